//! Per-span recording decision.
//!
//! Disabling one vendor's method must not silently drag down unrelated
//! children of other vendors under the same logical operation, except when
//! the parent's suppression was itself deliberate. Spans that did not come
//! from this crate (no SDK marker attribute) get their decision deferred to
//! the backend rather than suppressed here.

use std::collections::HashSet;

use crate::attributes::AttributeBag;
use crate::config::Config;
use crate::context::ActiveCall;
use crate::error::CoreResult;
use crate::keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingDecision {
    /// Record and export.
    RecordAndSample,
    /// Record, but defer the sampling verdict (foreign span).
    Record,
    /// Do not create a span at all.
    NotRecord,
}

impl SamplingDecision {
    pub fn is_recorded(&self) -> bool {
        !matches!(self, Self::NotRecord)
    }

    pub fn is_sampled(&self) -> bool {
        matches!(self, Self::RecordAndSample)
    }
}

/// Immutable set of fully-qualified method names that never produce a span.
#[derive(Debug, Clone, Default)]
pub struct SamplingConfig {
    disabled: HashSet<String>,
}

impl SamplingConfig {
    /// Flatten the validated per-vendor config into one lookup set.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        cfg.validate()?;
        let disabled = cfg
            .sampling
            .disabled
            .values()
            .flatten()
            .cloned()
            .collect();
        Ok(Self { disabled })
    }

    /// Builder-style variant for embedding without a config file.
    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.disabled.insert(name.into());
        self
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sampler {
    config: SamplingConfig,
}

impl Sampler {
    pub fn new(config: SamplingConfig) -> Self {
        Self { config }
    }

    /// Decide whether a span with this name/attribute set should exist,
    /// given the innermost active call (if any) as parent.
    pub fn decide(
        &self,
        name: &str,
        attributes: &AttributeBag,
        parent: Option<ActiveCall>,
    ) -> SamplingDecision {
        if self.config.is_disabled(name) {
            tracing::debug!(span = name, "span disabled by configuration");
            return SamplingDecision::NotRecord;
        }
        if !attributes.contains_key(keys::KEY_SDK_NAME) {
            return SamplingDecision::Record;
        }
        if let Some(p) = parent
            && !p.sampled
            && p.instrumented
        {
            tracing::debug!(span = name, "inheriting suppression from parent");
            return SamplingDecision::NotRecord;
        }
        SamplingDecision::RecordAndSample
    }
}
