use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::Path};

use crate::error::{CoreResult, LangtraceError};

/// Per-vendor sampling configuration: fully-qualified method names that must
/// never produce a span. Built once at initialization, immutable afterward.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct SamplingCfg {
    /// Vendor key to disabled method names, e.g.
    /// `openai = ["openai.chat.completions.create"]`.
    #[serde(default)]
    pub disabled: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingCfg,
    /// When set, per-chunk span events carry token deltas and the chunk
    /// index but omit the chunk text payload.
    #[serde(default)]
    pub redact_chunk_text: bool,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    /// Misconfiguration fails here, not per-call.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(LangtraceError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| LangtraceError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Self>(s).map_err(|e| LangtraceError::Other(e.into()))?
            }
            Some("toml") => {
                toml::from_str::<Self>(s).map_err(|e| LangtraceError::Other(e.into()))?
            }
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| LangtraceError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s).map_err(|e| LangtraceError::Other(e.into()))
                })?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check internal consistency of the disabled-method sets.
    ///
    /// Every entry must be a fully-qualified method name under its vendor
    /// key ("openai" -> "openai.chat.completions.create"); anything else is
    /// a typo that would silently disable nothing.
    pub fn validate(&self) -> CoreResult<()> {
        for (vendor, methods) in &self.sampling.disabled {
            if vendor.is_empty() {
                return Err(LangtraceError::SamplingConfig(
                    "empty vendor key in disabled set".into(),
                ));
            }
            let prefix = format!("{vendor}.");
            for method in methods {
                if !method.starts_with(&prefix) {
                    return Err(LangtraceError::SamplingConfig(format!(
                        "disabled method '{method}' is not under vendor '{vendor}'"
                    )));
                }
            }
        }
        Ok(())
    }
}
