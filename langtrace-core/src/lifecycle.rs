//! The single choke point every instrumented vendor call passes through.
//!
//! `wrap_call` opens a span (consulting the sampler), invokes the original
//! method with its original arguments, and guarantees the span ends exactly
//! once on every non-streaming exit path. Streaming results are handed to
//! [`TracedStream`], which takes over span ownership and defers the end
//! until the consumer finishes with the stream.
//!
//! Tracing must never change business behavior: a suppressed call still
//! runs, extraction failures only degrade telemetry, and the caller's error
//! type passes through untouched.

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use futures::stream::BoxStream;

use crate::attributes::AttributeBag;
use crate::config::Config;
use crate::context::{self, ActiveCall};
use crate::error::CoreResult;
use crate::keys;
use crate::sampler::{Sampler, SamplingConfig, SamplingDecision};
use crate::span::{self, SpanHandle, SpanKind, SpanStatus, Tracer};
use crate::stream::TracedStream;
use crate::vendor::VendorExtractor;

/// What the original vendor method produced, tagged by the vendor binding.
/// The vendor decides value-vs-stream at the call site; the core never
/// probes the result's shape at runtime.
pub enum CallResult<T, C, E> {
    Value(T),
    Stream(BoxStream<'static, Result<C, E>>),
}

/// What the caller gets back: the untouched value, or the traced
/// pass-through stream standing in for the raw one.
pub enum CallOutcome<T, C, E> {
    Value(T),
    Stream(TracedStream<C, E>),
}

impl<T, C, E> fmt::Debug for CallOutcome<T, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.debug_tuple("Value").finish(),
            Self::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

impl<T, C, E> CallOutcome<T, C, E> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<TracedStream<C, E>> {
        match self {
            Self::Stream(s) => Some(s),
            Self::Value(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct Instrumentor {
    tracer: Arc<dyn Tracer>,
    sampler: Sampler,
    redact_chunk_text: bool,
}

impl Instrumentor {
    pub fn new(tracer: Arc<dyn Tracer>, sampler: Sampler) -> Self {
        Self {
            tracer,
            sampler,
            redact_chunk_text: false,
        }
    }

    /// Build from a validated [`Config`]: disabled-method sets feed the
    /// sampler, the redaction flag feeds the stream proxy.
    pub fn from_config(tracer: Arc<dyn Tracer>, cfg: &Config) -> CoreResult<Self> {
        let sampler = Sampler::new(SamplingConfig::from_config(cfg)?);
        Ok(Self {
            tracer,
            sampler,
            redact_chunk_text: cfg.redact_chunk_text,
        })
    }

    pub fn with_chunk_redaction(mut self, on: bool) -> Self {
        self.redact_chunk_text = on;
        self
    }

    /// Wrap one intercepted vendor call.
    ///
    /// `extractor` derives all vendor-specific attributes; `call` is the
    /// original method, invoked exactly once with the original arguments.
    /// The span (kind CLIENT) opens before the call and the call runs inside
    /// its scope, so spans opened further down nest underneath it and
    /// inherit its sampling verdict.
    pub async fn wrap_call<A, T, C, E, X, F, Fut>(
        &self,
        extractor: Arc<X>,
        args: A,
        call: F,
    ) -> Result<CallOutcome<T, C, E>, E>
    where
        X: VendorExtractor<A, T, C> + 'static,
        C: Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<CallResult<T, C, E>, E>>,
    {
        let mut attrs = AttributeBag::new();
        attrs.insert(keys::KEY_SDK_NAME, keys::SDK_NAME);
        attrs.merge(extractor.service().to_attributes());
        match extractor.request_attributes(&args) {
            Ok(req) => attrs.merge(req),
            Err(e) => tracing::warn!(error = %e, "request attribute extraction failed"),
        }

        let ambient = context::ambient_attributes();
        let span_name = ambient
            .get(keys::KEY_SPAN_NAME)
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| extractor.span_name());
        attrs.merge(ambient);

        let decision = self.sampler.decide(&span_name, &attrs, context::active_call());
        let mut handle = self.open_span(&span_name, SpanKind::Client, &attrs, decision);

        let scope = ActiveCall {
            sampled: decision.is_sampled(),
            instrumented: true,
        };
        match context::with_active_call(scope, call(args)).await {
            Ok(CallResult::Value(value)) => {
                if handle.is_recording() {
                    match extractor.response_attributes(&value) {
                        Ok(resp) => handle.set_attributes(resp),
                        Err(e) => {
                            tracing::warn!(error = %e, "response attribute extraction failed")
                        }
                    }
                }
                handle.set_status(SpanStatus::Ok);
                handle.end();
                Ok(CallOutcome::Value(value))
            }
            Ok(CallResult::Stream(raw)) => {
                handle.set_attribute(keys::KEY_STREAM, true.into());
                let ext = extractor.clone();
                Ok(CallOutcome::Stream(TracedStream::new(
                    raw,
                    Box::new(move |c: &C| ext.chunk_delta(c)),
                    handle,
                    self.redact_chunk_text,
                )))
            }
            Err(e) => {
                handle.record_exception(&e.to_string());
                handle.set_status(SpanStatus::error(e.to_string()));
                handle.end();
                Err(e)
            }
        }
    }

    /// Run arbitrary caller code inside a fresh instrumented root span.
    pub async fn with_root_span<F, Fut, R>(&self, name: &str, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let mut attrs = AttributeBag::new();
        attrs.insert(keys::KEY_SDK_NAME, keys::SDK_NAME);
        attrs.merge(context::ambient_attributes());

        let decision = self.sampler.decide(name, &attrs, context::active_call());
        let mut handle = self.open_span(name, SpanKind::Internal, &attrs, decision);

        let scope = ActiveCall {
            sampled: decision.is_sampled(),
            instrumented: true,
        };
        let out = context::with_active_call(scope, f()).await;
        handle.set_status(SpanStatus::Ok);
        handle.end();
        out
    }

    fn open_span(
        &self,
        name: &str,
        kind: SpanKind,
        attrs: &AttributeBag,
        decision: SamplingDecision,
    ) -> SpanHandle {
        if decision.is_recorded() {
            SpanHandle::started(self.tracer.start_span(name, kind, attrs))
        } else {
            SpanHandle::noop()
        }
    }
}

/// Convenience wrapper over the process-wide tracer: runs `f` inside a root
/// span when a global tracer is installed, otherwise runs it untraced.
pub async fn with_root_span<F, Fut, R>(name: &str, f: F) -> R
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = R>,
{
    match span::global_tracer() {
        Some(tracer) => {
            Instrumentor::new(tracer, Sampler::default())
                .with_root_span(name, f)
                .await
        }
        None => f().await,
    }
}
