//! The span contract this crate emits against, plus the end-once handle the
//! lifecycle manager and stream proxy share.
//!
//! The tracer itself is an external capability: callers plug in whatever
//! OpenTelemetry-compatible backend they already run. By default nothing is
//! installed and `Instrumentor` must be handed a tracer explicitly.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::attributes::{AttrValue, AttributeBag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Client,
    Server,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error {
        message: String,
    },
}

impl SpanStatus {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Externally-supplied span factory.
///
/// Requirements:
/// - Implementations must be thread-safe (`Send + Sync`) and `'static`.
/// - `start_span` may be called from any task; keep overhead minimal, this
///   sits on the hot path of every instrumented call.
pub trait Tracer: Send + Sync + 'static {
    fn start_span(&self, name: &str, kind: SpanKind, attributes: &AttributeBag) -> Box<dyn Span>;
}

/// One live span owned by the tracer backend.
///
/// The backend may assume `end` is called at most once and that no writes
/// arrive after it; [`SpanHandle`] enforces both.
pub trait Span: Send {
    fn set_attribute(&mut self, key: &str, value: AttrValue);
    fn add_event(&mut self, name: &str, attributes: AttributeBag);
    fn set_status(&mut self, status: SpanStatus);
    fn record_exception(&mut self, message: &str);
    fn end(&mut self);
}

/// End-once wrapper around a live span.
///
/// Writes after `end` are no-ops, and dropping an un-ended handle ends the
/// span, so no exit path can leak an open span. `noop()` is the
/// suppressed-span variant where every operation does nothing.
pub struct SpanHandle {
    span: Option<Box<dyn Span>>,
}

impl SpanHandle {
    pub fn started(span: Box<dyn Span>) -> Self {
        Self { span: Some(span) }
    }

    pub fn noop() -> Self {
        Self { span: None }
    }

    /// False once ended, and always false for the noop variant.
    pub fn is_recording(&self) -> bool {
        self.span.is_some()
    }

    pub fn set_attribute(&mut self, key: &str, value: AttrValue) {
        if let Some(s) = &mut self.span {
            s.set_attribute(key, value);
        }
    }

    pub fn set_attributes(&mut self, attributes: AttributeBag) {
        if let Some(s) = &mut self.span {
            for (k, v) in attributes.iter() {
                s.set_attribute(k, v.clone());
            }
        }
    }

    pub fn add_event(&mut self, name: &str, attributes: AttributeBag) {
        if let Some(s) = &mut self.span {
            s.add_event(name, attributes);
        }
    }

    pub fn set_status(&mut self, status: SpanStatus) {
        if let Some(s) = &mut self.span {
            s.set_status(status);
        }
    }

    pub fn record_exception(&mut self, message: &str) {
        if let Some(s) = &mut self.span {
            s.record_exception(message);
        }
    }

    pub fn end(&mut self) {
        if let Some(mut s) = self.span.take() {
            s.end();
        }
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        self.end();
    }
}

impl fmt::Debug for SpanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanHandle")
            .field("recording", &self.is_recording())
            .finish()
    }
}

static GLOBAL_TRACER: OnceCell<Arc<dyn Tracer>> = OnceCell::new();

/// Install a process-wide tracer. Returns `false` if one is already installed.
///
/// This is a write-once global for the process lifetime (backed by
/// `OnceCell`). Library code that can thread a tracer explicitly should
/// prefer `Instrumentor::new`.
pub fn set_global_tracer(tracer: Arc<dyn Tracer>) -> bool {
    GLOBAL_TRACER.set(tracer).is_ok()
}

pub fn global_tracer() -> Option<Arc<dyn Tracer>> {
    GLOBAL_TRACER.get().cloned()
}
