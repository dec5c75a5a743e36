//! In-memory tracer double for unit tests.
//!
//! Records every span the crate opens so tests can assert on names, kinds,
//! attributes, events, status transitions and end counts without a real
//! telemetry backend.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::attributes::{AttrValue, AttributeBag};
use crate::span::{Span, SpanKind, SpanStatus, Tracer};

/// Everything observed about one span, inspectable after the fact.
#[derive(Debug)]
pub struct RecordedSpan {
    pub name: String,
    pub kind: SpanKind,
    attrs: Mutex<AttributeBag>,
    events: Mutex<Vec<(String, AttributeBag)>>,
    status: Mutex<SpanStatus>,
    exceptions: Mutex<Vec<String>>,
    end_count: AtomicU32,
    ended: AtomicBool,
}

impl RecordedSpan {
    fn new(name: &str, kind: SpanKind, attributes: &AttributeBag) -> Self {
        Self {
            name: name.to_string(),
            kind,
            attrs: Mutex::new(attributes.clone()),
            events: Mutex::new(Vec::new()),
            status: Mutex::new(SpanStatus::Unset),
            exceptions: Mutex::new(Vec::new()),
            end_count: AtomicU32::new(0),
            ended: AtomicBool::new(false),
        }
    }

    pub fn attr(&self, key: &str) -> Option<AttrValue> {
        self.attrs.lock().unwrap().get(key).cloned()
    }

    pub fn events(&self) -> Vec<(String, AttributeBag)> {
        self.events.lock().unwrap().clone()
    }

    pub fn status(&self) -> SpanStatus {
        self.status.lock().unwrap().clone()
    }

    pub fn exceptions(&self) -> Vec<String> {
        self.exceptions.lock().unwrap().clone()
    }

    pub fn end_count(&self) -> u32 {
        self.end_count.load(Ordering::SeqCst)
    }
}

/// All spans started through one [`RecordingTracer`], in start order.
#[derive(Debug, Default)]
pub struct SpanStore {
    pub spans: Mutex<Vec<Arc<RecordedSpan>>>,
}

impl SpanStore {
    pub fn len(&self) -> usize {
        self.spans.lock().unwrap().len()
    }

    pub fn span_names(&self) -> Vec<String> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// The one span a test expects; panics if there are zero or several.
    pub fn single(&self) -> Arc<RecordedSpan> {
        let spans = self.spans.lock().unwrap();
        assert_eq!(spans.len(), 1, "expected exactly one span, got {}", spans.len());
        spans[0].clone()
    }
}

#[derive(Clone)]
pub struct RecordingTracer {
    pub store: Arc<SpanStore>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self {
            store: Arc::new(SpanStore::default()),
        }
    }
}

impl Tracer for RecordingTracer {
    fn start_span(&self, name: &str, kind: SpanKind, attributes: &AttributeBag) -> Box<dyn Span> {
        let recorded = Arc::new(RecordedSpan::new(name, kind, attributes));
        self.store.spans.lock().unwrap().push(recorded.clone());
        Box::new(RecordingSpan { recorded })
    }
}

/// Live write side of one recorded span. Writes after `end` are dropped,
/// matching what a real backend is allowed to assume.
struct RecordingSpan {
    recorded: Arc<RecordedSpan>,
}

impl RecordingSpan {
    fn open(&self) -> bool {
        !self.recorded.ended.load(Ordering::SeqCst)
    }
}

impl Span for RecordingSpan {
    fn set_attribute(&mut self, key: &str, value: AttrValue) {
        if self.open() {
            self.recorded.attrs.lock().unwrap().insert(key, value);
        }
    }

    fn add_event(&mut self, name: &str, attributes: AttributeBag) {
        if self.open() {
            self.recorded
                .events
                .lock()
                .unwrap()
                .push((name.to_string(), attributes));
        }
    }

    fn set_status(&mut self, status: SpanStatus) {
        if self.open() {
            *self.recorded.status.lock().unwrap() = status;
        }
    }

    fn record_exception(&mut self, message: &str) {
        if self.open() {
            self.recorded
                .exceptions
                .lock()
                .unwrap()
                .push(message.to_string());
        }
    }

    fn end(&mut self) {
        self.recorded.end_count.fetch_add(1, Ordering::SeqCst);
        self.recorded.ended.store(true, Ordering::SeqCst);
    }
}
