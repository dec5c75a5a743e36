//! Pass-through stream proxy that makes span lifetime track stream lifetime.
//!
//! Contract:
//! - Every chunk the raw stream yields reaches the consumer unmodified, in
//!   order; the proxy only observes.
//! - The span ends exactly once: on exhaustion (status OK), on a mid-stream
//!   error (status ERROR, error re-raised to the consumer), or on drop if
//!   the consumer abandons iteration early.
//! - Iteration is strictly sequential per stream; independent streams share
//!   no mutable state.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures_util::stream::Stream;

use crate::attributes::AttributeBag;
use crate::error::CoreResult;
use crate::keys;
use crate::span::{SpanHandle, SpanStatus};
use crate::vendor::ChunkDelta;

/// Accumulated view of one in-flight stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    pub chunk_count: u64,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub fragments: Vec<String>,
    pub finish_reason: Option<String>,
}

impl StreamState {
    pub fn apply(&mut self, delta: &ChunkDelta) {
        self.chunk_count += 1;
        if let Some(t) = &delta.text {
            self.fragments.push(t.clone());
        }
        if let Some(n) = delta.input_tokens {
            *self.input_tokens.get_or_insert(0) += n;
        }
        if let Some(n) = delta.output_tokens {
            *self.output_tokens.get_or_insert(0) += n;
        }
        if let Some(r) = &delta.finish_reason {
            self.finish_reason = Some(r.clone());
        }
    }

    /// All text fragments seen so far, concatenated in arrival order.
    pub fn completion(&self) -> String {
        self.fragments.concat()
    }

    fn final_attributes(&self) -> AttributeBag {
        let mut bag = AttributeBag::new();
        bag.insert(keys::KEY_STREAM_CHUNKS, self.chunk_count);
        bag.insert_opt(keys::KEY_INPUT_TOKENS, self.input_tokens);
        bag.insert_opt(keys::KEY_OUTPUT_TOKENS, self.output_tokens);
        if self.input_tokens.is_some() || self.output_tokens.is_some() {
            bag.insert(
                keys::KEY_TOTAL_TOKENS,
                self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0),
            );
        }
        if !self.fragments.is_empty() {
            bag.insert(keys::KEY_COMPLETION, self.completion());
        }
        bag.insert_opt(keys::KEY_FINISH_REASON, self.finish_reason.clone());
        bag
    }
}

type DeltaFn<C> = Box<dyn Fn(&C) -> CoreResult<ChunkDelta> + Send + Sync>;

/// Wraps a raw chunk stream, forwarding every item untouched while feeding
/// per-chunk telemetry into the span it carries.
pub struct TracedStream<C, E> {
    inner: BoxStream<'static, Result<C, E>>,
    delta_fn: DeltaFn<C>,
    handle: SpanHandle,
    state: StreamState,
    redact_chunk_text: bool,
    done: bool,
}

impl<C, E> TracedStream<C, E> {
    pub(crate) fn new(
        inner: BoxStream<'static, Result<C, E>>,
        delta_fn: DeltaFn<C>,
        handle: SpanHandle,
        redact_chunk_text: bool,
    ) -> Self {
        Self {
            inner,
            delta_fn,
            handle,
            state: StreamState::default(),
            redact_chunk_text,
            done: false,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    fn observe_chunk(&mut self, chunk: &C) {
        if !self.handle.is_recording() {
            return;
        }
        match (self.delta_fn)(chunk) {
            Ok(delta) => {
                self.state.apply(&delta);
                let mut payload = AttributeBag::new();
                payload.insert(keys::KEY_CHUNK_INDEX, self.state.chunk_count - 1);
                if !self.redact_chunk_text {
                    payload.insert_opt(keys::KEY_CHUNK_TEXT, delta.text);
                }
                payload.insert_opt(keys::KEY_INPUT_TOKENS, delta.input_tokens);
                payload.insert_opt(keys::KEY_OUTPUT_TOKENS, delta.output_tokens);
                self.handle.add_event(keys::EVENT_STREAM_CHUNK, payload);
            }
            Err(e) => tracing::warn!(error = %e, "chunk attribute extraction failed"),
        }
    }

    fn finalize_ok(&mut self) {
        self.handle.set_attributes(self.state.final_attributes());
        self.handle.set_status(SpanStatus::Ok);
        self.handle.end();
    }

    fn finalize_error(&mut self, message: &str) {
        self.handle.set_attributes(self.state.final_attributes());
        self.handle.record_exception(message);
        self.handle.set_status(SpanStatus::error(message));
        self.handle.end();
    }
}

impl<C, E: std::fmt::Display> Stream for TracedStream<C, E> {
    type Item = Result<C, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.observe_chunk(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                this.finalize_error(&e.to_string());
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.finalize_ok();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<C, E> Drop for TracedStream<C, E> {
    fn drop(&mut self) {
        // Abandoned mid-iteration: flush what we saw and let the handle's
        // drop guarantee end the span.
        if !self.done && self.handle.is_recording() {
            self.handle.set_attributes(self.state.final_attributes());
            self.handle
                .set_attribute(keys::KEY_STREAM_ABANDONED, true.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttrValue;
    use crate::span::{SpanKind, Tracer};
    use crate::test_span::RecordingTracer;
    use futures::StreamExt;
    use futures::stream;

    #[derive(Debug, thiserror::Error)]
    #[error("stream broke: {0}")]
    struct PullError(String);

    fn text_delta(c: &String) -> CoreResult<ChunkDelta> {
        Ok(ChunkDelta {
            text: Some(c.clone()),
            ..Default::default()
        })
    }

    fn traced(
        tracer: &RecordingTracer,
        chunks: Vec<Result<String, PullError>>,
        redact: bool,
    ) -> TracedStream<String, PullError> {
        let handle = SpanHandle::started(tracer.start_span(
            "openai.chat.completions.create",
            SpanKind::Client,
            &AttributeBag::new(),
        ));
        TracedStream::new(
            stream::iter(chunks).boxed(),
            Box::new(text_delta),
            handle,
            redact,
        )
    }

    #[tokio::test]
    async fn full_consumption_passes_chunks_through_and_ends_once() {
        let tracer = RecordingTracer::new();
        let proxy = traced(
            &tracer,
            vec![Ok("Hel".to_string()), Ok("lo".to_string())],
            false,
        );

        let seen: Vec<String> = proxy.map(|r| r.unwrap()).collect().await;
        assert_eq!(seen, vec!["Hel", "lo"]);

        let span = tracer.store.single();
        assert_eq!(span.end_count(), 1);
        assert_eq!(span.status(), SpanStatus::Ok);
        assert_eq!(
            span.attr(keys::KEY_COMPLETION),
            Some(AttrValue::Str("Hello".into()))
        );
        assert_eq!(span.attr(keys::KEY_STREAM_CHUNKS), Some(AttrValue::Int(2)));
        let events = span.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, keys::EVENT_STREAM_CHUNK);
        assert_eq!(
            events[0].1.get(keys::KEY_CHUNK_TEXT),
            Some(&AttrValue::Str("Hel".into()))
        );
    }

    #[tokio::test]
    async fn mid_stream_error_finalizes_then_propagates() {
        let tracer = RecordingTracer::new();
        let mut proxy = traced(
            &tracer,
            vec![
                Ok("a".to_string()),
                Err(PullError("connection reset".into())),
            ],
            false,
        );

        assert_eq!(proxy.next().await.unwrap().unwrap(), "a");
        let err = proxy.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        // Fused after the terminal error.
        assert!(proxy.next().await.is_none());

        let span = tracer.store.single();
        assert_eq!(span.end_count(), 1);
        match span.status() {
            SpanStatus::Error { message } => assert!(message.contains("connection reset")),
            other => panic!("expected error status, got {other:?}"),
        }
        assert_eq!(span.exceptions().len(), 1);
    }

    #[tokio::test]
    async fn abandoned_stream_is_ended_on_drop() {
        let tracer = RecordingTracer::new();
        let mut proxy = traced(
            &tracer,
            vec![
                Ok("par".to_string()),
                Ok("tial".to_string()),
                Ok("!".to_string()),
            ],
            false,
        );

        assert_eq!(proxy.next().await.unwrap().unwrap(), "par");
        drop(proxy);

        let span = tracer.store.single();
        assert_eq!(span.end_count(), 1);
        assert_eq!(
            span.attr(keys::KEY_STREAM_ABANDONED),
            Some(AttrValue::Bool(true))
        );
        assert_eq!(
            span.attr(keys::KEY_COMPLETION),
            Some(AttrValue::Str("par".into()))
        );
        // No terminal status was reached; the span keeps the default.
        assert_eq!(span.status(), SpanStatus::Unset);
    }

    #[tokio::test]
    async fn redaction_keeps_counts_but_drops_text() {
        let tracer = RecordingTracer::new();
        let proxy = traced(&tracer, vec![Ok("secret".to_string())], true);
        let _: Vec<_> = proxy.collect().await;

        let span = tracer.store.single();
        let events = span.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].1.get(keys::KEY_CHUNK_TEXT).is_none());
        assert_eq!(events[0].1.get(keys::KEY_CHUNK_INDEX), Some(&AttrValue::Int(0)));
    }

    #[tokio::test]
    async fn token_deltas_accumulate_into_totals() {
        struct UsageChunk {
            text: &'static str,
            out: u64,
        }
        let tracer = RecordingTracer::new();
        let handle = SpanHandle::started(tracer.start_span(
            "anthropic.messages.create",
            SpanKind::Client,
            &AttributeBag::new(),
        ));
        let chunks: Vec<Result<UsageChunk, PullError>> = vec![
            Ok(UsageChunk { text: "a", out: 1 }),
            Ok(UsageChunk { text: "b", out: 2 }),
        ];
        let proxy = TracedStream::new(
            stream::iter(chunks).boxed(),
            Box::new(|c: &UsageChunk| {
                Ok(ChunkDelta {
                    text: Some(c.text.to_string()),
                    output_tokens: Some(c.out),
                    ..Default::default()
                })
            }),
            handle,
            false,
        );
        let _: Vec<_> = proxy.collect().await;

        let span = tracer.store.single();
        assert_eq!(span.attr(keys::KEY_OUTPUT_TOKENS), Some(AttrValue::Int(3)));
        assert_eq!(span.attr(keys::KEY_TOTAL_TOKENS), Some(AttrValue::Int(3)));
        assert!(span.attr(keys::KEY_INPUT_TOKENS).is_none());
    }

    #[tokio::test]
    async fn extraction_failure_never_breaks_consumption() {
        let _log = tracing::subscriber::set_default(
            tracing_subscriber::fmt().with_test_writer().finish(),
        );
        let tracer = RecordingTracer::new();
        let handle = SpanHandle::started(tracer.start_span(
            "openai.chat.completions.create",
            SpanKind::Client,
            &AttributeBag::new(),
        ));
        let chunks: Vec<Result<String, PullError>> =
            vec![Ok("ok".to_string()), Ok("still ok".to_string())];
        let proxy: TracedStream<String, PullError> = TracedStream::new(
            stream::iter(chunks).boxed(),
            Box::new(|_c: &String| {
                Err(crate::error::LangtraceError::AttributeExtraction(
                    "malformed chunk".into(),
                ))
            }),
            handle,
            false,
        );

        let seen: Vec<String> = proxy.map(|r| r.unwrap()).collect().await;
        assert_eq!(seen, vec!["ok", "still ok"]);

        let span = tracer.store.single();
        assert_eq!(span.end_count(), 1);
        assert_eq!(span.status(), SpanStatus::Ok);
        assert!(span.events().is_empty());
    }
}
