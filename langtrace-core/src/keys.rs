/// Span/event attribute keys emitted by the instrumentation core.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_SDK_NAME: &str = "langtrace.sdk.name";
pub const KEY_SERVICE_NAME: &str = "langtrace.service.name";
pub const KEY_SERVICE_TYPE: &str = "langtrace.service.type";
pub const KEY_SERVICE_VERSION: &str = "langtrace.service.version";

/// Caller-supplied span-name override, read from the ambient attribute bag.
pub const KEY_SPAN_NAME: &str = "langtrace.span.name";

/// Request/response attributes (GenAI semantic conventions).
pub const KEY_MODEL: &str = "gen_ai.request.model";
pub const KEY_RESPONSE_MODEL: &str = "gen_ai.response.model";
pub const KEY_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
pub const KEY_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
pub const KEY_TOTAL_TOKENS: &str = "gen_ai.usage.total_tokens";
pub const KEY_FINISH_REASON: &str = "gen_ai.response.finish_reason";
pub const KEY_COMPLETION: &str = "gen_ai.completion";

/// Streaming attributes.
pub const KEY_STREAM: &str = "llm.stream";
pub const KEY_STREAM_CHUNKS: &str = "llm.stream.chunk_count";
pub const KEY_STREAM_ABANDONED: &str = "llm.stream.abandoned";

/// Per-chunk span event name and its payload keys.
pub const EVENT_STREAM_CHUNK: &str = "gen_ai.content.chunk";
pub const KEY_CHUNK_INDEX: &str = "chunk.index";
pub const KEY_CHUNK_TEXT: &str = "chunk.text";

/// Value written under `KEY_SDK_NAME` on every span this crate opens.
pub const SDK_NAME: &str = "langtrace-core";
