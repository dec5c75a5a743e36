use thiserror::Error;

/// Core error type for langtrace-core.
///
/// This covers the library's own failures only. A wrapped vendor call never
/// surfaces this type: `wrap_call` stays generic over the caller's error and
/// re-raises it unchanged, so error-handling code around the instrumented
/// call keeps matching on the vendor's original error.
#[derive(Debug, Error)]
pub enum LangtraceError {
    #[error("invalid sampling configuration: {0}")]
    SamplingConfig(String),

    #[error("attribute extraction failed: {0}")]
    AttributeExtraction(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = std::result::Result<T, LangtraceError>;
