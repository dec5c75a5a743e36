//! The contract vendors implement to describe their calls.
//!
//! Everything attribute-shaped lives behind this trait as declarative lookup
//! logic; the core never interprets vendor payloads itself. Extraction is
//! fallible but fail-open: an error here degrades the span, never the call.

use crate::attributes::AttributeBag;
use crate::error::CoreResult;
use crate::keys;

/// Static service descriptors for one instrumented vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// e.g. "openai", "pinecone".
    pub name: String,
    /// e.g. "llm", "vectordb", "framework".
    pub service_type: String,
    pub version: Option<String>,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn to_attributes(&self) -> AttributeBag {
        let mut bag = AttributeBag::new();
        bag.insert(keys::KEY_SERVICE_NAME, self.name.as_str());
        bag.insert(keys::KEY_SERVICE_TYPE, self.service_type.as_str());
        bag.insert_opt(keys::KEY_SERVICE_VERSION, self.version.clone());
        bag
    }
}

/// Incremental data pulled out of one streamed chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkDelta {
    pub text: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub finish_reason: Option<String>,
}

/// Vendor-supplied attribute derivation for one intercepted method.
///
/// `A` is the call's argument shape, `T` its awaited value, `C` the chunk
/// type of its streaming variant. Implementations must be cheap and pure;
/// they run on the hot path of every call and every chunk.
pub trait VendorExtractor<A, T, C>: Send + Sync {
    /// Fully-qualified method name, e.g. "openai.chat.completions.create".
    /// This is both the default span name and the sampling lookup key.
    fn span_name(&self) -> String;

    fn service(&self) -> ServiceInfo;

    fn request_attributes(&self, args: &A) -> CoreResult<AttributeBag>;

    fn response_attributes(&self, value: &T) -> CoreResult<AttributeBag>;

    fn chunk_delta(&self, chunk: &C) -> CoreResult<ChunkDelta>;
}

/// A placeholder extractor that derives nothing.
/// Useful for tests or as a starting point for a new vendor.
pub struct NullExtractor;

impl<A, T, C> VendorExtractor<A, T, C> for NullExtractor {
    fn span_name(&self) -> String {
        "null.call".into()
    }

    fn service(&self) -> ServiceInfo {
        ServiceInfo::new("null", "llm")
    }

    fn request_attributes(&self, _args: &A) -> CoreResult<AttributeBag> {
        Ok(AttributeBag::new())
    }

    fn response_attributes(&self, _value: &T) -> CoreResult<AttributeBag> {
        Ok(AttributeBag::new())
    }

    fn chunk_delta(&self, _chunk: &C) -> CoreResult<ChunkDelta> {
        Ok(ChunkDelta::default())
    }
}
