pub mod attributes;
pub mod config;
pub mod context;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod sampler;
pub mod span;
pub mod stream;
#[cfg(test)]
pub mod test_span;
pub mod vendor;
