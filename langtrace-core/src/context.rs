//! Call-chain-scoped ambient state.
//!
//! Two task-locals back this module: the caller-facing ambient attribute bag
//! and the crate-internal active-call record the sampler reads for parent
//! decisions. Both follow strict nested-scope discipline: a nested scope
//! shadows only its own extent, siblings and concurrent tasks never observe
//! each other's values, and the outer value is restored when a scope exits.
//! This must never degrade to a bare mutable global; concurrent requests
//! would cross-contaminate each other's trace attributes.

use std::future::Future;

use crate::attributes::AttributeBag;

tokio::task_local! {
    static AMBIENT_ATTRIBUTES: AttributeBag;
    static ACTIVE_CALL: ActiveCall;
}

/// Run `fut` with `bag` installed as the ambient attribute bag.
///
/// Whatever instrumented call happens inside `fut` picks the bag up and
/// merges it into its span attributes (later-wins), without the call's
/// signature changing. An entry under `langtrace.span.name` additionally
/// overrides the span name.
pub async fn with_attributes<F>(bag: AttributeBag, fut: F) -> F::Output
where
    F: Future,
{
    AMBIENT_ATTRIBUTES.scope(bag, fut).await
}

/// Synchronous variant of [`with_attributes`].
pub fn with_attributes_sync<F, R>(bag: AttributeBag, f: F) -> R
where
    F: FnOnce() -> R,
{
    AMBIENT_ATTRIBUTES.sync_scope(bag, f)
}

/// Snapshot of the current ambient bag; empty if none is installed.
/// Never fails.
pub fn ambient_attributes() -> AttributeBag {
    AMBIENT_ATTRIBUTES
        .try_with(|b| b.clone())
        .unwrap_or_default()
}

/// Sampling-relevant facts about the innermost instrumented call in whose
/// dynamic extent we are currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCall {
    /// Parent's sampling verdict: false means deliberately suppressed.
    pub sampled: bool,
    /// Whether the parent span was opened by this crate at all.
    pub instrumented: bool,
}

/// The innermost active call record, if any.
pub fn active_call() -> Option<ActiveCall> {
    ACTIVE_CALL.try_with(|c| *c).ok()
}

pub(crate) async fn with_active_call<F>(call: ActiveCall, fut: F) -> F::Output
where
    F: Future,
{
    ACTIVE_CALL.scope(call, fut).await
}
