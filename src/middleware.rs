//! The per-handler middleware chain (§4.3): an ordered list of steps run before the callback,
//! any of which may short-circuit the record or mutate the shared context.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::MiddlewareError;
use crate::record::Record;

/// What a middleware step decided for this record. `Continue` plays the role of the spec's
/// `next()` call; `ShortCircuit` plays the role of returning without calling it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiddlewareOutcome {
    Continue,
    ShortCircuit,
}

/// One step of a handler's middleware chain. Implementations may inspect `record`, mutate
/// `ctx`, and decide whether dispatch continues to the next step (and eventually the callback).
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, record: &Record, ctx: &mut Context) -> Result<MiddlewareOutcome, MiddlewareError>;

    /// Used only in error messages and reports; override for anything more specific than the
    /// type name.
    fn name(&self) -> &str {
        "middleware"
    }
}

/// Run an ordered chain of middleware against one record. Stops at the first `ShortCircuit` or
/// the first error — never runs the remaining steps past either. Two records never share a
/// `Context`; the caller is responsible for handing in a fresh one.
pub async fn run_chain(
    chain: &[Arc<dyn Middleware>],
    record: &Record,
    ctx: &mut Context,
) -> Result<MiddlewareOutcome, MiddlewareError> {
    for step in chain {
        match step.handle(record, ctx).await {
            Ok(MiddlewareOutcome::Continue) => continue,
            Ok(MiddlewareOutcome::ShortCircuit) => return Ok(MiddlewareOutcome::ShortCircuit),
            Err(e) => return Err(e),
        }
    }
    Ok(MiddlewareOutcome::Continue)
}
