//! The typed error taxonomy from the dispatch spec (§7): one type per failure class instead of
//! a shared stringly-typed bag, so callers can match on what actually went wrong.

use crate::registry::HandlerId;

/// Fails handler registration outright — caught before a single record is ever processed.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("batch handler requires a batch_key")]
    MissingBatchKey,
    #[error("operationKinds must be non-empty")]
    EmptyOperationKinds,
    #[error("max_batch_size must be greater than zero")]
    InvalidMaxBatchSize,
}

/// A malformed wire record. The record is skipped for every handler; the incident is reported,
/// never propagated.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed attribute value at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// A predicate failed to evaluate (as opposed to evaluating to `false`). Treated identically to
/// "predicate returned false" for the handler it occurred on; reported separately so callers can
/// tell the two apart.
#[derive(Debug, thiserror::Error, Clone)]
pub enum PredicateError {
    #[error("schema validation failed: {0}")]
    Schema(#[from] SchemaError),
    #[error("type guard panicked or failed: {0}")]
    TypeGuard(String),
}

/// A schema validator rejected an image, or failed to run at all.
#[derive(Debug, thiserror::Error, Clone)]
pub enum SchemaError {
    #[error("value did not conform to schema: {0}")]
    Invalid(String),
}

/// A middleware step failed. Aborts dispatch for that handler on that record only; sibling
/// handlers still run.
#[derive(Debug, thiserror::Error, Clone)]
pub enum MiddlewareError {
    #[error("middleware {step} failed: {reason}")]
    Failed { step: String, reason: String },
}

/// The user's callback returned an error. Caught; the engine continues with the remaining
/// handlers and records.
#[derive(Debug, thiserror::Error, Clone)]
pub enum CallbackError {
    #[error("handler callback failed: {0}")]
    Failed(String),
}

/// The deferral queue rejected a write.
#[derive(Debug, thiserror::Error, Clone)]
pub enum DeferralError {
    #[error("deferral sink rejected message: {0}")]
    SinkRejected(String),
}

/// Any failure that can occur while dispatching one handler against one record. Folded into a
/// [`crate::dispatch::DispatchReport`] rather than propagated out of `process_batch`.
#[derive(Debug, thiserror::Error, Clone)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Predicate(#[from] PredicateError),
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),
    #[error(transparent)]
    Callback(#[from] CallbackError),
    #[error(transparent)]
    Deferral(#[from] DeferralError),
    #[error("deferred handler {0:?} matched but no deferral sink is configured")]
    DeferralSinkMissing(HandlerId),
}
