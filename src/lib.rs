//! streamrouter: predicate-driven matching, middleware, batching, and deferred re-injection for
//! DynamoDB-style change-data-capture streams.

pub mod attributes;
pub mod batch;
pub mod context;
pub mod deferral;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod predicate;
pub mod record;
pub mod registry;
pub mod utils;

pub use attributes::{AttributeDiff, AttributeTree, DiffTag, NumberValue, Path, PathSegment, Scalar};
pub use batch::BatchAggregator;
pub use context::Context;
pub use deferral::{DeferralMessage, DeferralSink};
pub use dispatch::{BatchReport, DispatchReport, Reporter, StreamRouter};
pub use error::{CallbackError, ConfigError, DecodeError, DeferralError, DispatchError, MiddlewareError, PredicateError, SchemaError};
pub use middleware::{Middleware, MiddlewareOutcome};
pub use predicate::{EvalContext, Evaluation, FnSchemaValidator, Predicate, SchemaValidator};
pub use record::{OperationKind, Record, WireAttributeValue, WireEventName, WireRecord, WireStreamRecord, WireUserIdentity};
pub use registry::{
    BatchCallback, BatchEntry, BatchKeyFn, Callback, FrozenRegistry, Handler, HandlerCallback, HandlerId, HandlerOptions,
    HandlerRegistry, ImageView, Mode, ResolvedValue, ValidationTarget,
};
