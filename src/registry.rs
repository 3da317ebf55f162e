//! The handler registry (§4.4): append-only during registration, frozen into a read-only
//! `Arc<[Handler]>` before dispatch ever sees it.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::attributes::{AttributeTree, DiffTag, Path};
use crate::context::Context;
use crate::error::{CallbackError, ConfigError};
use crate::middleware::Middleware;
use crate::predicate::Predicate;
use crate::record::{OperationKind, Record};

/// Opaque handler identity, assigned at registration order. Exists only as the aggregator's
/// grouping key and the deferral message's handler reference — never compared across
/// registries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn new(index: usize) -> HandlerId {
        HandlerId(index as u64)
    }

    /// The raw `u64` form, for embedding in a [`crate::deferral::DeferralMessage`] or indexing
    /// back into a [`FrozenRegistry`].
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Which image(s) a handler's predicate is evaluated against. MODIFY handlers may choose any of
/// the three; INSERT is always `NewImage` and REMOVE/TTL_REMOVE are always `OldImage` regardless
/// of what a handler requests (§4.4 step 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationTarget {
    NewImage,
    OldImage,
    Both,
}

impl Default for ValidationTarget {
    fn default() -> Self {
        ValidationTarget::NewImage
    }
}

/// The value a callback actually receives for one image: the raw decoded tree, or the
/// schema-parsed value when the handler's predicate was schema-backed (§4.2, §4.4 step 4).
#[derive(Clone, Debug)]
pub enum ResolvedValue {
    Raw(AttributeTree),
    Parsed(serde_json::Value),
}

/// The resolved view of a record's image(s) passed to a callback, uniform across the three
/// JS-side callback shapes in §6 (single INSERT/REMOVE gets one image; single MODIFY gets one or
/// two; batch entries carry the same shape per entry).
#[derive(Clone, Debug, Default)]
pub struct ImageView {
    pub new_image: Option<ResolvedValue>,
    pub old_image: Option<ResolvedValue>,
}

/// One callback invocation's worth of single-mode delivery.
#[async_trait]
pub trait Callback: Send + Sync {
    async fn call(&self, view: ImageView, record: &Record, ctx: &mut Context) -> Result<(), CallbackError>;
}

/// One flushed batch's worth of delivery (§4.5): `entries` preserves arrival order.
#[async_trait]
pub trait BatchCallback: Send + Sync {
    async fn call(&self, entries: Vec<BatchEntry>, ctx: &mut Context) -> Result<(), CallbackError>;
}

/// One record accumulated in a batch aggregator slot, carrying its own resolved view.
#[derive(Clone, Debug)]
pub struct BatchEntry {
    pub record: Record,
    pub view: ImageView,
}

pub type BatchKeyFn = Arc<dyn Fn(&Record) -> String + Send + Sync>;

/// A handler's dispatch mode: one callback per matching record, or accumulation into the
/// per-invocation aggregator keyed by `batchKey`.
pub enum Mode {
    Single(Arc<dyn Callback>),
    Batch {
        batch_key: BatchKeyFn,
        max_batch_size: Option<usize>,
        callback: Arc<dyn BatchCallback>,
    },
}

/// Either callback shape a caller can hand to a registration method; which variant is expected
/// is implied by whether `HandlerOptions::batch_with` was used.
pub enum HandlerCallback {
    Single(Arc<dyn Callback>),
    Batch(Arc<dyn BatchCallback>),
}

/// A registered routing entry (§3 Data model: Handler).
pub struct Handler {
    pub id: HandlerId,
    pub operation_kinds: HashSet<OperationKind>,
    pub predicate: Predicate,
    /// `None` means "use the per-operation-kind default" (§4.4 step 2); only meaningful for
    /// MODIFY, since INSERT/REMOVE/TTL_REMOVE ignore it entirely.
    pub validation_target: Option<ValidationTarget>,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub mode: Mode,
    pub deferred: bool,
}

/// Builder for the `opts` object of §4.4/§6: `HandlerOptions::new().validation_target(..)`.
#[derive(Default)]
pub struct HandlerOptions {
    validation_target: Option<ValidationTarget>,
    batch_key: Option<BatchKeyFn>,
    max_batch_size: Option<usize>,
    exclude_ttl: bool,
    deferred: bool,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl HandlerOptions {
    pub fn new() -> HandlerOptions {
        HandlerOptions::default()
    }

    pub fn validation_target(mut self, target: ValidationTarget) -> HandlerOptions {
        self.validation_target = Some(target);
        self
    }

    /// Marks this handler as batch mode: requires a `HandlerCallback::Batch` at registration.
    pub fn batch_with(
        mut self,
        batch_key: impl Fn(&Record) -> String + Send + Sync + 'static,
        max_batch_size: Option<usize>,
    ) -> HandlerOptions {
        self.batch_key = Some(Arc::new(batch_key));
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn exclude_ttl(mut self, exclude: bool) -> HandlerOptions {
        self.exclude_ttl = exclude;
        self
    }

    pub fn deferred(mut self, deferred: bool) -> HandlerOptions {
        self.deferred = deferred;
        self
    }

    pub fn use_middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> HandlerOptions {
        self.middleware = middleware;
        self
    }
}

/// Owns the append-only `Vec<Handler>` built up during registration. Call [`HandlerRegistry::freeze`]
/// once configuration is complete to obtain the read-only registry dispatch actually consumes.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Handler>,
}

impl HandlerRegistry {
    pub fn new() -> HandlerRegistry {
        HandlerRegistry::default()
    }

    pub fn on_insert(
        &mut self,
        predicate: Predicate,
        callback: HandlerCallback,
        opts: HandlerOptions,
    ) -> Result<HandlerId, ConfigError> {
        self.register(HashSet::from([OperationKind::Insert]), predicate, opts, callback)
    }

    pub fn on_modify(
        &mut self,
        predicate: Predicate,
        callback: HandlerCallback,
        opts: HandlerOptions,
    ) -> Result<HandlerId, ConfigError> {
        self.register(HashSet::from([OperationKind::Modify]), predicate, opts, callback)
    }

    pub fn on_remove(
        &mut self,
        predicate: Predicate,
        callback: HandlerCallback,
        opts: HandlerOptions,
    ) -> Result<HandlerId, ConfigError> {
        let mut kinds = HashSet::from([OperationKind::Remove, OperationKind::TtlRemove]);
        if opts.exclude_ttl {
            kinds.remove(&OperationKind::TtlRemove);
        }
        self.register(kinds, predicate, opts, callback)
    }

    pub fn on_ttl_remove(
        &mut self,
        predicate: Predicate,
        callback: HandlerCallback,
        opts: HandlerOptions,
    ) -> Result<HandlerId, ConfigError> {
        self.register(HashSet::from([OperationKind::TtlRemove]), predicate, opts, callback)
    }

    /// Sugar over `on_modify` with `changed_attribute(path)` (§4.4).
    pub fn on_change(
        &mut self,
        path: impl Into<Path>,
        callback: HandlerCallback,
        opts: HandlerOptions,
    ) -> Result<HandlerId, ConfigError> {
        self.on_modify(Predicate::changed_attribute(path), callback, opts)
    }

    /// Sugar over `on_modify` with `field_cleared(path)`.
    pub fn on_field_cleared(
        &mut self,
        path: impl Into<Path>,
        callback: HandlerCallback,
        opts: HandlerOptions,
    ) -> Result<HandlerId, ConfigError> {
        self.on_modify(Predicate::field_cleared(path), callback, opts)
    }

    /// Sugar over `on_modify` with `any_of(...)` spanning the requested diff tags.
    pub fn on_change_types(
        &mut self,
        path: impl Into<Path>,
        kinds: impl IntoIterator<Item = DiffTag>,
        callback: HandlerCallback,
        opts: HandlerOptions,
    ) -> Result<HandlerId, ConfigError> {
        let path = path.into();
        let predicates = kinds.into_iter().map(|kind| match kind {
            DiffTag::Added => Predicate::added_attribute(path.clone()),
            DiffTag::Changed => Predicate::changed_attribute(path.clone()),
            DiffTag::Cleared => Predicate::field_cleared(path.clone()),
        });
        self.on_modify(Predicate::any_of(predicates), callback, opts)
    }

    fn register(
        &mut self,
        operation_kinds: HashSet<OperationKind>,
        predicate: Predicate,
        opts: HandlerOptions,
        callback: HandlerCallback,
    ) -> Result<HandlerId, ConfigError> {
        if operation_kinds.is_empty() {
            return Err(ConfigError::EmptyOperationKinds);
        }

        let mode = match callback {
            HandlerCallback::Single(cb) => Mode::Single(cb),
            HandlerCallback::Batch(cb) => {
                let batch_key = opts.batch_key.clone().ok_or(ConfigError::MissingBatchKey)?;
                if let Some(0) = opts.max_batch_size {
                    return Err(ConfigError::InvalidMaxBatchSize);
                }
                Mode::Batch {
                    batch_key,
                    max_batch_size: opts.max_batch_size,
                    callback: cb,
                }
            }
        };

        let id = HandlerId::new(self.handlers.len());
        self.handlers.push(Handler {
            id,
            operation_kinds,
            predicate,
            validation_target: opts.validation_target,
            middleware: opts.middleware,
            mode,
            deferred: opts.deferred,
        });
        Ok(id)
    }

    pub fn freeze(self) -> FrozenRegistry {
        FrozenRegistry {
            handlers: self.handlers.into(),
        }
    }
}

/// The read-only registry dispatch consumes: `Vec<Handler>` turned into `Arc<[Handler]>` so a
/// `StreamRouter` can be cloned cheaply and shared across tasks without re-registering anything.
#[derive(Clone)]
pub struct FrozenRegistry {
    handlers: Arc<[Handler]>,
}

impl FrozenRegistry {
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn handler(&self, id: HandlerId) -> &Handler {
        &self.handlers[id.raw() as usize]
    }
}
