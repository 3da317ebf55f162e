//! The dispatch core (§4.4, §5): ties the registry, predicate evaluation, middleware, batching,
//! and deferral together into `StreamRouter::process_batch`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::attributes::AttributeDiff;
use crate::batch::BatchAggregator;
use crate::context::Context;
use crate::deferral::{DeferralMessage, DeferralSink};
use crate::error::DispatchError;
use crate::middleware::{run_chain, MiddlewareOutcome};
use crate::predicate::EvalContext;
use crate::record::{OperationKind, Record, WireRecord};
use crate::registry::{BatchEntry, FrozenRegistry, Handler, HandlerId, ImageView, Mode, ResolvedValue, ValidationTarget};

/// One incident: a decode/predicate/middleware/callback/deferral failure, reported instead of
/// propagated (§7). `handler_id` is absent for a decode failure, since that occurs before
/// matching reaches any handler.
#[derive(Clone, Debug)]
pub struct DispatchReport {
    pub event_id: String,
    pub handler_id: Option<HandlerId>,
    pub error: DispatchError,
}

/// The result of one `process_batch`/`process_reinjected` call: every incident that occurred,
/// in the order it was produced. An empty `reports` means every matched handler ran to
/// completion without error — it says nothing about how many handlers matched.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub reports: Vec<DispatchReport>,
}

/// Push-style observability: invoked once per `DispatchReport` as it's produced, in addition to
/// that report being folded into the `BatchReport` returned at the end (§7.1).
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, report: &DispatchReport);
}

/// Ties a frozen registry to an optional deferral sink and optional reporter, and drives
/// `process_batch`/`process_reinjected` over incoming wire records. Holds no table or queue
/// client itself (§9) — both are supplied by the embedder.
#[derive(Clone)]
pub struct StreamRouter {
    registry: FrozenRegistry,
    deferral_sink: Option<Arc<dyn DeferralSink>>,
    reporter: Option<Arc<dyn Reporter>>,
}

impl StreamRouter {
    pub fn new(registry: FrozenRegistry) -> StreamRouter {
        StreamRouter {
            registry,
            deferral_sink: None,
            reporter: None,
        }
    }

    pub fn with_deferral_sink(mut self, sink: Arc<dyn DeferralSink>) -> StreamRouter {
        self.deferral_sink = Some(sink);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> StreamRouter {
        self.reporter = Some(reporter);
        self
    }

    /// Process one batch of freshly-read stream records (`deferred = false`).
    pub async fn process_batch(&self, records: Vec<WireRecord>) -> BatchReport {
        self.process_records(records, false).await
    }

    /// Process one batch of records the deferral consumer is re-injecting (`deferred = true`);
    /// only handlers registered with `deferred(true)` are eligible for these (§4.6).
    pub async fn process_reinjected(&self, records: Vec<WireRecord>) -> BatchReport {
        self.process_records(records, true).await
    }

    async fn process_records(&self, records: Vec<WireRecord>, deferred: bool) -> BatchReport {
        let mut reports = Vec::new();
        let mut aggregator = BatchAggregator::new();

        for wire in &records {
            match Record::decode(wire, deferred) {
                Ok(record) => self.dispatch_record(&record, &mut aggregator, &mut reports).await,
                Err(e) => {
                    self.emit_report(
                        &mut reports,
                        DispatchReport {
                            event_id: wire.event_id.clone(),
                            handler_id: None,
                            error: DispatchError::Decode(e),
                        },
                    )
                    .await;
                }
            }
        }

        for ((handler_id, _key), entries) in aggregator.drain_all() {
            self.flush_batch(handler_id, entries, &mut reports).await;
        }

        BatchReport { reports }
    }

    async fn dispatch_record(&self, record: &Record, aggregator: &mut BatchAggregator, reports: &mut Vec<DispatchReport>) {
        let diff = AttributeDiff::compute(record.old_image.as_ref(), record.new_image.as_ref());
        let mut early_flushes: Vec<(HandlerId, Vec<BatchEntry>)> = Vec::new();

        for handler in self.registry.handlers() {
            if !handler.operation_kinds.contains(&record.operation_kind) {
                continue;
            }

            let target = resolve_target(record.operation_kind, handler);
            let eval_ctx = EvalContext {
                diff: &diff,
                new_image: record.new_image.as_ref(),
                old_image: record.old_image.as_ref(),
                target,
            };

            let evaluation = match handler.predicate.evaluate(&eval_ctx) {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    self.emit_report(reports, dispatch_error(record, handler.id, e.into())).await;
                    continue;
                }
            };
            if !evaluation.matched {
                continue;
            }

            if record.operation_kind == OperationKind::Insert {
                if handler.deferred && !record.deferred {
                    self.emit_deferral(record, handler, reports).await;
                    continue;
                }
                if !handler.deferred && record.deferred {
                    // Re-injection pass: only handlers registered with `deferred(true)` are
                    // eligible (§4.6) — a non-deferred handler already fired on the first pass.
                    continue;
                }
            }

            let mut ctx = Context::new();
            let outcome = match run_chain(&handler.middleware, record, &mut ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.emit_report(reports, dispatch_error(record, handler.id, e.into())).await;
                    continue;
                }
            };
            if outcome == MiddlewareOutcome::ShortCircuit {
                continue;
            }

            let view = resolve_view(record, target, &evaluation);

            match &handler.mode {
                Mode::Single(callback) => {
                    if let Err(e) = callback.call(view, record, &mut ctx).await {
                        self.emit_report(reports, dispatch_error(record, handler.id, e.into())).await;
                    }
                }
                Mode::Batch { batch_key, max_batch_size, .. } => {
                    let key = batch_key(record);
                    let entry = BatchEntry {
                        record: record.clone(),
                        view,
                    };
                    if let Some(flushed) = aggregator.append(handler.id, key, entry, *max_batch_size) {
                        early_flushes.push((handler.id, flushed));
                    }
                }
            }
        }

        for (handler_id, entries) in early_flushes {
            self.flush_batch(handler_id, entries, reports).await;
        }
    }

    async fn emit_deferral(&self, record: &Record, handler: &Handler, reports: &mut Vec<DispatchReport>) {
        match &self.deferral_sink {
            Some(sink) => {
                let message = build_deferral_message(record, handler.id);
                if let Err(e) = sink.emit(message).await {
                    self.emit_report(reports, dispatch_error(record, handler.id, e.into())).await;
                }
            }
            None => {
                self.emit_report(
                    reports,
                    DispatchReport {
                        event_id: record.event_id.clone(),
                        handler_id: Some(handler.id),
                        error: DispatchError::DeferralSinkMissing(handler.id),
                    },
                )
                .await;
            }
        }
    }

    async fn flush_batch(&self, handler_id: HandlerId, entries: Vec<BatchEntry>, reports: &mut Vec<DispatchReport>) {
        let handler = self.registry.handler(handler_id);
        let Mode::Batch { callback, .. } = &handler.mode else {
            return;
        };
        let first_event_id = entries.first().map(|e| e.record.event_id.clone()).unwrap_or_default();
        let mut ctx = Context::new();
        if let Err(e) = callback.call(entries, &mut ctx).await {
            self.emit_report(
                reports,
                DispatchReport {
                    event_id: first_event_id,
                    handler_id: Some(handler_id),
                    error: DispatchError::Callback(e),
                },
            )
            .await;
        }
    }

    async fn emit_report(&self, reports: &mut Vec<DispatchReport>, report: DispatchReport) {
        if let Some(reporter) = &self.reporter {
            reporter.report(&report).await;
        }
        reports.push(report);
    }
}

fn dispatch_error(record: &Record, handler_id: HandlerId, error: DispatchError) -> DispatchReport {
    DispatchReport {
        event_id: record.event_id.clone(),
        handler_id: Some(handler_id),
        error,
    }
}

/// Resolve which image(s) a handler is evaluated against for this record's operation kind
/// (§4.4 step 2). INSERT and REMOVE/TTL_REMOVE ignore the handler's own preference entirely.
fn resolve_target(kind: OperationKind, handler: &Handler) -> ValidationTarget {
    match kind {
        OperationKind::Insert => ValidationTarget::NewImage,
        OperationKind::Remove | OperationKind::TtlRemove => ValidationTarget::OldImage,
        OperationKind::Modify => handler.validation_target.unwrap_or_default(),
    }
}

/// Build the view a callback receives: the schema-parsed value when the predicate produced one,
/// otherwise the raw decoded tree for whichever image(s) `target` selects (§4.4 step 4, §6).
fn resolve_view(record: &Record, target: ValidationTarget, evaluation: &crate::predicate::Evaluation) -> ImageView {
    let resolve = |image: Option<&crate::attributes::AttributeTree>, parsed: Option<&Value>| -> Option<ResolvedValue> {
        match parsed {
            Some(parsed) => Some(ResolvedValue::Parsed(parsed.clone())),
            None => image.map(|tree| ResolvedValue::Raw(tree.clone())),
        }
    };
    match target {
        ValidationTarget::NewImage => ImageView {
            new_image: resolve(record.new_image.as_ref(), evaluation.parsed_new.as_ref()),
            old_image: None,
        },
        ValidationTarget::OldImage => ImageView {
            new_image: None,
            old_image: resolve(record.old_image.as_ref(), evaluation.parsed_old.as_ref()),
        },
        ValidationTarget::Both => ImageView {
            new_image: resolve(record.new_image.as_ref(), evaluation.parsed_new.as_ref()),
            old_image: resolve(record.old_image.as_ref(), evaluation.parsed_old.as_ref()),
        },
    }
}

fn build_deferral_message(record: &Record, handler_id: HandlerId) -> DeferralMessage {
    DeferralMessage {
        event_id: record.event_id.clone(),
        keys: record.keys.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
        handler_id: handler_id.raw(),
        original_sequence_number: record.sequence_number.clone(),
    }
}

