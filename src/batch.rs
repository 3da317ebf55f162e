//! The per-invocation batching aggregator (§4.5): groups matched records by `(handlerId,
//! batchKey)` and flushes in first-insertion order, either early on `maxBatchSize` or at the end
//! of the invocation.

use indexmap::IndexMap;

use crate::registry::{BatchEntry, HandlerId};

/// Accumulates batch-mode entries for exactly one `process_batch` call. Never shared across
/// invocations and never wrapped in `Arc`/`Mutex` — it's owned, mutated, and drained entirely
/// within one `&mut self` pass.
#[derive(Default)]
pub struct BatchAggregator {
    slots: IndexMap<(HandlerId, String), Vec<BatchEntry>>,
}

impl BatchAggregator {
    pub fn new() -> BatchAggregator {
        BatchAggregator::default()
    }

    /// Append `entry` to the slot for `(handler_id, batch_key)`. If `max_batch_size` is set and
    /// the slot would exceed it, the slot is flushed (returned) before `entry` starts a fresh
    /// one — this is the "flush immediately, then begin a new list" rule of §4.5.
    pub fn append(
        &mut self,
        handler_id: HandlerId,
        batch_key: String,
        entry: BatchEntry,
        max_batch_size: Option<usize>,
    ) -> Option<Vec<BatchEntry>> {
        let key = (handler_id, batch_key);
        let slot = self.slots.entry(key.clone()).or_default();
        slot.push(entry);

        if let Some(max) = max_batch_size {
            if slot.len() >= max {
                return self.slots.shift_remove(&key);
            }
        }
        None
    }

    /// Drain every non-empty slot in first-insertion order, for the end-of-invocation flush.
    pub fn drain_all(&mut self) -> Vec<((HandlerId, String), Vec<BatchEntry>)> {
        self.slots.drain(..).collect()
    }
}
