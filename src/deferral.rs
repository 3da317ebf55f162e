//! The deferral emitter (§4.6): lets selected INSERT handlers run on a second, re-injected pass
//! instead of inline with the first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeferralError;
use crate::registry::HandlerId;

/// The message written to the external queue when a deferred INSERT handler matches a
/// non-deferred record. Re-injection reads this back and reconstructs a record with
/// `deferred = true` (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeferralMessage {
    pub event_id: String,
    pub keys: std::collections::HashMap<String, serde_json::Value>,
    pub handler_id: u64,
    pub original_sequence_number: String,
}

impl DeferralMessage {
    pub fn handler_id(&self) -> HandlerId {
        HandlerId::new(self.handler_id as usize)
    }
}

/// The queue write, expressed as a trait the engine depends on but never implements — it does
/// not itself hold a queue client (§9).
#[async_trait]
pub trait DeferralSink: Send + Sync {
    async fn emit(&self, message: DeferralMessage) -> Result<(), DeferralError>;
}
