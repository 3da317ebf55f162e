//! The decoded `Record` the dispatch core works with, and the wire format it's built from.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::AttributeTree;
use crate::error::DecodeError;
use crate::utils::config::TTL_PRINCIPAL_MARKER;

/// The four operation kinds a handler can match against. `TTL_REMOVE` is not a distinct wire
/// `eventName` — it's a `REMOVE` reclassified by [`Record::classify_operation`] based on
/// `userIdentity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Insert,
    Modify,
    Remove,
    TtlRemove,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "INSERT",
            OperationKind::Modify => "MODIFY",
            OperationKind::Remove => "REMOVE",
            OperationKind::TtlRemove => "TTL_REMOVE",
        }
    }
}

/// A decoded CDC event: the engine's internal representation, produced from a [`WireRecord`]
/// by [`Record::decode`].
#[derive(Clone, Debug)]
pub struct Record {
    pub operation_kind: OperationKind,
    pub keys: HashMap<String, AttributeTree>,
    pub old_image: Option<AttributeTree>,
    pub new_image: Option<AttributeTree>,
    pub event_id: String,
    pub approximate_timestamp: DateTime<Utc>,
    pub sequence_number: String,
    /// `false` on the first pass through the stream, `true` when re-injected by the deferral
    /// consumer (§4.6).
    pub deferred: bool,
}

impl Record {
    /// Decode a wire record into a `Record`, classifying `REMOVE` vs `TTL_REMOVE` along the way.
    /// `deferred` is supplied by the caller: `false` for records freshly read off the stream,
    /// `true` for records the deferral consumer is re-injecting.
    pub fn decode(wire: &WireRecord, deferred: bool) -> Result<Record, DecodeError> {
        let operation_kind = classify_operation(wire);
        let keys = AttributeTree::decode_map(&wire.dynamodb.keys)?;
        let old_image = wire
            .dynamodb
            .old_image
            .as_ref()
            .map(AttributeTree::decode_map)
            .transpose()?
            .map(AttributeTree::Map);
        let new_image = wire
            .dynamodb
            .new_image
            .as_ref()
            .map(AttributeTree::decode_map)
            .transpose()?
            .map(AttributeTree::Map);

        let approximate_timestamp =
            DateTime::from_timestamp(wire.dynamodb.approximate_creation_date_time as i64, 0)
                .unwrap_or_else(Utc::now);

        Ok(Record {
            operation_kind,
            keys,
            old_image,
            new_image,
            event_id: wire.event_id.clone(),
            approximate_timestamp,
            sequence_number: wire.dynamodb.sequence_number.clone(),
            deferred,
        })
    }
}

fn classify_operation(wire: &WireRecord) -> OperationKind {
    match wire.event_name {
        WireEventName::Insert => OperationKind::Insert,
        WireEventName::Modify => OperationKind::Modify,
        WireEventName::Remove => {
            let is_ttl = wire
                .user_identity
                .as_ref()
                .map(|id| id.principal_id == TTL_PRINCIPAL_MARKER && id.identity_type == "Service")
                .unwrap_or(false);
            if is_ttl {
                OperationKind::TtlRemove
            } else {
                OperationKind::Remove
            }
        }
    }
}

// ---- Wire format (§6.1): a 1:1 mirror of the hosted-NoSQL CDC stream record. ----

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WireRecord {
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "eventName")]
    pub event_name: WireEventName,
    #[serde(rename = "userIdentity", default)]
    pub user_identity: Option<WireUserIdentity>,
    pub dynamodb: WireStreamRecord,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum WireEventName {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "MODIFY")]
    Modify,
    #[serde(rename = "REMOVE")]
    Remove,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WireUserIdentity {
    #[serde(rename = "PrincipalId")]
    pub principal_id: String,
    #[serde(rename = "Type")]
    pub identity_type: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WireStreamRecord {
    #[serde(rename = "Keys")]
    pub keys: HashMap<String, WireAttributeValue>,
    #[serde(rename = "OldImage", default)]
    pub old_image: Option<HashMap<String, WireAttributeValue>>,
    #[serde(rename = "NewImage", default)]
    pub new_image: Option<HashMap<String, WireAttributeValue>>,
    #[serde(rename = "ApproximateCreationDateTime")]
    pub approximate_creation_date_time: f64,
    #[serde(rename = "SequenceNumber")]
    pub sequence_number: String,
}

/// A tagged wire attribute value (DynamoDB's `AttributeValue` shape).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum WireAttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "B")]
    B(String),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "L")]
    L(Vec<WireAttributeValue>),
    #[serde(rename = "M")]
    M(HashMap<String, WireAttributeValue>),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS")]
    Bs(Vec<String>),
}
