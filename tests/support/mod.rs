//! Shared wire-record builders and recording callbacks for the integration test suite.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use streamrouter::{
    BatchCallback, BatchEntry, Callback, CallbackError, Context, ImageView, Record, WireAttributeValue, WireEventName,
    WireRecord, WireStreamRecord, WireUserIdentity,
};

pub fn insert_wire(event_id: &str, pk: &str, status: &str) -> WireRecord {
    let mut new_image = HashMap::new();
    new_image.insert("status".to_string(), WireAttributeValue::S(status.to_string()));
    let mut keys = HashMap::new();
    keys.insert("pk".to_string(), WireAttributeValue::S(pk.to_string()));
    WireRecord {
        event_id: event_id.to_string(),
        event_name: WireEventName::Insert,
        user_identity: None,
        dynamodb: WireStreamRecord {
            keys,
            old_image: None,
            new_image: Some(new_image),
            approximate_creation_date_time: 1_700_000_000.0,
            sequence_number: "1".to_string(),
        },
    }
}

pub fn modify_wire(event_id: &str, pk: &str, seq: &str, old_fields: &[(&str, &str)], new_fields: &[(&str, &str)]) -> WireRecord {
    let build = |fields: &[(&str, &str)]| {
        let mut image = HashMap::new();
        for (k, v) in fields {
            image.insert(k.to_string(), WireAttributeValue::S(v.to_string()));
        }
        image
    };
    let mut keys = HashMap::new();
    keys.insert("pk".to_string(), WireAttributeValue::S(pk.to_string()));
    WireRecord {
        event_id: event_id.to_string(),
        event_name: WireEventName::Modify,
        user_identity: None,
        dynamodb: WireStreamRecord {
            keys,
            old_image: Some(build(old_fields)),
            new_image: Some(build(new_fields)),
            approximate_creation_date_time: 1_700_000_000.0,
            sequence_number: seq.to_string(),
        },
    }
}

pub fn remove_wire(event_id: &str, pk: &str, service: bool) -> WireRecord {
    let mut old_image = HashMap::new();
    old_image.insert("pk".to_string(), WireAttributeValue::S(pk.to_string()));
    let mut keys = HashMap::new();
    keys.insert("pk".to_string(), WireAttributeValue::S(pk.to_string()));
    WireRecord {
        event_id: event_id.to_string(),
        event_name: WireEventName::Remove,
        user_identity: service.then(|| WireUserIdentity {
            principal_id: "dynamodb.amazonaws.com".to_string(),
            identity_type: "Service".to_string(),
        }),
        dynamodb: WireStreamRecord {
            keys,
            old_image: Some(old_image),
            new_image: None,
            approximate_creation_date_time: 1_700_000_000.0,
            sequence_number: "9".to_string(),
        },
    }
}

/// Counts invocations; ignores the delivered view.
pub struct CountingCallback(pub Arc<Mutex<u32>>);

#[async_trait]
impl Callback for CountingCallback {
    async fn call(&self, _view: ImageView, _record: &Record, _ctx: &mut Context) -> Result<(), CallbackError> {
        *self.0.lock().unwrap() += 1;
        Ok(())
    }
}

/// Records each invocation's event id, in call order.
pub struct RecordingCallback(pub Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Callback for RecordingCallback {
    async fn call(&self, _view: ImageView, record: &Record, _ctx: &mut Context) -> Result<(), CallbackError> {
        self.0.lock().unwrap().push(record.event_id.clone());
        Ok(())
    }
}

/// Records the size of each flushed batch, in flush order.
pub struct BatchSizeRecorder(pub Arc<Mutex<Vec<usize>>>);

#[async_trait]
impl BatchCallback for BatchSizeRecorder {
    async fn call(&self, entries: Vec<BatchEntry>, _ctx: &mut Context) -> Result<(), CallbackError> {
        self.0.lock().unwrap().push(entries.len());
        Ok(())
    }
}
