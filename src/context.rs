//! The per-record (or per-batch) mutable map threaded through the middleware chain and into
//! the callback.

use std::collections::HashMap;

use serde_json::Value;

/// A mutable bag of values middleware can read and write. Absent keys read as `None`; nothing
/// is pre-populated. Each record (or each flushed batch) gets its own `Context` — the engine
/// never shares one across records.
#[derive(Clone, Debug, Default)]
pub struct Context {
    values: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Context {
        Context {
            values: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
