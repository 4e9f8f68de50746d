#![forbid(unsafe_code)]

//! Building values from JSON (feature `json`).

use crate::object::Object;
use crate::value::{Key, Value};

impl Value {
    /// Convert a JSON document: arrays become array objects, objects become
    /// plain objects with members in `serde_json` map order.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s.as_str()),
            serde_json::Value::Array(items) => {
                Self::Object(Object::from_values(items.iter().map(Self::from_json)))
            }
            serde_json::Value::Object(members) => Self::Object(Object::from_entries(
                members
                    .iter()
                    .map(|(k, v)| (Key::from(k.as_str()), Self::from_json(v))),
            )),
        }
    }
}
