// ── Primary keys ──
//
// Entities are untyped JSON objects; the only thing the store needs to
// understand about them is their primary key. Most models use an
// integer `id`, node-like models a string `system_id`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of a model's primary key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Int,
    Text,
}

/// Primary key value of one entity.
///
/// Ordering puts integer keys before text keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int(i64),
    Text(String),
}

impl PrimaryKey {
    /// Read a key from a bare JSON scalar. Objects, arrays, floats,
    /// booleans and null are not keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }

    /// Whether `value` is the JSON encoding of this key.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Int(n), Value::Number(v)) => v.as_i64() == Some(*n),
            (Self::Text(s), Value::String(v)) => s == v,
            _ => false,
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for PrimaryKey {
    type Err = std::convert::Infallible;

    /// Digits become an integer key; anything else stays text. Prefer
    /// [`ModelDescriptor::parse_key`](super::ModelDescriptor::parse_key)
    /// when the model is known: some text keys are all digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Text(s.to_owned()), Self::Int))
    }
}

impl From<i64> for PrimaryKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
