//! Tool arguments: a JSON object bag plus typed extraction into per-tool
//! request structs.
//!
//! Request structs declare their defaults with `#[serde(default = ..)]`, so
//! the defaults live next to the schema descriptions. The helpers below let
//! numeric and boolean fields also accept their string spellings, and treat
//! blank strings as absent.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ToolError};

pub type JsonObject = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(JsonObject);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept an object, or `null` for "no arguments"
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ToolError::invalid(format!(
                "Arguments must be an object, got {other}"
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Non-blank string value
    pub fn string(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// First non-blank string among `keys`
    pub fn first_string(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.string(key))
    }

    /// Deserialize into a typed request, reporting failures as `InvalidArgument`
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ToolError::invalid(format!("Invalid arguments: {e}")))
    }

    pub fn as_object(&self) -> &JsonObject {
        &self.0
    }

    pub fn into_inner(self) -> JsonObject {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<JsonObject> for Arguments {
    fn from(map: JsonObject) -> Self {
        Self(map)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn invalid<E: serde::de::Error>(expected: &str, got: impl std::fmt::Display) -> E {
    E::custom(format!("expected {expected}, got {got}"))
}

pub fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => Ok(i as f64),
        Scalar::Float(f) => Ok(f),
        Scalar::Text(s) => s.trim().parse().map_err(|_| invalid("a number", s)),
        Scalar::Bool(b) => Err(invalid("a number", b)),
    }
}

pub fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => Ok(i),
        Scalar::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        Scalar::Text(s) => s.trim().parse().map_err(|_| invalid("an integer", s)),
        Scalar::Float(f) => Err(invalid("an integer", f)),
        Scalar::Bool(b) => Err(invalid("an integer", b)),
    }
}

/// `true`, `"true"`, `"1"` and `"yes"` are true
pub fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Int(i) => Ok(i != 0),
        Scalar::Text(s) => Ok(matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")),
        Scalar::Float(f) => Err(invalid("a boolean", f)),
    }
}

/// Blank or missing strings become `None`
pub fn non_blank<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
