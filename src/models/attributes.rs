//! Per-render attribute map.
//!
//! The map is arbitrary JSON; two top-level keys have meaning to the
//! compositor: `logos` (placeholder name -> image reference) and `barcode`
//! (the image composited into the barcode placeholder).

use serde_json::{Map, Value};

/// How many layers of string encoding are peeled off an attributes field.
/// The editor posts `JSON.stringify(attributes)` where `attributes` is itself
/// a JSON string, so two layers occur in practice.
const MAX_STRING_ENCODING_DEPTH: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum AttributeError {
    #[error("attributes are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("attributes must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Read-only attribute mapping for one render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    values: Map<String, Value>,
    logos: Map<String, Value>,
}

impl AttributeMap {
    /// Build from a request field: an object, a (possibly doubly) JSON-encoded
    /// string holding an object, or null for "no attributes".
    pub fn parse(value: Value) -> Result<Self, AttributeError> {
        let mut value = value;
        for _ in 0..MAX_STRING_ENCODING_DEPTH {
            match value {
                Value::String(raw) if raw.trim().is_empty() => return Ok(Self::default()),
                Value::String(raw) => value = serde_json::from_str(&raw)?,
                _ => break,
            }
        }

        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(values) => Ok(Self::from_map(values)),
            other => Err(AttributeError::NotAnObject(json_type_name(&other))),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AttributeError> {
        Self::parse(Value::String(raw.to_string()))
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        let logos = match values.get("logos") {
            Some(Value::Object(logos)) => logos.clone(),
            _ => Map::new(),
        };
        Self { values, logos }
    }

    /// The full mapping.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The `logos` sub-mapping; empty when absent or not an object.
    pub fn logos(&self) -> &Map<String, Value> {
        &self.logos
    }

    pub fn has_logos(&self) -> bool {
        matches!(self.values.get("logos"), Some(Value::Object(_)))
    }

    /// The barcode image reference, if one is configured.
    pub fn barcode(&self) -> Option<&str> {
        self.values
            .get("barcode")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
