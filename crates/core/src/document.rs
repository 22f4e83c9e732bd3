#![forbid(unsafe_code)]

use serde_json::Value as JsonValue;

/// Insertion-ordered metadata document.
pub type JsonMap = serde_json::Map<String, JsonValue>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentError {
    NotAnObject { found: &'static str },
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject { found } => write!(f, "document must be an object, got {found}"),
        }
    }
}

impl std::error::Error for DocumentError {}

/// Converts a JSON value into a document. `null` becomes an empty document.
pub fn document_from_value(value: JsonValue) -> Result<JsonMap, DocumentError> {
    match value {
        JsonValue::Object(map) => Ok(map),
        JsonValue::Null => Ok(JsonMap::new()),
        other => Err(DocumentError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

pub fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
