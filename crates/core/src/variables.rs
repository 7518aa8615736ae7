//! Process-variable map helpers.
//!
//! Variables cross the wire as a JSON object (name -> value). The engine
//! rejects anything that is not an object at the top level, so these
//! helpers keep construction and merging honest on the client side.

use serde_json::{Map, Value};

/// A process-variable mapping as the engine expects it: a JSON object.
pub type Variables = Map<String, Value>;

/// An empty variable mapping.
pub fn empty() -> Variables {
    Map::new()
}

/// Build a variable mapping from `(name, value)` pairs.
pub fn from_pairs<I>(pairs: I) -> Variables
where
    I: IntoIterator<Item = (String, Value)>,
{
    pairs.into_iter().collect()
}

/// Validate that a JSON value is usable as a variable payload.
///
/// Returns the inner object, or an error naming the offending type.
/// `null` is accepted and treated as an empty mapping.
pub fn as_object(value: Value) -> Result<Variables, VariablesError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(empty()),
        other => Err(VariablesError::NotAnObject(type_name(&other))),
    }
}

/// Merge `overlay` into `base`, with `overlay` winning on name clashes.
pub fn merge(base: &mut Variables, overlay: Variables) {
    for (name, value) in overlay {
        base.insert(name, value);
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Errors produced when validating a variable payload.
#[derive(Debug, thiserror::Error)]
pub enum VariablesError {
    /// The top-level JSON value was not an object.
    #[error("Variables must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
