//! Tool results enter the conversation as text.

use serde_json::Value;

/// Render a tool's JSON result as the text sent back to the model.
///
/// Strings pass through unquoted; scalars use their JSON spelling; objects
/// and arrays are pretty-printed.
pub fn normalize_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}
