use serde_json::{Map, Value};

/// One data item of a collection. Field order follows the source payload.
pub type Row = Map<String, Value>;

/// Resolve a column key against a row.
///
/// An exact key wins. Otherwise a dotted key walks nested objects, so
/// `metrics.score` reaches `{"metrics": {"score": 3}}`.
pub fn lookup<'a>(row: &'a Row, key: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(key) {
        return Some(value);
    }
    if !key.contains('.') {
        return None;
    }
    let mut segments = key.split('.');
    let mut current = row.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Display text of a cell. Nested values are shown in their json form.
pub fn cell_text(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => serde_json::to_string(nested).unwrap_or_default(),
    };
    single_line(text)
}

/// Text that takes part in filtering. Only primitive values qualify.
pub fn filter_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn single_line(text: String) -> String {
    if text.contains('\n') {
        text.replace("\r\n", " ↵ ").replace('\n', " ↵ ")
    } else {
        text
    }
}
