use tracing::{debug, warn};

use crate::column::{ColumnDef, Stringifier};
use crate::record::{self, Row};

/// Columns for every key of the rows, in first-seen order.
pub fn infer_columns(rows: &[Row], filterable_keys: &[String]) -> Vec<ColumnDef> {
    let mut keys: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
    }
    debug!("Inferred {} columns from {} rows", keys.len(), rows.len());
    keys.into_iter()
        .map(|key| build_column(rows, key, filterable_keys))
        .collect()
}

/// Columns for an explicit list of keys. Keys that no row carries are kept,
/// they render as empty cells.
pub fn select_columns(rows: &[Row], keys: &[String], filterable_keys: &[String]) -> Vec<ColumnDef> {
    for key in keys {
        if !rows.is_empty() && !rows.iter().any(|r| record::lookup(r, key).is_some()) {
            warn!("Column \"{key}\" is not present in any row");
        }
    }
    keys.iter()
        .map(|key| build_column(rows, key, filterable_keys))
        .collect()
}

fn build_column(rows: &[Row], key: &str, filterable_keys: &[String]) -> ColumnDef {
    let mut column = ColumnDef::new(key);
    if key.contains('.') {
        column = column.header_fn(|key| key.replace('.', " › "));
    }
    if !filterable_keys.iter().any(|k| k == key) {
        return column;
    }
    // Nested columns are only searchable through their json text
    let nested = rows
        .iter()
        .filter_map(|r| record::lookup(r, key))
        .any(|v| v.is_array() || v.is_object());
    if nested {
        column.stringifier(Stringifier::json())
    } else {
        column.filterable(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            json!({"title": "Home", "url": "/"}),
            json!({"title": "Blog", "score": 4, "tags": ["a"]}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    #[test]
    fn infer_keeps_first_seen_order() {
        let columns = infer_columns(&rows(), &[]);
        let keys: Vec<_> = columns.iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["title", "url", "score", "tags"]);
        assert!(columns.iter().all(|c| !c.is_filterable()));
    }

    #[test]
    fn infer_on_empty_rows_is_empty() {
        assert!(infer_columns(&[], &[]).is_empty());
    }

    #[test]
    fn filterable_keys_are_flagged() {
        let filterable = vec!["url".to_string(), "tags".to_string()];
        let columns = infer_columns(&rows(), &filterable);
        let flagged: Vec<_> = columns
            .iter()
            .filter(|c| c.is_filterable())
            .map(|c| c.key())
            .collect();
        assert_eq!(flagged, vec!["url", "tags"]);
        let tags = columns.iter().find(|c| c.key() == "tags").unwrap();
        assert!(tags.custom_stringifier().is_some());
    }

    #[test]
    fn select_keeps_unknown_keys() {
        let keys = vec!["missing".to_string(), "title".to_string()];
        let columns = select_columns(&rows(), &keys, &[]);
        let keys: Vec<_> = columns.iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["missing", "title"]);
    }

    #[test]
    fn nested_paths_get_a_path_header() {
        let keys = vec!["metrics.score".to_string(), "title".to_string()];
        let columns = select_columns(&rows(), &keys, &[]);
        assert_eq!(columns[0].header_text(), "metrics › score");
        assert_eq!(columns[1].header_text(), "title");
    }
}
