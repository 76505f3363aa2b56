use serde_json::{Map, Value};

use crate::error::FlattenError;
use crate::flatten::types::FlattenConfig;

/// Flatten a nested JSON object into a single-level mapping keyed by
/// path-concatenated strings.
///
/// Depth-first walk. Mapping keys and zero-based sequence indices become path
/// segments joined by the configured separator. Empty values (`null`, `""`,
/// `{}`, `[]`) are assigned as-is at the key where they are encountered
/// rather than silently disappearing; scalars are always assigned as-is.
/// Top-level keys listed in `root_keys_to_ignore` are skipped entirely.
///
/// The input must be a JSON object; anything else is a [`FlattenError`].
/// An empty object flattens to an empty mapping.
pub fn flatten(record: &Value, config: &FlattenConfig) -> Result<Map<String, Value>, FlattenError> {
    let object = match record {
        Value::Object(object) => object,
        other => {
            return Err(FlattenError::NotAMapping {
                kind: json_kind(other),
            })
        }
    };

    let mut flattened = Map::new();
    for (key, value) in object {
        if config.root_keys_to_ignore.contains(key) {
            continue;
        }
        walk(value, construct_key(None, key, config), config, &mut flattened);
    }

    Ok(flattened)
}

fn walk(value: &Value, key: String, config: &FlattenConfig, out: &mut Map<String, Value>) {
    // Empty or falsy values are terminal regardless of shape: an explicitly
    // empty container is preserved as-is instead of recursing into nothing.
    if is_empty_leaf(value) {
        out.insert(key, value.clone());
        return;
    }

    match value {
        Value::Object(object) => {
            for (child_key, child) in object {
                walk(child, construct_key(Some(&key), child_key, config), config, out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                walk(
                    item,
                    construct_key(Some(&key), &index.to_string(), config),
                    config,
                    out,
                );
            }
        }
        scalar => {
            out.insert(key, scalar.clone());
        }
    }
}

/// The short-circuit covers falsy scalars (`false`, `0`) as well as empties.
/// For scalars this is indistinguishable from the plain leaf assignment, so
/// the rule that actually matters is: empty container => assign as-is.
fn is_empty_leaf(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(object) => object.is_empty(),
    }
}

/// Returns the new key if no previous key exists, otherwise concatenates
/// previous key, separator and new key. Separator occurrences inside the raw
/// key are replaced first when a replacement is configured.
fn construct_key(previous: Option<&str>, raw_key: &str, config: &FlattenConfig) -> String {
    let key = match &config.key_separator_replacement {
        Some(replacement) => raw_key.replace(&config.separator, replacement),
        None => raw_key.to_string(),
    };

    match previous {
        Some(previous) if !previous.is_empty() => {
            format!("{}{}{}", previous, config.separator, key)
        }
        _ => key,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Pre-expand embedded JSON: any top-level string field that itself parses as
/// a JSON object is replaced by the parsed mapping. Strings holding JSON
/// arrays or scalars are left untouched. Runs once per record, before
/// flattening; it is not part of the recursive walk.
pub fn expand_embedded_json(record: &mut Value) {
    let object = match record {
        Value::Object(object) => object,
        _ => return,
    };

    for (_, value) in object.iter_mut() {
        if let Value::String(raw) = value {
            if !raw.trim_start().starts_with('{') {
                continue;
            }
            if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
                if parsed.is_object() {
                    *value = parsed;
                }
            }
        }
    }
}

/// Recursively normalize whitespace inside every string value: newlines,
/// carriage returns and tabs become spaces, and double spaces collapse once.
pub fn clean_strings(value: &mut Value) {
    match value {
        Value::String(s) => {
            *s = s
                .replace('\n', " ")
                .replace('\r', " ")
                .replace('\t', " ")
                .replace("  ", " ");
        }
        Value::Array(items) => {
            for item in items {
                clean_strings(item);
            }
        }
        Value::Object(object) => {
            for (_, child) in object.iter_mut() {
                clean_strings(child);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(value: Value) -> Map<String, Value> {
        flatten(&value, &FlattenConfig::default()).unwrap()
    }

    #[test]
    fn test_path_determinism() {
        let record = json!({"a": {"b": 1, "c": [2, 3]}});
        let expected = json!({"a_b": 1, "a_c_0": 2, "a_c_1": 3});
        assert_eq!(Value::Object(flat(record)), expected);
    }

    #[test]
    fn test_root_key_skip() {
        let record = json!({"skip": {"x": 1}, "keep": 2});
        let config = FlattenConfig::default().ignore_root_key("skip");
        let result = flatten(&record, &config).unwrap();
        assert_eq!(Value::Object(result), json!({"keep": 2}));
    }

    #[test]
    fn test_nested_key_not_skipped() {
        let record = json!({"outer": {"skip": 1}});
        let config = FlattenConfig::default().ignore_root_key("skip");
        let result = flatten(&record, &config).unwrap();
        assert_eq!(Value::Object(result), json!({"outer_skip": 1}));
    }

    #[test]
    fn test_empty_leaf_preservation() {
        let record = json!({"a": {}, "b": [], "c": ""});
        assert_eq!(Value::Object(flat(record.clone())), record);
    }

    #[test]
    fn test_falsy_scalars_pass_through() {
        let record = json!({"zero": 0, "no": false, "missing": null});
        assert_eq!(Value::Object(flat(record.clone())), record);
    }

    #[test]
    fn test_idempotent_on_flat_input() {
        let record = json!({"a_b": 1, "c": "x", "d": true});
        let once = flat(record.clone());
        let twice = flat(Value::Object(once.clone()));
        assert_eq!(once, twice);
        assert_eq!(Value::Object(once), record);
    }

    #[test]
    fn test_empty_object_flattens_to_empty() {
        assert!(flat(json!({})).is_empty());
    }

    #[test]
    fn test_non_object_input_rejected() {
        let err = flatten(&json!([1, 2]), &FlattenConfig::default()).unwrap_err();
        assert!(matches!(err, FlattenError::NotAMapping { kind: "array" }));
    }

    #[test]
    fn test_key_separator_replacement() {
        let record = json!({"a_b": {"c": 1}});
        let config = FlattenConfig::default().with_key_separator_replacement("-");
        let result = flatten(&record, &config).unwrap();
        assert_eq!(Value::Object(result), json!({"a-b_c": 1}));
    }

    #[test]
    fn test_roundtrip_mappings_of_scalars() {
        // For records with no lists, dotted keys fully determine the nesting.
        let record = json!({
            "id": "abc",
            "customer": {"name": "Ada", "address": {"city": "Lagos", "zip": "100001"}},
            "active": true
        });

        let flattened = flat(record.clone());
        let rebuilt = unflatten(&flattened, "_");
        assert_eq!(rebuilt, record);
    }

    /// Test-only inverse: rebuild nesting from separator-joined keys.
    fn unflatten(flat: &Map<String, Value>, separator: &str) -> Value {
        let mut root = Map::new();
        for (path, value) in flat {
            let segments: Vec<&str> = path.split(separator).collect();
            let mut node = &mut root;
            for segment in &segments[..segments.len() - 1] {
                node = node
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
                    .as_object_mut()
                    .unwrap();
            }
            node.insert(segments[segments.len() - 1].to_string(), value.clone());
        }
        Value::Object(root)
    }

    #[test]
    fn test_expand_embedded_json_objects_only() {
        let mut record = json!({
            "payload": "{\"inner\": 1}",
            "tags": "[1, 2]",
            "plain": "hello"
        });

        expand_embedded_json(&mut record);

        assert_eq!(record["payload"], json!({"inner": 1}));
        assert_eq!(record["tags"], json!("[1, 2]"));
        assert_eq!(record["plain"], json!("hello"));
    }

    #[test]
    fn test_clean_strings() {
        let mut record = json!({"note": "line1\nline2\tend", "nested": {"v": "a\r\nb"}});
        clean_strings(&mut record);
        assert_eq!(record["note"], json!("line1 line2 end"));
        assert_eq!(record["nested"]["v"], json!("a b"));
    }
}
