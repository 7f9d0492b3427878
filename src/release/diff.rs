// ABOUTME: Key-level comparison of service inputs for plan rendering.
// ABOUTME: Reports added, removed and changed keys in sorted order.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum InputChange {
    Added { key: String, value: Value },
    Removed { key: String, value: Value },
    Changed { key: String, old: Value, new: Value },
}

impl fmt::Display for InputChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputChange::Added { key, value } => write!(f, "+ {}: {}", key, render(value)),
            InputChange::Removed { key, value } => write!(f, "- {}: {}", key, render(value)),
            InputChange::Changed { key, old, new } => {
                write!(f, "~ {}: {} -> {}", key, render(old), render(new))
            }
        }
    }
}

/// Strings print bare; everything else prints as compact JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compare two inputs objects. A non-object side is treated as empty.
pub fn diff_inputs(old: &Value, new: &Value) -> Vec<InputChange> {
    let empty = serde_json::Map::new();
    let old = old.as_object().unwrap_or(&empty);
    let new = new.as_object().unwrap_or(&empty);

    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| match (old.get(key), new.get(key)) {
            (None, Some(value)) => Some(InputChange::Added {
                key: key.clone(),
                value: value.clone(),
            }),
            (Some(value), None) => Some(InputChange::Removed {
                key: key.clone(),
                value: value.clone(),
            }),
            (Some(a), Some(b)) if a != b => Some(InputChange::Changed {
                key: key.clone(),
                old: a.clone(),
                new: b.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// One `key: value` line per top-level key.
pub fn format_inputs(inputs: &Value) -> Vec<String> {
    match inputs.as_object() {
        Some(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.into_iter()
                .map(|key| format!("{}: {}", key, render(&map[key.as_str()])))
                .collect()
        }
        None => vec![render(inputs)],
    }
}
