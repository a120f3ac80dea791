//! Tool-result capping.
//!
//! Oversized tool results would blow the next call's token budget, so they
//! are trimmed before re-injection as conversation context. Results under
//! the budget pass through byte-identical. Lists keep items front-to-back,
//! maps keep pairs in order, strings hard-truncate; every trimmed shape
//! carries a marker recording what was dropped.

use serde_json::{json, Map, Value};

/// Characters reserved for the truncation marker itself.
const METADATA_MARGIN: usize = 200;

fn serialized_len(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

/// Truncate a string on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Cap a tool result to `budget` serialized characters.
pub fn cap_tool_result(result: &Value, budget: usize) -> Value {
    if serialized_len(result) <= budget {
        return result.clone();
    }
    let keep_budget = budget.saturating_sub(METADATA_MARGIN);

    match result {
        Value::Array(items) => {
            let mut kept: Vec<Value> = Vec::new();
            let mut used = 2; // brackets
            for item in items {
                let cost = serialized_len(item) + 1;
                if used + cost > keep_budget {
                    break;
                }
                used += cost;
                kept.push(item.clone());
            }
            let kept_count = kept.len();
            kept.push(json!({
                "truncated": true,
                "original_items": items.len(),
                "kept_items": kept_count
            }));
            Value::Array(kept)
        }
        Value::Object(map) => {
            let mut kept = Map::new();
            let mut used = 2;
            for (key, value) in map {
                let cost = key.len() + serialized_len(value) + 4;
                if used + cost > keep_budget {
                    break;
                }
                used += cost;
                kept.insert(key.clone(), value.clone());
            }
            kept.insert("_truncated".into(), json!(true));
            kept.insert("_original_keys".into(), json!(map.len()));
            kept.insert("_kept_keys".into(), json!(kept.len() - 2));
            Value::Object(kept)
        }
        Value::String(text) => {
            let kept = truncate_chars(text, keep_budget);
            let omitted = text.chars().count() - kept.chars().count();
            Value::String(format!("{kept}… [truncated {omitted} characters]"))
        }
        other => other.clone(),
    }
}
