//! Field redaction for event payloads

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Replacement written over redacted values
pub const REDACTED: &str = "[REDACTED]";

/// Mask the values of the given keys anywhere in a JSON value
///
/// Key matching is case-insensitive and recurses through nested objects
/// and arrays. The whole value under a matching key is replaced, even if
/// it is itself an object.
pub fn redact_fields<I, S>(value: &Value, keys: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let keys: HashSet<String> = keys.into_iter().map(|k| k.as_ref().to_lowercase()).collect();
    if keys.is_empty() {
        return value.clone();
    }
    redact(value, &keys)
}

fn redact(value: &Value, keys: &HashSet<String>) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let masked = if keys.contains(&k.to_lowercase()) {
                    Value::String(REDACTED.to_string())
                } else {
                    redact(v, keys)
                };
                out.insert(k.clone(), masked);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| redact(v, keys)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_keys_are_masked() {
        let payload = json!({
            "tool": "email_user",
            "params": {"to": "a@b.c", "API_KEY": "sk-123"},
            "history": [{"password": "hunter2", "ok": true}]
        });

        let redacted = redact_fields(&payload, ["api_key", "password"]);
        assert_eq!(redacted["params"]["API_KEY"], REDACTED);
        assert_eq!(redacted["params"]["to"], "a@b.c");
        assert_eq!(redacted["history"][0]["password"], REDACTED);
        assert_eq!(redacted["history"][0]["ok"], true);
    }

    #[test]
    fn test_whole_subtree_is_replaced() {
        let payload = json!({"credentials": {"user": "u", "token": "t"}});
        let redacted = redact_fields(&payload, ["credentials"]);
        assert_eq!(redacted, json!({"credentials": REDACTED}));
    }

    #[test]
    fn test_no_keys_is_identity() {
        let payload = json!({"a": 1});
        assert_eq!(redact_fields(&payload, Vec::<String>::new()), payload);
    }
}
