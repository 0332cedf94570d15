use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::profile::UserProfileSnapshot;

/// Write a JSON value with object keys sorted lexicographically, so the
/// digest never depends on field order. Arrays keep their order (it is
/// meaningful: meal ordering, diet days).
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Digest over the canonical serialization of a JSON value.
pub fn hash_value(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Content hash of everything that influences plan output: the profile
/// snapshot plus the resolved protein target. Equal logical inputs hash
/// equal; any influencing field change moves the digest.
pub fn plan_hash(snapshot: &UserProfileSnapshot, protein_target_g: f64) -> String {
    let payload = serde_json::json!({
        "profile": snapshot,
        "protein_target_g": protein_target_g,
    });
    hash_value(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_the_digest() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":3,"y":2},"b":1}"#).unwrap();
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn array_order_does_affect_the_digest() {
        let a = json!({"days": ["Mon", "Tue"]});
        let b = json!({"days": ["Tue", "Mon"]});
        assert_ne!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn field_change_moves_the_digest() {
        let a = json!({"weight_kg": 80.0});
        let b = json!({"weight_kg": 80.5});
        assert_ne!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn digest_is_fixed_length_hex() {
        let h = hash_value(&json!({"k": null}));
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
