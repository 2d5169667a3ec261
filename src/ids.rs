//! Content-addressed identifiers.
//!
//! Ids are SHA-256 digests over canonical JSON: object keys sorted, no
//! insignificant whitespace. Identical content always yields the same id,
//! whatever order the upstream annotations arrived in.

use elementary_assertions_document::{Assertion, Operator, RoleEntry};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

const ASSERTION_ID_HEX_LEN: usize = 32;
const GROUP_ID_HEX_LEN: usize = 16;

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Rebuilds `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn role_payload(entries: &[RoleEntry]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|entry| json!({ "role": entry.role, "mention_ids": entry.mention_ids }))
            .collect(),
    )
}

fn operator_payload(operators: &[Operator]) -> Value {
    Value::Array(
        operators
            .iter()
            .map(|op| {
                json!({
                    "kind": op.kind,
                    "value": op.value,
                    "token_id": op.token_id,
                    "group_id": op.group_id,
                })
            })
            .collect(),
    )
}

/// Id of an assertion from its segment, predicate, roles and operators.
///
/// Evidence and diagnostics do not participate. The assertion must already
/// be normalized so that role and operator order is canonical.
pub fn assertion_id(assertion: &Assertion) -> String {
    let payload = json!({
        "segment_id": assertion.segment_id,
        "predicate": assertion.predicate.mention_id,
        "arguments": role_payload(&assertion.arguments),
        "modifiers": role_payload(&assertion.modifiers),
        "operators": operator_payload(&assertion.operators),
    });
    let digest = sha256_hex(canonical_json(&payload).as_bytes());
    format!("a:{}", &digest[..ASSERTION_ID_HEX_LEN])
}

/// Id of a coordination group from its sorted member mention ids.
pub fn coordination_group_id(sorted_member_ids: &[String]) -> String {
    let digest = sha256_hex(canonical_json(&json!(sorted_member_ids)).as_bytes());
    format!("cg:{}", &digest[..GROUP_ID_HEX_LEN])
}

/// `sha256:<hex>` digest of a serializable input.
pub fn input_digest(value: &Value) -> String {
    format!("sha256:{}", sha256_hex(canonical_json(value).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = json!({ "b": 1, "a": { "d": [ { "z": 0, "y": 1 } ], "c": null } });
        insta::assert_snapshot!(
            canonical_json(&value),
            @r###"{"a":{"c":null,"d":[{"y":1,"z":0}]},"b":1}"###
        );
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_group_id_shape() {
        let id = coordination_group_id(&["m:s1:0-5:token".to_string()]);
        assert!(id.starts_with("cg:"));
        assert_eq!(id.len(), 3 + GROUP_ID_HEX_LEN);
    }
}
