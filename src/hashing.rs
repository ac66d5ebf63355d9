//! Hashing System - SHA-256 for Published Configurations
//!
//! Identical configurations hash identically regardless of map ordering or
//! when they were published, so storefront caches can skip re-rendering.

use serde::Serialize;
use serde_json::{json, to_string, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::draft::ColorVariant;
use crate::ids::{FabricId, ProductId};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// content_hash = sha256(canonical {product, fabrics, variants})
pub fn compute_content_hash(
    product: &ProductId,
    fabrics: &BTreeSet<FabricId>,
    variants: &[ColorVariant],
) -> Result<String, serde_json::Error> {
    let content = json!({
        "product": product,
        "fabrics": fabrics,
        "variants": variants,
    });
    Ok(sha256_hex(canonical_json(&content)?.as_bytes()))
}
