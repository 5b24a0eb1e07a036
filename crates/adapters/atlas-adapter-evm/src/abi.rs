//! Zero-argument view extraction from a verified ABI, selector derivation,
//! and return-value classification.

use anyhow::{anyhow, Result};
use primitive_types::U256;
use serde_json::{json, Value as JsonValue};
use sha3::{Digest, Keccak256};

/// A read-only function callable without arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFunction {
    pub name: String,
    /// Solidity type names of the outputs, in order.
    pub outputs: Vec<String>,
}

/// All zero-argument `view`/`pure` functions declared by the ABI.
pub fn zero_arg_views(abi: &JsonValue) -> Vec<ViewFunction> {
    let Some(entries) = abi.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|e| e.get("type").and_then(JsonValue::as_str) == Some("function"))
        .filter(|e| {
            matches!(
                e.get("stateMutability").and_then(JsonValue::as_str),
                Some("view") | Some("pure")
            )
        })
        .filter(|e| {
            e.get("inputs")
                .and_then(JsonValue::as_array)
                .map(Vec::is_empty)
                .unwrap_or(false)
        })
        .filter_map(|e| {
            let name = e.get("name")?.as_str()?.to_string();
            let outputs = e
                .get("outputs")
                .and_then(JsonValue::as_array)
                .map(|outs| {
                    outs.iter()
                        .filter_map(|o| o.get("type").and_then(JsonValue::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(ViewFunction { name, outputs })
        })
        .collect()
}

/// 4-byte call selector for a zero-argument function, hex-encoded with the
/// `0x` prefix.
pub fn selector(name: &str) -> String {
    let digest = Keccak256::digest(format!("{name}()").as_bytes());
    format!("0x{}", hex::encode(&digest[..4]))
}

/// Decode an `eth_call` return payload against the declared output types.
///
/// Static types are read from their head words; `string`/`bytes` follow the
/// tail offset. Anything unrecognized falls back to the raw head word hex.
pub fn decode_return(outputs: &[String], data: &str) -> Result<Vec<JsonValue>> {
    let raw = hex::decode(data.trim_start_matches("0x"))
        .map_err(|e| anyhow!("return payload is not hex: {e}"))?;
    if outputs.is_empty() {
        return Ok(Vec::new());
    }
    if raw.len() < outputs.len() * 32 {
        return Err(anyhow!(
            "return payload too short: {} bytes for {} outputs",
            raw.len(),
            outputs.len()
        ));
    }

    let word = |index: usize| -> &[u8] { &raw[index * 32..(index + 1) * 32] };

    let mut values = Vec::with_capacity(outputs.len());
    for (i, ty) in outputs.iter().enumerate() {
        let head = word(i);
        let value = match ty.as_str() {
            "address" => json!(format!("0x{}", hex::encode(&head[12..]))),
            "bool" => json!(head[31] != 0),
            "string" | "bytes" => decode_dynamic(&raw, head, ty)?,
            t if t.starts_with("uint") || t.starts_with("int") => {
                json!(U256::from_big_endian(head).to_string())
            }
            t if t.starts_with("bytes") => {
                let n: usize = t[5..].parse().unwrap_or(32);
                json!(format!("0x{}", hex::encode(&head[..n.min(32)])))
            }
            _ => json!(format!("0x{}", hex::encode(head))),
        };
        values.push(value);
    }
    Ok(values)
}

fn decode_dynamic(raw: &[u8], head: &[u8], ty: &str) -> Result<JsonValue> {
    let offset_word = U256::from_big_endian(head);
    if offset_word > U256::from(raw.len()) {
        return Err(anyhow!("dynamic offset {offset_word} out of bounds"));
    }
    let offset = offset_word.low_u64() as usize;
    if offset + 32 > raw.len() {
        return Err(anyhow!("dynamic offset {offset} out of bounds"));
    }
    let len_word = U256::from_big_endian(&raw[offset..offset + 32]);
    if len_word > U256::from(raw.len()) {
        return Err(anyhow!("dynamic length {len_word} out of bounds"));
    }
    let len = len_word.low_u64() as usize;
    let start = offset + 32;
    if start + len > raw.len() {
        return Err(anyhow!("dynamic payload of {len} bytes out of bounds"));
    }
    let payload = &raw[start..start + len];
    Ok(match ty {
        "string" => json!(String::from_utf8_lossy(payload).into_owned()),
        _ => json!(format!("0x{}", hex::encode(payload))),
    })
}

/// How a decoded method result lands in the state spec.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Method name contains `ROLE`: a role-id getter feeding RBAC discovery.
    RoleGetter(String),
    /// Lone `address` return: an interacts-with edge target.
    InteractsWith(String),
    /// Everything else, JSON-stringified.
    Fact(String),
}

pub fn classify(function: &ViewFunction, values: Vec<JsonValue>) -> Classified {
    if function.name.contains("ROLE") {
        let id = values
            .first()
            .map(|v| match v {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        return Classified::RoleGetter(id);
    }
    if function.outputs.len() == 1 && function.outputs[0] == "address" {
        if let Some(JsonValue::String(addr)) = values.first() {
            return Classified::InteractsWith(addr.clone());
        }
    }
    match values.len() {
        0 => Classified::Fact("null".to_string()),
        1 => Classified::Fact(values[0].to_string()),
        _ => Classified::Fact(JsonValue::Array(values).to_string()),
    }
}
