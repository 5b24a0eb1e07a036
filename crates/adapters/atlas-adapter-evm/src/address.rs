//! EVM address grammar and EIP-55 checksum casing.

use atlas_model::ModelError;
use sha3::{Digest, Keccak256};

/// 20-byte hex address with `0x` prefix.
pub fn is_valid(address: &str) -> bool {
    let Some(hex_part) = address.strip_prefix("0x") else {
        return false;
    };
    hex_part.len() == 40 && hex_part.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Checksum-case an address per EIP-55. Idempotent: casing is a pure
/// function of the lowercased hex digits.
pub fn normalize(address: &str) -> Result<String, ModelError> {
    if !is_valid(address) {
        return Err(ModelError::InvalidAddress(address.to_string()));
    }
    let lower = address[2..].to_ascii_lowercase();
    let digest = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = (digest[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0xf;
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Checksummed vectors from the EIP-55 reference set.
    const VECTORS: &[&str] = &[
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn checksum_matches_reference_vectors() {
        for vector in VECTORS {
            assert_eq!(&normalize(&vector.to_lowercase()).unwrap(), vector);
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        for vector in VECTORS {
            let once = normalize(vector).unwrap();
            assert_eq!(normalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn grammar_rejects_junk() {
        assert!(is_valid("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid("0x5aAeb6"));
        assert!(!is_valid("0xZZZeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid("alice.near"));
        assert!(normalize("alice.near").is_err());
    }
}
