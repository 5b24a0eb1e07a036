//! NEAR account-id grammar.
//!
//! Accepted forms: named accounts under `.near`/`.aurora`/`.testnet`,
//! 64-hex implicit accounts, and the literal `aurora` (the Aurora engine's
//! top-level account). Normalization lower-cases, which is idempotent.

use atlas_model::ModelError;

const SUFFIXES: &[&str] = &[".near", ".aurora", ".testnet"];

pub fn is_valid(address: &str) -> bool {
    let lower = address.to_ascii_lowercase();
    if lower == "aurora" {
        return true;
    }
    if lower.len() == 64 && lower.bytes().all(|b| b.is_ascii_hexdigit()) {
        return true;
    }
    if !SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return false;
    }
    is_account_id(&lower)
}

/// Protocol account-id grammar: 2..=64 chars, dot-separated parts of
/// lowercase alphanumerics with interior `-`/`_`.
fn is_account_id(lower: &str) -> bool {
    if lower.len() < 2 || lower.len() > 64 {
        return false;
    }
    lower.split('.').all(|part| {
        !part.is_empty()
            && part.bytes().all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_'))
            && !part.starts_with(['-', '_'])
            && !part.ends_with(['-', '_'])
    })
}

pub fn normalize(address: &str) -> Result<String, ModelError> {
    if !is_valid(address) {
        return Err(ModelError::InvalidAddress(address.to_string()));
    }
    Ok(address.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_documented_forms() {
        assert!(is_valid("aurora"));
        assert!(is_valid("alice.near"));
        assert!(is_valid("bridge.aurora"));
        assert!(is_valid("dev-1234.testnet"));
        assert!(is_valid("council.sputnik-dao.near"));
        assert!(is_valid(&"a1".repeat(32)));
    }

    #[test]
    fn rejects_everything_else() {
        assert!(!is_valid("alice"));
        assert!(!is_valid("alice.eth"));
        assert!(!is_valid(".near"));
        assert!(!is_valid("-bad.near"));
        assert!(!is_valid("bad-.near"));
        assert!(!is_valid("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid(&"g".repeat(64)), "64 chars but not hex");
    }

    #[test]
    fn normalize_lowercases_and_is_idempotent() {
        let once = normalize("Alice.NEAR").unwrap();
        assert_eq!(once, "alice.near");
        assert_eq!(normalize(&once).unwrap(), once);
    }
}
