//! Minimal wasm export-section scan.
//!
//! NEAR contract methods are exported wasm functions taking no wasm-level
//! parameters (arguments arrive through the host), so enumerating function
//! exports is enough to know which view methods a contract offers.

use anyhow::{anyhow, Result};

const EXPORT_SECTION: u8 = 7;
const EXPORT_KIND_FUNC: u8 = 0;

/// Names of all exported functions, in module order. Internal `__*` exports
/// are dropped, since they are never callable view methods.
pub fn exported_methods(wasm: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::new(wasm);
    let magic = reader.bytes(4)?;
    if magic != b"\0asm" {
        return Err(anyhow!("not a wasm module"));
    }
    reader.bytes(4)?; // version

    let mut methods = Vec::new();
    while !reader.done() {
        let id = reader.byte()?;
        let size = reader.leb128()? as usize;
        if id != EXPORT_SECTION {
            reader.bytes(size)?;
            continue;
        }
        let count = reader.leb128()?;
        for _ in 0..count {
            let name_len = reader.leb128()? as usize;
            let name = String::from_utf8_lossy(reader.bytes(name_len)?).into_owned();
            let kind = reader.byte()?;
            reader.leb128()?; // export index
            if kind == EXPORT_KIND_FUNC && !name.starts_with("__") {
                methods.push(name);
            }
        }
        break;
    }
    Ok(methods)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| anyhow!("truncated wasm module"))?;
        self.pos += 1;
        Ok(b)
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| anyhow!("truncated wasm module"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn leb128(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.byte()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(anyhow!("leb128 overflow"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leb(mut value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    /// Build a module with just an export section.
    fn module(exports: &[(&str, u8)]) -> Vec<u8> {
        let mut body = leb(exports.len() as u64);
        for (name, kind) in exports {
            body.extend(leb(name.len() as u64));
            body.extend(name.as_bytes());
            body.push(*kind);
            body.extend(leb(0));
        }
        let mut wasm = b"\0asm\x01\0\0\0".to_vec();
        wasm.push(EXPORT_SECTION);
        wasm.extend(leb(body.len() as u64));
        wasm.extend(body);
        wasm
    }

    #[test]
    fn lists_function_exports_only() {
        let wasm = module(&[
            ("get_owner", 0),
            ("memory", 2),
            ("__contract_abi", 0),
            ("ft_total_supply", 0),
        ]);
        let methods = exported_methods(&wasm).unwrap();
        assert_eq!(methods, vec!["get_owner", "ft_total_supply"]);
    }

    #[test]
    fn skips_unknown_sections() {
        let mut wasm = b"\0asm\x01\0\0\0".to_vec();
        // Custom section (id 0) with 3 payload bytes, then an export section.
        wasm.extend([0, 3, 1, 2, 3]);
        let tail = module(&[("get_status", 0)]);
        wasm.extend(&tail[8..]);
        assert_eq!(exported_methods(&wasm).unwrap(), vec!["get_status"]);
    }

    #[test]
    fn rejects_non_wasm_payloads() {
        assert!(exported_methods(b"not wasm at all").is_err());
        assert!(exported_methods(b"\0as").is_err());
    }
}
