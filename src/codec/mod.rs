//! CCSID (Coded Character Set Identifier) codec tables.
//!
//! Bijective-where-possible conversion between a single EBCDIC byte and a
//! Unicode scalar, parameterized by CCSID id. Tables are loaded once from
//! an embedded JSON resource and never mutated afterwards; lookups are
//! allocation-free.

use std::collections::HashMap;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{CodecError, ConfigError, Error, Result};

/// Unicode replacement placeholder used for unmapped EBCDIC slots.
pub const UNMAPPED: char = '\u{001A}';

const RESOURCE_JSON: &str = include_str!("resources/ccsid.json");

#[derive(Debug, Deserialize)]
struct CcsidResource {
    ccsid_mappings: Vec<CcsidEntry>,
}

#[derive(Debug, Deserialize)]
struct CcsidEntry {
    ccsid_id: String,
    #[allow(dead_code)]
    name: String,
    description: String,
    codepage: Vec<u32>,
}

/// A single loaded CCSID table: forward (byte -> char) and inverse
/// (char -> byte) mappings.
pub struct CcsidTable {
    pub description: String,
    forward: [char; 256],
    inverse: HashMap<char, u8>,
}

impl CcsidTable {
    fn from_entry(entry: CcsidEntry) -> Self {
        let mut forward = [UNMAPPED; 256];
        for (i, cp) in entry.codepage.iter().enumerate().take(256) {
            forward[i] = char::from_u32(*cp).unwrap_or(UNMAPPED);
        }
        let mut inverse = HashMap::with_capacity(256);
        for (byte, ch) in forward.iter().enumerate() {
            if *ch != UNMAPPED {
                inverse.entry(*ch).or_insert(byte as u8);
            }
        }
        CcsidTable { description: entry.description, forward, inverse }
    }

    #[inline(always)]
    pub fn decode(&self, byte: u8) -> char {
        self.forward[byte as usize]
    }

    pub fn encode(&self, ch: char) -> Option<u8> {
        self.inverse.get(&ch).copied()
    }
}

/// Global, read-only registry of all loaded CCSID tables. Loaded once on
/// first access; never mutated after init.
pub struct CcsidRegistry {
    tables: HashMap<String, CcsidTable>,
}

static REGISTRY: Lazy<CcsidRegistry> = Lazy::new(CcsidRegistry::load);

impl CcsidRegistry {
    fn load() -> Self {
        let resource: CcsidResource = serde_json::from_str(RESOURCE_JSON)
            .expect("embedded CCSID resource is malformed JSON");
        let mut tables = HashMap::with_capacity(resource.ccsid_mappings.len());
        for entry in resource.ccsid_mappings {
            tables.insert(entry.ccsid_id.clone(), CcsidTable::from_entry(entry));
        }
        CcsidRegistry { tables }
    }

    pub fn global() -> &'static CcsidRegistry {
        &REGISTRY
    }

    fn table(&self, ccsid: &str) -> Result<&CcsidTable> {
        self.tables.get(ccsid).ok_or_else(|| {
            Error::Config(ConfigError::UnknownCcsid { ccsid: ccsid.to_string() })
        })
    }

    /// Total: unmapped entries decode to [`UNMAPPED`].
    pub fn decode(&self, ccsid: &str, byte: u8) -> Result<char> {
        Ok(self.table(ccsid)?.decode(byte))
    }

    /// Fails when `ch` has no reverse mapping for `ccsid`.
    pub fn encode(&self, ccsid: &str, ch: char) -> Result<u8> {
        let table = self.table(ccsid)?;
        table.encode(ch).ok_or_else(|| {
            Error::Codec(CodecError::Unmappable { ccsid: ccsid.to_string(), codepoint: ch })
        })
    }

    pub fn description(&self, ccsid: &str) -> Result<&str> {
        Ok(self.table(ccsid)?.description.as_str())
    }

    pub fn available(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }
}

/// Convenience free functions operating on the global registry.
pub fn decode(ccsid: &str, byte: u8) -> Result<char> {
    CcsidRegistry::global().decode(ccsid, byte)
}

pub fn encode(ccsid: &str, ch: char) -> Result<u8> {
    CcsidRegistry::global().encode(ccsid, ch)
}

pub fn decode_str(ccsid: &str, bytes: &[u8]) -> Result<String> {
    let table = CcsidRegistry::global().table(ccsid)?;
    Ok(bytes.iter().map(|&b| table.decode(b)).collect())
}

pub fn encode_str(ccsid: &str, s: &str) -> Result<Vec<u8>> {
    let table = CcsidRegistry::global().table(ccsid)?;
    let mut out = Vec::with_capacity(s.len());
    for ch in s.chars() {
        let byte = table.encode(ch).ok_or_else(|| {
            Error::Codec(CodecError::Unmappable { ccsid: ccsid.to_string(), codepoint: ch })
        })?;
        out.push(byte);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_cp037_basics() {
        assert_eq!(decode("037", 0x40).unwrap(), ' ');
        assert_eq!(decode("037", 0xC1).unwrap(), 'A');
        assert_eq!(decode("037", 0x81).unwrap(), 'a');
        assert_eq!(decode("037", 0xF0).unwrap(), '0');
    }

    #[test]
    fn round_trips_mapped_subset() {
        for ccsid in CcsidRegistry::global().available() {
            for byte in 0u8..=255 {
                let ch = decode(ccsid, byte).unwrap();
                if ch == UNMAPPED {
                    continue;
                }
                assert_eq!(encode(ccsid, ch).unwrap(), byte, "ccsid {ccsid} byte {byte:#04x}");
            }
        }
    }

    #[test]
    fn unknown_ccsid_is_config_error() {
        assert!(matches!(decode("9999", 0x40), Err(Error::Config(ConfigError::UnknownCcsid { .. }))));
    }

    #[test]
    fn unmappable_character_is_codec_error() {
        let err = encode("037", '\u{1F600}').unwrap_err();
        assert!(matches!(err, Error::Codec(CodecError::Unmappable { .. })));
    }

    #[test]
    fn euro_pages_carry_euro_sign() {
        assert_eq!(decode("1140", 0x9F).unwrap(), '\u{20AC}');
    }

    #[test]
    fn all_required_ccsids_present() {
        let required = [
            "037", "273", "277", "278", "280", "284", "285", "297", "500", "870",
            "871", "1025", "1026", "1112", "1140", "1141", "1147", "1148", "875",
        ];
        let available: Vec<&str> = CcsidRegistry::global().available();
        for r in required {
            assert!(available.contains(&r), "missing required ccsid {r}");
        }
    }
}
