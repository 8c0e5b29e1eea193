use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Masked byte pattern; `None` positions match any byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<Option<u8>>,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let bytes = parse_pattern(pattern)?;
        if bytes.iter().all(Option::is_none) {
            return Err(Error::InvalidSignature(format!(
                "Pattern '{}' has no literal bytes",
                pattern
            )));
        }
        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[Option<u8>] {
        &self.bytes
    }

    /// First literal byte and its index, used to anchor the scan.
    pub fn anchor(&self) -> (usize, u8) {
        self.bytes
            .iter()
            .enumerate()
            .find_map(|(i, b)| b.map(|v| (i, v)))
            .unwrap_or((0, 0))
    }

    /// Masked compare against the start of `window`.
    pub fn matches(&self, window: &[u8]) -> bool {
        window.len() >= self.bytes.len()
            && self
                .bytes
                .iter()
                .zip(window)
                .all(|(expected, actual)| expected.is_none_or(|b| b == *actual))
    }
}

/// How a host function is located inside the module image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Masked byte pattern; `offset` is added to the match address.
    Pattern {
        pattern: String,
        #[serde(default)]
        offset: i64,
    },
    /// Fixed relative virtual address from the module base, no search.
    Rva { rva: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    #[serde(flatten)]
    pub locator: Locator,
}

impl FunctionSignature {
    pub fn pattern(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            locator: Locator::Pattern {
                pattern: pattern.to_string(),
                offset: 0,
            },
        }
    }

    pub fn rva(name: &str, rva: u64) -> Self {
        Self {
            name: name.to_string(),
            locator: Locator::Rva { rva },
        }
    }

    /// Parsed pattern, `None` for the fixed-RVA form.
    pub fn pattern_bytes(&self) -> Result<Option<Pattern>> {
        match &self.locator {
            Locator::Pattern { pattern, .. } => Pattern::parse(pattern)
                .map(Some)
                .map_err(|e| Error::InvalidSignature(format!("{}: {}", self.name, e))),
            Locator::Rva { .. } => Ok(None),
        }
    }

    /// Human-readable locator; patterns are printed in canonical form.
    pub fn describe(&self) -> String {
        match &self.locator {
            Locator::Pattern { pattern, offset } => {
                let pattern = parse_pattern(pattern)
                    .map(|bytes| format_pattern(&bytes))
                    .unwrap_or_else(|_| pattern.clone());
                if *offset == 0 {
                    pattern
                } else {
                    format!("{} {}", pattern, signed_hex(*offset))
                }
            }
            Locator::Rva { rva } => format!("rva {:#x}", rva),
        }
    }
}

/// Versioned set of signatures for one host build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSet {
    pub version: String,
    pub entries: Vec<FunctionSignature>,
}

impl SignatureSet {
    pub fn entry(&self, name: &str) -> Option<&FunctionSignature> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureSet> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, signatures: &SignatureSet) -> Result<()> {
    let content = serde_json::to_string_pretty(signatures)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::InvalidSignature(format!("Invalid signature token '{}': {}", token, e))
        })?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidSignature(
            "Signature pattern is empty".to_string(),
        ));
    }

    Ok(bytes)
}

/// Offset as `+0x10` or `-0x10`
pub(crate) fn signed_hex(value: i64) -> String {
    let sign = if value < 0 { '-' } else { '+' };
    format!("{}{:#x}", sign, value.unsigned_abs())
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_with_wildcards() {
        let bytes = parse_pattern("48 85 D2 74 ? 48 89 74 24 10").unwrap();
        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes[0], Some(0x48));
        assert_eq!(bytes[2], Some(0xD2));
        assert_eq!(bytes[4], None);
    }

    #[test]
    fn test_format_uses_double_question_marks() {
        let pattern = vec![Some(0x48), None, Some(0xFF)];
        assert_eq!(format_pattern(&pattern), "48 ?? FF");
    }

    #[test]
    fn test_describe_normalizes_pattern() {
        let sig = FunctionSignature::pattern("F", "48 8b ? c3");
        assert_eq!(sig.describe(), "48 8B ?? C3");

        let mut shifted = sig.clone();
        shifted.locator = Locator::Pattern {
            pattern: "e8 ?".to_string(),
            offset: -4,
        };
        assert_eq!(shifted.describe(), "E8 ?? -0x4");
        assert_eq!(FunctionSignature::rva("R", 0x1F0).describe(), "rva 0x1f0");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let err = parse_pattern("48 ZZ").unwrap_err();
        assert!(err.to_string().contains("ZZ"));
        assert!(parse_pattern("   ").is_err());
    }

    #[test]
    fn test_all_wildcard_pattern_rejected() {
        assert!(Pattern::parse("?? ? ??").is_err());
    }

    #[test]
    fn test_anchor_skips_leading_wildcards() {
        let pattern = Pattern::parse("?? ?? E8 ?? 90").unwrap();
        assert_eq!(pattern.anchor(), (2, 0xE8));
    }

    #[test]
    fn test_masked_match() {
        let pattern = Pattern::parse("48 ?? 90").unwrap();
        assert!(pattern.matches(&[0x48, 0x11, 0x90, 0xCC]));
        assert!(!pattern.matches(&[0x48, 0x11, 0x91]));
        assert!(!pattern.matches(&[0x48, 0x11]));
    }

    #[test]
    fn test_signature_set_json_shape() {
        let set = SignatureSet {
            version: "test".to_string(),
            entries: vec![
                FunctionSignature::pattern("Foo", "48 8B ??"),
                FunctionSignature::rva("Bar", 0x1234),
            ],
        };
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["entries"][0]["kind"], "pattern");
        assert_eq!(json["entries"][1]["rva"], 0x1234);

        let parsed: SignatureSet = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.entry("foo"), Some(&set.entries[0]));
    }

    #[test]
    fn test_save_and_load_signatures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigs.json");
        let set = SignatureSet {
            version: "v1".to_string(),
            entries: vec![FunctionSignature::pattern("Foo", "90 90")],
        };
        save_signatures(&path, &set).unwrap();
        let loaded = load_signatures(&path).unwrap();
        assert_eq!(loaded.version, "v1");
        assert_eq!(loaded.entries, set.entries);
    }
}
