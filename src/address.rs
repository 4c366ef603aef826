//! Subscriber address identifiers.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SyncError;

/// Byte length of an account address once the `0x` prefix is stripped and decoded.
const ADDRESS_BYTES: usize = 20;

/// Identifier of a watched account.
///
/// `0x`-prefixed hex addresses are validated and lower-cased on parse so that a
/// checksummed input matches the lower-case form nodes return in blocks. Any other
/// non-empty identifier is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parse and normalize a user-supplied identifier.
    ///
    /// # Errors
    /// [`SyncError::InvalidAddress`] if the identifier is empty, or is `0x`-prefixed
    /// but not exactly 20 bytes of hex.
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SyncError::InvalidAddress("address is empty".into()));
        }

        let Some(body) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        else {
            return Ok(Self(trimmed.to_owned()));
        };

        let bytes = hex::decode(body)
            .map_err(|e| SyncError::InvalidAddress(format!("{trimmed}: {e}")))?;
        if bytes.len() != ADDRESS_BYTES {
            return Err(SyncError::InvalidAddress(format!(
                "{trimmed}: expected {ADDRESS_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }

    /// The normalized identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `other` (as it appears in a block) refers to this address.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_addresses_are_lowercased() {
        let a = Address::parse(" 0xC426E53C0DA077676A66EDF2245E990E9832D4A0 ").unwrap();
        assert_eq!(a.as_str(), "0xc426e53c0da077676a66edf2245e990e9832d4a0");
        assert!(a.matches("0xc426e53c0da077676a66edf2245e990e9832d4a0"));
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert!(matches!(Address::parse(""), Err(SyncError::InvalidAddress(_))));
        assert!(matches!(Address::parse("   "), Err(SyncError::InvalidAddress(_))));
        assert!(matches!(Address::parse("0x12zz"), Err(SyncError::InvalidAddress(_))));
        // 19 bytes
        assert!(matches!(
            Address::parse("0x26e53c0da077676a66edf2245e990e9832d4a0"),
            Err(SyncError::InvalidAddress(_))
        ));
    }

    #[test]
    fn opaque_identifiers_pass_through() {
        assert_eq!(Address::parse("alice").unwrap().as_str(), "alice");
    }
}
