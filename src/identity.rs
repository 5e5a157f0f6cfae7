//! Node identity derivation.
//!
//! A node's identity is the 48-bit MAC-like id built from three driver
//! fields, each a hex string with a `0x` prefix:
//!
//! ```text
//! ┌────────────────────┬────────────────┬────────────────┐
//! │  manufacturer id   │  product type  │  product id    │
//! │  bits 47..32       │  bits 31..16   │  bits 15..0    │
//! └────────────────────┴────────────────┴────────────────┘
//! ```
//!
//! `("0x0086", "0x0002", "0x0064")` becomes `00:86:00:02:00:64`.

use std::fmt;

use crate::error::IdentityError;

/// Length of the prefix stripped from every raw field.
pub const RAW_PREFIX_LEN: usize = 2;

/// Derived identity of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity(Vec<u8>);

impl NodeIdentity {
    /// Derives the identity from the three raw driver fields.
    ///
    /// Fields are not padded or truncated. A missing `0x` prefix, an empty
    /// field, an odd digit count or a non-hex digit is an error.
    pub fn derive(
        manufacturer_id: &str,
        product_type: &str,
        product_id: &str,
    ) -> Result<Self, IdentityError> {
        let mut bytes = decode_field("manufacturer id", manufacturer_id)?;
        bytes.extend(decode_field("product type", product_type)?);
        bytes.extend(decode_field("product id", product_id)?);
        Ok(Self(bytes))
    }

    /// Returns the identity as raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

fn decode_field(field: &'static str, raw: &str) -> Result<Vec<u8>, IdentityError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| IdentityError::MissingPrefix {
            field,
            raw: raw.to_string(),
        })?;

    let invalid = |source| IdentityError::InvalidHex {
        field,
        raw: raw.to_string(),
        source,
    };
    if digits.is_empty() {
        return Err(invalid(hex::FromHexError::InvalidStringLength));
    }
    hex::decode(digits).map_err(invalid)
}
