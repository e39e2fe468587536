//! Ledger-native unsigned 256-bit integers.
//!
//! Every integer the ledger hands back (record ids, the record count,
//! timestamps, block numbers) is a 256-bit word. The registry works in `u64`,
//! so the conversion is explicit and fails closed instead of truncating.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// An unsigned 256-bit integer stored as 32 big-endian bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerUint([u8; 32]);

impl LedgerUint {
    pub const ZERO: LedgerUint = LedgerUint([0; 32]);

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        LedgerUint(bytes)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        LedgerUint(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Convert to `u64`, failing with [`LedgerError::Overflow`] when any of
    /// the upper 192 bits are set.
    pub fn to_u64(&self) -> Result<u64, LedgerError> {
        if self.0[..24].iter().any(|b| *b != 0) {
            return Err(LedgerError::Overflow {
                value: self.to_string(),
                target: "u64",
            });
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[24..]);
        Ok(u64::from_be_bytes(low))
    }

    /// Parse a JSON-RPC quantity such as `"0x1a"`.
    ///
    /// An empty quantity (`"0x"`) is read as zero; some nodes emit it for
    /// empty return data.
    pub fn from_hex(text: &str) -> Result<Self, LedgerError> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.len() > 64 {
            return Err(LedgerError::Overflow {
                value: text.to_string(),
                target: "uint256",
            });
        }

        let mut bytes = [0u8; 32];
        for (i, c) in digits.chars().rev().enumerate() {
            let nibble = c.to_digit(16).ok_or_else(|| {
                LedgerError::MalformedResponse(format!("invalid hex quantity '{}'", text))
            })? as u8;
            let byte = &mut bytes[31 - i / 2];
            if i % 2 == 0 {
                *byte |= nibble;
            } else {
                *byte |= nibble << 4;
            }
        }
        Ok(LedgerUint(bytes))
    }

    /// Minimal `0x`-prefixed hex form, as JSON-RPC quantities are written.
    pub fn to_hex(&self) -> String {
        let hex: String = self.0.iter().map(|b| format!("{:02x}", b)).collect();
        let trimmed = hex.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{}", trimmed)
        }
    }
}

impl From<u64> for LedgerUint {
    fn from(value: u64) -> Self {
        LedgerUint::from_u64(value)
    }
}

impl fmt::Display for LedgerUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.pad("0");
        }

        // Long division by 10 over the big-endian bytes.
        let mut work = self.0;
        let mut digits = Vec::new();
        while work.iter().any(|b| *b != 0) {
            let mut rem: u32 = 0;
            for byte in work.iter_mut() {
                let acc = (rem << 8) | u32::from(*byte);
                *byte = (acc / 10) as u8;
                rem = acc % 10;
            }
            digits.push(char::from(b'0' + rem as u8));
        }
        let decimal: String = digits.into_iter().rev().collect();
        f.pad(&decimal)
    }
}

impl fmt::Debug for LedgerUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerUint({})", self)
    }
}

impl Serialize for LedgerUint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LedgerUint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        LedgerUint::from_hex(&text).map_err(serde::de::Error::custom)
    }
}
