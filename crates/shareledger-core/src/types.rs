//! Strong type definitions for the ledger.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte share record identifier, computed as Blake3(signable_bytes(record)).
///
/// This is the content-address of a record. It does not depend on either
/// signature, so any holder of the unsigned fields can recompute it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub [u8; 32]);

impl RecordId {
    /// Create a new RecordId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// True for the "no predecessor" sentinel.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// The predecessor of a device's first record.
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for RecordId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for RecordId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for RecordId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Cumulative byte totals for one device, as of just before a record.
///
/// Missing totals are zero. Storage rows and wire messages that omit them
/// decode to `CumulativeTotals::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CumulativeTotals {
    pub sent: u64,
    pub received: u64,
}

impl CumulativeTotals {
    pub const fn new(sent: u64, received: u64) -> Self {
        Self { sent, received }
    }

    /// Totals after sending `bytes` more.
    pub fn after_sending(self, bytes: u64) -> Self {
        Self {
            sent: self.sent.saturating_add(bytes),
            received: self.received,
        }
    }

    /// Totals after receiving `bytes` more.
    pub fn after_receiving(self, bytes: u64) -> Self {
        Self {
            sent: self.sent,
            received: self.received.saturating_add(bytes),
        }
    }
}

/// Who may see a share record beyond its two parties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Visibility {
    #[default]
    Public = 0,
    Private = 1,
}

impl Visibility {
    /// Convert to u32 for encoding.
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    /// Try to parse from u32.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Public),
            1 => Some(Self::Private),
            _ => None,
        }
    }
}
