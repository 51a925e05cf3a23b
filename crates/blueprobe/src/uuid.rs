//! Bluetooth UUID handling
//!
//! ATT carries UUIDs in two wire encodings: a 16-bit SIG-assigned short
//! form and the full 128-bit form. Both are members of the same value
//! space, so this type always stores the expanded 128-bit value
//! (little-endian) and contracts back to the short form for display and
//! wire encoding when possible.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// The Bluetooth base UUID "00000000-0000-1000-8000-00805F9B34FB" in
/// little-endian byte order.
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where the 16-bit value is inserted.
const BASE_OFFSET: usize = 12;

impl Uuid {
    /// Creates a UUID directly from 16 bytes in little-endian order.
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a UUID directly from 16 bytes in big-endian order.
    pub fn from_bytes_be(mut bytes: [u8; 16]) -> Self {
        bytes.reverse();
        Uuid { bytes }
    }

    /// Expands a 16-bit SIG-assigned value: `value * 2^96 + BASE_UUID`.
    pub const fn from_u16(uuid16: u16) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid16 as u8;
        bytes[BASE_OFFSET + 1] = (uuid16 >> 8) as u8;
        Uuid { bytes }
    }

    /// Tries to create a UUID from wire bytes (little-endian).
    ///
    /// Accepts slices of length 2 (16-bit form) or 16 (128-bit form);
    /// any other length returns `None`.
    pub fn try_from_slice_le(slice: &[u8]) -> Option<Self> {
        match slice.len() {
            2 => Some(Uuid::from_u16(u16::from_le_bytes([slice[0], slice[1]]))),
            16 => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(slice);
                Some(Uuid::from_bytes_le(bytes))
            }
            _ => None,
        }
    }

    /// Returns the underlying 16 bytes in little-endian order.
    pub const fn as_bytes_le(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Returns the underlying 16 bytes in big-endian order.
    pub fn as_bytes_be(&self) -> [u8; 16] {
        let mut bytes = self.bytes;
        bytes.reverse();
        bytes
    }

    fn is_sig_assigned(&self) -> bool {
        self.bytes[0..BASE_OFFSET] == BASE_UUID_BYTES[0..BASE_OFFSET]
            && self.bytes[BASE_OFFSET + 2] == 0
            && self.bytes[BASE_OFFSET + 3] == 0
    }

    /// Contracts the UUID to its 16-bit short form, if it has one.
    pub fn as_u16(&self) -> Option<u16> {
        if self.is_sig_assigned() {
            Some(u16::from_le_bytes([
                self.bytes[BASE_OFFSET],
                self.bytes[BASE_OFFSET + 1],
            ]))
        } else {
            None
        }
    }

    /// Length of this UUID's wire encoding: 2 or 16 bytes.
    pub fn encoded_len(&self) -> usize {
        if self.as_u16().is_some() {
            2
        } else {
            16
        }
    }

    /// Appends the wire encoding (short form when possible) to `buf`.
    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        if let Some(uuid16) = self.as_u16() {
            buf.extend_from_slice(&uuid16.to_le_bytes());
        } else {
            buf.extend_from_slice(&self.bytes);
        }
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uuid16) = self.as_u16() {
            write!(f, "{:04x}", uuid16)
        } else {
            let b = self.as_bytes_be();
            write!(
                f,
                "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
                b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
            )
        }
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uuid16) = self.as_u16() {
            write!(f, "Uuid(0x{:04X})", uuid16)
        } else {
            write!(f, "Uuid({})", self)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UuidParseError {
    #[error("UUID string has an invalid length")]
    InvalidLength,
    #[error("UUID string is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != '-').collect();

        match cleaned.len() {
            4 => {
                let mut raw = [0u8; 2];
                hex::decode_to_slice(&cleaned, &mut raw)?;
                Ok(Uuid::from_u16(u16::from_be_bytes(raw)))
            }
            32 => {
                let mut bytes_be = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes_be)?;
                Ok(Uuid::from_bytes_be(bytes_be))
            }
            _ => Err(UuidParseError::InvalidLength),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_round_trip() {
        let uuid = Uuid::from_u16(0x180A);
        assert_eq!(uuid.as_u16(), Some(0x180A));
        assert_eq!(uuid.encoded_len(), 2);
        assert_eq!(uuid.to_string(), "180a");
    }

    #[test]
    fn short_and_expanded_forms_compare_equal() {
        let short = Uuid::from_u16(0x1800);
        let expanded: Uuid = "00001800-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(short, expanded);
        assert_eq!(expanded.as_u16(), Some(0x1800));
    }

    #[test]
    fn full_form_display() {
        let uuid: Uuid = "12345678-90ab-cdef-1234-567890abcdef".parse().unwrap();
        assert_eq!(uuid.as_u16(), None);
        assert_eq!(uuid.encoded_len(), 16);
        assert_eq!(uuid.to_string(), "12345678-90ab-cdef-1234-567890abcdef");
    }

    #[test]
    fn wire_slice_lengths() {
        assert!(Uuid::try_from_slice_le(&[0x00, 0x18]).is_some());
        assert!(Uuid::try_from_slice_le(&[0u8; 16]).is_some());
        assert!(Uuid::try_from_slice_le(&[0u8; 4]).is_none());
        assert!(Uuid::try_from_slice_le(&[]).is_none());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("18".parse::<Uuid>().is_err());
        assert!("zzzz".parse::<Uuid>().is_err());
    }
}
