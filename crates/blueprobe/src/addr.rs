//! Bluetooth device addresses

use std::fmt;
use std::str::FromStr;

/// A Bluetooth device address (BD_ADDR).
///
/// Stored in little-endian byte order, matching the wire and socket
/// address representation; `Display` prints the conventional
/// most-significant-first form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    /// The wildcard address (BDADDR_ANY), used to bind to any adapter.
    pub const ANY: BdAddr = BdAddr { bytes: [0u8; 6] };

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid Bluetooth address (expected XX:XX:XX:XX:XX:XX)")]
pub struct InvalidBdAddr;

impl FromStr for BdAddr {
    type Err = InvalidBdAddr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut count = 0;

        for part in s.split(':') {
            if count == 6 || part.len() != 2 {
                return Err(InvalidBdAddr);
            }
            let value = u8::from_str_radix(part, 16).map_err(|_| InvalidBdAddr)?;
            // Text is most-significant-first; storage is little-endian
            bytes[5 - count] = value;
            count += 1;
        }

        if count != 6 {
            return Err(InvalidBdAddr);
        }

        Ok(BdAddr { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let addr: BdAddr = "00:11:22:AA:BB:CC".parse().unwrap();
        assert_eq!(addr.bytes, [0xCC, 0xBB, 0xAA, 0x22, 0x11, 0x00]);
        assert_eq!(addr.to_string(), "00:11:22:AA:BB:CC");
    }

    #[test]
    fn parse_rejects_malformed_addresses() {
        assert!("00:11:22:AA:BB".parse::<BdAddr>().is_err());
        assert!("00:11:22:AA:BB:CC:DD".parse::<BdAddr>().is_err());
        assert!("001:1:22:AA:BB:CC".parse::<BdAddr>().is_err());
        assert!("00:11:22:AA:BB:ZZ".parse::<BdAddr>().is_err());
        assert!("".parse::<BdAddr>().is_err());
    }
}
