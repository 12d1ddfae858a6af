//! Link-layer radio addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FrameError;

/// Length of a radio address in bytes.
pub const ADDRESS_LEN: usize = 6;

/// A 6-byte link-layer address, written `AA:BB:CC:DD:EE:FF`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RadioAddress(pub [u8; ADDRESS_LEN]);

impl RadioAddress {
    /// The link-layer broadcast address.
    pub const BROADCAST: RadioAddress = RadioAddress([0xFF; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        RadioAddress(bytes)
    }

    /// Read an address from the first six bytes of `data`.
    pub fn from_slice(data: &[u8]) -> Result<Self, FrameError> {
        let bytes: [u8; ADDRESS_LEN] = data
            .get(..ADDRESS_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| FrameError::too_short("address", ADDRESS_LEN, data.len()))?;
        Ok(RadioAddress(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == RadioAddress::BROADCAST
    }
}

impl fmt::Display for RadioAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for RadioAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RadioAddress({})", self)
    }
}

impl FromStr for RadioAddress {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.split([':', '-']).collect();
        let raw = hex::decode(&compact).map_err(|e| FrameError::InvalidAddress(format!("{s}: {e}")))?;
        let bytes: [u8; ADDRESS_LEN] = raw
            .try_into()
            .map_err(|_| FrameError::InvalidAddress(format!("{s}: expected 6 bytes")))?;
        Ok(RadioAddress(bytes))
    }
}

impl TryFrom<String> for RadioAddress {
    type Error = FrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RadioAddress> for String {
    fn from(addr: RadioAddress) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let addr = RadioAddress::new([0x24, 0x6F, 0x28, 0x01, 0x02, 0xAB]);
        assert_eq!(addr.to_string(), "24:6F:28:01:02:AB");
        assert_eq!("24:6f:28:01:02:ab".parse::<RadioAddress>().unwrap(), addr);
        assert_eq!("246F280102AB".parse::<RadioAddress>().unwrap(), addr);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("24:6F:28".parse::<RadioAddress>().is_err());
        assert!("ZZ:6F:28:01:02:AB".parse::<RadioAddress>().is_err());
        assert!("24:6F:28:01:02:AB:CD".parse::<RadioAddress>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let addr = RadioAddress::new([1, 2, 3, 4, 5, 6]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"01:02:03:04:05:06\"");
        let back: RadioAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_from_slice() {
        assert!(RadioAddress::from_slice(&[1, 2, 3]).is_err());
        let addr = RadioAddress::from_slice(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(addr, RadioAddress::new([1, 2, 3, 4, 5, 6]));
        assert!(RadioAddress::BROADCAST.is_broadcast());
    }
}
