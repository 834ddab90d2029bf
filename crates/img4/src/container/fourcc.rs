//! Four-character codes
//!
//! IM4P types (`krnl`, `ibot`, ...) and IM4M property keys (`BNCH`, `DGST`,
//! ...) are four ASCII bytes. As private-class DER tag numbers they are read
//! as a big-endian `u32`.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A four-character ASCII code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Boot nonce held by IM4R.
    pub const BNCN: FourCc = FourCc(*b"BNCN");
    /// Boot nonce hash held by the manifest properties.
    pub const BNCH: FourCc = FourCc(*b"BNCH");
    /// Per-object digest.
    pub const DGST: FourCc = FourCc(*b"DGST");
    /// Manifest body.
    pub const MANB: FourCc = FourCc(*b"MANB");
    /// Manifest properties.
    pub const MANP: FourCc = FourCc(*b"MANP");

    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    pub const fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<u32> for FourCc {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl TryFrom<&[u8]> for FourCc {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 4] = bytes.try_into().map_err(|_| {
            Error::Value(format!("four-character code needs 4 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }
}

impl FromStr for FourCc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !s.is_ascii() {
            return Err(Error::Value(format!("four-character code {s:?} is not ASCII")));
        }
        Self::try_from(s.as_bytes())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc('{self}')")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_conversion() {
        assert_eq!(FourCc::MANB.as_u32(), 0x4d41_4e42);
        assert_eq!(FourCc::from(0x424e_4348), FourCc::BNCH);
    }

    #[test]
    fn test_parse() {
        assert_eq!("krnl".parse::<FourCc>().unwrap(), FourCc(*b"krnl"));
        assert!(matches!("krn".parse::<FourCc>(), Err(Error::Value(_))));
        assert!(matches!("kernel".parse::<FourCc>(), Err(Error::Value(_))));
        assert!(matches!("kérn".parse::<FourCc>(), Err(Error::Value(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(FourCc::DGST.to_string(), "DGST");
        assert_eq!(format!("{:?}", FourCc::DGST), "FourCc('DGST')");
    }
}
