//! Four-character pixel format codes
//!
//! A FourCC is four bytes, usually ASCII, packed into a 32-bit value, least-significant
//! byte first: `YUYV` is `0x5659_5559`.

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const YUYV: FourCc = FourCc(*b"YUYV");
    pub const MJPG: FourCc = FourCc(*b"MJPG");
    pub const RGB3: FourCc = FourCc(*b"RGB3");
    pub const BGR3: FourCc = FourCc(*b"BGR3");
    pub const GREY: FourCc = FourCc(*b"GREY");
    pub const AVC1: FourCc = FourCc(*b"avc1");

    pub const fn new(repr: &[u8; 4]) -> Self {
        FourCc(*repr)
    }

    /// Byte `i` of the code is `(packed >> (8 * i)) & 0xFF`.
    pub fn from_packed(packed: u32) -> Self {
        FourCc(packed.to_le_bytes())
    }

    pub fn packed(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Decode a packed value reported as a float, as some capture APIs do.
    pub fn from_packed_f64(value: f64) -> Self {
        Self::from_packed(value as u32)
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }

    pub fn as_str(&self) -> String {
        self.0.iter().map(|&b| b as char).collect()
    }
}

impl FromStr for FourCc {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Each char carries one byte, matching `as_str`.
        let invalid = || {
            CameraError::InvalidArgument(format!(
                "pixel format must be four single-byte characters, got {s:?}"
            ))
        };
        let mut bytes = [0u8; 4];
        let mut chars = s.chars();
        for slot in bytes.iter_mut() {
            let c = chars.next().ok_or_else(invalid)?;
            *slot = u8::try_from(u32::from(c)).map_err(|_| invalid())?;
        }
        if chars.next().is_some() {
            return Err(invalid());
        }
        Ok(FourCc(bytes))
    }
}

impl TryFrom<String> for FourCc {
    type Error = CameraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FourCc> for String {
    fn from(value: FourCc) -> Self {
        value.as_str()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}
