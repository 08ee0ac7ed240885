pub mod cache;
pub mod config;
pub mod loader;
pub mod pattern;
pub mod prelude;
pub mod tables;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub use loader::{TableInfo, TableLoader, TableSet};

/// A BUFR descriptor: class F (2 bits), category X (6 bits), item Y (8 bits).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FXY {
    pub f: u8,
    pub x: u8,
    pub y: u8,
}

/// The four descriptor classes, selected by F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorKind {
    Element,
    Replicator,
    Operator,
    Sequence,
}

impl FXY {
    pub const fn new(f: u8, x: u8, y: u8) -> Self {
        FXY { f, x, y }
    }

    /// Decode the 16-bit wire form used in section 3.
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        FXY {
            f: bytes[0] >> 6,
            x: bytes[0] & 0x3F,
            y: bytes[1],
        }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        [(self.f << 6) | (self.x & 0x3F), self.y]
    }

    /// Decode the six digit integer form `F*100000 + X*1000 + Y`.
    pub fn from_int(value: u32) -> Self {
        FXY {
            f: (value / 100_000) as u8,
            x: (value / 1_000 % 100) as u8,
            y: (value % 1_000) as u8,
        }
    }

    pub fn to_int(&self) -> u32 {
        self.f as u32 * 100_000 + self.x as u32 * 1_000 + self.y as u32
    }

    /// Parse the canonical `FXXYYY` key used by the table files.
    pub fn from_key(key: &str) -> anyhow::Result<Self> {
        if key.len() != 6 || !key.bytes().all(|b| b.is_ascii_digit()) {
            bail!("Invalid descriptor key: {:?}", key);
        }

        let f: u8 = key[0..1]
            .parse()
            .with_context(|| format!("Failed to parse F from descriptor: {}", key))?;
        let x: u8 = key[1..3]
            .parse()
            .with_context(|| format!("Failed to parse X from descriptor: {}", key))?;
        let y: u16 = key[3..6]
            .parse()
            .with_context(|| format!("Failed to parse Y from descriptor: {}", key))?;

        let fxy = FXY {
            f,
            x,
            y: u8::try_from(y).with_context(|| format!("Y out of range in {}", key))?,
        };
        if !fxy.is_valid() {
            bail!("Descriptor out of range: {}", key);
        }
        Ok(fxy)
    }

    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn is_valid(&self) -> bool {
        self.f <= 3 && self.x <= 63
    }

    pub fn kind(&self) -> DescriptorKind {
        match self.f & 0b11 {
            0 => DescriptorKind::Element,
            1 => DescriptorKind::Replicator,
            2 => DescriptorKind::Operator,
            _ => DescriptorKind::Sequence,
        }
    }
}

impl Display for FXY {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:02}{:03}", self.f, self.x, self.y)
    }
}

impl FromStr for FXY {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FXY::from_key(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableType {
    B,
    C,
    D,
}

impl TableType {
    pub fn as_char(&self) -> char {
        match self {
            TableType::B => 'B',
            TableType::C => 'C',
            TableType::D => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'B' => Some(TableType::B),
            'C' => Some(TableType::C),
            'D' => Some(TableType::D),
            _ => None,
        }
    }
}

impl Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Table {}", self.as_char())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test]
    fn int_round_trip_covers_every_descriptor() {
        for f in 0..=3u8 {
            for x in 0..=63u8 {
                for y in 0..=255u8 {
                    let fxy = FXY::new(f, x, y);
                    assert_eq!(FXY::from_int(fxy.to_int()), fxy);
                    assert_eq!(FXY::from_bytes(fxy.to_bytes()), fxy);
                }
            }
        }
    }

    #[test_case([0x01, 0x01], FXY::new(0, 1, 1); "element")]
    #[test_case([0x41, 0x00], FXY::new(1, 1, 0); "delayed replicator")]
    #[test_case([0x81, 0x88], FXY::new(2, 1, 136); "operator")]
    #[test_case([0xC1, 0x0B], FXY::new(3, 1, 11); "sequence")]
    fn decodes_wire_form(bytes: [u8; 2], expected: FXY) {
        assert_eq!(FXY::from_bytes(bytes), expected);
    }

    #[test]
    fn key_form() {
        let fxy = FXY::new(0, 12, 101);
        assert_eq!(fxy.key(), "012101");
        assert_eq!(fxy.to_int(), 12101);
        assert_eq!("012101".parse::<FXY>().unwrap(), fxy);
        assert_eq!(FXY::from_key("302001").unwrap().kind(), DescriptorKind::Sequence);
    }

    #[test_case("12101"; "too short")]
    #[test_case("0121o1"; "not digits")]
    #[test_case("064001"; "x out of range")]
    #[test_case("001256"; "y out of range")]
    #[test_case("401001"; "f out of range")]
    fn rejects_bad_keys(key: &str) {
        assert!(FXY::from_key(key).is_err());
    }
}
