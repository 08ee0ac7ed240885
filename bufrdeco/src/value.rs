use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Deref;
use tablelib::FXY;

/// Bit set describing an atomic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(u8);

impl Kind {
    pub const MISSING: Kind = Kind(0b0000_0001);
    pub const NUMERIC: Kind = Kind(0b0000_0010);
    pub const STRING: Kind = Kind(0b0000_0100);
    pub const CODE_TABLE: Kind = Kind(0b0000_1000);
    pub const FLAG_TABLE: Kind = Kind(0b0001_0000);

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Kind) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Kind) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for Kind {
    type Output = Kind;

    fn bitor(self, rhs: Self) -> Self::Output {
        Kind(self.0 | rhs.0)
    }
}

/// Values of compressed data carry the common minimum and increment width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedRef {
    pub reference: u64,
    pub increment_bits: u8,
}

/// One decoded element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicValue {
    pub desc: FXY,
    pub kind: Kind,
    pub value: Option<f64>,
    pub string: Option<String>,
    pub explanation: Option<String>,
    pub name: String,
    pub unit: String,
    /// Decimal scale the value was decoded with.
    pub scale: i32,
    pub compressed: Option<CompressedRef>,
}

impl AtomicValue {
    pub fn number(desc: FXY, name: &str, unit: &str, value: f64, scale: i32) -> Self {
        AtomicValue {
            desc,
            kind: Kind::NUMERIC,
            value: Some(value),
            string: None,
            explanation: None,
            name: name.to_string(),
            unit: unit.to_string(),
            scale,
            compressed: None,
        }
    }

    pub fn missing(desc: FXY, name: &str, unit: &str, kind: Kind) -> Self {
        AtomicValue {
            desc,
            kind: kind | Kind::MISSING,
            value: None,
            string: None,
            explanation: None,
            name: name.to_string(),
            unit: unit.to_string(),
            scale: 0,
            compressed: None,
        }
    }

    pub fn text(desc: FXY, name: &str, unit: &str, text: Option<String>) -> Self {
        let mut kind = Kind::STRING;
        if text.is_none() {
            kind.insert(Kind::MISSING);
        }

        AtomicValue {
            desc,
            kind,
            value: None,
            string: text,
            explanation: None,
            name: name.to_string(),
            unit: unit.to_string(),
            scale: 0,
            compressed: None,
        }
    }

    pub fn with_compressed(mut self, compressed: CompressedRef) -> Self {
        self.compressed = Some(compressed);
        self
    }

    pub fn is_missing(&self) -> bool {
        self.kind.contains(Kind::MISSING)
    }

    pub fn is_numeric(&self) -> bool {
        self.kind.contains(Kind::NUMERIC)
    }

    pub fn is_string(&self) -> bool {
        self.kind.contains(Kind::STRING)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.string.as_deref()
    }

    /// Value as text, formatted with its decimal scale.
    pub fn format_value(&self) -> String {
        if self.is_missing() {
            return "MISSING".to_string();
        }
        if let Some(s) = &self.string {
            return s.clone();
        }
        match self.value {
            Some(v) => format!("{:.*}", self.scale.max(0) as usize, v),
            None => String::new(),
        }
    }
}

impl Display for AtomicValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:<48} : {}", self.desc, self.name, self.format_value())?;
        if !self.is_string() && !self.is_missing() && !self.unit.is_empty() {
            write!(f, " {}", self.unit)?;
        }
        if let Some(exp) = &self.explanation {
            write!(f, " ({})", exp)?;
        }
        Ok(())
    }
}

pub const MAX_SUBSET_VALUES: usize = 16384;

/// Reusable output buffer for one subset.
#[derive(Debug, Clone, Serialize)]
pub struct SubsetValues {
    pub subset: usize,
    values: Vec<AtomicValue>,
    #[serde(skip)]
    capacity: usize,
}

impl Default for SubsetValues {
    fn default() -> Self {
        Self::new(MAX_SUBSET_VALUES)
    }
}

impl SubsetValues {
    pub fn new(capacity: usize) -> Self {
        SubsetValues {
            subset: 0,
            values: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self, subset: usize) {
        self.subset = subset;
        self.values.clear();
    }

    pub fn push(&mut self, value: AtomicValue) -> Result<()> {
        if self.values.len() >= self.capacity {
            return Err(Error::TooManyValues(self.capacity));
        }
        self.values.push(value);
        Ok(())
    }

    pub fn values(&self) -> &[AtomicValue] {
        &self.values
    }

    /// First value decoded for `desc`.
    pub fn find(&self, desc: &FXY) -> Option<&AtomicValue> {
        self.values.iter().find(|v| v.desc == *desc)
    }
}

impl Deref for SubsetValues {
    type Target = [AtomicValue];

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl Display for SubsetValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Subset {}:", self.subset)?;
        for v in &self.values {
            writeln!(f, "  {}", v)?;
        }
        Ok(())
    }
}
