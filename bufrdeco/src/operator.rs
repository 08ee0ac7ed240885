use crate::errors::{Error, Result};
use rustc_hash::FxHashMap;
use tablelib::FXY;
use tablelib::tables::{BTableEntry, UnitKind};

/// Width, scale and reference an element is actually read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpec {
    pub width: usize,
    pub scale: i32,
    pub reference: i32,
}

/// What the decoder has to do after an operator was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// State changed, nothing to read.
    None,
    /// 2-05-Y: Y characters follow in the data.
    Signify(usize),
}

/// Operator state of one decoding pass. Survives sequence boundaries.
#[derive(Debug, Clone, Default)]
pub struct OperatorState {
    pub added_width: i32,
    pub added_scale: i32,
    /// Bit width of the new reference values while a 2-03 block is open.
    pub reference_width: Option<usize>,
    pub new_references: FxHashMap<FXY, i32>,
    pub associated_width: usize,
}

impl OperatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply(&mut self, op: &FXY) -> Result<Effect> {
        let y = op.y as i32;

        match op.x {
            1 => {
                self.added_width = if y == 0 { 0 } else { y - 128 };
            }
            2 => {
                self.added_scale = if y == 0 { 0 } else { y - 128 };
            }
            3 => match op.y {
                255 => self.reference_width = None,
                0 => {
                    self.reference_width = None;
                    self.new_references.clear();
                }
                width => self.reference_width = Some(width as usize),
            },
            4 => {
                self.associated_width = op.y as usize;
            }
            5 => return Ok(Effect::Signify(op.y as usize)),
            _ => return Err(Error::UnsupportedOperator(*op)),
        }

        Ok(Effect::None)
    }

    /// Code tables, flag tables, characters and class 31 are never modified.
    pub fn modifies(entry: &BTableEntry) -> bool {
        entry.unit_kind() == UnitKind::Numeric && entry.fxy.x != 31
    }

    pub fn spec(&self, entry: &BTableEntry) -> Result<ElementSpec> {
        if !Self::modifies(entry) {
            return Ok(ElementSpec {
                width: entry.width as usize,
                scale: entry.scale,
                reference: entry.reference,
            });
        }

        let width = entry.width as i64 + self.added_width as i64;
        if width <= 0 {
            return Err(Error::InvalidBitWidth(width));
        }

        Ok(ElementSpec {
            width: width as usize,
            scale: entry.scale + self.added_scale,
            reference: self
                .new_references
                .get(&entry.fxy)
                .copied()
                .unwrap_or(entry.reference),
        })
    }

    /// Width of the associated field carried by `entry`, 0 when none.
    pub fn associated_for(&self, entry: &BTableEntry) -> usize {
        if entry.fxy.x == 31 {
            0
        } else {
            self.associated_width
        }
    }
}

/// New reference values are sign-magnitude: top bit set means negative.
pub fn signed_reference(raw: u32, width: usize) -> i32 {
    let sign = 1u32 << (width - 1);
    let magnitude = (raw & (sign - 1)) as i32;
    if raw & sign != 0 { -magnitude } else { magnitude }
}
