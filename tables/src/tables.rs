use crate::{FXY, TableType};
use anyhow::{Context, Result, bail};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

impl TableType {
    /// Upper bound on the number of lines kept in memory for one table file.
    pub fn max_lines(&self) -> usize {
        match self {
            TableType::B => 4096,
            TableType::C => 16384,
            TableType::D => 8192,
        }
    }

    fn key_columns(&self) -> Range<usize> {
        match self {
            TableType::C => 0..6,
            TableType::B | TableType::D => 1..7,
        }
    }
}

/// Raw text of one table file, one entry per line, plus a key index.
#[derive(Debug)]
pub struct TableFile {
    table_type: TableType,
    path: PathBuf,
    lines: Vec<String>,
    index: FxHashMap<FXY, usize>,
}

impl TableFile {
    pub fn read<P: AsRef<Path>>(path: P, table_type: TableType) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot open {} file {}", table_type, path.display()))?;
        crate::cache::record_disk_read();

        Self::from_text(path, &String::from_utf8_lossy(&bytes), table_type)
    }

    pub fn from_text<P: Into<PathBuf>>(path: P, text: &str, table_type: TableType) -> Result<Self> {
        let path = path.into();
        let max = table_type.max_lines();
        let mut lines = Vec::new();

        for line in text.lines() {
            if lines.len() == max {
                bail!(
                    "{} file {} has more than {} lines",
                    table_type,
                    path.display(),
                    max
                );
            }
            lines.push(line.trim_end_matches('\r').to_string());
        }

        // First occurrence wins, exactly as a linear scan from the top would.
        let key_columns = table_type.key_columns();
        let mut index = FxHashMap::default();
        for (i, line) in lines.iter().enumerate() {
            if let Some(fxy) = line.get(key_columns.clone()).and_then(|k| k.parse().ok()) {
                index.entry(fxy).or_insert(i);
            }
        }

        Ok(TableFile {
            table_type,
            path,
            lines,
            index,
        })
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line number of the entry keyed by `fxy`.
    pub fn find(&self, fxy: &FXY) -> Option<usize> {
        self.index.get(fxy).copied()
    }

    /// All keys in file order.
    pub fn keys(&self) -> Vec<FXY> {
        let mut keys: Vec<(usize, FXY)> = self.index.iter().map(|(k, v)| (*v, *k)).collect();
        keys.sort_unstable();
        keys.into_iter().map(|(_, k)| k).collect()
    }
}

fn column(line: &str, range: Range<usize>) -> &str {
    let end = range.end.min(line.len());
    if range.start >= end {
        return "";
    }
    line.get(range.start..end).unwrap_or("").trim()
}

/// How the value of a Table B element is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Numeric,
    CodeTable,
    FlagTable,
    Ccitt,
}

impl UnitKind {
    pub fn classify(unit: &str) -> Self {
        let unit = unit.to_ascii_uppercase();
        if unit.starts_with("CCITT") {
            UnitKind::Ccitt
        } else if unit.starts_with("CODE TABLE") || unit.starts_with("CODE-TABLE") {
            UnitKind::CodeTable
        } else if unit.starts_with("FLAG TABLE") || unit.starts_with("FLAG-TABLE") {
            UnitKind::FlagTable
        } else {
            UnitKind::Numeric
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BTableEntry {
    pub fxy: FXY,
    pub name: String,
    pub unit: String,
    pub scale: i32,
    pub reference: i32,
    pub width: u32,
}

impl BTableEntry {
    /// Parse one fixed-column Table B line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let fxy = column(line, 1..7).parse().ok()?;
        Some(BTableEntry {
            fxy,
            name: column(line, 8..72).to_string(),
            unit: column(line, 73..97).to_string(),
            scale: column(line, 97..101).parse().ok()?,
            reference: column(line, 101..114).parse().ok()?,
            width: column(line, 114..118).parse().ok()?,
        })
    }

    pub fn unit_kind(&self) -> UnitKind {
        UnitKind::classify(&self.unit)
    }
}

impl Display for BTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = if self.name.chars().count() > 40 {
            format!("{}...", self.name.chars().take(37).collect::<String>())
        } else {
            self.name.clone()
        };

        write!(
            f,
            "{} | {:<40} | {:<24} | {:>5} | {:>12} | {:>5}",
            self.fxy, name, self.unit, self.scale, self.reference, self.width
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DTableEntry {
    pub fxy: FXY,
    pub chain: Vec<FXY>,
}

impl Display for DTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chain = self
            .chain
            .iter()
            .map(|fxy| fxy.key())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} | {:>3} | [{}]", self.fxy, self.chain.len(), chain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CTableEntry {
    pub value: u32,
    pub meaning: String,
}

/// Element descriptors.
#[derive(Debug, Clone)]
pub struct TableB(pub Arc<TableFile>);

impl TableB {
    pub fn lookup(&self, fxy: &FXY) -> Option<BTableEntry> {
        let line = &self.0.lines()[self.0.find(fxy)?];
        let entry = BTableEntry::parse_line(line);
        if entry.is_none() {
            warn!(descriptor = %fxy, path = %self.0.path().display(), "malformed Table B line");
        }
        entry
    }

    pub fn entries(&self) -> Vec<BTableEntry> {
        self.0
            .lines()
            .iter()
            .filter_map(|l| BTableEntry::parse_line(l))
            .collect()
    }
}

/// Sequence descriptors.
#[derive(Debug, Clone)]
pub struct TableD(pub Arc<TableFile>);

impl TableD {
    pub fn lookup(&self, fxy: &FXY) -> Option<DTableEntry> {
        let start = self.0.find(fxy)?;
        let lines = self.0.lines();

        let Ok(count) = column(&lines[start], 7..10).parse::<usize>() else {
            warn!(descriptor = %fxy, path = %self.0.path().display(), "malformed Table D count");
            return None;
        };

        let mut chain = Vec::with_capacity(count);
        for (i, line) in lines.iter().skip(start).take(count).enumerate() {
            // Continuation lines leave the key column blank.
            if i > 0 && !column(line, 1..7).is_empty() {
                break;
            }
            match column(line, 11..17).parse() {
                Ok(fxy) => chain.push(fxy),
                Err(_) => break,
            }
        }

        if chain.len() != count {
            warn!(
                descriptor = %fxy,
                expected = count,
                found = chain.len(),
                "truncated Table D sequence"
            );
            return None;
        }

        Some(DTableEntry { fxy: *fxy, chain })
    }

    pub fn entries(&self) -> Vec<DTableEntry> {
        self.0
            .keys()
            .iter()
            .filter_map(|k| self.lookup(k))
            .collect()
    }
}

/// Code and flag table meanings.
#[derive(Debug, Clone)]
pub struct TableC(pub Arc<TableFile>);

impl TableC {
    /// Every (value, meaning) pair listed for `fxy`.
    pub fn entries_for(&self, fxy: &FXY) -> Vec<CTableEntry> {
        let Some(start) = self.0.find(fxy) else {
            return vec![];
        };

        let mut entries: Vec<CTableEntry> = vec![];
        for (i, line) in self.0.lines().iter().enumerate().skip(start) {
            if i > start && !column(line, 0..6).is_empty() {
                break;
            }

            let value = column(line, 12..16);
            if value.is_empty() {
                let text = line.trim();
                if let (Some(last), false) = (entries.last_mut(), text.is_empty()) {
                    last.meaning.push(' ');
                    last.meaning.push_str(text);
                }
                continue;
            }

            match value.parse() {
                Ok(value) => entries.push(CTableEntry {
                    value,
                    meaning: column(line, 20..line.len().max(20)).to_string(),
                }),
                Err(_) => {
                    warn!(descriptor = %fxy, line = i + 1, "malformed Table C line");
                    break;
                }
            }
        }

        entries
    }

    pub fn code_meaning(&self, fxy: &FXY, code: u32) -> Option<String> {
        self.entries_for(fxy)
            .into_iter()
            .find(|e| e.value == code)
            .map(|e| e.meaning)
    }

    /// Bit 1 is the most significant of the `nbits` wide field and bit
    /// `nbits` is reserved for missing, so it never carries a meaning.
    pub fn flag_meaning(&self, fxy: &FXY, value: u64, nbits: u32) -> Option<String> {
        let entries = self.entries_for(fxy);
        let meanings: Vec<&str> = (1..nbits)
            .filter(|bit| value & (1u64 << (nbits - bit)) != 0)
            .filter_map(|bit| entries.iter().find(|e| e.value == bit))
            .map(|e| e.meaning.as_str())
            .collect();

        if meanings.is_empty() {
            None
        } else {
            Some(meanings.join("; "))
        }
    }
}
