use crate::{TableInfo, TableType};
use anyhow::{Context, Result};
use regex::Regex;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Identity of one table file, as encoded in its name:
/// `<Type><master:3><subcentre:5><centre:5><version:3><local:3>.TXT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub table_type: TableType,
    pub master_table: u8,
    pub subcentre: u16,
    pub centre: u16,
    pub version: u8,
    pub local_version: u8,
}

fn file_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^([BCD])(\d{3})(\d{5})(\d{5})(\d{3})(\d{3})\.TXT$").expect("Invalid regex")
    })
}

impl TableName {
    /// Name of the table a message with these section 1 fields asks for.
    pub fn for_message(table_type: TableType, info: &TableInfo) -> Self {
        TableName {
            table_type,
            master_table: info.master_table,
            subcentre: info.subcentre,
            centre: info.centre,
            version: info.master_version,
            local_version: info.local_version,
        }
    }

    /// WMO standard table of the given master version.
    pub fn wmo(table_type: TableType, version: u8) -> Self {
        TableName {
            table_type,
            master_table: 0,
            subcentre: 0,
            centre: 0,
            version,
            local_version: 0,
        }
    }

    pub fn is_wmo(&self) -> bool {
        *self == Self::wmo(self.table_type, self.version)
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{:03}{:05}{:05}{:03}{:03}.TXT",
            self.table_type.as_char(),
            self.master_table,
            self.subcentre,
            self.centre,
            self.version,
            self.local_version
        )
    }

    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = file_regex().captures(file_name)?;

        Some(TableName {
            table_type: TableType::from_char(caps[1].chars().next()?)?,
            master_table: caps[2].parse().ok()?,
            subcentre: caps[3].parse().ok()?,
            centre: caps[4].parse().ok()?,
            version: caps[5].parse().ok()?,
            local_version: caps[6].parse().ok()?,
        })
    }

    /// Glob matching every table file of one type (or of all types).
    pub fn glob_pattern(table_type: Option<TableType>) -> String {
        match table_type {
            Some(t) => format!("{}*.TXT", t.as_char()),
            None => "[BCD]*.TXT".to_string(),
        }
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Every well-named table file in `dir`, sorted by name.
pub fn scan<P: AsRef<Path>>(dir: P, table_type: Option<TableType>) -> Result<Vec<(PathBuf, TableName)>> {
    let dir = dir.as_ref();
    let pattern = dir.join(TableName::glob_pattern(table_type));
    let pattern = pattern
        .to_str()
        .with_context(|| format!("Non UTF-8 table directory: {}", dir.display()))?;

    let mut found = vec![];
    for entry in glob::glob(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))? {
        let path = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(TableName::parse);

        if let Some(name) = name {
            found.push((path, name));
        }
    }

    found.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(found)
}
