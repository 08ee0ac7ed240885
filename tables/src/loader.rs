use crate::cache;
use crate::config::TablesConfig;
use crate::pattern::{TableName, scan};
use crate::tables::{TableB, TableC, TableD, TableFile};
use crate::TableType;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// The section 1 fields that select a table set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub master_table: u8,
    pub centre: u16,
    pub subcentre: u16,
    pub master_version: u8,
    pub local_version: u8,
}

/// Tables B and D are required, C only enriches code and flag values.
#[derive(Debug, Clone)]
pub struct TableSet {
    pub b: TableB,
    pub c: Option<TableC>,
    pub d: TableD,
    /// Fallbacks taken while resolving the files.
    pub notes: Vec<String>,
}

pub struct TableLoader<'a> {
    config: &'a TablesConfig,
}

impl<'a> TableLoader<'a> {
    pub fn new(config: &'a TablesConfig) -> Self {
        TableLoader { config }
    }

    pub fn load_set(&self, info: &TableInfo) -> Result<TableSet> {
        let mut notes = vec![];

        let b = TableB(self.load(TableType::B, info, &mut notes)?);
        let d = TableD(self.load(TableType::D, info, &mut notes)?);
        let c = match self.load(TableType::C, info, &mut notes) {
            Ok(file) => Some(TableC(file)),
            Err(e) => {
                warn!("{:#}", e);
                notes.push(format!("Table C unavailable, no code or flag meanings: {:#}", e));
                None
            }
        };

        Ok(TableSet { b, c, d, notes })
    }

    pub fn load(&self, table_type: TableType, info: &TableInfo, notes: &mut Vec<String>) -> Result<Arc<TableFile>> {
        let path = self.resolve(table_type, info, notes)?;
        debug!(path = %path.display(), "resolved {}", table_type);
        cache::load(&path, table_type, self.config.use_cache)
    }

    /// Find the file to use, in order: the exact name, the WMO name when the
    /// master table is 0, the nearest newer WMO version, the newest older one.
    pub fn resolve(&self, table_type: TableType, info: &TableInfo, notes: &mut Vec<String>) -> Result<PathBuf> {
        let dir = &self.config.tables_dir;
        let exact = TableName::for_message(table_type, info);
        let path = dir.join(exact.file_name());
        if path.is_file() {
            return Ok(path);
        }

        if info.master_table != 0 {
            bail!(
                "{} not found: {} (master table {})",
                table_type,
                path.display(),
                info.master_table
            );
        }

        let wmo = TableName::wmo(table_type, info.master_version);
        if wmo != exact {
            let wmo_path = dir.join(wmo.file_name());
            if wmo_path.is_file() {
                notes.push(format!("{} not found, using {}", exact, wmo));
                return Ok(wmo_path);
            }
        }

        let available: Vec<(PathBuf, TableName)> = scan(dir, Some(table_type))
            .with_context(|| format!("Failed to scan table directory {}", dir.display()))?
            .into_iter()
            .filter(|(_, name)| name.is_wmo())
            .collect();

        let requested = info.master_version;
        let newer = available
            .iter()
            .filter(|(_, n)| n.version > requested)
            .min_by_key(|(_, n)| n.version);
        let older = available
            .iter()
            .filter(|(_, n)| n.version < requested)
            .max_by_key(|(_, n)| n.version);

        match newer.or(older) {
            Some((path, name)) => {
                notes.push(format!(
                    "{} master version {} not found, using version {}",
                    table_type, requested, name.version
                ));
                Ok(path.clone())
            }
            None => bail!(
                "{} not found: no file for master version {} in {}",
                table_type,
                requested,
                dir.display()
            ),
        }
    }
}
