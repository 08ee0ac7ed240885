pub use crate::config::TablesConfig;
pub use crate::loader::{TableInfo, TableLoader, TableSet};
pub use crate::pattern::TableName;
pub use crate::tables::{
    BTableEntry, CTableEntry, DTableEntry, TableB, TableC, TableD, TableFile, UnitKind,
};
pub use crate::{DescriptorKind, FXY, TableType};
