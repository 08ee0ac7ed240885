pub mod bits;
pub mod block;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod errors;
pub mod gts;
pub mod operator;
pub mod parser;
pub mod structs;
pub mod tree;
pub mod value;

pub use crate::block::{BUFRFile, MessageBlock};
pub use crate::config::DecoderConfig;
pub use crate::decoder::Decoder;
pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
pub use crate::errors::{Error, Result};
pub use crate::parser::*;
pub use crate::structs::versions::{BUFRMessage, Identification, MessageVersion};
pub use crate::tree::SequenceTree;
pub use crate::value::{AtomicValue, Kind, SubsetValues};
pub use tablelib;
