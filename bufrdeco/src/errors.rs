use nom;
use tablelib::FXY;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File is not a valid BUFR file: {0}")]
    Nom(String),

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Unsupported BUFR edition: {0}")]
    UnsupportedVersion(u8),

    #[error("Table not found: {0:#}")]
    TableNotFound(#[from] anyhow::Error),

    #[error("Sequence descriptor {0} not found in Table D")]
    UnknownSequence(FXY),

    #[error("Sequence tree exceeds {0} nodes")]
    TooManyNodes(usize),

    #[error("Sequence {0} expands to {1} descriptors")]
    TooManyDescriptors(FXY, usize),

    #[error("Delayed replication {0} inside a sequence is not supported in compressed data")]
    DelayedReplicationInCompressed(FXY),

    #[error("Replicator {replicator} spans {span} descriptors but only {available} follow")]
    ReplicationOutOfRange {
        replicator: FXY,
        span: usize,
        available: usize,
    },

    #[error("Unsupported operator {0}")]
    UnsupportedOperator(FXY),

    #[error("Element {0} not found in Table B")]
    UnknownElement(FXY),

    #[error("Bit overrun: {needed} bits requested at bit {offset}, {available} left")]
    BitOverrun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid bit width: {0}")]
    InvalidBitWidth(i64),

    #[error("Subset holds more than {0} values")]
    TooManyValues(usize),

    #[error("Bad replication factor for {0}: {1}")]
    BadReplicationFactor(FXY, String),

    #[error("Subset {0} cannot be located after an earlier failure")]
    Desynchronized(usize),

    #[error("Compression mismatch: {0}")]
    CompressionMismatch(String),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        Self::Nom(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
