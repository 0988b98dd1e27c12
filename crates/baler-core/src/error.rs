//! Error types for all BalerDB operations.

use std::io;
use thiserror::Error;

/// Top-level error type for BalerDB operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Txn(#[from] TxnError),
}

/// Disk-tier failures. Propagated to the driver as a transaction abort;
/// the driver may retry.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame out of bounds: {frame} >= {total_frames}")]
    FrameOutOfBounds { frame: u64, total_frames: u64 },

    #[error("tuple of {tuple} bytes does not fit a {frame} byte frame")]
    TupleTooLarge { tuple: usize, frame: usize },
}

/// Schema and attribute-vector contract violations. These indicate an
/// implementation bug, never bad input, and callers treat them as fatal.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("slot {slot} holds {actual}, caller asked for {expected}")]
    SchemaViolation {
        slot: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("slot index {slot} out of range for arity {arity}")]
    SlotOutOfRange { slot: usize, arity: usize },

    #[error("unknown enum id {id} for column {relation}.{slot}")]
    UnknownEnumId {
        relation: &'static str,
        slot: usize,
        id: i64,
    },

    #[error("enum column {relation}.{slot} exceeded its declared capacity {cap}")]
    EnumCapacityExceeded {
        relation: &'static str,
        slot: usize,
        cap: usize,
    },
}

/// Compression-model failures.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("decompressed tuple failed its key digest (expected {expected:#04x}, got {actual:#04x})")]
    ModelInconsistency { expected: u8, actual: u8 },

    #[error("decompressed tuple derives key {actual}, index holds it under {expected}")]
    KeyMismatch { expected: u64, actual: u64 },

    #[error("compressed stream truncated at bit {bit}")]
    TruncatedStream { bit: usize },

    #[error("cannot fit a model over an empty sample")]
    EmptySample,

    #[error("model file error: {0}")]
    ModelFile(String),
}

/// Business-level transaction outcomes and index contract violations.
#[derive(Debug, Error)]
pub enum TxnError {
    #[error("argument out of range: {0}")]
    ArgumentOutOfRange(String),

    #[error("duplicate key {key} in {relation}")]
    DuplicateKey { relation: &'static str, key: u64 },

    #[error("key {key} not found in {relation}")]
    KeyNotFound { relation: &'static str, key: u64 },

    #[error("item number is not valid")]
    InvalidItem,

    #[error("no customer ({w_id}, {d_id}) with last name {last}")]
    UnknownCustomer { w_id: i32, d_id: i32, last: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors that indicate an implementation bug or corrupted
    /// state rather than a recoverable condition. The driver exits on
    /// these instead of retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Schema(_) | Error::Model(_))
    }
}
