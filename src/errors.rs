//! Error types for fqclean operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for fqclean operations
pub type Result<T> = std::result::Result<T, QcError>;

/// Error type for fqclean operations
#[derive(Error, Debug)]
pub enum QcError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A read is longer than the histogram tables were sized for.
    #[error(
        "read length {len} exceeds the maximum read length {max}; \
         rerun with --max_read_len {len} (or larger)"
    )]
    ReadTooLong { len: usize, max: usize },

    /// A record violates the 4-line FASTQ layout.
    #[error("malformed FASTQ record in '{path}': {reason}")]
    MalformedRecord { path: PathBuf, reason: String },

    /// The two ends of a paired run hold different numbers of records.
    #[error("paired inputs '{first}' and '{second}' contain different numbers of reads")]
    UnpairedInput { first: PathBuf, second: PathBuf },

    #[error("invalid quality system {0} (expected 0-4)")]
    InvalidQualitySystem(u8),

    /// Invalid parameter value provided
    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    /// File lists that must line up one-to-one do not.
    #[error("unequal numbers of {left} and {right}: {left_count} {left} and {right_count} {right}")]
    MismatchedInputs {
        left: &'static str,
        left_count: usize,
        right: &'static str,
        right_count: usize,
    },

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}
