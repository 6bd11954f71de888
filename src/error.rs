use std::io;

use thiserror::Error as ThisError;

/// Errors surfaced when persisting or loading a predicate index.
///
/// Search itself is infallible: malformed in-memory state is a programming
/// error and panics instead of returning one of these variants.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Underlying file system failure while reading or writing index files.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The binary index payload is truncated or structurally inconsistent.
    #[error("corrupt index data: {0}")]
    Corruption(String),

    /// The JSON index meta file could not be encoded or decoded.
    #[error("meta serialization error: {0}")]
    Serialization(String),

    /// The on-disk index was written by an incompatible format revision.
    #[error("incompatible index format version {major}.{minor}")]
    IncompatibleFormat {
        /// Major format revision found in the file.
        major: u16,
        /// Minor format revision found in the file.
        minor: u16,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
