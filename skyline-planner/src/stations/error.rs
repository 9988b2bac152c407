//! Station data error types.

use std::path::PathBuf;

/// Errors that can occur when loading station tables.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// File could not be opened
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TSV reader failed
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A row had the wrong shape or an unparseable field
    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}
