//! Actionable typed errors for corpair.
//!
//! Each error variant includes enough context for the user to understand
//! what went wrong and what to do next. Internal propagation uses `anyhow`;
//! the public API exposes these `thiserror` types.

use std::path::PathBuf;

/// Errors that corpair surfaces to the user.
#[derive(Debug, thiserror::Error)]
pub enum CorpairError {
    /// An input path does not exist or is not readable.
    #[error("Input not found at {}. Check the --talk/--content paths.", path.display())]
    InputNotFound { path: PathBuf },

    /// A directory input contained no CSV shards.
    #[error("No .csv files found under {}. Pass a CSV file or a directory containing CSV shards.", path.display())]
    NoInputShards { path: PathBuf },

    /// A row could not be parsed into the expected record shape.
    #[error("Malformed record at {}:{line}: {detail}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        detail: String,
    },

    /// The talk table is missing a required column.
    #[error("Missing column '{column}' in {}. Expected header: article,thread,username,timestamp,contribution_id,text", path.display())]
    MissingColumn { path: PathBuf, column: String },

    /// A contribution id could not be parsed as an integer.
    #[error("Invalid contribution_id '{value}' at {}:{line}: expected an integer", path.display())]
    InvalidSequenceNumber {
        path: PathBuf,
        line: u64,
        value: String,
    },

    /// Failed to write an output table or report.
    #[error("Failed to write {}: {detail}", path.display())]
    OutputWriteError { path: PathBuf, detail: String },
}
