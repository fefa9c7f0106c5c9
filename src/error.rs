//! Crate-wide error type, tying the three error categories of the recovery
//! design (recoverable byte-range, policy refusal, fatal) to the process
//! exit codes the binary reports on startup and shutdown failures.

use std::io;

use thiserror::Error;

use crate::map::MapError;

/// Fatal error categories. Library functions return `Result<T, RescueError>`;
/// `main` maps each variant to the matching process exit code.
#[derive(Debug, Error)]
pub enum RescueError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("outfile I/O error: {0}")]
    Outfile(#[source] io::Error),

    #[error("infile seek failed: {0}")]
    InfileSeek(#[source] io::Error),

    #[error("map mutation failed: {0}")]
    MapMutation(#[from] MapError),

    #[error("map save failed: {0}")]
    MapSave(String),
}

impl RescueError {
    /// The process exit code this error corresponds to, per the external
    /// interface contract: 1 startup, 2 outfile, 3 infile seek, 4 map
    /// mutation, 5 map save/corruption.
    pub fn exit_code(&self) -> i32 {
        match self {
            RescueError::Usage(_) => 1,
            RescueError::Outfile(_) => 2,
            RescueError::InfileSeek(_) => 3,
            RescueError::MapMutation(_) => 4,
            RescueError::MapSave(_) => 5,
        }
    }
}
