//! Error taxonomy for the Oracle Node core.

use oracle_env::TransportError;
use thiserror::Error;

/// Configuration file errors.
///
/// Always non-fatal once the reactor is running: the previously loaded
/// matrix stays authoritative.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file contains no cost rows")]
    Empty,

    #[error("Line {line}: invalid cost token '{token}'")]
    InvalidToken { line: usize, token: String },

    #[error("Line {line}: row {row} has {entries} entries but only {max} fit above the diagonal")]
    RowOverflow {
        line: usize,
        row: usize,
        entries: usize,
        max: usize,
    },

    #[error("Line {line}: cost {cost} does not fit the 16-bit wire field")]
    CostOutOfRange { line: usize, cost: i32 },

    #[error("Topology has {nodes} nodes, at most {max} identities are available")]
    TooManyNodes { nodes: usize, max: usize },

    #[error("Topology size changed from {expected} to {found} nodes")]
    SizeMismatch { expected: usize, found: usize },
}

/// Top-level error type for Oracle Node operations.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// More participants than the topology has identities
    #[error("All {capacity} participant slots are in use")]
    Capacity { capacity: usize },
}

impl OracleError {
    /// Creates a capacity error.
    pub fn capacity(capacity: usize) -> Self {
        Self::Capacity { capacity }
    }
}
