//! Oracle Node Core - Centralized Link-State Distribution
//!
//! The Oracle Node plays the part of the flooding phase of a link-state
//! routing protocol: instead of peers exchanging LSPs, one coordinator
//! owns the topology and pushes every participant its own outgoing links.
//!
//! 1. **Topology**: a triangular cost file expanded into a symmetric matrix
//! 2. **Sessions**: N positional slots with reuse after disconnect
//! 3. **Link-state**: per-recipient 9-byte tuples, no framing

pub mod error;
pub mod identity;
pub mod matrix;
pub mod wire;
pub mod encoder;
pub mod session;
pub mod watch;

// Re-export key types for convenience
pub use error::{ConfigError, OracleError};
pub use identity::{Identity, MAX_NODES};
pub use matrix::{AdjacencyMatrix, NO_EDGE};
pub use wire::{LinkStateTuple, RegistrationMessage};
pub use session::{BroadcastReport, Delivery, Registration, SessionTable, SlotState};
pub use watch::ConfigWatcher;
