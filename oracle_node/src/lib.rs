//! Oracle Node - link-state distribution server
//!
//! Loads a topology, waits for its N Virtual Nodes to register over TCP,
//! and pushes each one its outgoing links. A config edit triggers a
//! rebroadcast to everyone connected.

pub mod config;
pub mod reactor;

pub use config::{OracleConfig, DEFAULT_PORT, MAX_TICK};
pub use reactor::{EventLoop, TickReport};
