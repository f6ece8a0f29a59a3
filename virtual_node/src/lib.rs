//! Virtual Node - Oracle Node client
//!
//! Binds a UDP endpoint, registers it with the Oracle Node, and consumes
//! the link-state batches the Oracle pushes over TCP.

pub mod peer;

pub use peer::{BatchRecord, LinkStateReader, PeerConfig, VirtualNodePeer};
