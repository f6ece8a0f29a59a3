//! Oracle Node Environment Abstraction Layer
//!
//! This crate separates the session state machine from the sockets it
//! drives, so that the same `SessionTable` code runs against:
//! - **Production**: `TcpLink` - a registered participant's tokio `TcpStream`
//! - **Testing**: `MemoryLink` - a scripted in-memory link with fault injection
//!
//! # Core Concept: One Link per Slot
//!
//! Every participant slot owns at most one `SessionLink`. The link is the
//! only handle to the underlying connection, so releasing a slot is simply
//! dropping its link.
//!
//! # Example
//!
//! ```ignore
//! use oracle_env::{SessionLink, Drain};
//!
//! async fn push<L: SessionLink>(link: &mut L, batch: &[u8]) {
//!     if link.send_all(batch).await.is_err() {
//!         // caller frees the slot
//!     }
//!     match link.try_drain() {
//!         Drain::Closed | Drain::Failed(_) => { /* disconnect */ }
//!         Drain::Idle | Drain::Activity(_) => {}
//!     }
//! }
//! ```

mod link;
mod types;
mod error;
mod tokio_impl;
pub mod memory;

pub use link::{Drain, SessionLink};
pub use types::Endpoint;
pub use error::TransportError;
pub use tokio_impl::TcpLink;
pub use memory::{MemoryLink, MemoryPeer};
