//! Error types for the session transport layer.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur on a listening or session socket.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying socket read/write failed
    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection (or a send was refused on a closed link)
    #[error("Connection closed by peer")]
    Closed,

    /// An exact-length read hit EOF before the message was complete
    #[error("Short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// Socket setup (bind/listen) failed
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Creates a short-read error.
    pub fn short_read(expected: usize, received: usize) -> Self {
        Self::ShortRead { expected, received }
    }

    /// Creates a bind error for the given address.
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }

    /// Returns true if this is a truncated-message error.
    pub fn is_short_read(&self) -> bool {
        matches!(self, Self::ShortRead { .. })
    }
}
