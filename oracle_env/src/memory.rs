//! In-memory session link with fault injection.
//!
//! A `MemoryLink` is handed to the code under test (as the slot's link) and
//! the matching `MemoryPeer` stays with the test, which uses it to script
//! inbound bytes, inspect what was sent, close the connection, or make
//! sends fail.
//!
//! Reads never wait: `recv_exact` on a link without enough scripted bytes
//! behaves like a peer that closed early.

use crate::error::TransportError;
use crate::link::{Drain, SessionLink};
use crate::types::Endpoint;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// State shared between a link and its peer handle.
#[derive(Debug, Default)]
struct Shared {
    /// Bytes the peer "sent" that the link has not consumed yet
    inbound: Mutex<VecDeque<u8>>,

    /// Every successful `send_all`, one entry per logical write
    writes: Mutex<Vec<Vec<u8>>>,

    /// Peer has hung up
    closed: AtomicBool,

    /// Sends fail while set
    fail_sends: AtomicBool,

    /// Link side has been dropped
    released: AtomicBool,
}

/// Link half, owned by the session table under test.
#[derive(Debug)]
pub struct MemoryLink {
    peer: Endpoint,
    shared: Arc<Shared>,
}

/// Test half of a `MemoryLink`.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    shared: Arc<Shared>,
}

impl MemoryLink {
    /// Creates a connected link/peer pair for a peer at `peer`.
    pub fn pair(peer: Endpoint) -> (MemoryLink, MemoryPeer) {
        let shared = Arc::new(Shared::default());
        (
            MemoryLink {
                peer,
                shared: Arc::clone(&shared),
            },
            MemoryPeer { shared },
        )
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.shared.released.store(true, Ordering::SeqCst);
    }
}

impl MemoryPeer {
    /// Queues bytes for the link to read.
    pub fn push(&self, bytes: &[u8]) {
        self.shared.inbound.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Simulates the remote side hanging up.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Returns every logical write received so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.shared.writes.lock().unwrap().clone()
    }

    /// Returns the number of logical writes received so far.
    pub fn write_count(&self) -> usize {
        self.shared.writes.lock().unwrap().len()
    }

    /// Returns the most recent logical write, if any.
    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.shared.writes.lock().unwrap().last().cloned()
    }

    /// Returns true once the link half has been dropped (socket released).
    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLink for MemoryLink {
    fn peer(&self) -> Endpoint {
        self.peer
    }

    async fn send_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.shared.closed.load(Ordering::SeqCst) || self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.shared.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let mut inbound = self.shared.inbound.lock().unwrap();
        if inbound.len() < buf.len() {
            let received = inbound.len();
            inbound.clear();
            return Err(TransportError::short_read(buf.len(), received));
        }
        let len = buf.len();
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(())
    }

    fn try_drain(&mut self) -> Drain {
        let mut inbound = self.shared.inbound.lock().unwrap();
        if !inbound.is_empty() {
            let n = inbound.len();
            inbound.clear();
            return Drain::Activity(n);
        }
        if self.shared.closed.load(Ordering::SeqCst) {
            Drain::Closed
        } else {
            Drain::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn endpoint() -> Endpoint {
        Endpoint::new(Ipv4Addr::new(192, 168, 1, 2), 40000)
    }

    #[tokio::test]
    async fn test_memory_link_scripted_read() {
        let (mut link, peer) = MemoryLink::pair(endpoint());
        peer.push(&[1, 2, 3, 4, 5, 6, 7]);

        let mut buf = [0u8; 6];
        link.recv_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);

        // Leftover byte shows up as activity
        assert!(matches!(link.try_drain(), Drain::Activity(1)));
        assert!(matches!(link.try_drain(), Drain::Idle));
    }

    #[tokio::test]
    async fn test_memory_link_short_read() {
        let (mut link, peer) = MemoryLink::pair(endpoint());
        peer.push(&[1, 2]);

        let mut buf = [0u8; 6];
        let err = link.recv_exact(&mut buf).await.unwrap_err();
        assert!(err.is_short_read());
    }

    #[tokio::test]
    async fn test_memory_link_fault_injection() {
        let (mut link, peer) = MemoryLink::pair(endpoint());
        link.send_all(b"abc").await.unwrap();
        assert_eq!(peer.writes(), vec![b"abc".to_vec()]);

        peer.set_fail_sends(true);
        assert!(link.send_all(b"def").await.is_err());
        assert_eq!(peer.write_count(), 1);

        peer.close();
        assert!(matches!(link.try_drain(), Drain::Closed));

        assert!(!peer.is_released());
        drop(link);
        assert!(peer.is_released());
    }
}
