//! Session link abstraction between the Oracle Node and one participant.

use async_trait::async_trait;
use crate::error::TransportError;
use crate::types::Endpoint;

/// Outcome of a non-blocking drain on a session link.
#[derive(Debug)]
pub enum Drain {
    /// Nothing was available to read
    Idle,

    /// Some unsolicited bytes were read and discarded
    Activity(usize),

    /// The peer closed the connection (EOF)
    Closed,

    /// The read failed
    Failed(TransportError),
}

impl Drain {
    /// Returns true if the drain observed a teardown (EOF or error).
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Drain::Closed | Drain::Failed(_))
    }
}

/// Abstraction for the connection behind one participant slot.
///
/// # Implementations
///
/// - **Production**: `TcpLink` wraps an accepted tokio `TcpStream`
/// - **Testing**: `MemoryLink` with scripted input and injectable failures
///
/// # Ownership
///
/// A link is owned by exactly one slot. Dropping it closes the connection;
/// there is no separate close call.
///
/// ```text
/// Oracle Node                  Link                   Virtual Node
///   |                           |                          |
///   |<-- recv_exact(6) ---------|<-- RegistrationMessage --|
///   |-- send_all(9 * k) ------->|-- LinkStateTuple x k --->|
///   |-- try_drain() ----------->|   (EOF => disconnect)    |
/// ```
#[async_trait]
pub trait SessionLink: Send + 'static {
    /// Returns the remote address of the connection.
    fn peer(&self) -> Endpoint;

    /// Writes the whole buffer as one logical write.
    ///
    /// # Returns
    /// * `Ok(())` - every byte was handed to the transport
    /// * `Err(TransportError)` - the write failed; the caller drops the link
    async fn send_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Reads exactly `buf.len()` bytes.
    ///
    /// EOF before the buffer is full is reported as
    /// `TransportError::ShortRead` carrying the received count.
    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Reads whatever is immediately available without waiting.
    fn try_drain(&mut self) -> Drain;
}
