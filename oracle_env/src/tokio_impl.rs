//! Production implementation of SessionLink using Tokio.

use crate::error::TransportError;
use crate::link::{Drain, SessionLink};
use crate::types::Endpoint;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Size of the scratch buffer used when draining unsolicited bytes.
const DRAIN_CHUNK: usize = 1024;

/// Session link backed by an accepted TCP connection.
pub struct TcpLink {
    /// The accepted stream
    stream: TcpStream,

    /// Remote address captured at accept time
    peer: Endpoint,
}

impl TcpLink {
    /// Wraps an accepted stream.
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            stream,
            peer: Endpoint::from_socket_addr(addr),
        }
    }

    /// Waits until the stream is readable (data, EOF, or error pending).
    ///
    /// Cancel-safe; used by the reactor to build its readiness set.
    pub async fn readable(&self) -> std::io::Result<()> {
        self.stream.readable().await
    }
}

#[async_trait]
impl SessionLink for TcpLink {
    fn peer(&self) -> Endpoint {
        self.peer
    }

    async fn send_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let mut received = 0;
        while received < buf.len() {
            match self.stream.read(&mut buf[received..]).await? {
                0 => return Err(TransportError::short_read(buf.len(), received)),
                n => received += n,
            }
        }
        Ok(())
    }

    fn try_drain(&mut self) -> Drain {
        let mut scratch = [0u8; DRAIN_CHUNK];
        match self.stream.try_read(&mut scratch) {
            Ok(0) => Drain::Closed,
            Ok(n) => Drain::Activity(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Drain::Idle,
            Err(e) => Drain::Failed(e.into()),
        }
    }
}
