//! Oracle-facing half of a Virtual Node.
//!
//! The link-state stream has no count prefix, so a batch ends wherever the
//! bytes that are immediately available run out. A batch split across two
//! TCP segments can therefore surface as two smaller batches; the partial
//! tuple at a split is kept and completed by the next read.

use bytes::BytesMut;
use futures::FutureExt;
use oracle_core::wire::decode_whole;
use oracle_core::{Identity, LinkStateTuple, RegistrationMessage};
use oracle_env::{Endpoint, TransportError};
use serde::Serialize;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, info};

/// Bytes reserved per opportunistic read.
const DRAIN_CHUNK: usize = 512;

/// Virtual Node settings.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Oracle Node address
    pub oracle: SocketAddrV4,

    /// Address to bind the UDP endpoint to and advertise
    pub own_ip: Ipv4Addr,

    /// UDP port to bind and advertise (0 = ephemeral)
    pub udp_port: u16,

    /// How long to wait for the TCP connection
    pub connect_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            oracle: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5000),
            own_ip: Ipv4Addr::LOCALHOST,
            udp_port: 0,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Reads link-state batches off a byte stream.
pub struct LinkStateReader<R> {
    inner: R,

    /// Bytes received but not yet decoded
    pending: BytesMut,
}

impl<R: AsyncRead + Unpin> LinkStateReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(DRAIN_CHUNK),
        }
    }

    /// Bytes of a partial tuple held over from the last batch.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Waits for at least one whole tuple, then takes whatever else is
    /// already readable.
    ///
    /// # Errors
    /// * `TransportError::Closed` - EOF on a tuple boundary
    /// * `TransportError::ShortRead` - EOF inside a tuple
    pub async fn read_batch(&mut self) -> Result<Vec<LinkStateTuple>, TransportError> {
        while self.pending.len() < LinkStateTuple::WIRE_SIZE {
            self.pending.reserve(DRAIN_CHUNK);
            if self.inner.read_buf(&mut self.pending).await? == 0 {
                return Err(if self.pending.is_empty() {
                    TransportError::Closed
                } else {
                    TransportError::short_read(LinkStateTuple::WIRE_SIZE, self.pending.len())
                });
            }
        }

        loop {
            self.pending.reserve(DRAIN_CHUNK);
            match self.inner.read_buf(&mut self.pending).now_or_never() {
                // EOF is reported by the next call
                Some(Ok(0)) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }

        Ok(decode_whole(&mut self.pending))
    }
}

/// Picks this node's identity out of a batch: the zero-cost tuple carrying
/// our UDP port, else the first zero-cost tuple.
pub fn own_identity(batch: &[LinkStateTuple], udp_port: u16) -> Option<Identity> {
    batch
        .iter()
        .find(|t| t.cost == 0 && t.endpoint.port == udp_port)
        .or_else(|| batch.iter().find(|t| t.cost == 0))
        .map(|t| t.identity)
}

/// Renders a batch as `A=0,B=10,C=5`.
pub fn summarize(batch: &[LinkStateTuple]) -> String {
    batch
        .iter()
        .map(|t| format!("{}={}", t.identity, t.cost))
        .collect::<Vec<_>>()
        .join(",")
}

/// One received batch, as printed by `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRecord {
    pub identity: Option<String>,
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkRecord {
    pub node: String,
    pub endpoint: Endpoint,
    pub cost: u16,
}

impl BatchRecord {
    pub fn new(identity: Option<Identity>, batch: &[LinkStateTuple]) -> Self {
        Self {
            identity: identity.map(|id| id.to_string()),
            links: batch
                .iter()
                .map(|t| LinkRecord {
                    node: t.identity.to_string(),
                    endpoint: t.endpoint,
                    cost: t.cost,
                })
                .collect(),
        }
    }
}

/// A registered Virtual Node.
pub struct VirtualNodePeer {
    /// Data-plane endpoint, bound before registering
    udp: UdpSocket,

    reader: LinkStateReader<TcpStream>,

    /// Endpoint sent in the registration
    advertised: Endpoint,

    identity: Option<Identity>,
}

impl VirtualNodePeer {
    /// Binds the UDP endpoint, connects to the Oracle Node, and registers.
    pub async fn connect(config: &PeerConfig) -> Result<Self, TransportError> {
        let udp_addr = SocketAddr::from((config.own_ip, config.udp_port));
        let udp = UdpSocket::bind(udp_addr)
            .await
            .map_err(|e| TransportError::bind(udp_addr, e))?;
        let udp_port = udp.local_addr()?.port();
        info!("UDP socket bound on {}:{}", config.own_ip, udp_port);

        let mut stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.oracle))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect to Oracle Node timed out"))??;

        let advertised = Endpoint::new(config.own_ip, udp_port);
        stream
            .write_all(&RegistrationMessage::new(advertised).encode())
            .await?;
        info!("CONNECT message sent to Oracle ({})", config.oracle);

        Ok(Self {
            udp,
            reader: LinkStateReader::new(stream),
            advertised,
            identity: None,
        })
    }

    pub fn advertised(&self) -> Endpoint {
        self.advertised
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    pub fn udp_socket(&self) -> &UdpSocket {
        &self.udp
    }

    /// Reads the next link-state batch and updates the learned identity.
    pub async fn next_batch(&mut self) -> Result<Vec<LinkStateTuple>, TransportError> {
        let batch = self.reader.read_batch().await?;
        if let Some(identity) = own_identity(&batch, self.advertised.port) {
            if self.identity != Some(identity) {
                info!("Assigned identity {}", identity);
            }
            self.identity = Some(identity);
        }
        info!("Received LINK-STATE from ON: {}", summarize(&batch));
        if self.reader.pending() > 0 {
            debug!("{} bytes of a split tuple held for the next batch", self.reader.pending());
        }
        Ok(batch)
    }
}
