//! Binary wire format between the Oracle Node and Virtual Nodes.
//!
//! All multi-byte fields are big-endian. There are no delimiters and no
//! length prefixes: a link-state message is zero or more tuples laid end
//! to end, written as one logical write.
//!
//! ```text
//! RegistrationMessage (6 bytes)      LinkStateTuple (9 bytes)
//! +---------+------+                 +----+---------+------+------+
//! | address | port |                 | id | address | port | cost |
//! |   4     |  2   |                 | 1  |   4     |  2   |  2   |
//! +---------+------+                 +----+---------+------+------+
//! ```

use crate::identity::Identity;
use bytes::{Buf, BufMut, BytesMut};
use oracle_env::Endpoint;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Registration sent once by a Virtual Node right after connecting.
///
/// Advertises the UDP endpoint the node listens on for data-plane traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationMessage {
    pub endpoint: Endpoint,
}

impl RegistrationMessage {
    /// Encoded size in bytes.
    pub const WIRE_SIZE: usize = 6;

    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Encodes into a fixed-size buffer.
    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        let mut buf = &mut out[..];
        buf.put_slice(&self.endpoint.address.octets());
        buf.put_u16(self.endpoint.port);
        out
    }

    /// Decodes from a fixed-size buffer.
    pub fn decode(bytes: &[u8; Self::WIRE_SIZE]) -> Self {
        let mut buf = &bytes[..];
        let address = Ipv4Addr::from(buf.get_u32());
        let port = buf.get_u16();
        Self::new(Endpoint::new(address, port))
    }
}

/// One destination as seen from the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStateTuple {
    /// Destination identity
    pub identity: Identity,

    /// Destination address and UDP port
    pub endpoint: Endpoint,

    /// Link cost; 0 for the recipient's own tuple
    pub cost: u16,
}

impl LinkStateTuple {
    /// Encoded size in bytes.
    pub const WIRE_SIZE: usize = 9;

    pub fn new(identity: Identity, endpoint: Endpoint, cost: u16) -> Self {
        Self {
            identity,
            endpoint,
            cost,
        }
    }

    /// Appends the encoded tuple to `buf`.
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.identity.as_byte());
        buf.put_slice(&self.endpoint.address.octets());
        buf.put_u16(self.endpoint.port);
        buf.put_u16(self.cost);
    }

    /// Decodes one tuple from the front of `buf`.
    ///
    /// Returns `None` (consuming nothing) if fewer than `WIRE_SIZE` bytes remain.
    pub fn decode_from(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < Self::WIRE_SIZE {
            return None;
        }
        let identity = Identity(buf.get_u8());
        let address = Ipv4Addr::from(buf.get_u32());
        let port = buf.get_u16();
        let cost = buf.get_u16();
        Some(Self::new(identity, Endpoint::new(address, port), cost))
    }
}

/// Concatenates tuples into one link-state message.
pub fn encode_batch(tuples: &[LinkStateTuple]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(tuples.len() * LinkStateTuple::WIRE_SIZE);
    for tuple in tuples {
        tuple.encode_into(&mut buf);
    }
    buf
}

/// Decodes every whole tuple in `buf`, leaving any partial trailing tuple
/// in place for the next read.
pub fn decode_whole(buf: &mut BytesMut) -> Vec<LinkStateTuple> {
    let mut tuples = Vec::with_capacity(buf.len() / LinkStateTuple::WIRE_SIZE);
    while let Some(tuple) = LinkStateTuple::decode_from(&mut *buf) {
        tuples.push(tuple);
    }
    tuples
}
