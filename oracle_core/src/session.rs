//! Participant session table.
//!
//! Tracks which of the N expected Virtual Nodes are connected, under which
//! identity, and whether the topology has been fully distributed.
//!
//! # Slot lifecycle
//!
//! ```text
//!            accept                 registration
//!  Empty ───────────► Connecting ─────────────────► Registered
//!    ▲                    │ short read / EOF             │ EOF, error,
//!    │                    ▼                              ▼ failed send
//!    └──────────────────────────────────────────────────┘
//! ```
//!
//! # Distribution flag
//!
//! `distributed` is true only right after a broadcast that reached all N
//! slots, every one registered and every send successful. Any drop clears it,
//! so the next registration has to re-check quorum.

use crate::encoder;
use crate::error::OracleError;
use crate::identity::Identity;
use crate::matrix::AdjacencyMatrix;
use crate::wire::RegistrationMessage;
use oracle_env::{Endpoint, SessionLink, TransportError};
use serde::Serialize;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

/// Connection state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotState {
    /// No connection
    Empty,

    /// Accepted, waiting for the registration message
    Connecting,

    /// Registration decoded, eligible for link-state
    Registered,
}

/// One fixed participant position.
#[derive(Debug)]
pub struct ParticipantSlot<L> {
    /// Positional identity, stable across reconnections
    identity: Identity,

    /// Connection handle, present while Connecting or Registered
    link: Option<L>,

    /// TCP peer address of the latest connection
    remote: Ipv4Addr,

    /// Endpoint advertised in the latest registration
    advertised: Option<Endpoint>,

    /// UDP port from the latest registration (0 until registered)
    udp_port: u16,

    state: SlotState,
}

impl<L> ParticipantSlot<L> {
    fn vacant(identity: Identity) -> Self {
        Self {
            identity,
            link: None,
            remote: Ipv4Addr::UNSPECIFIED,
            advertised: None,
            udp_port: 0,
            state: SlotState::Empty,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        self.state == SlotState::Registered
    }

    /// Endpoint advertised at registration, if the slot ever registered.
    pub fn advertised(&self) -> Option<Endpoint> {
        self.advertised
    }

    /// Address and port other nodes are told to use for this slot.
    ///
    /// The address is the TCP peer address; the port is the advertised
    /// UDP port. Both keep their last values after a disconnect.
    pub fn tuple_endpoint(&self) -> Endpoint {
        Endpoint::new(self.remote, self.udp_port)
    }
}

/// What happened after a registration completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Topology already distributed; this node got its personal view
    Personal,

    /// Personal send failed; slot dropped
    PersonalFailed,

    /// Quorum reached; every registered slot was sent its view
    Broadcast(BroadcastReport),

    /// Fewer than N registered; nothing sent
    Waiting { registered: usize, capacity: usize },
}

/// Result of sending link-state to every registered slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Slots that received their view
    pub delivered: Vec<usize>,

    /// Slots whose send failed (now Empty)
    pub failed: Vec<usize>,

    /// All N slots registered and delivered
    pub complete: bool,
}

/// A successful accept + registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub slot: usize,
    pub identity: Identity,
    pub message: RegistrationMessage,
    pub delivery: Delivery,
}

/// Serializable view of one slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub identity: Identity,
    pub state: SlotState,
    pub endpoint: Endpoint,
    pub advertised: Option<Endpoint>,
}

/// Serializable view of the whole table.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub capacity: usize,
    pub distributed: bool,
    pub slots: Vec<SlotSnapshot>,
}

/// Authoritative participant table for one topology of N nodes.
#[derive(Debug)]
pub struct SessionTable<L> {
    /// N, fixed for the table's lifetime
    capacity: usize,

    /// Slots created so far (lazily, up to `capacity`)
    slots: Vec<ParticipantSlot<L>>,

    /// Whether the most recent full broadcast reached a complete, healthy table
    distributed: bool,
}

impl<L> SessionTable<L> {
    /// Creates an empty table for `capacity` participants.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            distributed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slots(&self) -> &[ParticipantSlot<L>] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&ParticipantSlot<L>> {
        self.slots.get(index)
    }

    pub fn is_distributed(&self) -> bool {
        self.distributed
    }

    /// Number of slots currently Registered.
    pub fn registered_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_registered()).count()
    }

    /// Iterates `(index, link)` for every slot holding a connection.
    pub fn links(&self) -> impl Iterator<Item = (usize, &L)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.link.as_ref().map(|l| (i, l)))
    }

    /// Picks a slot for a new connection.
    ///
    /// Appends while fewer than N slots exist, then reuses the lowest-index
    /// Empty slot. `None` means every identity is taken.
    pub fn allocate(&mut self) -> Option<usize> {
        if self.slots.len() < self.capacity {
            let index = self.slots.len();
            self.slots.push(ParticipantSlot::vacant(Identity::from_slot(index)?));
            return Some(index);
        }
        self.slots.iter().position(|s| s.state == SlotState::Empty)
    }

    /// Releases a slot's connection and clears the distribution flag.
    pub fn disconnect(&mut self, index: usize) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        // Dropping the link closes the socket
        drop(slot.link.take());
        slot.state = SlotState::Empty;
        self.distributed = false;
    }

    /// Returns a serializable view of the table.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            capacity: self.capacity,
            distributed: self.distributed,
            slots: self
                .slots
                .iter()
                .map(|s| SlotSnapshot {
                    identity: s.identity,
                    state: s.state,
                    endpoint: s.tuple_endpoint(),
                    advertised: s.advertised,
                })
                .collect(),
        }
    }
}

impl<L: SessionLink> SessionTable<L> {
    /// Runs the accept → register → distribute pipeline for one connection.
    ///
    /// # Errors
    /// * `OracleError::Capacity` - all N slots busy; the link was closed
    /// * `OracleError::Transport` - registration failed; the slot is Empty again
    pub async fn accept(
        &mut self,
        link: L,
        matrix: &AdjacencyMatrix,
    ) -> Result<Registration, OracleError> {
        let Some(index) = self.allocate() else {
            info!("Extra VN connected from {}. Closing socket.", link.peer().address);
            drop(link);
            return Err(OracleError::capacity(self.capacity));
        };

        let slot = &mut self.slots[index];
        slot.remote = link.peer().address;
        slot.udp_port = 0;
        slot.link = Some(link);
        slot.state = SlotState::Connecting;
        info!("Connected VN {} from {}", slot.identity, slot.remote);

        let message = match self.read_registration(index).await {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to receive CONNECT message from VN {}: {}", self.slots[index].identity, e);
                self.disconnect(index);
                return Err(e.into());
            }
        };

        let slot = &mut self.slots[index];
        slot.udp_port = message.endpoint.port;
        slot.advertised = Some(message.endpoint);
        slot.state = SlotState::Registered;
        info!(
            "VN {} UDP Port: {}, IP: {}",
            slot.identity, message.endpoint.port, message.endpoint.address
        );
        let identity = slot.identity;

        let delivery = self.on_registered(index, matrix).await;
        Ok(Registration {
            slot: index,
            identity,
            message,
            delivery,
        })
    }

    async fn read_registration(&mut self, index: usize) -> Result<RegistrationMessage, TransportError> {
        let link = self.slots[index].link.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = [0u8; RegistrationMessage::WIRE_SIZE];
        link.recv_exact(&mut buf).await?;
        Ok(RegistrationMessage::decode(&buf))
    }

    async fn on_registered(&mut self, index: usize, matrix: &AdjacencyMatrix) -> Delivery {
        if self.distributed {
            return match self.send_to(index, matrix).await {
                Ok(_) => Delivery::Personal,
                Err(_) => Delivery::PersonalFailed,
            };
        }

        let registered = self.registered_count();
        if registered == self.capacity {
            let report = self.broadcast(matrix).await;
            if report.complete {
                info!("Initial LINK-STATE sent to all VNs.");
            }
            Delivery::Broadcast(report)
        } else {
            info!("Waiting for other VNs to connect ({}/{})", registered, self.capacity);
            Delivery::Waiting {
                registered,
                capacity: self.capacity,
            }
        }
    }

    /// Sends slot `index` its personal link-state.
    ///
    /// Returns the number of bytes written (0 for a node with no eligible
    /// destinations, which still counts as success). On failure the slot is
    /// dropped and the distribution flag cleared.
    pub async fn send_to(&mut self, index: usize, matrix: &AdjacencyMatrix) -> Result<usize, TransportError> {
        let payload = encoder::encode_bytes(index, self, matrix);
        let slot = self.slots.get_mut(index).ok_or(TransportError::Closed)?;
        let link = slot.link.as_mut().ok_or(TransportError::Closed)?;

        if payload.is_empty() {
            debug!("VN {} has no eligible destinations", slot.identity);
            return Ok(0);
        }

        match link.send_all(&payload).await {
            Ok(()) => {
                debug!("Sent {} bytes of LINK-STATE to VN {}", payload.len(), slot.identity);
                Ok(payload.len())
            }
            Err(e) => {
                error!("Failed to send LINK-STATE to VN {}: {}", slot.identity, e);
                self.disconnect(index);
                Err(e)
            }
        }
    }

    /// Sends every registered slot its view, in ascending slot order.
    ///
    /// Failing slots are dropped. The distribution flag ends up true only if
    /// all N slots were registered and every send succeeded.
    pub async fn broadcast(&mut self, matrix: &AdjacencyMatrix) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for index in 0..self.slots.len() {
            if !self.slots[index].is_registered() {
                continue;
            }
            match self.send_to(index, matrix).await {
                Ok(_) => report.delivered.push(index),
                Err(_) => report.failed.push(index),
            }
        }
        report.complete = report.failed.is_empty() && report.delivered.len() == self.capacity;
        self.distributed = report.complete;
        report
    }

    /// Non-blocking drain of every connected session.
    ///
    /// Unsolicited bytes are discarded. EOF or a read error disconnects the
    /// slot. Returns the indices that were disconnected.
    pub fn drain_all(&mut self) -> Vec<usize> {
        let mut dropped = Vec::new();
        for index in 0..self.slots.len() {
            let Some(link) = self.slots[index].link.as_mut() else {
                continue;
            };
            let drain = link.try_drain();
            if drain.is_disconnect() {
                info!("VN {} disconnected", self.slots[index].identity);
                self.disconnect(index);
                dropped.push(index);
            }
        }
        dropped
    }
}
