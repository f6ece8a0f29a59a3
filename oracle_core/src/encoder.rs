//! Per-recipient link-state encoding.

use crate::matrix::AdjacencyMatrix;
use crate::session::SessionTable;
use crate::wire::{self, LinkStateTuple};
use bytes::BytesMut;

/// Builds the tuples slot `recipient` must receive.
///
/// One tuple per existing slot `j` (ascending) whose matrix entry from the
/// recipient is not the no-edge sentinel. The recipient's own tuple always
/// carries cost 0. Slots that are currently empty still appear, with the
/// endpoint they last registered.
pub fn encode_for<L>(
    recipient: usize,
    sessions: &SessionTable<L>,
    matrix: &AdjacencyMatrix,
) -> Vec<LinkStateTuple> {
    let Some(row) = matrix.row(recipient) else {
        return Vec::new();
    };

    sessions
        .slots()
        .iter()
        .enumerate()
        .filter_map(|(j, slot)| {
            let raw = *row.get(j)?;
            if raw < 0 {
                return None;
            }
            let cost = if j == recipient {
                0
            } else {
                u16::try_from(raw).ok()?
            };
            Some(LinkStateTuple::new(slot.identity(), slot.tuple_endpoint(), cost))
        })
        .collect()
}

/// Encodes the recipient's link-state as one contiguous message.
pub fn encode_bytes<L>(
    recipient: usize,
    sessions: &SessionTable<L>,
    matrix: &AdjacencyMatrix,
) -> BytesMut {
    wire::encode_batch(&encode_for(recipient, sessions, matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::matrix::parse_str;
    use crate::wire::RegistrationMessage;
    use oracle_env::{Endpoint, MemoryLink, MemoryPeer};
    use std::net::Ipv4Addr;

    /// Builds a table with every slot registered on 10.0.0.(k+1), port 6000+k.
    async fn registered_table(matrix: &AdjacencyMatrix) -> (SessionTable<MemoryLink>, Vec<MemoryPeer>) {
        let mut table = SessionTable::new(matrix.size());
        let mut peers = Vec::new();
        for k in 0..matrix.size() {
            let remote = Endpoint::new(Ipv4Addr::new(10, 0, 0, k as u8 + 1), 50000);
            let (link, peer) = MemoryLink::pair(remote);
            let msg = RegistrationMessage::new(Endpoint::new(remote.address, 6000 + k as u16));
            peer.push(&msg.encode());
            table.accept(link, matrix).await.unwrap();
            peers.push(peer);
        }
        (table, peers)
    }

    #[tokio::test]
    async fn test_three_node_costs_from_slot_zero() {
        let matrix = parse_str("10 5\n7").unwrap();
        let (table, _peers) = registered_table(&matrix).await;

        let tuples = encode_for(0, &table, &matrix);
        let view: Vec<(Identity, u16)> = tuples.iter().map(|t| (t.identity, t.cost)).collect();
        assert_eq!(
            view,
            vec![(Identity(b'A'), 0), (Identity(b'B'), 10), (Identity(b'C'), 5)]
        );
        assert_eq!(tuples[1].endpoint, Endpoint::new(Ipv4Addr::new(10, 0, 0, 2), 6001));
    }

    #[tokio::test]
    async fn test_no_edge_excluded() {
        // A-B = 4, A-C none, B-C = 2
        let matrix = parse_str("4 -1\n2").unwrap();
        let (table, _peers) = registered_table(&matrix).await;

        let ids: Vec<Identity> = encode_for(0, &table, &matrix).iter().map(|t| t.identity).collect();
        assert_eq!(ids, vec![Identity(b'A'), Identity(b'B')]);

        let ids: Vec<Identity> = encode_for(2, &table, &matrix).iter().map(|t| t.identity).collect();
        assert_eq!(ids, vec![Identity(b'B'), Identity(b'C')]);
    }

    #[tokio::test]
    async fn test_recipient_outside_matrix_gets_nothing() {
        let matrix = parse_str("1").unwrap();
        let (table, _peers) = registered_table(&matrix).await;
        assert!(encode_for(5, &table, &matrix).is_empty());
        assert!(encode_bytes(5, &table, &matrix).is_empty());
    }

    #[tokio::test]
    async fn test_encoding_deterministic() {
        let matrix = parse_str("3 9\n1").unwrap();
        let (table, _peers) = registered_table(&matrix).await;

        let first = encode_bytes(1, &table, &matrix);
        let second = encode_bytes(1, &table, &matrix);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3 * LinkStateTuple::WIRE_SIZE);
    }

    #[tokio::test]
    async fn test_self_tuple_ignores_stored_diagonal() {
        let mut matrix = parse_str("2 2\n2").unwrap();
        matrix.set_cell(1, 1, 9);
        let (table, _peers) = registered_table(&matrix).await;

        let tuples = encode_for(1, &table, &matrix);
        assert_eq!(tuples[1].identity, Identity(b'B'));
        assert_eq!(tuples[1].cost, 0);
    }

    #[test]
    fn test_no_slots_no_tuples() {
        let matrix = parse_str("2 2\n2").unwrap();
        let table: SessionTable<MemoryLink> = SessionTable::new(3);
        assert!(encode_for(0, &table, &matrix).is_empty());
    }
}
