//! Positional participant identities.

use serde::{Deserialize, Serialize};

/// First identity byte; slot 0 is `A`.
const FIRST: u8 = b'A';

/// Last identity byte; the alphabet is the printable ASCII run `A..=~`.
const LAST: u8 = b'~';

/// Maximum number of participants a topology may describe.
pub const MAX_NODES: usize = (LAST - FIRST) as usize + 1;

/// One-byte participant identity.
///
/// Identity is purely positional: slot `k` always carries the `k`-th byte
/// of the alphabet, across reconnections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(pub u8);

impl Identity {
    /// Returns the identity for a slot index, or `None` past the alphabet.
    pub fn from_slot(index: usize) -> Option<Self> {
        if index < MAX_NODES {
            Some(Self(FIRST + index as u8))
        } else {
            None
        }
    }

    /// Returns the slot index this identity belongs to, if it is in the alphabet.
    pub fn slot(&self) -> Option<usize> {
        if (FIRST..=LAST).contains(&self.0) {
            Some((self.0 - FIRST) as usize)
        } else {
            None
        }
    }

    /// Returns the raw byte.
    pub fn as_byte(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_ascii_graphic() {
            write!(f, "{}", self.0 as char)
        } else {
            write!(f, "0x{:02x}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_positional() {
        assert_eq!(Identity::from_slot(0), Some(Identity(b'A')));
        assert_eq!(Identity::from_slot(2), Some(Identity(b'C')));
        assert_eq!(Identity::from_slot(25).map(|i| i.to_string()), Some("Z".to_string()));
        assert_eq!(Identity(b'C').slot(), Some(2));
    }

    #[test]
    fn test_identity_alphabet_bounds() {
        assert_eq!(MAX_NODES, 62);
        assert_eq!(Identity::from_slot(MAX_NODES - 1), Some(Identity(b'~')));
        assert_eq!(Identity::from_slot(MAX_NODES), None);
        assert_eq!(Identity(b'#').slot(), None);
        assert_eq!(Identity(0x07).to_string(), "0x07");
    }
}
