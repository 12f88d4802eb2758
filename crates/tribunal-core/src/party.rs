//! Party identities and dispute roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity of a dispute participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyId(pub u64);

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party#{}", self.0)
    }
}

/// Role a party plays in a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Asserts the result of the computation.
    Claimer,
    /// Disputes the claimed result.
    Challenger,
}

impl Role {
    pub fn opponent(self) -> Role {
        match self {
            Role::Claimer => Role::Challenger,
            Role::Challenger => Role::Claimer,
        }
    }
}
