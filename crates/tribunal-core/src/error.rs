use thiserror::Error;

use crate::party::PartyId;

/// Protocol errors.
///
/// Every variant is a local, synchronous rejection of the call that caused
/// it: a failed call never modifies instance state. `ProofMismatch` and
/// `ReplayDivergence` are not recoverable conditions but the detection
/// mechanism for a cheating party; the orchestrator turns them into a loss
/// for the acting party.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Construction parameters were rejected before any state existed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The caller is not the party whose turn it is in the current state.
    #[error("{0} may not act in the current state")]
    Unauthorized(PartyId),

    /// The operation is not valid in the instance's current state.
    #[error("operation not valid in state {0}")]
    WrongState(&'static str),

    /// The address is not a multiple of the word size.
    #[error("address {0:#x} is not word aligned")]
    MisalignedAddress(u64),

    /// The address falls outside the committed memory space.
    #[error("address {0:#x} is out of range")]
    AddressOutOfRange(u64),

    /// A submitted Merkle proof did not verify against the expected root.
    #[error("merkle proof does not match the committed root")]
    ProofMismatch,

    /// A replayed read or write disagrees with the authenticated log.
    #[error("replayed access diverges from the authenticated log")]
    ReplayDivergence,

    /// A timeout victory was claimed before the round deadline passed.
    #[error("round deadline has not been reached")]
    DeadlineNotReached,

    /// The instance already reached a terminal state.
    #[error("instance has been finalized")]
    InstanceFinalized,
}

pub type Result<T> = std::result::Result<T, Error>;
