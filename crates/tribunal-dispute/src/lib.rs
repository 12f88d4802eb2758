//! Dispute orchestration: two staked parties commit to conflicting
//! computation histories, bisect over time to the first divergent step,
//! replay that step on a proof-carrying replica, and settle the stakes.

pub mod arena;
pub mod escrow;
pub mod game;

pub use arena::{Arena, InstanceId};
pub use escrow::{Escrow, EscrowError, LedgerEscrow};
pub use game::{Commitment, DisputeGame, GameConfig, GameState, Outcome, OutcomeReason};
