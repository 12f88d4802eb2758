//! Sparse committed memory and its proof scheme.
//!
//! This crate provides the cryptographically committed memory model shared by
//! both sides of a dispute:
//!
//! - [`memory::CommittedMemory`] - sparse word-addressable memory over the
//!   full `2^64`-byte space with a single Merkle root
//! - [`proof::MerkleProof`] - 61-level sibling path verifying (and, given the
//!   old value, updating) one word against a root
//! - [`replica::ProofCarryingReplica`] - per-dispute scratch memory that
//!   admits proven reads/writes and maintains a running root incrementally
//! - [`precomputed`] - empty-subtree hashes for every tree depth

pub mod memory;
pub mod precomputed;
pub mod proof;
pub mod replica;

pub use memory::CommittedMemory;
pub use proof::MerkleProof;
pub use replica::{AccessEntry, AccessKind, ProofCarryingReplica, ReplicaPhase};
