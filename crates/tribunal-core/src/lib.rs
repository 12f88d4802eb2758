//! Core types for the Tribunal dispute toolchain.
//!
//! This crate defines the foundational data structures used across the entire
//! system: hashes and their combinators, the word/address contract of the
//! committed memory space, party identities and roles, the clock abstraction,
//! and the shared error taxonomy. It contains no protocol logic.

pub mod addr;
pub mod clock;
pub mod error;
pub mod hash;
pub mod party;

pub use error::{Error, Result};
pub use hash::{H256, HASH_SIZE};
pub use party::{PartyId, Role};
