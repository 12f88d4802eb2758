//! Stake custody behind the dispute game.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tribunal_core::PartyId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    #[error("{0} holds insufficient balance")]
    InsufficientBalance(PartyId),
    #[error("escrow holds less than the requested amount")]
    InsufficientEscrow,
}

/// Custody of party funds during a dispute. The game locks both stakes at
/// commit time and pays the pot out at settlement.
pub trait Escrow {
    fn lock(&mut self, party: PartyId, amount: u64) -> Result<(), EscrowError>;
    fn transfer(&mut self, to: PartyId, amount: u64) -> Result<(), EscrowError>;
    fn balance_of(&self, party: PartyId) -> u64;
}

/// In-memory ledger escrow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerEscrow {
    balances: BTreeMap<PartyId, u64>,
    locked: u64,
}

impl LedgerEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, party: PartyId, amount: u64) {
        *self.balances.entry(party).or_insert(0) += amount;
    }

    pub fn locked(&self) -> u64 {
        self.locked
    }
}

impl Escrow for LedgerEscrow {
    fn lock(&mut self, party: PartyId, amount: u64) -> Result<(), EscrowError> {
        let balance = self.balances.entry(party).or_insert(0);
        if *balance < amount {
            return Err(EscrowError::InsufficientBalance(party));
        }
        *balance -= amount;
        self.locked += amount;
        Ok(())
    }

    fn transfer(&mut self, to: PartyId, amount: u64) -> Result<(), EscrowError> {
        if self.locked < amount {
            return Err(EscrowError::InsufficientEscrow);
        }
        self.locked -= amount;
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn balance_of(&self, party: PartyId) -> u64 {
        self.balances.get(&party).copied().unwrap_or(0)
    }
}
