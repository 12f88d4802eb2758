//! Proof-carrying memory replica for single-step replay.
//!
//! A replica starts from a committed pre-step root and admits only reads and
//! writes that carry a valid inclusion proof. Writes advance the running
//! root incrementally: the proof that authenticated the old value is reused
//! to recompute the contribution of the new value at the same tree
//! positions, so the full tree is never materialized. Because consecutive
//! writes can share siblings, callers must authenticate writes one at a time
//! and generate each proof against the root produced by the previous
//! authenticated write.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use tribunal_core::hash::H256;
use tribunal_core::{Error, Result};

use crate::proof::MerkleProof;

/// Kind of an authenticated access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// One authenticated log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub kind: AccessKind,
    pub addr: u64,
    /// Proven value before this access (the read value, or a write's old
    /// value).
    pub old: u64,
    /// Value installed by a write, absent for reads.
    pub new: Option<u64>,
}

/// Lifecycle of a replica. Linear, no branch back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaPhase {
    Authenticating,
    Replaying,
    Finished,
}

/// Per-dispute scratch memory that admits proven accesses and incrementally
/// maintains the committed root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofCarryingReplica {
    pre_root: H256,
    current_root: H256,
    phase: ReplicaPhase,
    log: Vec<AccessEntry>,
    /// Value each touched address held in the pre-state, updated by replayed
    /// writes; this is what replayed reads observe.
    values: HashMap<u64, u64>,
    /// Indices into `log` of writes not yet replayed, in authentication
    /// order.
    pending_writes: VecDeque<usize>,
}

impl ProofCarryingReplica {
    pub fn new(pre_root: H256) -> Self {
        Self {
            pre_root,
            current_root: pre_root,
            phase: ReplicaPhase::Authenticating,
            log: Vec::new(),
            values: HashMap::new(),
            pending_writes: VecDeque::new(),
        }
    }

    pub fn pre_root(&self) -> H256 {
        self.pre_root
    }

    /// Root of the memory with every authenticated write applied.
    pub fn current_root(&self) -> H256 {
        self.current_root
    }

    pub fn phase(&self) -> ReplicaPhase {
        self.phase
    }

    pub fn log(&self) -> &[AccessEntry] {
        &self.log
    }

    /// Whether any access at `addr` has been authenticated.
    pub fn was_authenticated(&self, addr: u64) -> bool {
        self.values.contains_key(&addr)
    }

    fn ensure_phase(&self, phase: ReplicaPhase, op: &'static str) -> Result<()> {
        match self.phase {
            p if p == phase => Ok(()),
            ReplicaPhase::Finished => Err(Error::InstanceFinalized),
            _ => Err(Error::WrongState(op)),
        }
    }

    /// Authenticate a read of `value` at `addr`.
    ///
    /// The proof must place `value` at `addr` under the current running
    /// root, which already reflects previously authenticated writes.
    pub fn prove_read(&mut self, addr: u64, value: u64, proof: &MerkleProof) -> Result<()> {
        self.ensure_phase(ReplicaPhase::Authenticating, "prove_read")?;
        if !proof.verify(addr, value, &self.current_root)? {
            return Err(Error::ProofMismatch);
        }
        self.log.push(AccessEntry { kind: AccessKind::Read, addr, old: value, new: None });
        self.values.entry(addr).or_insert(value);
        Ok(())
    }

    /// Authenticate a write of `new` over `old` at `addr` and advance the
    /// running root.
    pub fn prove_write(
        &mut self,
        addr: u64,
        old: u64,
        new: u64,
        proof: &MerkleProof,
    ) -> Result<()> {
        self.ensure_phase(ReplicaPhase::Authenticating, "prove_write")?;
        if !proof.verify(addr, old, &self.current_root)? {
            return Err(Error::ProofMismatch);
        }
        self.current_root = proof.root_with(addr, new)?;
        self.pending_writes.push_back(self.log.len());
        self.log.push(AccessEntry { kind: AccessKind::Write, addr, old, new: Some(new) });
        self.values.entry(addr).or_insert(old);
        Ok(())
    }

    /// Close the authentication window and open replay.
    pub fn finish_authenticating(&mut self) -> Result<()> {
        self.ensure_phase(ReplicaPhase::Authenticating, "finish_authenticating")?;
        self.phase = ReplicaPhase::Replaying;
        Ok(())
    }

    /// Replay a read: returns the latest authenticated or written value at
    /// `addr`.
    ///
    /// Reading an address no access was authenticated for is a
    /// `ReplayDivergence` and attributable to the party that fixed the
    /// footprint.
    pub fn read(&mut self, addr: u64) -> Result<u64> {
        self.ensure_phase(ReplicaPhase::Replaying, "read")?;
        self.values.get(&addr).copied().ok_or(Error::ReplayDivergence)
    }

    /// Replay a write: must match the next authenticated write in log order.
    pub fn write(&mut self, addr: u64, value: u64) -> Result<()> {
        self.ensure_phase(ReplicaPhase::Replaying, "write")?;
        let next = self
            .pending_writes
            .front()
            .map(|i| &self.log[*i])
            .ok_or(Error::ReplayDivergence)?;
        if next.addr != addr || next.new != Some(value) {
            return Err(Error::ReplayDivergence);
        }
        self.pending_writes.pop_front();
        self.values.insert(addr, value);
        Ok(())
    }

    /// Close replay and produce the post-step root.
    ///
    /// Fails with `ReplayDivergence` if authenticated writes were never
    /// replayed: the running root includes them, so skipping one means the
    /// declared footprint was wrong.
    pub fn finish_replaying(&mut self) -> Result<H256> {
        self.ensure_phase(ReplicaPhase::Replaying, "finish_replaying")?;
        if !self.pending_writes.is_empty() {
            return Err(Error::ReplayDivergence);
        }
        self.phase = ReplicaPhase::Finished;
        Ok(self.current_root)
    }
}
