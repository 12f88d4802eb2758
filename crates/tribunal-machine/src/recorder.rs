//! Footprint discovery: record every word a step touches so the same
//! accesses can be authenticated into a replica with inclusion proofs.

use serde::{Deserialize, Serialize};

use tribunal_core::Result;
use tribunal_memory::{CommittedMemory, ProofCarryingReplica};

use crate::oracle::WordAccess;

/// One access observed while recording a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordedAccess {
    Read { addr: u64, value: u64 },
    Write { addr: u64, old: u64, new: u64 },
}

impl RecordedAccess {
    pub fn addr(&self) -> u64 {
        match self {
            RecordedAccess::Read { addr, .. } | RecordedAccess::Write { addr, .. } => *addr,
        }
    }
}

/// Pass-through [`WordAccess`] adapter that logs each access in order.
///
/// A party runs the oracle through this against its own materialized memory
/// to learn the read/write set of the disputed step; the log then drives
/// proof generation.
pub struct AccessRecorder<'a, M: WordAccess> {
    inner: &'a mut M,
    log: Vec<RecordedAccess>,
}

impl<'a, M: WordAccess> AccessRecorder<'a, M> {
    pub fn new(inner: &'a mut M) -> Self {
        Self { inner, log: Vec::new() }
    }

    pub fn log(&self) -> &[RecordedAccess] {
        &self.log
    }

    pub fn into_log(self) -> Vec<RecordedAccess> {
        self.log
    }
}

impl<M: WordAccess> WordAccess for AccessRecorder<'_, M> {
    fn read_word(&mut self, addr: u64) -> Result<u64> {
        let value = self.inner.read_word(addr)?;
        self.log.push(RecordedAccess::Read { addr, value });
        Ok(value)
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        let old = self.inner.read_word(addr)?;
        self.inner.write_word(addr, value)?;
        self.log.push(RecordedAccess::Write { addr, old, new: value });
        Ok(())
    }
}

/// Authenticate a recorded footprint into `replica`.
///
/// `scratch` must hold the same pre-step state the replica's root commits
/// to. Writes are applied to it as they are proven so that each proof is
/// generated against the replica's running root.
pub fn authenticate_footprint(
    scratch: &mut CommittedMemory,
    replica: &mut ProofCarryingReplica,
    log: &[RecordedAccess],
) -> Result<()> {
    for access in log {
        let proof = scratch.generate_proof(access.addr())?;
        match *access {
            RecordedAccess::Read { addr, value } => replica.prove_read(addr, value, &proof)?,
            RecordedAccess::Write { addr, old, new } => {
                replica.prove_write(addr, old, new, &proof)?;
                scratch.set(addr, new)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{StepOracle, StepStatus};
    use crate::subleq::{self, Subleq};

    #[test]
    fn recorded_step_replays_on_a_replica() {
        // A single instruction: mem[3] -= mem[3]; result 0, jump to word 5.
        let mut mem = CommittedMemory::new();
        mem.set(0, 3).unwrap();
        mem.set(8, 3).unwrap();
        mem.set(16, 5).unwrap();
        mem.set(24, 7).unwrap();
        mem.set(subleq::RAM_SIZE_ADDR, 0x10000).unwrap();
        let pre_root = mem.root();

        let mut scratch = mem.clone();
        let mut recorder = AccessRecorder::new(&mut scratch);
        assert_eq!(Subleq.step(&mut recorder).unwrap(), StepStatus::Advanced);
        let log = recorder.into_log();
        assert!(log
            .iter()
            .any(|a| matches!(a, RecordedAccess::Write { addr: 24, old: 7, new: 0 })));

        let mut replica = ProofCarryingReplica::new(pre_root);
        let mut proving = mem.clone();
        authenticate_footprint(&mut proving, &mut replica, &log).unwrap();
        replica.finish_authenticating().unwrap();

        assert_eq!(Subleq.step(&mut replica).unwrap(), StepStatus::Advanced);
        let post_root = replica.finish_replaying().unwrap();

        // The replica's post root matches the step applied directly.
        Subleq.step(&mut mem).unwrap();
        assert_eq!(post_root, mem.root());
    }

    #[test]
    fn replica_rejects_a_step_off_the_footprint() {
        let mut mem = CommittedMemory::new();
        mem.set(0, 3).unwrap();
        mem.set(8, 3).unwrap();
        mem.set(16, 5).unwrap();
        mem.set(24, 7).unwrap();
        mem.set(subleq::RAM_SIZE_ADDR, 0x10000).unwrap();

        let mut scratch = mem.clone();
        let mut recorder = AccessRecorder::new(&mut scratch);
        Subleq.step(&mut recorder).unwrap();
        let log = recorder.into_log();

        let mut replica = ProofCarryingReplica::new(mem.root());
        let mut proving = mem.clone();
        authenticate_footprint(&mut proving, &mut replica, &log).unwrap();
        replica.finish_authenticating().unwrap();

        // A replay that strays to an unauthenticated address diverges.
        assert!(replica.read(1 << 40).is_err());
    }
}
