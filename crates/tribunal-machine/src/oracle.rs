//! The step-oracle seam between interpreters and memory backends.

use serde::{Deserialize, Serialize};

use tribunal_core::Result;
use tribunal_memory::{CommittedMemory, ProofCarryingReplica};

/// Word-granular memory as seen by a step oracle.
///
/// Implemented both by [`CommittedMemory`] (ordinary execution, footprint
/// recording) and by [`ProofCarryingReplica`] in its replay phase, so the
/// same oracle code drives both.
pub trait WordAccess {
    fn read_word(&mut self, addr: u64) -> Result<u64>;
    fn write_word(&mut self, addr: u64, value: u64) -> Result<()>;
}

impl WordAccess for CommittedMemory {
    fn read_word(&mut self, addr: u64) -> Result<u64> {
        self.get(addr)
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        self.set(addr, value)
    }
}

impl WordAccess for ProofCarryingReplica {
    fn read_word(&mut self, addr: u64) -> Result<u64> {
        self.read(addr)
    }

    fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        self.write(addr, value)
    }
}

/// Machine-level faults a step can end in. Each carries the exit code the
/// reference interpreter reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepFault {
    /// Operand A below -1.
    NegativeOperandA,
    /// Operand B below -1.
    NegativeOperandB,
    /// Operands A and B both designate the input stream.
    BothOperandsInput,
    /// Operand A addresses past the RAM size.
    OutOfRamA,
    /// Operand B addresses past the RAM size.
    OutOfRamB,
    /// Operand C jumps past the RAM size.
    OutOfRamC,
    /// Input counter ran past the declared input size.
    InputOverflow,
    /// Output counter ran past the declared output size.
    OutputOverflow,
}

impl StepFault {
    pub fn exit_code(self) -> u8 {
        match self {
            StepFault::NegativeOperandA => 2,
            StepFault::NegativeOperandB => 3,
            StepFault::BothOperandsInput => 4,
            StepFault::OutOfRamA => 5,
            StepFault::OutOfRamB => 6,
            StepFault::OutOfRamC => 7,
            StepFault::InputOverflow => 8,
            StepFault::OutputOverflow => 9,
        }
    }
}

/// Result of applying one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// The machine advanced.
    Advanced,
    /// The machine had already halted; memory is unchanged past the operand
    /// fetch.
    Halted,
    /// The machine faulted; writes issued before the fault stand.
    Fault(StepFault),
}

impl StepStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            StepStatus::Advanced => 0,
            StepStatus::Halted => 1,
            StepStatus::Fault(fault) => fault.exit_code(),
        }
    }
}

/// Single-step transition function over word-addressable memory.
///
/// Implementations must be deterministic in the words they read, so that the
/// access footprint recorded on one memory replays identically on a replica
/// carrying the same committed state.
pub trait StepOracle {
    fn step(&self, mem: &mut dyn WordAccess) -> Result<StepStatus>;

    /// Step until the machine stops advancing or `max_steps` runs out.
    /// Returns the last status.
    fn run(&self, mem: &mut dyn WordAccess, max_steps: u64) -> Result<StepStatus> {
        let mut status = StepStatus::Advanced;
        for _ in 0..max_steps {
            status = self.step(mem)?;
            if status != StepStatus::Advanced {
                break;
            }
        }
        Ok(status)
    }
}
