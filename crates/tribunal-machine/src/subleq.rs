//! Subtract-and-branch-if-not-positive reference interpreter.
//!
//! Memory layout over the 64-bit address space:
//!
//! ```text
//! +----------------+----------------+----------------+----------------+
//! | ram            | pc ic oc hs    | input          | output         |
//! |                | rs is os       |                |                |
//! +----------------+----------------+----------------+----------------+
//! 0                0x4000...        0x8000...        0xc000...
//! ```
//!
//! Each instruction is three words `(a, b, c)` in 32-bit two's-complement
//! embedded into a 64-bit word. `a = -1` reads the next input word into
//! `mem[b]`; `b = -1` writes `mem[a]` to the next output word; otherwise
//! `mem[b] -= mem[a]` and control jumps to `c` when the result is not
//! positive (`c < 0` halts).

use tribunal_core::Result;

use crate::oracle::{StepFault, StepOracle, StepStatus, WordAccess};

/// Program counter register.
pub const PC_ADDR: u64 = 0x4000_0000_0000_0000;
/// Input counter register.
pub const IC_ADDR: u64 = PC_ADDR + 8;
/// Output counter register.
pub const OC_ADDR: u64 = PC_ADDR + 16;
/// Halt flag; non-zero means halted.
pub const HALT_ADDR: u64 = PC_ADDR + 24;
/// RAM size in words.
pub const RAM_SIZE_ADDR: u64 = PC_ADDR + 32;
/// Maximum input size in bytes.
pub const INPUT_SIZE_ADDR: u64 = PC_ADDR + 40;
/// Maximum output size in bytes.
pub const OUTPUT_SIZE_ADDR: u64 = PC_ADDR + 48;

/// First word of the input stream.
pub const INPUT_BASE: u64 = 0x8000_0000_0000_0000;
/// First word of the output stream.
pub const OUTPUT_BASE: u64 = 0xc000_0000_0000_0000;

/// Encode a signed value into the 32-bit two's-complement word embedding.
pub fn encode(value: i64) -> u64 {
    if value >= 0 {
        value as u64
    } else {
        0xffff_ffff_0000_0000 | (value as u32 as u64)
    }
}

/// Decode a word from the embedding. Words whose high half is neither all
/// zeros nor all ones are outside it.
pub fn decode(word: u64) -> Option<i64> {
    match word >> 32 {
        0 => Some(word as i64),
        0xffff_ffff => Some((word as u32) as i32 as i64),
        _ => None,
    }
}

/// The subleq step oracle. Stateless; all machine state lives in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subleq;

impl StepOracle for Subleq {
    fn step(&self, mem: &mut dyn WordAccess) -> Result<StepStatus> {
        let pc = mem.read_word(PC_ADDR)?;
        let ic = mem.read_word(IC_ADDR)?;
        let oc = mem.read_word(OC_ADDR)?;
        let halted = mem.read_word(HALT_ADDR)?;
        let ram_size = mem.read_word(RAM_SIZE_ADDR)?;
        let input_max = mem.read_word(INPUT_SIZE_ADDR)?;
        let output_max = mem.read_word(OUTPUT_SIZE_ADDR)?;
        // Operands are fetched before the halt check so the footprint of a
        // step is the same whether or not the machine already halted.
        // Encodings outside the 32-bit embedding behave as deeply negative.
        let a = decode(mem.read_word(pc)?).unwrap_or(i64::MIN);
        let b = decode(mem.read_word(pc.wrapping_add(8))?).unwrap_or(i64::MIN);
        let c = decode(mem.read_word(pc.wrapping_add(16))?).unwrap_or(i64::MIN);

        if halted != 0 {
            return Ok(StepStatus::Halted);
        }
        if a < -1 {
            return Ok(StepStatus::Fault(StepFault::NegativeOperandA));
        }
        if b < -1 {
            return Ok(StepStatus::Fault(StepFault::NegativeOperandB));
        }
        if a == -1 && b == -1 {
            return Ok(StepStatus::Fault(StepFault::BothOperandsInput));
        }
        if a >= 0 && a as u64 > ram_size {
            return Ok(StepStatus::Fault(StepFault::OutOfRamA));
        }
        if b >= 0 && b as u64 > ram_size {
            return Ok(StepStatus::Fault(StepFault::OutOfRamB));
        }

        // a = -1: read the next input word into mem[b].
        if a == -1 {
            if ic.checked_sub(INPUT_BASE).map_or(false, |used| used > input_max) {
                return Ok(StepStatus::Fault(StepFault::InputOverflow));
            }
            let loaded = mem.read_word(ic)?;
            mem.write_word(b as u64 * 8, loaded)?;
            mem.write_word(IC_ADDR, ic.wrapping_add(8))?;
            mem.write_word(PC_ADDR, pc.wrapping_add(24))?;
            return Ok(StepStatus::Advanced);
        }

        let value_a = mem.read_word(a as u64 * 8)?;

        // b = -1: write mem[a] to the next output word. The write lands
        // before the overflow check, matching the reference machine.
        if b == -1 {
            mem.write_word(oc, value_a)?;
            if oc.checked_sub(OUTPUT_BASE).map_or(false, |used| used > output_max) {
                return Ok(StepStatus::Fault(StepFault::OutputOverflow));
            }
            mem.write_word(OC_ADDR, oc.wrapping_add(8))?;
            mem.write_word(PC_ADDR, pc.wrapping_add(24))?;
            return Ok(StepStatus::Advanced);
        }

        let value_b = mem.read_word(b as u64 * 8)?;
        let subtraction = decode(value_b)
            .unwrap_or(i64::MIN)
            .wrapping_sub(decode(value_a).unwrap_or(i64::MIN));
        mem.write_word(b as u64 * 8, encode(subtraction))?;
        if subtraction <= 0 {
            if c < 0 {
                mem.write_word(HALT_ADDR, encode(1))?;
                return Ok(StepStatus::Advanced);
            }
            if c as u64 > ram_size {
                return Ok(StepStatus::Fault(StepFault::OutOfRamC));
            }
            mem.write_word(PC_ADDR, c as u64 * 8)?;
            return Ok(StepStatus::Advanced);
        }
        mem.write_word(PC_ADDR, pc.wrapping_add(24))?;
        Ok(StepStatus::Advanced)
    }
}
