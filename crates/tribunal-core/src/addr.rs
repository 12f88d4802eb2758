//! Address contract of the committed memory space.
//!
//! Memory is word addressable over the full 64-bit byte space: words are
//! 8 bytes wide and live at 8-byte-aligned addresses, giving `2^61` word
//! leaves under a tree of depth 61.

use crate::error::{Error, Result};

/// Width of a memory word in bytes.
pub const WORD_BYTES: u64 = 8;

/// Depth of the committed memory tree: `2^61` word leaves cover the
/// `2^64`-byte address space.
pub const TREE_DEPTH: usize = 61;

/// Whether an address is word aligned.
pub fn is_aligned(addr: u64) -> bool {
    addr % WORD_BYTES == 0
}

/// Convert a byte address into its word (leaf) index.
///
/// Fails with `MisalignedAddress` when the address is not a multiple of the
/// word size.
pub fn word_index(addr: u64) -> Result<u64> {
    if !is_aligned(addr) {
        return Err(Error::MisalignedAddress(addr));
    }
    Ok(addr / WORD_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_addresses_index_consecutively() {
        assert_eq!(word_index(0).unwrap(), 0);
        assert_eq!(word_index(8).unwrap(), 1);
        assert_eq!(word_index(u64::MAX - 7).unwrap(), (1 << TREE_DEPTH) - 1);
    }

    #[test]
    fn misaligned_addresses_are_rejected() {
        assert_eq!(word_index(4), Err(Error::MisalignedAddress(4)));
        assert_eq!(word_index(9), Err(Error::MisalignedAddress(9)));
    }
}
