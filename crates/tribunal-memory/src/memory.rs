//! Sparse word-addressable committed memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tribunal_core::addr::{word_index, TREE_DEPTH};
use tribunal_core::hash::{combine, hash_word, H256};
use tribunal_core::Result;

use crate::precomputed::EMPTY_SUBTREE;
use crate::proof::MerkleProof;

/// Sparse memory over the full `2^64`-byte space, committed to by a single
/// depth-61 Merkle root.
///
/// Only non-zero words are materialized; a word that was never set is
/// logically zero. The root is a pure function of the set of (address,
/// non-zero value) pairs, independent of insertion order: writing zero
/// removes the entry so the empty representation stays canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedMemory {
    words: BTreeMap<u64, u64>,
}

impl CommittedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the word at `addr`, zero if never set.
    pub fn get(&self, addr: u64) -> Result<u64> {
        let index = word_index(addr)?;
        Ok(self.words.get(&index).copied().unwrap_or(0))
    }

    /// Store `value` at `addr`. Writing zero removes the entry.
    pub fn set(&mut self, addr: u64, value: u64) -> Result<()> {
        let index = word_index(addr)?;
        if value == 0 {
            self.words.remove(&index);
        } else {
            self.words.insert(index, value);
        }
        Ok(())
    }

    /// Number of materialized (non-zero) words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterate materialized words as (byte address, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.words.iter().map(|(index, value)| (index * 8, *value))
    }

    /// Root hash of the whole memory.
    pub fn root(&self) -> H256 {
        self.subtree_root(0, TREE_DEPTH)
    }

    /// Root of the subtree of `height` levels whose first leaf is
    /// `first_index`.
    ///
    /// Empty subtrees resolve to the precomputed constant for their height,
    /// so cost is proportional to the number of materialized words, not the
    /// address space.
    pub fn subtree_root(&self, first_index: u64, height: usize) -> H256 {
        let count = 1u64 << height;
        if self.words.range(first_index..first_index + count).next().is_none() {
            return EMPTY_SUBTREE[height];
        }
        if height == 0 {
            return hash_word(self.words[&first_index]);
        }
        let mid = first_index + (count >> 1);
        combine(
            &self.subtree_root(first_index, height - 1),
            &self.subtree_root(mid, height - 1),
        )
    }

    /// Inclusion proof for the word at `addr`, ordered leaf to root.
    pub fn generate_proof(&self, addr: u64) -> Result<MerkleProof> {
        let index = word_index(addr)?;
        let mut siblings = Vec::with_capacity(TREE_DEPTH);
        for level in 0..TREE_DEPTH {
            let sibling_index = (index >> level) ^ 1;
            siblings.push(self.subtree_root(sibling_index << level, level));
        }
        MerkleProof::new(siblings)
    }

    /// Whether `proof` places `value` at `addr` under the current root.
    pub fn verify_proof(&self, addr: u64, value: u64, proof: &MerkleProof) -> Result<bool> {
        proof.verify(addr, value, &self.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use rand::seq::SliceRandom;
    use tribunal_core::Error;

    #[test]
    fn untouched_memory_has_empty_root() {
        assert_eq!(CommittedMemory::new().root(), EMPTY_SUBTREE[TREE_DEPTH]);
    }

    #[test]
    fn zero_default_reads() {
        let mem = CommittedMemory::new();
        assert_eq!(mem.get(0).unwrap(), 0);
        assert_eq!(mem.get(0xffff_ffff_ffff_fff8).unwrap(), 0);
    }

    #[test]
    fn misaligned_and_unaligned_boundaries() {
        let mut mem = CommittedMemory::new();
        assert_eq!(mem.get(4), Err(Error::MisalignedAddress(4)));
        assert_eq!(mem.set(17, 1), Err(Error::MisalignedAddress(17)));
    }

    #[test]
    fn proof_round_trip_across_sparse_addresses() {
        let mut mem = CommittedMemory::new();
        let values = [
            (0u64, 0x0000_0000_0030_0001u64),
            (180_008, 0x0000_0000_0000_c030),
            (u64::MAX - 7, 0x0000_0000_000f_00a0),
        ];
        for (addr, value) in values {
            mem.set(addr, value).unwrap();
        }
        for (addr, value) in values {
            let proof = mem.generate_proof(addr).unwrap();
            assert!(mem.verify_proof(addr, value, &proof).unwrap());
            assert!(!mem.verify_proof(addr, value ^ 1, &proof).unwrap());
        }
    }

    #[test]
    fn zero_proofs_for_untouched_addresses() {
        let mut mem = CommittedMemory::new();
        mem.set(0, 0x1111_1111_1111_1111).unwrap();
        for addr in [283_888u64, 2_838_918_800, u64::MAX - 15] {
            let proof = mem.generate_proof(addr).unwrap();
            assert!(mem.verify_proof(addr, 0, &proof).unwrap());
        }
    }

    #[test]
    fn tampered_proof_fails() {
        let mut mem = CommittedMemory::new();
        mem.set(888 * 8, 7).unwrap();
        let proof = mem.generate_proof(888 * 8).unwrap();
        let mut siblings = proof.siblings().to_vec();
        siblings[2] = [0xfe; 32];
        let bad = MerkleProof::new(siblings).unwrap();
        assert!(!mem.verify_proof(888 * 8, 7, &bad).unwrap());
    }

    #[test]
    fn root_is_independent_of_write_order() {
        let writes = (0u64..40)
            .map(|i| (i * 1_000 * 8, i.wrapping_mul(0x9e37_79b9_7f4a_7c15)))
            .collect_vec();

        let mut forward = CommittedMemory::new();
        for (addr, value) in &writes {
            forward.set(*addr, *value).unwrap();
        }

        let mut rng = rand::rng();
        for _ in 0..5 {
            let mut shuffled = writes.clone();
            shuffled.shuffle(&mut rng);
            let mut mem = CommittedMemory::new();
            for (addr, value) in shuffled {
                mem.set(addr, value).unwrap();
            }
            assert_eq!(mem.root(), forward.root());
        }
    }

    #[test]
    fn zero_write_is_a_root_noop() {
        let mut mem = CommittedMemory::new();
        mem.set(0, 0x1111_1111_1111_1111).unwrap();
        let before = mem.root();
        mem.set(8, 0).unwrap();
        assert_eq!(mem.root(), before);
        assert!(mem.len() == 1);
    }

    #[test]
    fn overwriting_with_zero_restores_prior_root() {
        let mut mem = CommittedMemory::new();
        mem.set(64, 42).unwrap();
        let with_one = mem.root();
        mem.set(128, 43).unwrap();
        mem.set(128, 0).unwrap();
        assert_eq!(mem.root(), with_one);
    }
}
