//! Merkle inclusion proofs for single memory words.

use serde::{Deserialize, Serialize};

use tribunal_core::addr::{word_index, TREE_DEPTH};
use tribunal_core::hash::{combine, hash_word, H256};
use tribunal_core::{Error, Result};

/// Sibling path authenticating one word against a memory root.
///
/// Siblings are ordered leaf to root: `siblings[i]` is the root of the
/// sibling subtree of the word's ancestor at height `i`. The same proof that
/// verifies an old value can recompute the root for a new value at the same
/// position, which is how the replica updates its running root without
/// walking the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    siblings: Vec<H256>,
}

impl MerkleProof {
    /// Build a proof from a leaf-to-root sibling list.
    ///
    /// Fails with `InvalidConfig` unless exactly `TREE_DEPTH` siblings are
    /// supplied.
    pub fn new(siblings: Vec<H256>) -> Result<Self> {
        if siblings.len() != TREE_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "merkle proof must have {} siblings, got {}",
                TREE_DEPTH,
                siblings.len()
            )));
        }
        Ok(Self { siblings })
    }

    pub fn siblings(&self) -> &[H256] {
        &self.siblings
    }

    /// Root implied by placing `value` at `addr` under this sibling path.
    pub fn root_with(&self, addr: u64, value: u64) -> Result<H256> {
        let index = word_index(addr)?;
        let mut running = hash_word(value);
        for (level, sibling) in self.siblings.iter().enumerate() {
            running = if (index >> level) & 1 == 0 {
                combine(&running, sibling)
            } else {
                combine(sibling, &running)
            };
        }
        Ok(running)
    }

    /// Whether this proof places `value` at `addr` under `root`.
    pub fn verify(&self, addr: u64, value: u64, root: &H256) -> Result<bool> {
        Ok(self.root_with(addr, value)? == *root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precomputed::EMPTY_SUBTREE;

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            MerkleProof::new(vec![[0u8; 32]; 60]),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn all_empty_siblings_give_empty_root_for_zero_word() {
        let proof = MerkleProof::new(EMPTY_SUBTREE[..TREE_DEPTH].to_vec()).unwrap();
        assert!(proof.verify(0, 0, &EMPTY_SUBTREE[TREE_DEPTH]).unwrap());
        assert!(!proof.verify(0, 1, &EMPTY_SUBTREE[TREE_DEPTH]).unwrap());
    }

    #[test]
    fn misaligned_address_is_rejected() {
        let proof = MerkleProof::new(EMPTY_SUBTREE[..TREE_DEPTH].to_vec()).unwrap();
        assert_eq!(proof.root_with(12, 0), Err(Error::MisalignedAddress(12)));
    }
}
