//! SHA-256 hashing for memory words and interior tree nodes.

use sha2::{Digest, Sha256};

/// 256-bit hash type.
pub type H256 = [u8; 32];

/// Size of a hash in bytes (SHA256).
pub const HASH_SIZE: usize = 32;

/// Hash of a single memory word.
///
/// Words are hashed as their 8 big-endian bytes, so the leaf hash of an
/// untouched (zero) word equals `hash_word(0)`.
pub fn hash_word(value: u64) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(value.to_be_bytes());
    hasher.finalize().into()
}

/// Hash of an interior node from its two child hashes.
pub fn combine(left: &H256, right: &H256) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Render a hash as lowercase hex.
pub fn to_hex(hash: &H256) -> String {
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_word_is_stable() {
        assert_eq!(hash_word(7), hash_word(7));
        assert_ne!(hash_word(7), hash_word(8));
    }

    #[test]
    fn combine_is_order_sensitive() {
        let a = hash_word(1);
        let b = hash_word(2);
        assert_ne!(combine(&a, &b), combine(&b, &a));
    }

    #[test]
    fn to_hex_renders_full_width() {
        assert_eq!(to_hex(&hash_word(0)).len(), 64);
    }
}
