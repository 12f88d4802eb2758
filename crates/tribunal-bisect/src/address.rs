//! Binary bisection over memory-tree depth.
//!
//! The parties disagree about a memory root. Each round the challenger posts
//! the two child hashes of the current node; the claimer checks them against
//! its own memory and descends into the differing half. Once the node is
//! down to a small block of words, the challenger posts the literal words
//! (the "controversial phrase"), giving both sides a concrete, minimal point
//! of disagreement.

use serde::{Deserialize, Serialize};

use tribunal_core::addr::TREE_DEPTH;
use tribunal_core::clock::Timestamp;
use tribunal_core::hash::{combine, hash_word, H256};
use tribunal_core::{Error, PartyId, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressSearchState {
    /// Challenger must post the child hashes of the current node.
    WaitingHashes,
    /// Claimer must pick the differing half.
    WaitingQuery,
    /// Node reached phrase size; challenger must post the literal words.
    WaitingPhrase,
    /// Claimer timed out.
    ChallengerWon,
    /// Challenger timed out.
    ClaimerWon,
    /// The controversial phrase is on record.
    PhrasePosted,
}

impl AddressSearchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AddressSearchState::ChallengerWon
                | AddressSearchState::ClaimerWon
                | AddressSearchState::PhrasePosted
        )
    }
}

/// Interactive search narrowing a root disagreement to a block of words.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSearch {
    claimer: PartyId,
    challenger: PartyId,
    round_duration: u64,
    /// Number of words in the terminal block. Power of two.
    phrase_words: usize,
    state: AddressSearchState,
    deadline: Timestamp,
    /// Byte address of the first word under the current node.
    current_address: u64,
    /// Levels descended from the root.
    depth: usize,
    /// Challenger's claimed hash for the current node.
    expected_hash: H256,
    left_hash: Option<H256>,
    right_hash: Option<H256>,
    phrase: Option<Vec<u64>>,
}

impl AddressSearch {
    /// Open a search over the challenger's claimed `root`.
    pub fn new(
        claimer: PartyId,
        challenger: PartyId,
        root: H256,
        phrase_words: usize,
        round_duration: u64,
        now: Timestamp,
    ) -> Result<Self> {
        if claimer == challenger {
            return Err(Error::InvalidConfig("claimer and challenger must differ".into()));
        }
        if round_duration == 0 {
            return Err(Error::InvalidConfig("round duration must be positive".into()));
        }
        if !phrase_words.is_power_of_two() || phrase_words as u64 > (1 << TREE_DEPTH) / 2 {
            return Err(Error::InvalidConfig(format!(
                "phrase size {} must be a power of two below the tree size",
                phrase_words
            )));
        }
        Ok(Self {
            claimer,
            challenger,
            round_duration,
            phrase_words,
            state: AddressSearchState::WaitingHashes,
            deadline: now + round_duration,
            current_address: 0,
            depth: 0,
            expected_hash: root,
            left_hash: None,
            right_hash: None,
            phrase: None,
        })
    }

    pub fn state(&self) -> AddressSearchState {
        self.state
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    /// Byte address of the first word under the current node.
    pub fn current_address(&self) -> u64 {
        self.current_address
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Words in the current node.
    pub fn node_words(&self) -> u64 {
        1u64 << (TREE_DEPTH - self.depth)
    }

    pub fn posted_children(&self) -> Option<(H256, H256)> {
        Some((self.left_hash?, self.right_hash?))
    }

    /// The literal words of the controversial block, once posted.
    pub fn phrase(&self) -> Option<&[u64]> {
        self.phrase.as_deref()
    }

    fn ensure_active(&self, expected: AddressSearchState, op: &'static str) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::InstanceFinalized);
        }
        if self.state != expected {
            return Err(Error::WrongState(op));
        }
        Ok(())
    }

    /// Challenger posts the child hashes of the current node. They must
    /// combine to the hash it previously committed to for this node.
    pub fn reply_with_child_hashes(
        &mut self,
        caller: PartyId,
        left: H256,
        right: H256,
        now: Timestamp,
    ) -> Result<()> {
        self.ensure_active(AddressSearchState::WaitingHashes, "reply_with_child_hashes")?;
        if caller != self.challenger {
            return Err(Error::Unauthorized(caller));
        }
        if combine(&left, &right) != self.expected_hash {
            return Err(Error::ProofMismatch);
        }
        self.left_hash = Some(left);
        self.right_hash = Some(right);
        self.state = AddressSearchState::WaitingQuery;
        self.deadline = now + self.round_duration;
        tracing::debug!(target: "tribunal-bisect", depth = self.depth, "child hashes posted");
        Ok(())
    }

    /// Claimer descends into the half it disagrees with. `differing_hash`
    /// must restate the posted child on that side.
    pub fn narrow(
        &mut self,
        caller: PartyId,
        go_left: bool,
        differing_hash: H256,
        now: Timestamp,
    ) -> Result<()> {
        self.ensure_active(AddressSearchState::WaitingQuery, "narrow")?;
        if caller != self.claimer {
            return Err(Error::Unauthorized(caller));
        }
        let (left, right) = self.posted_children().ok_or(Error::WrongState("narrow"))?;
        let chosen = if go_left { left } else { right };
        if differing_hash != chosen {
            return Err(Error::ProofMismatch);
        }
        let half_words = self.node_words() / 2;
        if !go_left {
            self.current_address += half_words * 8;
        }
        self.depth += 1;
        self.expected_hash = chosen;
        self.left_hash = None;
        self.right_hash = None;
        self.state = if self.node_words() == self.phrase_words as u64 {
            AddressSearchState::WaitingPhrase
        } else {
            AddressSearchState::WaitingHashes
        };
        self.deadline = now + self.round_duration;
        tracing::debug!(
            target: "tribunal-bisect",
            depth = self.depth,
            address = self.current_address,
            "query posted"
        );
        Ok(())
    }

    /// Challenger posts the literal words of the terminal block. Their
    /// subtree root must equal the hash it committed to for this node.
    pub fn post_controversial_phrase(
        &mut self,
        caller: PartyId,
        words: &[u64],
        now: Timestamp,
    ) -> Result<()> {
        self.ensure_active(AddressSearchState::WaitingPhrase, "post_controversial_phrase")?;
        if caller != self.challenger {
            return Err(Error::Unauthorized(caller));
        }
        let _ = now;
        if words.len() != self.phrase_words {
            return Err(Error::InvalidConfig(format!(
                "expected {} words, got {}",
                self.phrase_words,
                words.len()
            )));
        }
        if phrase_root(words) != self.expected_hash {
            return Err(Error::ProofMismatch);
        }
        self.phrase = Some(words.to_vec());
        self.state = AddressSearchState::PhrasePosted;
        tracing::info!(
            target: "tribunal-bisect",
            address = self.current_address,
            "controversial phrase posted"
        );
        Ok(())
    }

    /// Win against a counterparty that missed its round deadline.
    pub fn claim_victory_by_time(&mut self, caller: PartyId, now: Timestamp) -> Result<()> {
        let winner_state = match self.state {
            AddressSearchState::WaitingHashes | AddressSearchState::WaitingPhrase
                if caller == self.claimer =>
            {
                AddressSearchState::ClaimerWon
            }
            AddressSearchState::WaitingQuery if caller == self.challenger => {
                AddressSearchState::ChallengerWon
            }
            s if !s.is_terminal() => return Err(Error::Unauthorized(caller)),
            _ => return Err(Error::InstanceFinalized),
        };
        if now <= self.deadline {
            return Err(Error::DeadlineNotReached);
        }
        self.state = winner_state;
        tracing::info!(target: "tribunal-bisect", winner = %caller, "challenge ended by timeout");
        Ok(())
    }

    /// Address of the first posted word that differs from the caller's own
    /// block, once the phrase is on record.
    pub fn isolate_disagreement(&self, local_words: &[u64]) -> Option<u64> {
        let phrase = self.phrase.as_ref()?;
        phrase
            .iter()
            .zip(local_words)
            .position(|(posted, local)| posted != local)
            .map(|i| self.current_address + i as u64 * 8)
    }
}

/// Root of a small all-materialized block of words.
fn phrase_root(words: &[u64]) -> H256 {
    let mut level: Vec<H256> = words.iter().map(|w| hash_word(*w)).collect();
    while level.len() > 1 {
        level = level.chunks(2).map(|pair| combine(&pair[0], &pair[1])).collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_memory::CommittedMemory;

    const ALICE: PartyId = PartyId(1); // claimer
    const BOB: PartyId = PartyId(2); // challenger

    /// Two memories identical except for one word high in the address
    /// space, mirroring a corrupted machine state.
    fn rigged_memories() -> (CommittedMemory, CommittedMemory, u64) {
        let mut alice = CommittedMemory::new();
        let mut bob = CommittedMemory::new();
        let bases = [0u64, 1024, 18_446_744_073_709_551_360];
        for base in bases {
            for i in 0..4u64 {
                alice.set(base + i * 8, 0x1111_1111_1111_1111).unwrap();
                bob.set(base + i * 8, 0x1111_1111_1111_1111).unwrap();
            }
        }
        let corrupted = 18_446_744_073_709_551_368;
        bob.set(corrupted, 0x1111_1111_1111_1112).unwrap();
        (alice, bob, corrupted)
    }

    fn child_hashes(mem: &CommittedMemory, search: &AddressSearch) -> (H256, H256) {
        let height = TREE_DEPTH - search.depth() - 1;
        let first = search.current_address() / 8;
        let mid = first + (search.node_words() / 2);
        (mem.subtree_root(first, height), mem.subtree_root(mid, height))
    }

    #[test]
    fn narrows_to_the_single_corrupted_word() {
        let (alice, bob, corrupted) = rigged_memories();
        let mut search = AddressSearch::new(ALICE, BOB, bob.root(), 4, 3600, 0).unwrap();

        while search.state() == AddressSearchState::WaitingHashes {
            let (left, right) = child_hashes(&bob, &search);
            search.reply_with_child_hashes(BOB, left, right, 0).unwrap();

            let (my_left, _) = child_hashes(&alice, &search);
            let go_left = my_left != left;
            let differing = if go_left { left } else { right };
            search.narrow(ALICE, go_left, differing, 0).unwrap();
        }

        assert_eq!(search.state(), AddressSearchState::WaitingPhrase);
        assert_eq!(search.node_words(), 4);
        assert_eq!(search.current_address(), 18_446_744_073_709_551_360);

        let words: Vec<u64> = (0..4)
            .map(|i| bob.get(search.current_address() + i * 8).unwrap())
            .collect();
        search.post_controversial_phrase(BOB, &words, 0).unwrap();
        assert_eq!(search.state(), AddressSearchState::PhrasePosted);

        let local: Vec<u64> = (0..4)
            .map(|i| alice.get(search.current_address() + i * 8).unwrap())
            .collect();
        assert_eq!(search.isolate_disagreement(&local), Some(corrupted));
    }

    #[test]
    fn phrase_must_hash_to_the_claimed_node() {
        let (alice, bob, _) = rigged_memories();
        let mut search = AddressSearch::new(ALICE, BOB, bob.root(), 4, 3600, 0).unwrap();
        while search.state() == AddressSearchState::WaitingHashes {
            let (left, right) = child_hashes(&bob, &search);
            search.reply_with_child_hashes(BOB, left, right, 0).unwrap();
            let (my_left, _) = child_hashes(&alice, &search);
            let go_left = my_left != left;
            search.narrow(ALICE, go_left, if go_left { left } else { right }, 0).unwrap();
        }
        // Posting alice's (differing) words does not match bob's commitment.
        let local: Vec<u64> = (0..4)
            .map(|i| alice.get(search.current_address() + i * 8).unwrap())
            .collect();
        assert_eq!(
            search.post_controversial_phrase(BOB, &local, 0),
            Err(Error::ProofMismatch)
        );
    }

    #[test]
    fn children_must_combine_to_the_parent() {
        let (_, bob, _) = rigged_memories();
        let mut search = AddressSearch::new(ALICE, BOB, bob.root(), 4, 3600, 0).unwrap();
        assert_eq!(
            search.reply_with_child_hashes(BOB, [0; 32], [1; 32], 0),
            Err(Error::ProofMismatch)
        );
    }

    #[test]
    fn timeout_is_symmetric() {
        let (_, bob, _) = rigged_memories();
        let mut search = AddressSearch::new(ALICE, BOB, bob.root(), 4, 3600, 0).unwrap();
        assert_eq!(search.claim_victory_by_time(BOB, 5000), Err(Error::Unauthorized(BOB)));
        assert_eq!(search.claim_victory_by_time(ALICE, 3600), Err(Error::DeadlineNotReached));
        search.claim_victory_by_time(ALICE, 3700).unwrap();
        assert_eq!(search.state(), AddressSearchState::ClaimerWon);
        assert_eq!(search.claim_victory_by_time(ALICE, 9999), Err(Error::InstanceFinalized));
    }

    #[test]
    fn silent_challenger_loses_the_phrase_by_timeout() {
        let (alice, bob, _) = rigged_memories();
        let mut search = AddressSearch::new(ALICE, BOB, bob.root(), 4, 3600, 0).unwrap();
        let mut now = 0;
        while search.state() == AddressSearchState::WaitingHashes {
            let (left, right) = child_hashes(&bob, &search);
            search.reply_with_child_hashes(BOB, left, right, now).unwrap();
            let (my_left, _) = child_hashes(&alice, &search);
            let go_left = my_left != left;
            now += 10;
            search.narrow(ALICE, go_left, if go_left { left } else { right }, now).unwrap();
        }
        assert_eq!(search.state(), AddressSearchState::WaitingPhrase);

        // The phrase is the challenger's move, so only the claimer can run
        // out the clock here.
        assert_eq!(
            search.claim_victory_by_time(BOB, now + 9999),
            Err(Error::Unauthorized(BOB))
        );
        assert_eq!(
            search.claim_victory_by_time(ALICE, search.deadline()),
            Err(Error::DeadlineNotReached)
        );
        search.claim_victory_by_time(ALICE, search.deadline() + 1).unwrap();
        assert_eq!(search.state(), AddressSearchState::ClaimerWon);
        assert_eq!(
            search.post_controversial_phrase(BOB, &[0; 4], now),
            Err(Error::InstanceFinalized)
        );
    }

    #[test]
    fn config_validation() {
        let root = [0u8; 32];
        assert!(matches!(
            AddressSearch::new(ALICE, ALICE, root, 4, 3600, 0),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            AddressSearch::new(ALICE, BOB, root, 3, 3600, 0),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            AddressSearch::new(ALICE, BOB, root, 4, 0, 3600),
            Err(Error::InvalidConfig(_))
        ));
    }
}
