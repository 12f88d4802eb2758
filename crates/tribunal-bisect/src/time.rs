//! Fan-out bisection over execution time.
//!
//! The challenger answers each round's probe times with its claimed state
//! roots; the claimer compares them against its own history and either
//! narrows the interval or, once two adjacent steps are on record, presents
//! the divergence. Missing a round deadline loses the instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tribunal_core::clock::Timestamp;
use tribunal_core::hash::{to_hex, H256};
use tribunal_core::{Error, PartyId, Result};

/// Smallest permitted fan-out.
pub const MIN_QUERY_SIZE: usize = 3;
/// Largest permitted fan-out.
pub const MAX_QUERY_SIZE: usize = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSearchState {
    /// Challenger must answer the probe times with hashes.
    WaitingHashes,
    /// Claimer must narrow the interval or present the divergence.
    WaitingQuery,
    /// Claimer timed out.
    ChallengerWon,
    /// Challenger timed out.
    ClaimerWon,
    /// Adjacent steps with agreement before and disagreement after were
    /// found.
    DivergenceFound,
}

impl TimeSearchState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TimeSearchState::WaitingHashes | TimeSearchState::WaitingQuery)
    }
}

/// Interactive search for the earliest step where two claimed histories
/// diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSearch {
    claimer: PartyId,
    challenger: PartyId,
    initial_hash: H256,
    claimer_final_hash: H256,
    final_time: u64,
    query_size: usize,
    round_duration: u64,
    state: TimeSearchState,
    deadline: Timestamp,
    probe_times: Vec<u64>,
    /// Every (time, hash) the challenger has posted, across all rounds.
    posted: BTreeMap<u64, H256>,
    divergence_time: Option<u64>,
}

impl TimeSearch {
    /// Open a search over `[0, final_time]`.
    ///
    /// The challenger is expected to answer the first probe round before
    /// `now + round_duration`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        claimer: PartyId,
        challenger: PartyId,
        initial_hash: H256,
        claimer_final_hash: H256,
        final_time: u64,
        query_size: usize,
        round_duration: u64,
        now: Timestamp,
    ) -> Result<Self> {
        if claimer == challenger {
            return Err(Error::InvalidConfig("claimer and challenger must differ".into()));
        }
        if final_time == 0 {
            return Err(Error::InvalidConfig("final time must be positive".into()));
        }
        if !(MIN_QUERY_SIZE..=MAX_QUERY_SIZE).contains(&query_size) {
            return Err(Error::InvalidConfig(format!(
                "query size {} outside [{}, {}]",
                query_size, MIN_QUERY_SIZE, MAX_QUERY_SIZE
            )));
        }
        if round_duration == 0 {
            return Err(Error::InvalidConfig("round duration must be positive".into()));
        }
        let search = Self {
            claimer,
            challenger,
            initial_hash,
            claimer_final_hash,
            final_time,
            query_size,
            round_duration,
            state: TimeSearchState::WaitingHashes,
            deadline: now + round_duration,
            probe_times: probe_times(0, final_time, query_size),
            posted: BTreeMap::new(),
            divergence_time: None,
        };
        tracing::info!(
            target: "tribunal-bisect",
            final_time,
            query_size,
            "time search created"
        );
        Ok(search)
    }

    pub fn state(&self) -> TimeSearchState {
        self.state
    }

    pub fn claimer(&self) -> PartyId {
        self.claimer
    }

    pub fn challenger(&self) -> PartyId {
        self.challenger
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    /// Probe times of the current round.
    pub fn probe_times(&self) -> &[u64] {
        &self.probe_times
    }

    /// Hash the challenger posted for `time`, if any.
    pub fn posted_hash(&self, time: u64) -> Option<&H256> {
        self.posted.get(&time)
    }

    /// Step where the divergence was presented, once terminal.
    pub fn divergence_time(&self) -> Option<u64> {
        self.divergence_time
    }

    fn ensure_active(&self, expected: TimeSearchState, op: &'static str) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::InstanceFinalized);
        }
        if self.state != expected {
            return Err(Error::WrongState(op));
        }
        Ok(())
    }

    /// Challenger answers the current probe times with its claimed hashes,
    /// one per probe, ordered to match `probe_times`.
    pub fn reply_with_probe_hashes(
        &mut self,
        caller: PartyId,
        hashes: &[H256],
        now: Timestamp,
    ) -> Result<()> {
        self.ensure_active(TimeSearchState::WaitingHashes, "reply_with_probe_hashes")?;
        if caller != self.challenger {
            return Err(Error::Unauthorized(caller));
        }
        if hashes.len() != self.probe_times.len() {
            return Err(Error::InvalidConfig(format!(
                "expected {} hashes, got {}",
                self.probe_times.len(),
                hashes.len()
            )));
        }
        for (time, hash) in self.probe_times.iter().zip(hashes) {
            self.posted.insert(*time, *hash);
        }
        self.state = TimeSearchState::WaitingQuery;
        self.deadline = now + self.round_duration;
        tracing::debug!(target: "tribunal-bisect", probes = hashes.len(), "hashes posted");
        Ok(())
    }

    /// Claimer narrows the search to `[left, right]`, which must be the
    /// `j`-th and `j+1`-th probe times of the round just answered.
    pub fn narrow_interval(
        &mut self,
        caller: PartyId,
        j: usize,
        left: u64,
        right: u64,
        now: Timestamp,
    ) -> Result<()> {
        self.ensure_active(TimeSearchState::WaitingQuery, "narrow_interval")?;
        if caller != self.claimer {
            return Err(Error::Unauthorized(caller));
        }
        if j + 1 >= self.probe_times.len()
            || self.probe_times[j] != left
            || self.probe_times[j + 1] != right
        {
            return Err(Error::InvalidConfig(format!(
                "[{}, {}] is not the probe pair at index {}",
                left, right, j
            )));
        }
        if right == left + 1 {
            return Err(Error::InvalidConfig(
                "interval is unitary, present the divergence instead".into(),
            ));
        }
        self.probe_times = probe_times(left, right, self.query_size);
        self.state = TimeSearchState::WaitingHashes;
        self.deadline = now + self.round_duration;
        tracing::debug!(target: "tribunal-bisect", left, right, "query posted");
        Ok(())
    }

    /// Claimer presents `time` as the last step of agreement.
    ///
    /// Succeeds only when the challenger has posted hashes for both `time`
    /// and `time + 1`, which first happens once an interval became unitary.
    pub fn present_divergence(&mut self, caller: PartyId, time: u64, now: Timestamp) -> Result<()> {
        self.ensure_active(TimeSearchState::WaitingQuery, "present_divergence")?;
        if caller != self.claimer {
            return Err(Error::Unauthorized(caller));
        }
        let _ = now;
        if !self.posted.contains_key(&time) || !self.posted.contains_key(&(time + 1)) {
            return Err(Error::InvalidConfig(format!(
                "steps {} and {} were not both answered",
                time,
                time + 1
            )));
        }
        self.divergence_time = Some(time);
        self.state = TimeSearchState::DivergenceFound;
        tracing::info!(
            target: "tribunal-bisect",
            time,
            before = %to_hex(&self.posted[&time]),
            after = %to_hex(&self.posted[&(time + 1)]),
            "divergence found"
        );
        Ok(())
    }

    /// Win against a counterparty that missed its round deadline.
    pub fn claim_victory_by_time(&mut self, caller: PartyId, now: Timestamp) -> Result<()> {
        let winner_state = match self.state {
            TimeSearchState::WaitingHashes if caller == self.claimer => TimeSearchState::ClaimerWon,
            TimeSearchState::WaitingQuery if caller == self.challenger => {
                TimeSearchState::ChallengerWon
            }
            TimeSearchState::WaitingHashes | TimeSearchState::WaitingQuery => {
                return Err(Error::Unauthorized(caller));
            }
            _ => return Err(Error::InstanceFinalized),
        };
        if now <= self.deadline {
            return Err(Error::DeadlineNotReached);
        }
        self.state = winner_state;
        tracing::info!(target: "tribunal-bisect", winner = %caller, "challenge ended by timeout");
        Ok(())
    }

    /// Hashes bracketing the divergence, once found.
    pub fn divergence_hashes(&self) -> Option<(H256, H256)> {
        let time = self.divergence_time?;
        Some((*self.posted.get(&time)?, *self.posted.get(&(time + 1))?))
    }

    /// Hash the claimer committed to for the final step.
    pub fn claimer_final_hash(&self) -> H256 {
        self.claimer_final_hash
    }

    /// Hash both parties agreed on for step zero.
    pub fn initial_hash(&self) -> H256 {
        self.initial_hash
    }
}

/// `k` probe times over `[lo, hi]`, first `lo`, last `hi`, strictly
/// increasing. Degenerates to every step when the interval is smaller than
/// the fan-out.
fn probe_times(lo: u64, hi: u64, k: usize) -> Vec<u64> {
    let span = hi - lo;
    if span <= k as u64 - 1 {
        return (lo..=hi).collect();
    }
    // u128 keeps the interpolation exact near the top of the u64 range.
    (0..k as u128)
        .map(|i| lo + (span as u128 * i / (k as u128 - 1)) as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_core::hash::combine;

    const ALICE: PartyId = PartyId(1); // claimer
    const BOB: PartyId = PartyId(2); // challenger

    /// Iterated-hash history with a mistake injected after `last_agreement`.
    fn histories(final_time: u64, last_agreement: u64) -> (Vec<H256>, Vec<H256>) {
        let mut alice = vec![[0x11u8; 32]];
        let mut bob = vec![[0x11u8; 32]];
        for i in 0..final_time {
            let a = *alice.last().unwrap();
            alice.push(combine(&a, &a));
            let b = *bob.last().unwrap();
            let next = combine(&b, &b);
            bob.push(if i >= last_agreement { combine(&next, &[0xfe; 32]) } else { next });
        }
        (alice, bob)
    }

    fn run_to_divergence(
        final_time: u64,
        query_size: usize,
        last_agreement: u64,
    ) -> (TimeSearch, usize) {
        let (alice, bob) = histories(final_time, last_agreement);
        let mut search = TimeSearch::new(
            ALICE,
            BOB,
            alice[0],
            alice[final_time as usize],
            final_time,
            query_size,
            3600,
            0,
        )
        .unwrap();

        let mut rounds = 0;
        loop {
            let times = search.probe_times().to_vec();
            let hashes: Vec<H256> = times.iter().map(|t| bob[*t as usize]).collect();
            search.reply_with_probe_hashes(BOB, &hashes, 0).unwrap();

            // Last probe index where alice still agrees with bob's reply.
            let j = (0..times.len() - 1)
                .take_while(|i| alice[times[*i] as usize] == hashes[*i])
                .last()
                .unwrap();

            if times[j + 1] == times[j] + 1 {
                search.present_divergence(ALICE, times[j], 0).unwrap();
                return (search, rounds);
            }
            search.narrow_interval(ALICE, j, times[j], times[j + 1], 0).unwrap();
            rounds += 1;
        }
    }

    #[test]
    fn finds_injected_divergence() {
        let (search, _) = run_to_divergence(50_000, 3, 1_234);
        assert_eq!(search.state(), TimeSearchState::DivergenceFound);
        assert_eq!(search.divergence_time(), Some(1_234));
    }

    #[test]
    fn finds_divergence_at_random_steps() {
        let mut rng = rand::rng();
        for _ in 0..8 {
            let last_agreement = rand::Rng::random_range(&mut rng, 0..49_999);
            let (search, _) = run_to_divergence(50_000, 5, last_agreement);
            assert_eq!(search.divergence_time(), Some(last_agreement));
        }
    }

    #[test]
    fn round_bound_holds() {
        let final_time = 50_000u64;
        let k = 3usize;
        let (_, rounds) = run_to_divergence(final_time, k, 17);
        // ceil(log_{k-1}(final_time))
        let bound = (final_time as f64).log((k - 1) as f64).ceil() as usize;
        assert!(rounds <= bound, "{} rounds exceeds bound {}", rounds, bound);
    }

    #[test]
    fn config_validation() {
        let zero = [0u8; 32];
        assert!(matches!(
            TimeSearch::new(ALICE, ALICE, zero, zero, 10, 3, 3600, 0),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TimeSearch::new(ALICE, BOB, zero, zero, 0, 3, 3600, 0),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TimeSearch::new(ALICE, BOB, zero, zero, 10, 2, 3600, 0),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TimeSearch::new(ALICE, BOB, zero, zero, 10, 100, 3600, 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn timeout_windows() {
        let zero = [0u8; 32];
        let mut search = TimeSearch::new(ALICE, BOB, zero, [1; 32], 50_000, 3, 3600, 0).unwrap();

        // Challenger is the one expected to act; it cannot claim.
        assert_eq!(search.claim_victory_by_time(BOB, 4000), Err(Error::Unauthorized(BOB)));
        // Too early for the claimer.
        assert_eq!(search.claim_victory_by_time(ALICE, 3500), Err(Error::DeadlineNotReached));
        // Past the deadline it works and is permanent.
        search.claim_victory_by_time(ALICE, 3700).unwrap();
        assert_eq!(search.state(), TimeSearchState::ClaimerWon);
        assert_eq!(
            search.claim_victory_by_time(ALICE, 4000),
            Err(Error::InstanceFinalized)
        );
        assert_eq!(
            search.reply_with_probe_hashes(BOB, &[zero; 3], 4000),
            Err(Error::InstanceFinalized)
        );
    }

    #[test]
    fn challenger_wins_when_claimer_stalls() {
        let zero = [0u8; 32];
        let mut search = TimeSearch::new(ALICE, BOB, zero, [1; 32], 100, 3, 3600, 0).unwrap();
        let hashes: Vec<H256> = search.probe_times().iter().map(|_| [2; 32]).collect();
        search.reply_with_probe_hashes(BOB, &hashes, 10).unwrap();
        assert_eq!(search.claim_victory_by_time(BOB, 3600), Err(Error::DeadlineNotReached));
        search.claim_victory_by_time(BOB, 3700).unwrap();
        assert_eq!(search.state(), TimeSearchState::ChallengerWon);
    }

    #[test]
    fn wrong_party_and_wrong_state_are_rejected() {
        let zero = [0u8; 32];
        let mut search = TimeSearch::new(ALICE, BOB, zero, [1; 32], 100, 3, 3600, 0).unwrap();
        let hashes = vec![[2u8; 32]; search.probe_times().len()];
        // Claimer may not answer probes.
        assert_eq!(
            search.reply_with_probe_hashes(ALICE, &hashes, 0),
            Err(Error::Unauthorized(ALICE))
        );
        // Narrowing before hashes are posted is a state error.
        assert_eq!(
            search.narrow_interval(ALICE, 0, 0, 50, 0),
            Err(Error::WrongState("narrow_interval"))
        );
        search.reply_with_probe_hashes(BOB, &hashes, 0).unwrap();
        // Probe pair must match the round.
        assert!(matches!(
            search.narrow_interval(ALICE, 0, 1, 49, 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn snapshot_round_trip_continues_identically() {
        let (alice, bob) = histories(1000, 321);
        let mut search =
            TimeSearch::new(ALICE, BOB, alice[0], alice[1000], 1000, 3, 3600, 0).unwrap();
        let times = search.probe_times().to_vec();
        let hashes: Vec<H256> = times.iter().map(|t| bob[*t as usize]).collect();
        search.reply_with_probe_hashes(BOB, &hashes, 0).unwrap();

        let bytes = bincode::serialize(&search).unwrap();
        let mut restored: TimeSearch = bincode::deserialize(&bytes).unwrap();

        let j = (0..times.len() - 1)
            .take_while(|i| alice[times[*i] as usize] == hashes[*i])
            .last()
            .unwrap();
        search.narrow_interval(ALICE, j, times[j], times[j + 1], 0).unwrap();
        restored.narrow_interval(ALICE, j, times[j], times[j + 1], 0).unwrap();
        assert_eq!(search.probe_times(), restored.probe_times());
        assert_eq!(search.state(), restored.state());
    }
}
