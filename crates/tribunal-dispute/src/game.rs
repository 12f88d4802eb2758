//! The dispute game proper.
//!
//! Lifecycle: both parties stake and commit to (initial root, final root,
//! step count); a time bisection narrows the disagreement to one step; a
//! proof-carrying replica replays that step; the produced root decides the
//! winner. Silence at any stage loses by timeout.

use serde::{Deserialize, Serialize};

use tribunal_bisect::{AddressSearch, TimeSearch};
use tribunal_core::clock::Timestamp;
use tribunal_core::hash::{to_hex, H256};
use tribunal_core::{Error, PartyId, Result, Role};
use tribunal_memory::{MerkleProof, ProofCarryingReplica};
use tribunal_machine::StepOracle;

use crate::escrow::Escrow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameConfig {
    pub claimer: PartyId,
    pub challenger: PartyId,
    /// Stake each party locks at commit time.
    pub stake: u64,
    /// Seconds a party has to answer in any waiting state.
    pub round_duration: u64,
    /// Fan-out of the time bisection.
    pub query_size: usize,
    /// Terminal block size of the address search, in words.
    pub phrase_words: usize,
}

/// A party's staked claim about the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub initial_root: H256,
    pub final_root: H256,
    pub step_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    AwaitingCommit,
    TimeBisection,
    StepReplay,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeReason {
    /// Opponent never committed.
    CommitTimeout,
    /// Opponent missed a bisection round deadline.
    BisectionTimeout,
    /// Claimer went silent during replay.
    ReplayTimeout,
    /// A submitted inclusion proof did not verify.
    ProofViolation,
    /// The replay strayed from the authenticated footprint.
    ReplayDivergence,
    /// The replayed root equals the challenger's claim.
    RootMatched,
    /// The replayed root refutes the challenger's claim.
    RootMismatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub winner: PartyId,
    pub loser: PartyId,
    pub reason: OutcomeReason,
}

/// One two-party dispute, from commitment to settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeGame {
    config: GameConfig,
    state: GameState,
    claimer_commitment: Option<Commitment>,
    challenger_commitment: Option<Commitment>,
    commit_deadline: Timestamp,
    time_search: Option<TimeSearch>,
    address_search: Option<AddressSearch>,
    replica: Option<ProofCarryingReplica>,
    /// The challenger's claimed root one step past the divergence; the
    /// replayed root is judged against it.
    expected_after: Option<H256>,
    divergence_time: Option<u64>,
    replay_deadline: Timestamp,
    outcome: Option<Outcome>,
    paid: bool,
}

impl DisputeGame {
    pub fn new(config: GameConfig, now: Timestamp) -> Result<Self> {
        if config.claimer == config.challenger {
            return Err(Error::InvalidConfig("claimer and challenger must differ".into()));
        }
        if config.stake == 0 {
            return Err(Error::InvalidConfig("stake must be positive".into()));
        }
        if config.round_duration == 0 {
            return Err(Error::InvalidConfig("round duration must be positive".into()));
        }
        if !(tribunal_bisect::time::MIN_QUERY_SIZE..=tribunal_bisect::time::MAX_QUERY_SIZE)
            .contains(&config.query_size)
        {
            return Err(Error::InvalidConfig(format!(
                "query size {} out of range",
                config.query_size
            )));
        }
        if !config.phrase_words.is_power_of_two() {
            return Err(Error::InvalidConfig("phrase size must be a power of two".into()));
        }
        tracing::info!(
            target: "tribunal-dispute",
            claimer = %config.claimer,
            challenger = %config.challenger,
            stake = config.stake,
            "dispute created"
        );
        Ok(Self {
            commit_deadline: now + config.round_duration,
            config,
            state: GameState::AwaitingCommit,
            claimer_commitment: None,
            challenger_commitment: None,
            time_search: None,
            address_search: None,
            replica: None,
            expected_after: None,
            divergence_time: None,
            replay_deadline: 0,
            outcome: None,
            paid: false,
        })
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn role_of(&self, party: PartyId) -> Option<Role> {
        if party == self.config.claimer {
            Some(Role::Claimer)
        } else if party == self.config.challenger {
            Some(Role::Challenger)
        } else {
            None
        }
    }

    pub fn commitment_of(&self, party: PartyId) -> Option<&Commitment> {
        if party == self.config.claimer {
            self.claimer_commitment.as_ref()
        } else if party == self.config.challenger {
            self.challenger_commitment.as_ref()
        } else {
            None
        }
    }

    pub fn time_search(&self) -> Option<&TimeSearch> {
        self.time_search.as_ref()
    }

    pub fn address_search(&self) -> Option<&AddressSearch> {
        self.address_search.as_ref()
    }

    pub fn replica(&self) -> Option<&ProofCarryingReplica> {
        self.replica.as_ref()
    }

    pub fn divergence_time(&self) -> Option<u64> {
        self.divergence_time
    }

    fn opponent(&self, party: PartyId) -> PartyId {
        if party == self.config.claimer {
            self.config.challenger
        } else {
            self.config.claimer
        }
    }

    fn ensure_party(&self, caller: PartyId) -> Result<()> {
        if caller != self.config.claimer && caller != self.config.challenger {
            return Err(Error::Unauthorized(caller));
        }
        Ok(())
    }

    fn ensure_state(&self, expected: GameState, op: &'static str) -> Result<()> {
        match self.state {
            s if s == expected => Ok(()),
            GameState::Settled => Err(Error::InstanceFinalized),
            _ => Err(Error::WrongState(op)),
        }
    }

    fn settle(&mut self, winner: PartyId, reason: OutcomeReason) {
        let loser = self.opponent(winner);
        self.outcome = Some(Outcome { winner, loser, reason });
        self.state = GameState::Settled;
        tracing::info!(
            target: "tribunal-dispute",
            winner = %winner,
            loser = %loser,
            reason = ?reason,
            "dispute settled"
        );
    }

    /// Stake and commit. The second commitment must share the first's
    /// initial root and step count and contest its final root; accepting it
    /// opens the time bisection.
    pub fn commit(
        &mut self,
        caller: PartyId,
        commitment: Commitment,
        escrow: &mut dyn Escrow,
        now: Timestamp,
    ) -> Result<()> {
        self.ensure_state(GameState::AwaitingCommit, "commit")?;
        self.ensure_party(caller)?;
        if self.commitment_of(caller).is_some() {
            return Err(Error::WrongState("commit"));
        }
        if commitment.step_count == 0 {
            return Err(Error::InvalidConfig("step count must be positive".into()));
        }
        if let Some(other) = self.commitment_of(self.opponent(caller)) {
            if other.initial_root != commitment.initial_root {
                return Err(Error::InvalidConfig("commitments disagree on the initial root".into()));
            }
            if other.step_count != commitment.step_count {
                return Err(Error::InvalidConfig("commitments disagree on the step count".into()));
            }
            if other.final_root == commitment.final_root {
                return Err(Error::InvalidConfig("commitments agree, nothing to dispute".into()));
            }
        }
        escrow
            .lock(caller, self.config.stake)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if caller == self.config.claimer {
            self.claimer_commitment = Some(commitment);
        } else {
            self.challenger_commitment = Some(commitment);
        }
        tracing::info!(
            target: "tribunal-dispute",
            party = %caller,
            final_root = %to_hex(&commitment.final_root),
            steps = commitment.step_count,
            "commitment accepted"
        );

        if let (Some(claimed), Some(_)) = (self.claimer_commitment, self.challenger_commitment) {
            self.time_search = Some(TimeSearch::new(
                self.config.claimer,
                self.config.challenger,
                claimed.initial_root,
                claimed.final_root,
                claimed.step_count,
                self.config.query_size,
                self.config.round_duration,
                now,
            )?);
            self.state = GameState::TimeBisection;
        }
        Ok(())
    }

    /// Win by default against an opponent that never committed.
    pub fn claim_commit_timeout(&mut self, caller: PartyId, now: Timestamp) -> Result<()> {
        self.ensure_state(GameState::AwaitingCommit, "claim_commit_timeout")?;
        self.ensure_party(caller)?;
        if self.commitment_of(caller).is_none() {
            return Err(Error::Unauthorized(caller));
        }
        if now <= self.commit_deadline {
            return Err(Error::DeadlineNotReached);
        }
        self.settle(caller, OutcomeReason::CommitTimeout);
        Ok(())
    }

    fn time_search_mut(&mut self, op: &'static str) -> Result<&mut TimeSearch> {
        self.ensure_state(GameState::TimeBisection, op)?;
        self.time_search.as_mut().ok_or(Error::WrongState(op))
    }

    pub fn reply_with_probe_hashes(
        &mut self,
        caller: PartyId,
        hashes: &[H256],
        now: Timestamp,
    ) -> Result<()> {
        self.time_search_mut("reply_with_probe_hashes")?
            .reply_with_probe_hashes(caller, hashes, now)
    }

    pub fn narrow_interval(
        &mut self,
        caller: PartyId,
        j: usize,
        left: u64,
        right: u64,
        now: Timestamp,
    ) -> Result<()> {
        self.time_search_mut("narrow_interval")?
            .narrow_interval(caller, j, left, right, now)
    }

    /// Present the divergence step and open the replay stage seeded at the
    /// last agreed root.
    pub fn present_divergence(&mut self, caller: PartyId, time: u64, now: Timestamp) -> Result<()> {
        let search = self.time_search_mut("present_divergence")?;
        search.present_divergence(caller, time, now)?;
        let (before, after) = search
            .divergence_hashes()
            .ok_or(Error::WrongState("present_divergence"))?;
        self.replica = Some(ProofCarryingReplica::new(before));
        self.expected_after = Some(after);
        self.divergence_time = Some(time);
        self.replay_deadline = now + self.config.round_duration;
        self.state = GameState::StepReplay;
        tracing::info!(
            target: "tribunal-dispute",
            time,
            pre_root = %to_hex(&before),
            claimed_post = %to_hex(&after),
            "replay opened"
        );
        Ok(())
    }

    /// Win the bisection against a counterparty that missed its deadline.
    pub fn win_by_bisection_timeout(&mut self, caller: PartyId, now: Timestamp) -> Result<()> {
        self.time_search_mut("win_by_bisection_timeout")?
            .claim_victory_by_time(caller, now)?;
        self.settle(caller, OutcomeReason::BisectionTimeout);
        Ok(())
    }

    fn replica_mut(&mut self, caller: PartyId, op: &'static str) -> Result<&mut ProofCarryingReplica> {
        self.ensure_state(GameState::StepReplay, op)?;
        if caller != self.config.claimer {
            return Err(Error::Unauthorized(caller));
        }
        self.replica.as_mut().ok_or(Error::WrongState(op))
    }

    /// A non-verifying proof is attributable: it settles the game against
    /// the claimer on the spot.
    fn judge_proof(&mut self, result: Result<()>, now: Timestamp) -> Result<()> {
        match result {
            Err(Error::ProofMismatch) => {
                self.settle(self.config.challenger, OutcomeReason::ProofViolation);
                Err(Error::ProofMismatch)
            }
            Ok(()) => {
                self.replay_deadline = now + self.config.round_duration;
                Ok(())
            }
            other => other,
        }
    }

    pub fn prove_read(
        &mut self,
        caller: PartyId,
        addr: u64,
        value: u64,
        proof: &MerkleProof,
        now: Timestamp,
    ) -> Result<()> {
        let result = self.replica_mut(caller, "prove_read")?.prove_read(addr, value, proof);
        self.judge_proof(result, now)
    }

    pub fn prove_write(
        &mut self,
        caller: PartyId,
        addr: u64,
        old: u64,
        new: u64,
        proof: &MerkleProof,
        now: Timestamp,
    ) -> Result<()> {
        let result = self.replica_mut(caller, "prove_write")?.prove_write(addr, old, new, proof);
        self.judge_proof(result, now)
    }

    pub fn finish_authenticating(&mut self, caller: PartyId, now: Timestamp) -> Result<()> {
        self.replica_mut(caller, "finish_authenticating")?.finish_authenticating()?;
        self.replay_deadline = now + self.config.round_duration;
        Ok(())
    }

    /// Replay the disputed step and settle on the produced root.
    ///
    /// A replay that leaves the authenticated footprint is attributable to
    /// the claimer, who fixed the footprint; otherwise the root decides.
    pub fn run_step(&mut self, caller: PartyId, oracle: &dyn StepOracle) -> Result<Outcome> {
        let expected = self.expected_after.ok_or(Error::WrongState("run_step"))?;
        let replica = self.replica_mut(caller, "run_step")?;
        let replayed = oracle.step(&mut *replica).and_then(|_| replica.finish_replaying());
        let post_root = match replayed {
            Ok(root) => root,
            Err(Error::ReplayDivergence) => {
                self.settle(self.config.challenger, OutcomeReason::ReplayDivergence);
                return Err(Error::ReplayDivergence);
            }
            Err(other) => return Err(other),
        };
        if post_root == expected {
            self.settle(self.config.challenger, OutcomeReason::RootMatched);
        } else {
            self.settle(self.config.claimer, OutcomeReason::RootMismatched);
        }
        // Settled just above, so the outcome is always present.
        Ok(*self.outcome.as_ref().unwrap())
    }

    /// Challenger wins when the claimer goes silent during replay.
    pub fn claim_replay_timeout(&mut self, caller: PartyId, now: Timestamp) -> Result<()> {
        self.ensure_state(GameState::StepReplay, "claim_replay_timeout")?;
        if caller != self.config.challenger {
            return Err(Error::Unauthorized(caller));
        }
        if now <= self.replay_deadline {
            return Err(Error::DeadlineNotReached);
        }
        self.settle(caller, OutcomeReason::ReplayTimeout);
        Ok(())
    }

    /// Open an address search over the challenger's claimed post-root, for
    /// when the claimer wants the disagreement pinned to concrete words
    /// before replaying.
    pub fn open_address_search(&mut self, caller: PartyId, now: Timestamp) -> Result<()> {
        self.ensure_state(GameState::StepReplay, "open_address_search")?;
        if caller != self.config.claimer {
            return Err(Error::Unauthorized(caller));
        }
        if self.address_search.is_some() {
            return Err(Error::WrongState("open_address_search"));
        }
        let root = self.expected_after.ok_or(Error::WrongState("open_address_search"))?;
        self.address_search = Some(AddressSearch::new(
            self.config.claimer,
            self.config.challenger,
            root,
            self.config.phrase_words,
            self.config.round_duration,
            now,
        )?);
        self.replay_deadline = now + self.config.round_duration;
        Ok(())
    }

    fn address_search_mut(&mut self, op: &'static str) -> Result<&mut AddressSearch> {
        self.ensure_state(GameState::StepReplay, op)?;
        self.address_search.as_mut().ok_or(Error::WrongState(op))
    }

    pub fn address_reply_with_child_hashes(
        &mut self,
        caller: PartyId,
        left: H256,
        right: H256,
        now: Timestamp,
    ) -> Result<()> {
        self.address_search_mut("address_reply_with_child_hashes")?
            .reply_with_child_hashes(caller, left, right, now)?;
        self.replay_deadline = now + self.config.round_duration;
        Ok(())
    }

    pub fn address_narrow(
        &mut self,
        caller: PartyId,
        go_left: bool,
        differing_hash: H256,
        now: Timestamp,
    ) -> Result<()> {
        self.address_search_mut("address_narrow")?
            .narrow(caller, go_left, differing_hash, now)?;
        self.replay_deadline = now + self.config.round_duration;
        Ok(())
    }

    pub fn address_post_phrase(
        &mut self,
        caller: PartyId,
        words: &[u64],
        now: Timestamp,
    ) -> Result<()> {
        self.address_search_mut("address_post_phrase")?
            .post_controversial_phrase(caller, words, now)?;
        self.replay_deadline = now + self.config.round_duration;
        Ok(())
    }

    pub fn address_win_by_timeout(&mut self, caller: PartyId, now: Timestamp) -> Result<()> {
        let search = self.address_search_mut("address_win_by_timeout")?;
        search.claim_victory_by_time(caller, now)?;
        self.settle(caller, OutcomeReason::BisectionTimeout);
        Ok(())
    }

    /// Transfer the pot, both stakes, to the winner. Callable once.
    pub fn payout(&mut self, escrow: &mut dyn Escrow) -> Result<()> {
        if self.state != GameState::Settled {
            return Err(Error::WrongState("payout"));
        }
        if self.paid {
            return Err(Error::InstanceFinalized);
        }
        let outcome = self.outcome.ok_or(Error::WrongState("payout"))?;
        // Only one stake is in escrow when the game settled by commit
        // timeout.
        let pot = if matches!(outcome.reason, OutcomeReason::CommitTimeout) {
            self.config.stake
        } else {
            self.config.stake * 2
        };
        escrow
            .transfer(outcome.winner, pot)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        self.paid = true;
        Ok(())
    }
}
