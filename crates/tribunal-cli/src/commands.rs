//! Command implementations for the tribunal CLI.

use std::collections::BTreeMap;
use std::fs;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use tribunal_bisect::TimeSearchState;
use tribunal_core::clock::{Clock, SystemClock};
use tribunal_core::hash::{combine, to_hex, H256};
use tribunal_core::PartyId;
use tribunal_dispute::{
    Arena, Commitment, DisputeGame, Escrow, GameConfig, LedgerEscrow, OutcomeReason,
};
use tribunal_machine::{AccessRecorder, RecordedAccess, StepOracle, StepStatus, Subleq};
use tribunal_memory::{CommittedMemory, MerkleProof};

/// On-disk memory image: hex byte address to hex word value.
#[derive(Debug, Serialize, Deserialize)]
struct MemoryImage {
    words: BTreeMap<String, String>,
}

/// On-disk inclusion proof.
#[derive(Debug, Serialize, Deserialize)]
struct ProofFile {
    addr: String,
    value: String,
    root: String,
    siblings: Vec<String>,
}

fn parse_u64(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).with_context(|| format!("bad hex value {s}"))
    } else {
        s.parse().with_context(|| format!("bad decimal value {s}"))
    }
}

fn parse_h256(s: &str) -> Result<H256> {
    let bytes = hex::decode(s.trim().trim_start_matches("0x"))
        .with_context(|| format!("bad hash {s}"))?;
    bytes.try_into().map_err(|_| anyhow!("hash {s} is not 32 bytes"))
}

fn load_memory(path: &str) -> Result<CommittedMemory> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let image: MemoryImage = serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
    let mut mem = CommittedMemory::new();
    for (addr, value) in &image.words {
        mem.set(parse_u64(addr)?, parse_u64(value)?)
            .with_context(|| format!("loading word at {addr}"))?;
    }
    Ok(mem)
}

/// Root command: commit to a memory image.
pub fn root(image: &str) -> Result<()> {
    let mem = load_memory(image)?;
    println!("{}", to_hex(&mem.root()));
    Ok(())
}

/// Prove command: inclusion proof for one word.
pub fn prove(image: &str, addr: &str, output: Option<&str>) -> Result<()> {
    let mem = load_memory(image)?;
    let addr = parse_u64(addr)?;
    let value = mem.get(addr)?;
    let proof = mem.generate_proof(addr)?;
    let file = ProofFile {
        addr: format!("{addr:#x}"),
        value: format!("{value:#x}"),
        root: to_hex(&mem.root()),
        siblings: proof.siblings().iter().map(to_hex).collect(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {path}"))?;
            println!("proof written to {path}");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Verify command: check a proof file against the root it names.
pub fn verify(proof: &str) -> Result<()> {
    let text = fs::read_to_string(proof).with_context(|| format!("reading {proof}"))?;
    let file: ProofFile = serde_json::from_str(&text).with_context(|| format!("parsing {proof}"))?;
    let siblings = file
        .siblings
        .iter()
        .map(|s| parse_h256(s))
        .collect::<Result<Vec<_>>>()?;
    let merkle = MerkleProof::new(siblings)?;
    let addr = parse_u64(&file.addr)?;
    let value = parse_u64(&file.value)?;
    let root = parse_h256(&file.root)?;
    if merkle.verify(addr, value, &root)? {
        println!("proof verifies: word {:#x} = {:#x} under {}", addr, value, file.root);
        Ok(())
    } else {
        bail!("proof does not verify");
    }
}

/// Run command: step the reference machine over an image.
pub fn run(image: &str, max_steps: u64, trace_roots: bool) -> Result<()> {
    let mut mem = load_memory(image)?;
    let mut status = StepStatus::Advanced;
    let mut taken = 0u64;
    for step in 0..max_steps {
        status = Subleq.step(&mut mem)?;
        if status != StepStatus::Advanced {
            break;
        }
        taken = step + 1;
        if trace_roots {
            println!("step {:>6}  {}", taken, to_hex(&mem.root()));
        }
    }
    println!("stopped after {} step(s), exit code {}", taken, status.exit_code());
    println!("root {}", to_hex(&mem.root()));
    Ok(())
}

const CLAIMER: PartyId = PartyId(1);
const CHALLENGER: PartyId = PartyId(2);

/// Simulate command: full dispute between an honest claimer and a
/// challenger whose history goes wrong at `corrupt_at`.
pub fn simulate(
    image: &str,
    steps: u64,
    corrupt_at: Option<u64>,
    snapshot: Option<&str>,
) -> Result<()> {
    if steps == 0 {
        bail!("step count must be positive");
    }
    let corrupt_at = corrupt_at.unwrap_or(steps / 2);
    if corrupt_at >= steps {
        bail!("corruption step {corrupt_at} must precede the final step {steps}");
    }

    // The honest history, then the challenger's corrupted copy of it.
    let mut mem = load_memory(image)?;
    let mut truth = vec![mem.root()];
    for _ in 0..steps {
        Subleq.step(&mut mem)?;
        truth.push(mem.root());
    }
    let lies: Vec<H256> = truth
        .iter()
        .enumerate()
        .map(|(t, root)| if t as u64 > corrupt_at { combine(root, &[0xfe; 32]) } else { *root })
        .collect();

    let now = SystemClock.now();
    let mut escrow = LedgerEscrow::new();
    escrow.deposit(CLAIMER, 100);
    escrow.deposit(CHALLENGER, 100);
    let config = GameConfig {
        claimer: CLAIMER,
        challenger: CHALLENGER,
        stake: 50,
        round_duration: 3600,
        query_size: 3,
        phrase_words: 4,
    };
    let mut arena = Arena::new();
    let id = arena.insert(DisputeGame::new(config, now)?);
    let game = arena.get_mut(id).ok_or_else(|| anyhow!("missing instance {id}"))?;
    println!("dispute opened as {id}");
    let initial_root = truth[0];
    game.commit(
        CLAIMER,
        Commitment { initial_root, final_root: truth[steps as usize], step_count: steps },
        &mut escrow,
        now,
    )?;
    game.commit(
        CHALLENGER,
        Commitment { initial_root, final_root: lies[steps as usize], step_count: steps },
        &mut escrow,
        now,
    )?;

    // Bisection: the challenger answers probes from its corrupted history,
    // the claimer narrows against the truth.
    while game.time_search().map(|s| s.state()) == Some(TimeSearchState::WaitingHashes) {
        let times = game.time_search().unwrap().probe_times().to_vec();
        let hashes: Vec<H256> = times.iter().map(|t| lies[*t as usize]).collect();
        game.reply_with_probe_hashes(CHALLENGER, &hashes, now)?;

        let j = (0..times.len() - 1)
            .take_while(|i| truth[times[*i] as usize] == hashes[*i])
            .last()
            .ok_or_else(|| anyhow!("histories disagree on the initial root"))?;
        if times[j + 1] == times[j] + 1 {
            game.present_divergence(CLAIMER, times[j], now)?;
        } else {
            game.narrow_interval(CLAIMER, j, times[j], times[j + 1], now)?;
        }
    }
    let divergence = game
        .divergence_time()
        .ok_or_else(|| anyhow!("bisection ended without a divergence"))?;
    println!("divergence at step {divergence}");

    // Replay: authenticate the true footprint of the disputed step, then
    // let the oracle decide.
    let mut state = load_memory(image)?;
    for _ in 0..divergence {
        Subleq.step(&mut state)?;
    }
    let mut probe = state.clone();
    let mut recorder = AccessRecorder::new(&mut probe);
    Subleq.step(&mut recorder)?;
    let log = recorder.into_log();
    println!("disputed step touches {} word(s)", log.len());

    for access in log {
        let proof = state.generate_proof(access.addr())?;
        match access {
            RecordedAccess::Read { addr, value } => {
                game.prove_read(CLAIMER, addr, value, &proof, now)?;
            }
            RecordedAccess::Write { addr, old, new } => {
                game.prove_write(CLAIMER, addr, old, new, &proof, now)?;
                state.set(addr, new)?;
            }
        }
    }
    game.finish_authenticating(CLAIMER, now)?;
    let outcome = game.run_step(CLAIMER, &Subleq)?;

    game.payout(&mut escrow)?;
    println!(
        "{} wins ({:?}); balances: claimer {}, challenger {}",
        outcome.winner,
        outcome.reason,
        escrow.balance_of(CLAIMER),
        escrow.balance_of(CHALLENGER),
    );
    if outcome.reason != OutcomeReason::RootMismatched {
        bail!("expected the honest claimer to win on the replayed root");
    }

    if let Some(path) = snapshot {
        let bytes = bincode::serialize(&game)?;
        fs::write(path, bytes).with_context(|| format!("writing {path}"))?;
        println!("settled game snapshot written to {path}");
    }
    Ok(())
}
