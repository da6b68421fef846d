//! # Arena Simulation
//!
//! MISSION: Drive the full pipeline with a deterministic mixed population:
//! - honest players submitting plausible actions
//! - spammers hammering the rate limiter
//! - cheaters replaying nonces and inflating multipliers
//!
//! This binary runs a complete simulation and outputs the final
//! leaderboard plus rejection statistics.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Instant;
use summit::{Pipeline, SessionContext, TokenTable};
use summit_core::{ActionError, ActionKind, ActionParams, ActionRequest, SummitConfig, UserId};
use summit_ledger::MemoryLedger;
use summit_security::SigningKey;

const PLAYERS: u64 = 50;
const ACTIONS_PER_PLAYER: u64 = 40;
const SEED: u64 = 0xA12E;

#[derive(Default)]
struct Tally {
    accepted: u64,
    review: u64,
    rate_limited: u64,
    integrity: u64,
    anomaly: u64,
    suspended: u64,
}

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         SUMMIT ARENA - PIPELINE SIMULATION                       ║");
    println!("║         HONEST PLAYERS vs SPAMMERS vs CHEATERS                   ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // Policy comes from the external TOML when present; compiled defaults
    // otherwise.
    let config = std::fs::read_to_string("config/summit.toml")
        .ok()
        .map(|text| SummitConfig::from_toml_str(&text).expect("config/summit.toml must parse"))
        .unwrap_or_default();
    let tokens = Arc::new(TokenTable::new());
    let ledger = Arc::new(MemoryLedger::new());
    let pipeline = Pipeline::new(config, tokens.clone(), ledger)
        .expect("empty ledger always rebuilds");

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Players:            {PLAYERS}                                           │");
    println!("│ Actions per player: {ACTIONS_PER_PLAYER}                                           │");
    println!("│ Seed:               {SEED:#x}                                       │");
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut keys = Vec::new();
    for user in 0..PLAYERS {
        let key = SigningKey::new(rng.gen(), rng.gen());
        let name = format!("player-{user:02}");
        pipeline.register_user(UserId(user), &name, key);
        tokens.issue(&format!("token-{user}"), UserId(user), u64::MAX);
        keys.push(key);
    }

    let subscription = pipeline.subscribe();
    let start = Instant::now();
    let mut tally = Tally::default();
    let mut clock_ms: u64 = 1_000_000;

    for round in 0..ACTIONS_PER_PLAYER {
        for user in 0..PLAYERS {
            clock_ms += 37; // Server clock marches forward between arrivals.
            let kind = match rng.gen_range(0..100u32) {
                0..=59 => ActionKind::Takedown,
                60..=79 => ActionKind::ObjectiveCapture,
                80..=89 => ActionKind::BountyClaim,
                _ => ActionKind::RoundWin,
            };

            // Last five users cheat: inflated multipliers, reused nonces.
            let cheating = user >= PLAYERS - 5;
            let params = if cheating {
                ActionParams { difficulty_tier: 10, streak: 9_999 }
            } else {
                ActionParams {
                    difficulty_tier: rng.gen_range(0..4),
                    streak: rng.gen_range(0..10),
                }
            };
            let nonce = if cheating && round % 3 == 0 && round > 0 {
                user * 1_000_000 + (round - 1) // Replay the previous nonce.
            } else {
                user * 1_000_000 + round
            };

            let mut request = ActionRequest {
                user_id: UserId(user),
                kind,
                params,
                client_timestamp_ms: clock_ms,
                nonce,
                signature: 0,
            };
            request.signature = keys[user as usize].sign(&request);

            let token = format!("token-{user}");
            let session = SessionContext { token: &token, origin: Some("sim-host") };
            match pipeline.submit_at(&request, &session, clock_ms) {
                Ok(receipt) if receipt.review => tally.review += 1,
                Ok(_) => tally.accepted += 1,
                Err(ActionError::RateLimited { .. }) => tally.rate_limited += 1,
                Err(ActionError::Integrity) => tally.integrity += 1,
                Err(ActionError::AnomalyRejected) => tally.anomaly += 1,
                Err(ActionError::Suspended { .. }) => tally.suspended += 1,
                Err(other) => println!("unexpected rejection: {other}"),
            }
        }
    }

    pipeline.flush_broadcast();
    let elapsed = start.elapsed();
    let delivered = subscription.receiver.try_iter().count();
    let board = pipeline.leaderboard();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    SIMULATION RESULTS                            ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    println!("┌─ OUTCOMES ──────────────────────────────────────────────────────┐");
    println!("│ Accepted:           {:>6}                                      ", tally.accepted);
    println!("│ Accepted (review):  {:>6}                                      ", tally.review);
    println!("│ Rate limited:       {:>6}                                      ", tally.rate_limited);
    println!("│ Integrity rejects:  {:>6}                                      ", tally.integrity);
    println!("│ Anomaly rejects:    {:>6}                                      ", tally.anomaly);
    println!("│ Suspended rejects:  {:>6}                                      ", tally.suspended);
    println!("│ Events delivered:   {:>6}                                      ", delivered);
    println!("│ Wall time:          {:>6.2} ms                                  ", elapsed.as_secs_f64() * 1_000.0);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ TOP 10 (generation {}) ─────────────────────────────────────────", board.snapshot.generation);
    for (index, (user, total)) in board.snapshot.entries.iter().take(10).enumerate() {
        let name = pipeline
            .display_name(*user)
            .unwrap_or_else(|| user.to_string());
        println!("│ #{:<3} {:<12} {:>8} pts", index + 1, name, total);
    }
    println!("└──────────────────────────────────────────────────────────────────");
    println!();
    println!(
        "Participants ranked: {} of {PLAYERS}",
        board.participants
    );
}
