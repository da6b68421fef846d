//! # Pipeline Orchestration
//!
//! One `submit` call per inbound action, many in flight at once. Per-user
//! state lives in sharded maps: two actions from the same user serialize on
//! the shard lock, actions from different users only meet at the ranking
//! engine's serialized writer.
//!
//! Write discipline per accepted action:
//!
//! 1. gate + rate + calculator + anti-cheat decide (no durable effects)
//! 2. ledger append - the ONLY blocking call in the critical path
//! 3. ranking upsert (generation may advance)
//! 4. replay state commits (nonce burned, client clock advanced)
//! 5. broadcast hand-off (non-blocking, fire-and-forget)
//!
//! A failure at step 2 surfaces as `Transient` and leaves NO trace: the
//! retry re-enters with a fresh pipeline pass and the same nonce, which the
//! ledger absorbs idempotently.

use crate::auth::CredentialVerifier;
use crate::gate::{IngestGate, SessionContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use summit_broadcast::{Broadcaster, CommitNotice, Subscription};
use summit_core::score::compute_delta;
use summit_core::{
    ActionError, ActionReceipt, ActionRequest, ActionResult, LedgerEntry, Outcome, SummitConfig,
    TimestampMs, UserId,
};
use summit_ledger::LedgerStore;
use summit_ranking::{RankingEngine, RankingSnapshot};
use summit_security::{
    AntiCheatEvaluator, KeyRegistry, RateLimiter, ReplayWindow, RiskProfile, SigningKey, Verdict,
};

/// Number of per-user state shards.
const SHARDS: usize = 16;

/// Per-user mutable state, guarded by its shard lock.
struct UserState {
    display_name: String,
    replay: ReplayWindow,
    profile: RiskProfile,
}

/// Leaderboard query result.
#[derive(Clone, Debug)]
pub struct LeaderboardView {
    /// The current top-N window with its generation.
    pub snapshot: Arc<RankingSnapshot>,
    /// Total ranked participants, window included.
    pub participants: usize,
}

/// The assembled score pipeline.
pub struct Pipeline {
    config: SummitConfig,
    gate: IngestGate,
    keys: Arc<KeyRegistry>,
    limiter: RateLimiter,
    evaluator: AntiCheatEvaluator,
    ledger: Arc<dyn LedgerStore>,
    ranking: RankingEngine,
    broadcaster: Broadcaster,
    shards: Vec<Mutex<HashMap<u64, UserState>>>,
}

impl Pipeline {
    /// Assembles a pipeline, rebuilding the ranking engine from the ledger
    /// (cold start). The ledger is the source of truth; the engine is its
    /// cache.
    pub fn new(
        config: SummitConfig,
        verifier: Arc<dyn CredentialVerifier>,
        ledger: Arc<dyn LedgerStore>,
    ) -> ActionResult<Self> {
        let entries = ledger
            .load_all()
            .map_err(|e| ActionError::Transient(e.to_string()))?;
        let ranking = RankingEngine::rebuild(config.ranking.top_n, &entries);
        if !entries.is_empty() {
            tracing::info!(
                entries = entries.len(),
                participants = ranking.participants(),
                "ranking rebuilt from ledger"
            );
        }

        let keys = Arc::new(KeyRegistry::new());
        let gate = IngestGate::new(verifier, Arc::clone(&keys), &config.scoring);
        let limiter = RateLimiter::new(config.rate_limit.clone());
        let evaluator = AntiCheatEvaluator::new(config.scoring.clone(), config.risk.clone());
        let broadcaster = Broadcaster::new(config.broadcast.clone());

        Ok(Self {
            config,
            gate,
            keys,
            limiter,
            evaluator,
            ledger,
            ranking,
            broadcaster,
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        })
    }

    /// Registers a participant: display name plus signing key.
    pub fn register_user(&self, user_id: UserId, display_name: &str, key: SigningKey) {
        self.keys.register(user_id, key);
        let mut shard = self.shard(user_id).lock();
        shard
            .entry(user_id.0)
            .or_insert_with(|| self.new_user_state(display_name));
    }

    /// Submits an action using the server wall clock.
    pub fn submit(
        &self,
        request: &ActionRequest,
        session: &SessionContext<'_>,
    ) -> ActionResult<ActionReceipt> {
        self.submit_at(request, session, wall_clock_ms())
    }

    /// Submits an action at an explicit server time (tests, replays).
    pub fn submit_at(
        &self,
        request: &ActionRequest,
        session: &SessionContext<'_>,
        now_ms: TimestampMs,
    ) -> ActionResult<ActionReceipt> {
        // Boundary 1 runs before any per-user state is touched or created.
        self.gate.authenticate(request, session.token, now_ms)?;

        let mut shard = self.shard(request.user_id).lock();
        let state = shard
            .entry(request.user_id.0)
            .or_insert_with(|| self.new_user_state(""));

        // Boundaries 2-4 plus parameter sanity. Nothing mutated on failure.
        self.gate
            .admit(request, &mut state.profile, &mut state.replay, now_ms)?;

        // Admission control. Repeated violations feed the risk profile.
        if let Err(rejection) = self.limiter.admit(request.user_id, session.origin, now_ms) {
            if rejection.risk_signal {
                self.evaluator.apply_rate_signal(&mut state.profile, now_ms);
            }
            return Err(ActionError::RateLimited {
                retry_after_ms: rejection.retry_after_ms,
            });
        }

        // Authoritative delta. Client-declared params were bounded by the
        // gate; the calculator clamps the rest and reports it.
        let score = compute_delta(&self.config.scoring, request.kind, request.params);

        let evaluation = self.evaluator.evaluate(
            &mut state.profile,
            request.kind,
            score.delta,
            score.clamped,
            now_ms,
        );
        if evaluation.verdict == Verdict::Reject {
            tracing::warn!(
                user = %request.user_id,
                risk = evaluation.risk,
                reasons = ?evaluation.reasons,
                banned_until = ?evaluation.banned_until,
                "action rejected by anomaly evaluation"
            );
            return Err(ActionError::AnomalyRejected);
        }

        // Write-ahead: the entry must be durable before the ranking moves.
        let current_total = self.ranking.total(request.user_id).unwrap_or(0);
        let new_total = apply_delta(current_total, score.delta);
        let outcome = if evaluation.verdict == Verdict::Review {
            Outcome::Review
        } else {
            Outcome::Accepted
        };
        let entry = LedgerEntry {
            user_id: request.user_id,
            kind: request.kind,
            delta: score.delta,
            resulting_total: new_total,
            server_timestamp_ms: now_ms,
            nonce: request.nonce,
            outcome,
        };
        self.ledger
            .append(&entry)
            .map_err(|e| ActionError::Transient(e.to_string()))?;

        let upsert = self.ranking.upsert(request.user_id, new_total);

        // The commit stands: burn the nonce, advance the clocks, remember
        // the accepted event. From here on a disconnecting client changes
        // nothing.
        state
            .replay
            .commit(request.nonce, request.client_timestamp_ms, now_ms);
        self.evaluator
            .record_accepted(&mut state.profile, request.kind, score.delta, now_ms);

        self.broadcaster.publish(CommitNotice {
            snapshot: self.ranking.snapshot(),
            actor: request.user_id,
            actor_total: new_total,
            actor_rank: upsert.new_rank,
        });

        Ok(ActionReceipt {
            delta: score.delta,
            new_total,
            new_rank: upsert.new_rank,
            previous_rank: upsert.previous_rank,
            generation: upsert.generation,
            review: evaluation.verdict == Verdict::Review,
        })
    }

    /// Current top-N snapshot plus participant count.
    #[must_use]
    pub fn leaderboard(&self) -> LeaderboardView {
        LeaderboardView {
            snapshot: self.ranking.snapshot(),
            participants: self.ranking.participants(),
        }
    }

    /// 1-based rank across all participants.
    #[must_use]
    pub fn rank(&self, user_id: UserId) -> Option<u64> {
        self.ranking.rank(user_id)
    }

    /// A participant's committed total.
    #[must_use]
    pub fn total(&self, user_id: UserId) -> Option<u64> {
        self.ranking.total(user_id)
    }

    /// A participant's registered display name.
    #[must_use]
    pub fn display_name(&self, user_id: UserId) -> Option<String> {
        let shard = self.shard(user_id).lock();
        shard
            .get(&user_id.0)
            .filter(|state| !state.display_name.is_empty())
            .map(|state| state.display_name.clone())
    }

    /// Subscribes to ranking delta events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&self, id: u64) {
        self.broadcaster.unsubscribe(id);
    }

    /// Forces delivery of batched and throttle-deferred events.
    pub fn flush_broadcast(&self) {
        self.broadcaster.flush();
    }

    fn new_user_state(&self, display_name: &str) -> UserState {
        UserState {
            display_name: display_name.to_string(),
            replay: ReplayWindow::new(
                self.config.nonce_retention_ms(),
                self.config.replay.clock_skew_ms,
            ),
            profile: self.evaluator.new_profile(),
        }
    }

    fn shard(&self, user_id: UserId) -> &Mutex<HashMap<u64, UserState>> {
        &self.shards[(user_id.0 as usize) % SHARDS]
    }
}

/// Applies a signed delta to a non-negative total, saturating at zero.
fn apply_delta(total: u64, delta: i64) -> u64 {
    if delta >= 0 {
        total.saturating_add(delta as u64)
    } else {
        total.saturating_sub(delta.unsigned_abs())
    }
}

/// Server wall clock. The single place the pipeline reads time.
fn wall_clock_ms() -> TimestampMs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
