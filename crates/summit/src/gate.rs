//! # Action Ingest Gate
//!
//! The first line of defense. Four ordered hard boundaries, each
//! short-circuiting with NO state mutation:
//!
//! 1. credential/session validity
//! 2. ban check
//! 3. signature check
//! 4. replay/ordering check
//!
//! plus the parameter sanity check that guards the calculator. Nonce
//! recording happens elsewhere, only after the whole pipeline commits - a
//! downstream rejection must never poison replay state for a legitimate
//! retry.

use crate::auth::CredentialVerifier;
use std::sync::Arc;
use summit_core::config::ScoringConfig;
use summit_core::{ActionError, ActionRequest, ActionResult, TimestampMs};
use summit_security::{KeyRegistry, ReplayWindow, RiskProfile};

/// Transport-level context accompanying a request.
#[derive(Clone, Copy, Debug)]
pub struct SessionContext<'a> {
    /// Bearer token presented by the client.
    pub token: &'a str,
    /// Opaque origin key (e.g. remote address) when the transport knows it.
    pub origin: Option<&'a str>,
}

/// Stateless validator over the per-user state handed to it.
pub struct IngestGate {
    verifier: Arc<dyn CredentialVerifier>,
    keys: Arc<KeyRegistry>,
    max_difficulty_tier: u8,
    max_streak: u32,
}

impl IngestGate {
    /// Creates a gate bound to a verifier and key registry.
    #[must_use]
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        keys: Arc<KeyRegistry>,
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            verifier,
            keys,
            max_difficulty_tier: scoring.max_difficulty_tier,
            max_streak: scoring.max_streak,
        }
    }

    /// Boundary 1: credential and session validity. Runs BEFORE any
    /// per-user state exists, so unauthenticated traffic allocates nothing.
    pub fn authenticate(
        &self,
        request: &ActionRequest,
        token: &str,
        now_ms: TimestampMs,
    ) -> ActionResult<()> {
        let claims = self.verifier.verify(token)?;
        if claims.expires_at_ms <= now_ms {
            return Err(ActionError::Auth);
        }
        // A valid token for someone ELSE is still an auth failure.
        if claims.user_id != request.user_id {
            return Err(ActionError::Auth);
        }
        Ok(())
    }

    /// Boundaries 2-4 plus parameter sanity, over the user's state. `Ok`
    /// hands the request onward; any error means nothing was mutated (the
    /// ban-expiry reset inside [`RiskProfile::active_ban`] is the single,
    /// deliberate exception).
    pub fn admit(
        &self,
        request: &ActionRequest,
        profile: &mut RiskProfile,
        replay: &mut ReplayWindow,
        now_ms: TimestampMs,
    ) -> ActionResult<()> {
        // Boundary 2: active suspension rejects everything.
        if let Some(until_ms) = profile.active_ban(now_ms) {
            return Err(ActionError::Suspended { until_ms });
        }

        // Boundary 3: recompute the keyed digest, compare byte-for-byte.
        if !self.keys.verify(request) {
            return Err(ActionError::Integrity);
        }

        // Boundary 4: nonce freshness and timestamp ordering.
        if !replay.check(request.nonce, request.client_timestamp_ms, now_ms) {
            return Err(ActionError::Integrity);
        }

        // Parameter sanity: beyond these the request is malformed, not
        // merely ambitious (ambition is the calculator's clamp problem).
        if request.params.difficulty_tier > self.max_difficulty_tier
            || request.params.streak > self.max_streak
        {
            return Err(ActionError::Validation);
        }

        Ok(())
    }
}
