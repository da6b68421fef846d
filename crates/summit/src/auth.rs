//! # Credential Verification Boundary
//!
//! Credential ISSUANCE lives outside this system. The pipeline only
//! consumes the verification capability defined here: token in, claims
//! out. The gate compares the claimed identity and expiry against the
//! request; this module never sees a clock.

use parking_lot::RwLock;
use std::collections::HashMap;
use summit_core::{ActionError, ActionResult, TimestampMs, UserId};

/// What a verified credential asserts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthClaims {
    /// The authenticated user.
    pub user_id: UserId,
    /// Session expiry, milliseconds since the UNIX epoch.
    pub expires_at_ms: TimestampMs,
}

/// External credential-verification capability.
pub trait CredentialVerifier: Send + Sync {
    /// Resolves a bearer token to its claims, or fails with
    /// [`ActionError::Auth`].
    fn verify(&self, token: &str) -> ActionResult<AuthClaims>;
}

/// Token-table verifier for tests, simulations and single-node deploys.
#[derive(Default)]
pub struct TokenTable {
    tokens: RwLock<HashMap<String, AuthClaims>>,
}

impl TokenTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a token for a user.
    pub fn issue(&self, token: &str, user_id: UserId, expires_at_ms: TimestampMs) {
        self.tokens
            .write()
            .insert(token.to_string(), AuthClaims { user_id, expires_at_ms });
    }

    /// Revokes a token.
    pub fn revoke(&self, token: &str) {
        self.tokens.write().remove(token);
    }
}

impl CredentialVerifier for TokenTable {
    fn verify(&self, token: &str) -> ActionResult<AuthClaims> {
        self.tokens
            .read()
            .get(token)
            .copied()
            .ok_or(ActionError::Auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_verifies() {
        let table = TokenTable::new();
        table.issue("tok-1", UserId(7), 10_000);

        let claims = table.verify("tok-1").unwrap();
        assert_eq!(claims.user_id, UserId(7));
        assert_eq!(claims.expires_at_ms, 10_000);
    }

    #[test]
    fn test_unknown_token_rejected() {
        let table = TokenTable::new();
        assert_eq!(table.verify("nope"), Err(ActionError::Auth));
    }

    #[test]
    fn test_revoked_token_rejected() {
        let table = TokenTable::new();
        table.issue("tok-1", UserId(7), 10_000);
        table.revoke("tok-1");
        assert_eq!(table.verify("tok-1"), Err(ActionError::Auth));
    }
}
