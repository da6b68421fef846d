//! # Request Signatures
//!
//! Keyed SipHash-2-4 (128-bit) digests over the canonical request encoding.
//!
//! The scheme is symmetric: the server issues each user a key out of band
//! (credential issuance is outside this crate) and recomputes the digest on
//! every request. A request whose digest does not match byte-for-byte never
//! reaches the rest of the pipeline.

use parking_lot::RwLock;
use siphasher::sip128::{Hasher128, SipHasher24};
use std::collections::HashMap;
use std::hash::Hasher;
use summit_core::{ActionRequest, UserId};

/// A per-user signing key (two 64-bit SipHash key halves).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SigningKey {
    k0: u64,
    k1: u64,
}

impl SigningKey {
    /// Creates a key from its two halves.
    #[must_use]
    pub const fn new(k0: u64, k1: u64) -> Self {
        Self { k0, k1 }
    }

    /// Computes the keyed digest of a byte string.
    #[must_use]
    pub fn digest(&self, data: &[u8]) -> u128 {
        let mut hasher = SipHasher24::new_with_keys(self.k0, self.k1);
        hasher.write(data);
        hasher.finish128().as_u128()
    }

    /// Signs a request (client-side helper for tests and simulations).
    #[must_use]
    pub fn sign(&self, request: &ActionRequest) -> u128 {
        self.digest(&request.canonical_bytes())
    }
}

/// Server-side registry of per-user signing keys.
pub struct KeyRegistry {
    keys: RwLock<HashMap<UserId, SigningKey>>,
}

impl KeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { keys: RwLock::new(HashMap::new()) }
    }

    /// Installs (or rotates) a user's key.
    pub fn register(&self, user_id: UserId, key: SigningKey) {
        self.keys.write().insert(user_id, key);
    }

    /// Verifies a request's signature against the registered key.
    ///
    /// An unknown user verifies as false: no key, no service.
    #[must_use]
    pub fn verify(&self, request: &ActionRequest) -> bool {
        let keys = self.keys.read();
        let Some(key) = keys.get(&request.user_id) else {
            return false;
        };
        key.sign(request) == request.signature
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
