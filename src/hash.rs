//! Password hashing: salted iterated SHA-256 with a tunable work factor.
//!
//! Each hash embeds its own random 16-byte salt (`salt || digest` layout),
//! and each stored credential records the iteration count it was computed
//! with. Verification always replays the *recorded* count, so raising the
//! configured cost never invalidates existing hashes — they are upgraded
//! lazily on the next successful login.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};

/// Salt byte length prepended to every hash.
const SALT_BYTES: usize = 16;

/// SHA-256 digest length.
const DIGEST_BYTES: usize = 32;

/// Default number of stretching iterations for new hashes.
pub const DEFAULT_ITERATION_COUNT: u32 = 100_000;

/// Current work factor for newly computed hashes.
///
/// Mutable configuration, not a process-wide static: the engine owns one
/// policy instance and reads it at the moment a hash is created or
/// upgraded. Already-stored hashes stay verifiable at their own recorded
/// count.
#[derive(Debug)]
pub struct HashPolicy {
    iterations: AtomicU32,
}

impl HashPolicy {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: AtomicU32::new(iterations),
        }
    }

    /// The iteration count new hashes will be computed with.
    pub fn iteration_count(&self) -> u32 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Change the work factor for future hashes. Existing records are
    /// untouched until their next successful verification.
    pub fn set_iteration_count(&self, iterations: u32) {
        self.iterations.store(iterations, Ordering::Relaxed);
    }
}

impl Default for HashPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATION_COUNT)
    }
}

/// Hash a password under the given iteration count.
///
/// Output is `salt || digest` with a fresh random salt, so two calls with
/// identical inputs still produce different bytes.
pub fn compute(password: &str, iterations: u32) -> Vec<u8> {
    let mut salt = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let digest = stretch(password, &salt, iterations);
    let mut out = Vec::with_capacity(SALT_BYTES + DIGEST_BYTES);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&digest);
    out
}

/// Verify a password against a stored `salt || digest` hash computed with
/// `iterations` rounds. An empty or malformed hash never matches.
pub fn verify(password: &str, stored: &[u8], iterations: u32) -> bool {
    if stored.len() != SALT_BYTES + DIGEST_BYTES {
        return false;
    }
    let (salt, digest) = stored.split_at(SALT_BYTES);
    let candidate = stretch(password, salt, iterations);
    constant_time_eq(&candidate, digest)
}

/// Iterated SHA-256 key stretching.
fn stretch(password: &str, salt: &[u8], iterations: u32) -> [u8; DIGEST_BYTES] {
    let mut hash = Sha256::new();
    hash.update(salt);
    hash.update(password.as_bytes());
    let mut result = hash.finalize();

    for _ in 1..iterations {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt);
        result = h.finalize();
    }

    result.into()
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Tests ───────────────────────────────────────────────────────────
