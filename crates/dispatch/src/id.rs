// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque identifier generation for agents and tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};

/// Bytes of entropy per identifier (hex encoded to twice as many chars).
pub const ID_BYTES: usize = 16;

/// Generate a new random identifier.
///
/// Never fails: if the system randomness source errors, a time-derived
/// token is returned instead.
pub fn new_id() -> String {
    let rng = SystemRandom::new();
    id_from_source(|buf| rng.fill(buf))
}

fn id_from_source<F>(fill: F) -> String
where
    F: FnOnce(&mut [u8]) -> Result<(), Unspecified>,
{
    let mut bytes = [0u8; ID_BYTES];
    match fill(&mut bytes) {
        Ok(()) => hex::encode(bytes),
        Err(_) => {
            tracing::warn!("system randomness unavailable, falling back to time-derived id");
            fallback_id()
        }
    }
}

/// Nanosecond timestamp plus a process-local sequence, so concurrent
/// fallback calls still never collide.
fn fallback_id() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{nanos:016x}{seq:016x}")
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
