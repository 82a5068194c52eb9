//! The global RNG stream.
//!
//! All sampling in batchdist draws from a single logical RNG stream whose
//! state lives outside any distribution object. Callers wanting
//! deterministic replays snapshot the stream, run a side computation, and
//! restore it; the subsequent draws are bit-identical.

use std::sync::{LazyLock, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;

static GLOBAL_RNG: LazyLock<Mutex<StdRng>> =
    LazyLock::new(|| Mutex::new(StdRng::seed_from_u64(0)));

/// Opaque snapshot of the global RNG state.
#[derive(Debug, Clone)]
pub struct RngState(StdRng);

/// Re-seed the global stream.
pub fn seed(s: u64) {
    *lock() = StdRng::seed_from_u64(s);
}

/// Capture the current state of the global stream.
pub fn snapshot() -> RngState {
    RngState(lock().clone())
}

/// Restore a previously captured state.
pub fn restore(state: &RngState) {
    *lock() = state.0.clone();
}

/// Run `f` with exclusive access to the global stream.
///
/// Concurrent samplers interleave draws in lock-acquisition order; the
/// stream itself is never corrupted.
pub fn with_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    f(&mut lock())
}

fn lock() -> std::sync::MutexGuard<'static, StdRng> {
    GLOBAL_RNG.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_snapshot_restore_is_bit_identical() {
        seed(42);
        let state = snapshot();
        let a: Vec<u64> = with_rng(|r| (0..8).map(|_| r.gen()).collect());
        // Side computation advances the stream.
        let _: f64 = with_rng(|r| r.gen());
        restore(&state);
        let b: Vec<u64> = with_rng(|r| (0..8).map(|_| r.gen()).collect());
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_resets_stream() {
        seed(7);
        let a: u64 = with_rng(|r| r.gen());
        seed(7);
        let b: u64 = with_rng(|r| r.gen());
        assert_eq!(a, b);
    }
}
