//! Determinism testing utilities.
//!
//! Decisions must be reproducible: two clients resolving the same battle
//! have to issue the same commands. Sources of non-determinism include:
//!
//! - **Floating-point math**: every score is fixed point via
//!   [`tactics_core::math::Fixed`].
//! - **HashMap iteration order**: stacks are scanned in id order and the
//!   scripted boundaries use ordered maps.
//! - **Shared scratch state**: each battle owns all of its state, so
//!   battles may be resolved on different threads.

use std::fmt::Debug;
use std::thread;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult<T> {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Output of each run.
    pub outputs: Vec<T>,
}

impl<T: Debug + PartialEq> DeterminismResult<T> {
    fn from_outputs(outputs: Vec<T>) -> Self {
        let is_deterministic = outputs.windows(2).all(|w| w[0] == w[1]);
        Self {
            is_deterministic,
            outputs,
        }
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if any two runs differ.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let first_mismatch = self.outputs.windows(2).position(|w| w[0] != w[1]);
            panic!(
                "Decisions are non-deterministic!\n\
                 Runs: {}\n\
                 First mismatch after run: {:?}\n\
                 Outputs: {:#?}",
                self.outputs.len(),
                first_mismatch,
                self.outputs
            );
        }
    }
}

/// Run `scenario` `runs` times in sequence and compare the outputs.
///
/// # Example
///
/// ```ignore
/// use tactics_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(5, || {
///     let (mut engine, diplomacy) = setup_battle();
///     play_round(&mut engine, &diplomacy)
/// });
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<T, F>(runs: usize, scenario: F) -> DeterminismResult<T>
where
    T: Debug + PartialEq,
    F: Fn() -> T,
{
    DeterminismResult::from_outputs((0..runs).map(|_| scenario()).collect())
}

/// Run `scenario` on `threads` threads at once and compare the outputs.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn verify_parallel_determinism<T, F>(threads: usize, scenario: F) -> DeterminismResult<T>
where
    T: Debug + PartialEq + Send,
    F: Fn() -> T + Sync,
{
    let outputs = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads).map(|_| scope.spawn(&scenario)).collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(output) => output,
                Err(_) => panic!("determinism worker panicked"),
            })
            .collect()
    });
    DeterminismResult::from_outputs(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_runs_pass() {
        verify_determinism(4, || vec![1, 2, 3]).assert_deterministic();
    }

    #[test]
    fn test_parallel_runs_pass() {
        verify_parallel_determinism(4, || (0..100).sum::<u32>()).assert_deterministic();
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_divergent_runs_fail() {
        let counter = std::sync::atomic::AtomicU32::new(0);
        verify_determinism(3, || counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed)).assert_deterministic();
    }
}
