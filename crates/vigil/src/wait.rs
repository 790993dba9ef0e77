//! Condition poller.
//!
//! Media playback and asynchronous rendering never settle at a predictable
//! instant, so every state transition is observed by re-issuing a query until
//! it holds or a hard deadline passes. There is no event subscription: the
//! engine channel is request/response only.
//!
//! The loop checks immediately, then sleeps `min(poll_interval, remaining)`
//! between checks, and makes one last check at the deadline. A wait can
//! therefore return no later than `timeout + poll_interval` after it started.

use crate::clock::SharedClock;
use crate::result::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Poll intervals are clamped to at least this, so a zero interval
/// cannot spin forever on a virtual clock.
pub const MIN_POLL_INTERVAL_MS: u64 = 1;

/// Options for a single wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    /// Hard upper bound in milliseconds
    pub timeout_ms: u64,
    /// Time between predicate evaluations in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as Duration (clamped to the minimum)
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

/// Trait for wait conditions
pub trait WaitCondition {
    /// Evaluate the condition against current state
    fn check(&mut self) -> VigilResult<bool>;

    /// Description for error messages
    fn description(&self) -> String;
}

/// A closure-based wait condition
pub struct FnCondition<F: FnMut() -> VigilResult<bool>> {
    func: F,
    description: String,
}

impl<F: FnMut() -> VigilResult<bool>> std::fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F: FnMut() -> VigilResult<bool>> FnCondition<F> {
    /// Create a new function condition
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
        }
    }
}

impl<F: FnMut() -> VigilResult<bool>> WaitCondition for FnCondition<F> {
    fn check(&mut self) -> VigilResult<bool> {
        (self.func)()
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Result of a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of predicate evaluations
    pub attempts: u32,
    /// Description of what was waited for
    pub waited_for: String,
}

/// Polls conditions against a clock
#[derive(Debug, Clone)]
pub struct Waiter {
    clock: SharedClock,
}

impl Waiter {
    /// Create a waiter on the given clock
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// The clock this waiter sleeps on
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Poll `condition` until it holds or `options.timeout_ms` elapses.
    ///
    /// Lookup errors (stale handle, missing element, ordinal out of range)
    /// count as "not yet"; any other error aborts the wait.
    pub fn wait_for<C: WaitCondition + ?Sized>(
        &self,
        condition: &mut C,
        options: &WaitOptions,
    ) -> VigilResult<WaitResult> {
        let start = self.clock.now();
        let timeout = options.timeout();
        let interval = options.poll_interval();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match condition.check() {
                Ok(true) => {
                    let elapsed = self.clock.now().saturating_sub(start);
                    tracing::debug!(
                        condition = %condition.description(),
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "wait satisfied"
                    );
                    return Ok(WaitResult {
                        elapsed,
                        attempts,
                        waited_for: condition.description(),
                    });
                }
                Ok(false) => {}
                Err(e) if e.is_transient_lookup() => {
                    tracing::debug!(condition = %condition.description(), error = %e, "element not ready");
                }
                Err(e) => return Err(e),
            }

            let elapsed = self.clock.now().saturating_sub(start);
            if elapsed >= timeout {
                tracing::warn!(
                    condition = %condition.description(),
                    attempts,
                    timeout_ms = options.timeout_ms,
                    "wait timed out"
                );
                return Err(VigilError::Timeout {
                    description: condition.description(),
                    elapsed_ms: elapsed.as_millis() as u64,
                    timeout_ms: options.timeout_ms,
                });
            }
            self.clock.sleep(interval.min(timeout - elapsed));
        }
    }

    /// Poll a closure until it returns true
    pub fn wait_until<F>(
        &self,
        description: impl Into<String>,
        predicate: F,
        options: &WaitOptions,
    ) -> VigilResult<WaitResult>
    where
        F: FnMut() -> VigilResult<bool>,
    {
        let mut condition = FnCondition::new(predicate, description);
        self.wait_for(&mut condition, options)
    }

    /// Fixed delay for warm-ups whose minimum latency is known in advance.
    ///
    /// Not a substitute for polling when a specific transition matters.
    pub fn wait_for_timeout(&self, ms: u64) {
        tracing::debug!(ms, "fixed wait");
        self.clock.sleep(Duration::from_millis(ms));
    }
}

/// Poll an infallible predicate: `wait_until(predicate, timeout_ms, poll_interval_ms)`
pub fn wait_until<F>(
    clock: SharedClock,
    mut predicate: F,
    timeout_ms: u64,
    poll_interval_ms: u64,
) -> VigilResult<WaitResult>
where
    F: FnMut() -> bool,
{
    let options = WaitOptions::new()
        .with_timeout(timeout_ms)
        .with_poll_interval(poll_interval_ms);
    Waiter::new(clock).wait_until("custom predicate", || Ok(predicate()), &options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn manual() -> (ManualClock, Waiter) {
        let clock = ManualClock::new();
        let waiter = Waiter::new(Arc::new(clock.clone()));
        (clock, waiter)
    }

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_default() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }

        #[test]
        fn test_wait_options_chained() {
            let opts = WaitOptions::new().with_timeout(2000).with_poll_interval(25);
            assert_eq!(opts.timeout(), Duration::from_secs(2));
            assert_eq!(opts.poll_interval(), Duration::from_millis(25));
        }

        #[test]
        fn test_zero_interval_is_clamped() {
            let opts = WaitOptions::new().with_poll_interval(0);
            assert_eq!(opts.poll_interval(), Duration::from_millis(MIN_POLL_INTERVAL_MS));
        }
    }

    mod waiter_tests {
        use super::*;

        #[test]
        fn test_immediate_success_does_not_sleep() {
            let (clock, waiter) = manual();
            let result = waiter
                .wait_until("always", || Ok(true), &WaitOptions::default())
                .unwrap();
            assert_eq!(result.attempts, 1);
            assert_eq!(result.elapsed, Duration::ZERO);
            assert_eq!(clock.now(), Duration::ZERO);
        }

        #[test]
        fn test_returns_on_first_true_iteration() {
            let (clock, waiter) = manual();
            let observed = clock.clone();
            let options = WaitOptions::new().with_timeout(5000).with_poll_interval(100);
            let result = waiter
                .wait_until("t >= 750ms", move || Ok(observed.now_ms() >= 750), &options)
                .unwrap();
            // checks at 0,100,...,800 -> first true at 800
            assert_eq!(result.attempts, 9);
            assert_eq!(clock.now_ms(), 800);
        }

        #[test]
        fn test_always_false_times_out() {
            let (clock, waiter) = manual();
            let options = WaitOptions::new().with_timeout(1000).with_poll_interval(300);
            let err = waiter
                .wait_until("never", || Ok(false), &options)
                .unwrap_err();
            match err {
                VigilError::Timeout {
                    description,
                    elapsed_ms,
                    timeout_ms,
                } => {
                    assert_eq!(description, "never");
                    assert_eq!(timeout_ms, 1000);
                    assert_eq!(elapsed_ms, 1000);
                }
                other => panic!("expected timeout, got {other:?}"),
            }
            // last sleep is shortened to the remaining budget
            assert_eq!(clock.now_ms(), 1000);
        }

        #[test]
        fn test_transient_errors_are_retried() {
            let (_clock, waiter) = manual();
            let mut calls = 0;
            let result = waiter
                .wait_until(
                    "remounted",
                    || {
                        calls += 1;
                        if calls < 3 {
                            Err(VigilError::StaleElement {
                                handle: "video".into(),
                            })
                        } else {
                            Ok(true)
                        }
                    },
                    &WaitOptions::default(),
                )
                .unwrap();
            assert_eq!(result.attempts, 3);
        }

        #[test]
        fn test_hard_errors_abort_immediately() {
            let (clock, waiter) = manual();
            let err = waiter
                .wait_until(
                    "engine",
                    || Err(VigilError::engine("connection reset")),
                    &WaitOptions::default(),
                )
                .unwrap_err();
            assert!(matches!(err, VigilError::Engine { .. }));
            assert_eq!(clock.now(), Duration::ZERO);
        }

        #[test]
        fn test_wait_for_timeout_advances_clock() {
            let (clock, waiter) = manual();
            waiter.wait_for_timeout(2000);
            assert_eq!(clock.now_ms(), 2000);
        }

        #[test]
        fn test_free_wait_until() {
            let clock = ManualClock::new();
            let observed = clock.clone();
            let result = wait_until(
                Arc::new(clock.clone()),
                move || observed.now_ms() >= 200,
                1000,
                50,
            )
            .unwrap();
            assert_eq!(result.elapsed, Duration::from_millis(200));
        }

        #[test]
        fn test_zero_timeout_checks_once() {
            let (_clock, waiter) = manual();
            let mut calls = 0;
            let err = waiter
                .wait_until(
                    "once",
                    || {
                        calls += 1;
                        Ok(false)
                    },
                    &WaitOptions::new().with_timeout(0),
                )
                .unwrap_err();
            assert!(matches!(err, VigilError::Timeout { .. }));
            assert_eq!(calls, 1);
        }
    }

    proptest! {
        #[test]
        fn prop_wait_never_exceeds_budget_plus_interval(
            timeout in 0u64..5_000,
            interval in 1u64..500,
            becomes_true_at in 0u64..10_000,
        ) {
            let (clock, waiter) = manual();
            let observed = clock.clone();
            let options = WaitOptions::new().with_timeout(timeout).with_poll_interval(interval);
            let outcome = waiter.wait_until(
                "threshold",
                move || Ok(observed.now_ms() >= becomes_true_at),
                &options,
            );
            prop_assert!(clock.now_ms() <= timeout + interval);
            match outcome {
                Ok(result) => {
                    prop_assert!(clock.now_ms() >= becomes_true_at);
                    // success is observed on the first check at or after the transition
                    prop_assert!(clock.now_ms() < becomes_true_at + interval);
                    prop_assert_eq!(result.elapsed.as_millis() as u64, clock.now_ms());
                }
                Err(VigilError::Timeout { .. }) => {
                    prop_assert!(becomes_true_at > timeout);
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }
    }
}
