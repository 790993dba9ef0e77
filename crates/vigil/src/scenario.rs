//! Scenario driver: gate, session, steps, outcome.
//!
//! Each case is gated on the active engine first. Only a case that runs gets
//! a session from the factory. The body then executes named steps; the first
//! failing step aborts the case and is named in the report.

use crate::engine::Engine;
use crate::gate::{evaluate, GateDecision, SkipAnnotation};
use crate::locator::Locator;
use crate::page::Page;
use crate::result::VigilResult;
use crate::snapshot::{SnapshotComparator, SnapshotOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Step name reported when a failure happens outside any step
pub const BODY_STEP: &str = "scenario body";

/// Step name reported when the session factory fails
pub const SETUP_STEP: &str = "session setup";

/// A single test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Case name
    pub name: String,
    /// Parameter label, if this is one instance of a parametrized case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Engines this case must not run on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_on: Vec<SkipAnnotation>,
}

impl TestCase {
    /// Create a new test case
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: None,
            skip_on: Vec::new(),
        }
    }

    /// Exclude an engine
    #[must_use]
    pub fn skip_on(mut self, engine: Engine) -> Self {
        self.skip_on.push(SkipAnnotation::engine(engine));
        self
    }

    /// Exclude an engine with a reason
    #[must_use]
    pub fn skip_on_because(mut self, engine: Engine, reason: impl Into<String>) -> Self {
        self.skip_on
            .push(SkipAnnotation::engine(engine).because(reason));
        self
    }

    /// Label this case as one parameter instance
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// `name` or `name[param]`
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.param {
            Some(param) => format!("{}[{param}]", self.name),
            None => self.name.clone(),
        }
    }
}

/// How a case ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// All steps passed
    Passed,
    /// A step failed
    Failed {
        /// Name of the failing step
        step: String,
        /// Rendered error, including expected vs observed state
        error: String,
    },
    /// Excluded by the environment gate
    Skipped {
        /// Why
        reason: String,
    },
}

impl Outcome {
    /// Passed?
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Failed?
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Skipped?
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed { step, error } => write!(f, "failed at '{step}': {error}"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// Timing of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step label
    pub label: String,
    /// Time spent, on the page clock
    pub duration_ms: u64,
    /// Whether the step succeeded
    pub passed: bool,
}

/// Result of running one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    /// `name` or `name[param]`
    pub name: String,
    /// Engine the case was evaluated against
    pub engine: Engine,
    /// How it ended
    pub outcome: Outcome,
    /// Time spent, on the page clock (0 for skipped cases)
    pub duration_ms: u64,
    /// Executed steps in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
}

/// Per-case state handed to the scenario body
#[derive(Debug)]
pub struct ScenarioContext<'a> {
    page: &'a Page,
    snapshots: &'a SnapshotComparator,
    failed: Option<(String, String)>,
    steps: Vec<StepRecord>,
}

impl<'a> ScenarioContext<'a> {
    /// Context over a session
    #[must_use]
    pub const fn new(page: &'a Page, snapshots: &'a SnapshotComparator) -> Self {
        Self {
            page,
            snapshots,
            failed: None,
            steps: Vec::new(),
        }
    }

    /// The session
    #[must_use]
    pub const fn page(&self) -> &'a Page {
        self.page
    }

    /// The snapshot comparator shared by the suite
    #[must_use]
    pub const fn snapshots(&self) -> &'a SnapshotComparator {
        self.snapshots
    }

    /// Steps executed so far
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Run a named step. A failure is attributed to this step if the body
    /// returns the same error.
    pub fn step<T, F>(&mut self, label: impl Into<String>, f: F) -> VigilResult<T>
    where
        F: FnOnce(&Self) -> VigilResult<T>,
    {
        let label = label.into();
        tracing::debug!(step = %label, "step start");
        self.failed = None;
        let started = self.page.clock().now();
        let result = f(&*self);
        let duration_ms = millis(self.page.clock().now().saturating_sub(started));
        if let Err(e) = &result {
            self.failed = Some((label.clone(), e.to_string()));
        }
        self.steps.push(StepRecord {
            label,
            duration_ms,
            passed: result.is_ok(),
        });
        result
    }

    /// Compare a locator against a named reference
    pub fn assert_snapshot(
        &self,
        locator: &Locator<'_>,
        name: &str,
        threshold: f64,
    ) -> VigilResult<SnapshotOutcome> {
        self.snapshots.assert_locator(locator, name, threshold)
    }

    fn failed_step(&self, error: &str) -> String {
        match &self.failed {
            Some((label, message)) if message == error => label.clone(),
            _ => BODY_STEP.to_string(),
        }
    }
}

/// Runs cases against one engine
#[derive(Debug)]
pub struct ScenarioRunner {
    engine: Engine,
    snapshots: SnapshotComparator,
}

impl ScenarioRunner {
    /// Runner for the active `engine`
    #[must_use]
    pub const fn new(engine: Engine, snapshots: SnapshotComparator) -> Self {
        Self { engine, snapshots }
    }

    /// The active engine
    #[must_use]
    pub const fn engine(&self) -> Engine {
        self.engine
    }

    /// The snapshot comparator
    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotComparator {
        &self.snapshots
    }

    /// Gate, then acquire a session and run `body`.
    ///
    /// `session_factory` is not called for skipped cases.
    pub fn run<F, B>(&self, case: &TestCase, session_factory: F, body: B) -> CaseReport
    where
        F: FnOnce() -> VigilResult<Page>,
        B: FnOnce(&mut ScenarioContext<'_>) -> VigilResult<()>,
    {
        let name = case.full_name();
        if let GateDecision::Skip { reason } = evaluate(&case.skip_on, self.engine) {
            tracing::info!(case = %name, %reason, "case skipped");
            return CaseReport {
                name,
                engine: self.engine,
                outcome: Outcome::Skipped { reason },
                duration_ms: 0,
                steps: Vec::new(),
            };
        }

        tracing::info!(case = %name, engine = %self.engine, "case started");
        let page = match session_factory() {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(case = %name, error = %e, "session setup failed");
                return CaseReport {
                    name,
                    engine: self.engine,
                    outcome: Outcome::Failed {
                        step: SETUP_STEP.to_string(),
                        error: e.to_string(),
                    },
                    duration_ms: 0,
                    steps: Vec::new(),
                };
            }
        };

        let started = page.clock().now();
        let mut ctx = ScenarioContext::new(&page, &self.snapshots);
        let outcome = match body(&mut ctx) {
            Ok(()) => Outcome::Passed,
            Err(e) => {
                let error = e.to_string();
                Outcome::Failed {
                    step: ctx.failed_step(&error),
                    error,
                }
            }
        };
        let steps = std::mem::take(&mut ctx.steps);
        let duration_ms = millis(page.clock().now().saturating_sub(started));

        match &outcome {
            Outcome::Failed { step, error } => {
                tracing::warn!(case = %name, %step, %error, "case failed");
            }
            _ => tracing::info!(case = %name, duration_ms, "case passed"),
        }

        CaseReport {
            name,
            engine: self.engine,
            outcome,
            duration_ms,
            steps,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::expect::expect;
    use crate::result::VigilError;
    use crate::sim::{MediaSpec, SimEngine, SimFixture};
    use crate::snapshot::MemorySnapshotStore;
    use std::cell::Cell;
    use std::sync::Arc;

    fn runner(engine: Engine) -> ScenarioRunner {
        ScenarioRunner::new(
            engine,
            SnapshotComparator::new(Box::new(MemorySnapshotStore::new())),
        )
    }

    fn session(engine: Engine) -> VigilResult<Page> {
        let clock = ManualClock::new();
        let fixture = SimFixture::new()
            .with_media(MediaSpec::video("/media/a.mp4"))
            .with_media(MediaSpec::video("b.mp4"));
        let sim = SimEngine::new(fixture, engine, Arc::new(clock.clone()));
        Ok(Page::new(Box::new(sim), Arc::new(clock)))
    }

    mod case_tests {
        use super::*;

        #[test]
        fn test_full_name() {
            assert_eq!(TestCase::new("end_time").full_name(), "end_time");
            assert_eq!(
                TestCase::new("end_time").with_param("5").full_name(),
                "end_time[5]"
            );
        }

        #[test]
        fn test_outcome_predicates() {
            assert!(Outcome::Passed.is_passed());
            assert!(Outcome::Skipped { reason: "x".into() }.is_skipped());
            assert!(Outcome::Failed {
                step: "s".into(),
                error: "e".into()
            }
            .is_failed());
        }

        #[test]
        fn test_outcome_json_is_tagged() {
            let json = serde_json::to_value(Outcome::Skipped {
                reason: "no codec".into(),
            })
            .unwrap();
            assert_eq!(json["status"], "skipped");
        }
    }

    mod runner_tests {
        use super::*;

        #[test]
        fn test_skipped_case_never_builds_a_session() {
            let calls = Cell::new(0);
            let case = TestCase::new("rendering").skip_on_because(Engine::Chromium, "codecs");
            let report = runner(Engine::Chromium).run(
                &case,
                || {
                    calls.set(calls.get() + 1);
                    session(Engine::Chromium)
                },
                |_| Ok(()),
            );
            assert_eq!(calls.get(), 0);
            assert!(report.outcome.is_skipped());
            assert_eq!(report.duration_ms, 0);
        }

        #[test]
        fn test_passing_case_records_steps() {
            let case = TestCase::new("count");
            let report = runner(Engine::Firefox).run(
                &case,
                || session(Engine::Firefox),
                |ctx| {
                    ctx.step("count videos", |c| {
                        expect(&c.page().get_by_test_id("stVideo")).to_have_count(2)
                    })?;
                    ctx.step("warm up", |c| {
                        c.page().wait_for_timeout(2000);
                        Ok(())
                    })
                },
            );
            assert_eq!(report.outcome, Outcome::Passed);
            assert_eq!(report.steps.len(), 2);
            assert_eq!(report.steps[1].duration_ms, 2000);
            assert_eq!(report.duration_ms, 2000);
        }

        #[test]
        fn test_failure_names_the_step() {
            let case = TestCase::new("count");
            let report = runner(Engine::Firefox).run(
                &case,
                || session(Engine::Firefox),
                |ctx| {
                    ctx.step("count videos", |c| {
                        expect(&c.page().get_by_test_id("stVideo"))
                            .with_timeout(100)
                            .to_have_count(11)
                    })?;
                    ctx.step("never reached", |_| Ok(()))
                },
            );
            match report.outcome {
                Outcome::Failed { step, error } => {
                    assert_eq!(step, "count videos");
                    assert!(error.contains("expected 11"));
                    assert!(error.contains("got 2"));
                }
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(report.steps.len(), 1);
        }

        #[test]
        fn test_failure_outside_steps() {
            let report = runner(Engine::Firefox).run(
                &TestCase::new("raw"),
                || session(Engine::Firefox),
                |_| Err(VigilError::engine("boom")),
            );
            assert!(matches!(
                report.outcome,
                Outcome::Failed { ref step, .. } if step == BODY_STEP
            ));
        }

        #[test]
        fn test_recovered_step_failure_is_not_blamed_later() {
            let report = runner(Engine::Firefox).run(
                &TestCase::new("recover"),
                || session(Engine::Firefox),
                |ctx| {
                    let missing = ctx.step("optional overlay", |c| {
                        expect(&c.page().get_by_test_id("stToast"))
                            .with_timeout(0)
                            .to_have_count(1)
                    });
                    assert!(missing.is_err());
                    Err(VigilError::engine("connection lost"))
                },
            );
            match report.outcome {
                Outcome::Failed { step, error } => {
                    assert_eq!(step, BODY_STEP);
                    assert!(error.contains("connection lost"));
                }
                other => panic!("unexpected {other:?}"),
            }
            assert!(!report.steps[0].passed);
        }

        #[test]
        fn test_session_failure() {
            let report = runner(Engine::Webkit).run(
                &TestCase::new("raw"),
                || Err(VigilError::engine("no browser")),
                |_| Ok(()),
            );
            assert!(matches!(
                report.outcome,
                Outcome::Failed { ref step, .. } if step == SETUP_STEP
            ));
        }

        #[test]
        fn test_snapshot_through_context() {
            fn body(ctx: &mut ScenarioContext<'_>) -> VigilResult<()> {
                ctx.step("snapshot", |c| {
                    let first = c.page().get_by_test_id("stVideo").nth(0)?;
                    c.assert_snapshot(&first, "video_element_first", 0.0).map(|_| ())
                })
            }
            let run = runner(Engine::Firefox);
            let first = run.run(&TestCase::new("a"), || session(Engine::Firefox), body);
            let second = run.run(&TestCase::new("b"), || session(Engine::Firefox), body);
            assert!(first.outcome.is_passed());
            assert!(second.outcome.is_passed());
            assert!(run
                .snapshots()
                .store()
                .load("video_element_first")
                .unwrap()
                .is_some());
        }
    }
}
