//! Vigil: end-to-end test harness for media UI components
//!
//! Tests locate rendered elements by stable test ids, poll live element
//! state until it converges, compare captured pixels against stored
//! reference images, and gate cases on the active browser engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       VIGIL Architecture                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────┐   ┌──────────┐   ┌─────────────┐ │
//! │  │ Suite     │──►│ Scenario   │──►│ Page /   │──►│ Engine      │ │
//! │  │ (YAML)    │   │ Driver     │   │ Locator  │   │ Channel     │ │
//! │  └───────────┘   └─────┬──────┘   └────┬─────┘   │ (sim, ...)  │ │
//! │        gate ◄──────────┘               │         └─────────────┘ │
//! │                         waits / expect ┴ snapshots               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vigil::prelude::*;
//!
//! let clock = ManualClock::new();
//! let fixture = SimFixture::new().with_media(MediaSpec::video("/media/clip.mp4"));
//! let engine = SimEngine::new(fixture, Engine::Firefox, Arc::new(clock.clone()));
//! let page = Page::new(Box::new(engine), Arc::new(clock));
//!
//! expect(&page.get_by_test_id("stVideo")).to_have_count(1).unwrap();
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod clock;
pub mod condition;
pub mod config;
pub mod engine;
pub mod expect;
pub mod gate;
pub mod locator;
pub mod page;
pub mod report;
mod result;
pub mod scenario;
pub mod sim;
pub mod snapshot;
pub mod spec_json;
pub mod suite;
pub mod wait;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use condition::NumericExpectation;
pub use config::HarnessConfig;
pub use engine::{CaptureTarget, ElementHandle, Engine, EngineChannel, NodeId};
pub use expect::{expect, Expect, TextMatcher};
pub use gate::{evaluate, GateDecision, SkipAnnotation};
pub use locator::{Locator, Role, Selector};
pub use page::{Page, PageOptions};
pub use report::SuiteReport;
pub use result::{VigilError, VigilResult};
pub use scenario::{CaseReport, Outcome, ScenarioContext, ScenarioRunner, StepRecord, TestCase};
pub use snapshot::{
    FsSnapshotStore, ImageComparator, ImageDiff, MemorySnapshotStore, SnapshotComparator,
    SnapshotMode, SnapshotOutcome, SnapshotStore,
};
pub use spec_json::JsonSpec;
pub use suite::{CaseSpec, Step, SuiteRunner, SuiteSpec, Target};
pub use wait::{WaitCondition, WaitOptions, WaitResult, Waiter};

/// Everything a test file usually needs
pub mod prelude {
    pub use super::clock::*;
    pub use super::condition::*;
    pub use super::config::*;
    pub use super::engine::*;
    pub use super::expect::*;
    pub use super::gate::*;
    pub use super::locator::*;
    pub use super::page::*;
    pub use super::report::*;
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::sim::{ChartSpec, ControlSpec, MediaFlag, MediaKind, MediaSpec, SimEngine, SimFixture};
    pub use super::snapshot::*;
    pub use super::spec_json::*;
    pub use super::suite::*;
    pub use super::wait::*;
}
