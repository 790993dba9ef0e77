//! Environment gate: per-engine skip annotations.
//!
//! Decided from static metadata only, before a session exists.

use crate::engine::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// "Do not run this case under `engine`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipAnnotation {
    /// Excluded engine
    pub engine: Engine,
    /// Why, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SkipAnnotation {
    /// Exclude `engine` without a reason
    #[must_use]
    pub const fn engine(engine: Engine) -> Self {
        Self {
            engine,
            reason: None,
        }
    }

    /// Attach a reason
    #[must_use]
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Whether a case should run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Run the case
    Run,
    /// Skip it
    Skip {
        /// Human-readable reason
        reason: String,
    },
}

impl GateDecision {
    /// Whether the case runs
    #[must_use]
    pub const fn is_run(&self) -> bool {
        matches!(self, Self::Run)
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => f.write_str("run"),
            Self::Skip { reason } => write!(f, "skip ({reason})"),
        }
    }
}

/// Check `active` against a case's annotations. The first match wins.
#[must_use]
pub fn evaluate(annotations: &[SkipAnnotation], active: Engine) -> GateDecision {
    annotations
        .iter()
        .find(|a| a.engine == active)
        .map_or(GateDecision::Run, |a| GateDecision::Skip {
            reason: match &a.reason {
                Some(reason) => format!("skipped on {active}: {reason}"),
                None => format!("skipped on {active}"),
            },
        })
}
