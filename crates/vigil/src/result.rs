//! Result and error types for Vigil.

use thiserror::Error;

/// Result type for Vigil operations
pub type VigilResult<T> = Result<T, VigilError>;

/// Errors that can occur while driving or asserting against a page
#[derive(Debug, Error)]
pub enum VigilError {
    /// Expected and observed values differ
    #[error("Assertion failed on {subject}: expected {expected}, got {actual}")]
    AssertionMismatch {
        /// What was being asserted (e.g. `count of [data-testid="stVideo"]`)
        subject: String,
        /// Expected value, rendered for humans
        expected: String,
        /// Observed value, rendered for humans
        actual: String,
    },

    /// A polled condition never became true
    #[error("Timed out after {elapsed_ms}ms (budget {timeout_ms}ms) waiting for: {description}")]
    Timeout {
        /// Description of the predicate
        description: String,
        /// Time actually spent polling
        elapsed_ms: u64,
        /// Configured budget
        timeout_ms: u64,
    },

    /// Captured image diverged from its reference beyond the threshold
    #[error("Snapshot '{name}' differs by {difference:.4} (threshold {threshold:.4}); diff at {diff_path}")]
    SnapshotDivergence {
        /// Snapshot name
        name: String,
        /// Computed difference metric (0.0-1.0)
        difference: f64,
        /// Allowed threshold (0.0-1.0)
        threshold: f64,
        /// Where the captured image was written
        actual_path: String,
        /// Where the diff image was written
        diff_path: String,
    },

    /// No reference image exists and the store is read-only
    #[error("No reference snapshot named '{name}' (strict mode never records)")]
    SnapshotMissing {
        /// Snapshot name
        name: String,
    },

    /// Threshold outside [0, 1]
    #[error("Invalid snapshot threshold {threshold}: must be within [0, 1]")]
    InvalidThreshold {
        /// The rejected value
        threshold: f64,
    },

    /// Ordinal access beyond the current match count
    #[error("Index {index} out of range for {selector}: only {count} match(es)")]
    OutOfRange {
        /// Selector description
        selector: String,
        /// Requested index
        index: usize,
        /// Number of current matches
        count: usize,
    },

    /// Strict single-element resolution found nothing
    #[error("No element matches {selector}")]
    ElementNotFound {
        /// Selector description
        selector: String,
    },

    /// The element behind a handle was removed or remounted
    #[error("Element handle {handle} is stale (page was re-rendered)")]
    StaleElement {
        /// Handle description
        handle: String,
    },

    /// Engine control channel failure
    #[error("Engine error: {message}")]
    Engine {
        /// Error message
        message: String,
    },

    /// Image decode/encode failure
    #[error("Image comparison failed: {message}")]
    ImageComparison {
        /// Error message
        message: String,
    },

    /// Invalid configuration, fixture or suite
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Invalid attribute pattern
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl VigilError {
    /// Build an assertion mismatch from anything displayable
    pub fn mismatch(
        subject: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::AssertionMismatch {
            subject: subject.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Build an engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Whether this error means "the element is not there right now".
    ///
    /// Pollers treat these as a false predicate rather than a hard failure,
    /// since the page may be in the middle of a remount.
    #[must_use]
    pub const fn is_transient_lookup(&self) -> bool {
        matches!(
            self,
            Self::StaleElement { .. } | Self::OutOfRange { .. } | Self::ElementNotFound { .. }
        )
    }
}
