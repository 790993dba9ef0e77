//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Exit code when every case passed or was skipped
pub const EXIT_OK: u8 = 0;
/// Exit code when at least one case failed
pub const EXIT_FAILED: u8 = 1;
/// Exit code for usage and configuration errors
pub const EXIT_USAGE: u8 = 2;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Some cases failed
    #[error("{failed} case(s) failed")]
    CasesFailed {
        /// Number of failed cases
        failed: usize,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Vigil library error (suite, fixture or config loading)
    #[error("{0}")]
    Vigil(#[from] vigil::VigilError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Process exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::CasesFailed { .. } => EXIT_FAILED,
            Self::Config { .. } | Self::Io(_) | Self::Vigil(_) => EXIT_USAGE,
        }
    }
}
