//! Harness configuration.
//!
//! Layering, lowest first: defaults, a YAML file, `VIGIL_*` environment
//! variables, then explicit builder calls (the CLI maps its flags onto
//! those).

use crate::engine::Engine;
use crate::page::PageOptions;
use crate::result::{VigilError, VigilResult};
use crate::snapshot::{FsSnapshotStore, SnapshotComparator, SnapshotMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable selecting the engine
pub const ENV_ENGINE: &str = "VIGIL_ENGINE";
/// Environment variable forcing snapshot update mode (`1`/`true`)
pub const ENV_UPDATE_SNAPSHOTS: &str = "VIGIL_UPDATE_SNAPSHOTS";
/// Environment variable overriding the reference directory
pub const ENV_SNAPSHOT_DIR: &str = "VIGIL_SNAPSHOT_DIR";

/// Harness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Active engine
    pub engine: Engine,
    /// Budget for `expect(..)` assertions
    pub assert_timeout_ms: u64,
    /// Budget for explicit waits
    pub wait_timeout_ms: u64,
    /// Interval between predicate evaluations
    pub poll_interval_ms: u64,
    /// Reference image directory
    pub snapshot_dir: PathBuf,
    /// Failure artifact directory
    pub artifact_dir: PathBuf,
    /// Reference store mode
    pub snapshot_mode: SnapshotMode,
    /// Per-pixel channel tolerance (0-255)
    pub color_tolerance: u8,
    /// Stop the suite at the first failing case
    pub fail_fast: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let page = PageOptions::default();
        Self {
            engine: Engine::default(),
            assert_timeout_ms: page.assert_timeout_ms,
            wait_timeout_ms: page.wait_timeout_ms,
            poll_interval_ms: page.poll_interval_ms,
            snapshot_dir: PathBuf::from("__snapshots__"),
            artifact_dir: PathBuf::from("target/vigil-artifacts"),
            snapshot_mode: SnapshotMode::Accept,
            color_tolerance: 0,
            fail_fast: false,
        }
    }
}

impl HarnessConfig {
    /// Defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML; missing keys take defaults
    pub fn from_yaml_str(yaml: &str) -> VigilResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> VigilResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| VigilError::Config {
            message: format!("cannot read config {}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `VIGIL_*` overrides from an arbitrary lookup
    pub fn with_env_from<F>(mut self, lookup: F) -> VigilResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(engine) = lookup(ENV_ENGINE) {
            self.engine = engine.parse()?;
        }
        if let Some(update) = lookup(ENV_UPDATE_SNAPSHOTS) {
            if parse_flag(ENV_UPDATE_SNAPSHOTS, &update)? {
                self.snapshot_mode = SnapshotMode::Update;
            }
        }
        if let Some(dir) = lookup(ENV_SNAPSHOT_DIR) {
            self.snapshot_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    /// Set the engine
    #[must_use]
    pub const fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Set the assertion timeout
    #[must_use]
    pub const fn with_assert_timeout(mut self, ms: u64) -> Self {
        self.assert_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the reference directory
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set the snapshot mode
    #[must_use]
    pub const fn with_snapshot_mode(mut self, mode: SnapshotMode) -> Self {
        self.snapshot_mode = mode;
        self
    }

    /// Set the per-pixel color tolerance
    #[must_use]
    pub const fn with_color_tolerance(mut self, tolerance: u8) -> Self {
        self.color_tolerance = tolerance;
        self
    }

    /// Enable or disable fail-fast
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Page timeouts derived from this config
    #[must_use]
    pub const fn page_options(&self) -> PageOptions {
        PageOptions {
            assert_timeout_ms: self.assert_timeout_ms,
            wait_timeout_ms: self.wait_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Filesystem-backed comparator derived from this config
    #[must_use]
    pub fn snapshot_comparator(&self) -> SnapshotComparator {
        SnapshotComparator::new(Box::new(FsSnapshotStore::new(&self.snapshot_dir)))
            .with_mode(self.snapshot_mode)
            .with_color_tolerance(self.color_tolerance)
            .with_artifact_dir(&self.artifact_dir)
    }
}

fn parse_flag(key: &str, value: &str) -> VigilResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(VigilError::Config {
            message: format!("{key} must be a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = HarnessConfig::default();
            assert_eq!(config.engine, Engine::Chromium);
            assert_eq!(config.assert_timeout_ms, 5_000);
            assert_eq!(config.snapshot_mode, SnapshotMode::Accept);
            assert_eq!(config.color_tolerance, 0);
        }

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config =
                HarnessConfig::from_yaml_str("engine: webkit\nsnapshot_mode: strict\n").unwrap();
            assert_eq!(config.engine, Engine::Webkit);
            assert_eq!(config.snapshot_mode, SnapshotMode::Strict);
            assert_eq!(config.poll_interval_ms, 100);
        }

        #[test]
        fn test_unknown_key_rejected() {
            assert!(HarnessConfig::from_yaml_str("engnie: webkit\n").is_err());
        }

        #[test]
        fn test_missing_file() {
            let err = HarnessConfig::from_yaml_file("/nonexistent/vigil.yaml").unwrap_err();
            assert!(matches!(err, VigilError::Config { .. }));
        }

        #[test]
        fn test_page_options() {
            let config = HarnessConfig::new()
                .with_assert_timeout(250)
                .with_poll_interval(25);
            let page = config.page_options();
            assert_eq!(page.assert_timeout_ms, 250);
            assert_eq!(page.poll_interval_ms, 25);
        }
    }

    mod env_tests {
        use super::*;

        #[test]
        fn test_env_overrides_file() {
            let config = HarnessConfig::from_yaml_str("engine: webkit\n")
                .unwrap()
                .with_env_from(env(&[
                    (ENV_ENGINE, "firefox"),
                    (ENV_UPDATE_SNAPSHOTS, "1"),
                    (ENV_SNAPSHOT_DIR, "/tmp/refs"),
                ]))
                .unwrap();
            assert_eq!(config.engine, Engine::Firefox);
            assert_eq!(config.snapshot_mode, SnapshotMode::Update);
            assert_eq!(config.snapshot_dir, PathBuf::from("/tmp/refs"));
        }

        #[test]
        fn test_false_flag_leaves_mode() {
            let config = HarnessConfig::new()
                .with_snapshot_mode(SnapshotMode::Strict)
                .with_env_from(env(&[(ENV_UPDATE_SNAPSHOTS, "false")]))
                .unwrap();
            assert_eq!(config.snapshot_mode, SnapshotMode::Strict);
        }

        #[test]
        fn test_bad_env_values() {
            assert!(HarnessConfig::new()
                .with_env_from(env(&[(ENV_ENGINE, "lynx")]))
                .is_err());
            assert!(HarnessConfig::new()
                .with_env_from(env(&[(ENV_UPDATE_SNAPSHOTS, "maybe")]))
                .is_err());
        }

        #[test]
        fn test_builders_override_env() {
            let config = HarnessConfig::new()
                .with_env_from(env(&[(ENV_ENGINE, "firefox")]))
                .unwrap()
                .with_engine(Engine::Webkit);
            assert_eq!(config.engine, Engine::Webkit);
        }
    }
}
