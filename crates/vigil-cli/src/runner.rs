//! Suite execution against the simulated page

use crate::commands::{ListArgs, RunArgs};
use crate::error::{CliError, CliResult};
use std::path::Path;
use std::sync::Arc;
use vigil::sim::{SimEngine, SimFixture};
use vigil::{
    Engine, GateDecision, HarnessConfig, ManualClock, Page, ScenarioRunner, SnapshotMode,
    SuiteReport, SuiteRunner, SuiteSpec,
};

/// Layer defaults, config file, environment and flags, in that order
pub fn resolve_config<F>(args: &RunArgs, env: F) -> CliResult<HarnessConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_yaml_file(path)?,
        None => HarnessConfig::default(),
    }
    .with_env_from(env)?;

    if let Some(engine) = args.engine {
        config = config.with_engine(engine.into());
    }
    if args.update_snapshots {
        config = config.with_snapshot_mode(SnapshotMode::Update);
    }
    if args.strict_snapshots {
        config = config.with_snapshot_mode(SnapshotMode::Strict);
    }
    if let Some(dir) = &args.snapshot_dir {
        config = config.with_snapshot_dir(dir);
    }
    if let Some(dir) = &args.artifact_dir {
        config = config.with_artifact_dir(dir);
    }
    if args.fail_fast {
        config = config.with_fail_fast(true);
    }
    Ok(config)
}

/// Run `suite` with a fresh simulated session per case.
///
/// Each session gets its own manual clock, so waits cost no wall time.
#[must_use]
pub fn run_suite(config: &HarnessConfig, suite: &SuiteSpec, fixture: &SimFixture) -> SuiteReport {
    let runner = ScenarioRunner::new(config.engine, config.snapshot_comparator());
    let suite_runner = SuiteRunner::new(runner).with_fail_fast(config.fail_fast);
    let options = config.page_options();
    let engine = config.engine;
    suite_runner.run(suite, || {
        let clock = ManualClock::new();
        let sim = SimEngine::new(fixture.clone(), engine, Arc::new(clock.clone()));
        Ok(Page::with_options(Box::new(sim), Arc::new(clock), options))
    })
}

/// Load everything named by `args` and run it
pub fn execute_run<F>(args: &RunArgs, env: F) -> CliResult<SuiteReport>
where
    F: Fn(&str) -> Option<String>,
{
    let config = resolve_config(args, env)?;
    let suite = load_suite(&args.suite)?;
    let fixture = SimFixture::from_yaml_file(&args.fixture)?;
    tracing::debug!(?config, "resolved harness config");

    let report = run_suite(&config, &suite, &fixture);
    if let Some(path) = &args.output {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(report)
}

fn load_suite(path: &Path) -> CliResult<SuiteSpec> {
    let suite = SuiteSpec::from_yaml_file(path)?;
    if suite.cases.is_empty() {
        return Err(CliError::config(format!("suite {} has no cases", path.display())));
    }
    Ok(suite)
}

/// Gate decisions for every case of the suite in `args`
pub fn execute_list(args: &ListArgs) -> CliResult<Vec<(String, GateDecision)>> {
    let suite = load_suite(&args.suite)?;
    Ok(suite.list(Engine::from(args.engine)))
}
