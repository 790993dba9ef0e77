//! Suite reports: text, JSON and JUnit renderings.

use crate::engine::Engine;
use crate::result::VigilResult;
use crate::scenario::{CaseReport, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Outcome of running a suite on one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite: String,
    /// Active engine
    pub engine: Engine,
    /// Wall-clock start time
    pub started_at: DateTime<Utc>,
    /// Per-case results in execution order
    pub cases: Vec<CaseReport>,
    /// Cases not run because fail-fast stopped the suite
    #[serde(default)]
    pub not_run: usize,
}

impl SuiteReport {
    /// Empty report starting now
    #[must_use]
    pub fn new(suite: impl Into<String>, engine: Engine) -> Self {
        Self {
            suite: suite.into(),
            engine,
            started_at: Utc::now(),
            cases: Vec::new(),
            not_run: 0,
        }
    }

    /// Append a case result
    pub fn record(&mut self, case: CaseReport) {
        self.cases.push(case);
    }

    /// Passed cases
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_passed()).count()
    }

    /// Failed cases
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_failed()).count()
    }

    /// Skipped cases
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_skipped()).count()
    }

    /// Cases with a result
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.cases.len()
    }

    /// No failures
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Sum of case durations on the page clock
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        self.cases.iter().map(|c| c.duration_ms).sum()
    }

    /// Failing cases
    #[must_use]
    pub fn failures(&self) -> Vec<&CaseReport> {
        self.cases.iter().filter(|c| c.outcome.is_failed()).collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} on {}: {} passed, {} failed, {} skipped",
            self.suite,
            self.engine,
            self.passed_count(),
            self.failed_count(),
            self.skipped_count()
        );
        if self.not_run > 0 {
            let _ = write!(line, ", {} not run", self.not_run);
        }
        line
    }

    /// Plain-text report, one line per case
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for case in &self.cases {
            let _ = match &case.outcome {
                Outcome::Passed => writeln!(out, "PASS {} ({}ms)", case.name, case.duration_ms),
                Outcome::Skipped { reason } => writeln!(out, "SKIP {} ({reason})", case.name),
                Outcome::Failed { step, error } => {
                    writeln!(out, "FAIL {} at '{step}'\n     {error}", case.name)
                }
            };
        }
        let _ = writeln!(out, "{}", self.summary());
        out
    }

    /// Pretty JSON
    pub fn to_json(&self) -> VigilResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JUnit XML
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        #[allow(clippy::cast_precision_loss)]
        let total_secs = self.total_duration_ms() as f64 / 1000.0;
        let _ = writeln!(
            xml,
            r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{total_secs:.3}" timestamp="{}">"#,
            escape_xml(&self.suite),
            self.total_count(),
            self.failed_count(),
            self.skipped_count(),
            self.started_at.to_rfc3339()
        );
        for case in &self.cases {
            #[allow(clippy::cast_precision_loss)]
            let secs = case.duration_ms as f64 / 1000.0;
            let _ = write!(
                xml,
                r#"  <testcase name="{}" classname="{}" time="{secs:.3}""#,
                escape_xml(&case.name),
                case.engine
            );
            match &case.outcome {
                Outcome::Passed => xml.push_str("/>\n"),
                Outcome::Skipped { reason } => {
                    let _ = writeln!(
                        xml,
                        ">\n    <skipped message=\"{}\"/>\n  </testcase>",
                        escape_xml(reason)
                    );
                }
                Outcome::Failed { step, error } => {
                    let _ = writeln!(
                        xml,
                        ">\n    <failure message=\"{}\">{}</failure>\n  </testcase>",
                        escape_xml(step),
                        escape_xml(error)
                    );
                }
            }
        }
        xml.push_str("</testsuite>\n");
        xml
    }

    /// Write the JSON report to `path`
    pub fn write_json(&self, path: &Path) -> VigilResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn case(name: &str, outcome: Outcome, duration_ms: u64) -> CaseReport {
        CaseReport {
            name: name.into(),
            engine: Engine::Firefox,
            outcome,
            duration_ms,
            steps: Vec::new(),
        }
    }

    fn sample() -> SuiteReport {
        let mut report = SuiteReport::new("st_video", Engine::Firefox);
        report.record(case("count", Outcome::Passed, 120));
        report.record(case(
            "end_time[6]",
            Outcome::Skipped {
                reason: "skipped on firefox".into(),
            },
            0,
        ));
        report.record(case(
            "autoplay",
            Outcome::Failed {
                step: "paused".into(),
                error: "expected false, got <true>".into(),
            },
            5000,
        ));
        report
    }

    #[test]
    fn test_counts() {
        let report = sample();
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.total_count(), 3);
        assert!(!report.all_passed());
        assert_eq!(report.total_duration_ms(), 5120);
        assert_eq!(report.failures()[0].name, "autoplay");
    }

    #[test]
    fn test_summary_mentions_not_run() {
        let mut report = sample();
        assert_eq!(
            report.summary(),
            "st_video on firefox: 1 passed, 1 failed, 1 skipped"
        );
        report.not_run = 2;
        assert!(report.summary().ends_with(", 2 not run"));
    }

    #[test]
    fn test_text_rendering() {
        let text = sample().render_text();
        assert!(text.contains("PASS count (120ms)"));
        assert!(text.contains("SKIP end_time[6]"));
        assert!(text.contains("FAIL autoplay at 'paused'"));
    }

    #[test]
    fn test_json_round_trip() {
        let report = sample();
        let parsed: SuiteReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_junit_escapes() {
        let xml = sample().render_junit();
        assert!(xml.contains(r#"tests="3" failures="1" skipped="1""#));
        assert!(xml.contains("&lt;true&gt;"));
        assert!(xml.contains("<skipped message=\"skipped on firefox\"/>"));
    }
}
