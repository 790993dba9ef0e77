//! Report rendering for the terminal

use crate::commands::FormatArg;
use console::{style, Term};
use vigil::{GateDecision, Outcome, SuiteReport};

/// Writes reports and case listings to stdout
#[derive(Debug)]
pub struct Printer {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Printer {
    /// Create a new printer
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    /// Print a finished suite in `format`
    pub fn report(&self, report: &SuiteReport, format: FormatArg) -> std::io::Result<()> {
        match format {
            FormatArg::Json => self
                .term
                .write_line(&serde_json::to_string_pretty(report).map_err(std::io::Error::other)?),
            FormatArg::Junit => self.term.write_str(&report.render_junit()),
            FormatArg::Text => self.text(report),
        }
    }

    fn text(&self, report: &SuiteReport) -> std::io::Result<()> {
        for case in &report.cases {
            match &case.outcome {
                Outcome::Passed if !self.quiet => {
                    let line = format!("{} ({}ms)", case.name, case.duration_ms);
                    self.line(&self.tag("PASS", Tag::Pass), &line)?;
                }
                Outcome::Skipped { reason } if !self.quiet => {
                    let line = format!("{} ({reason})", case.name);
                    self.line(&self.tag("SKIP", Tag::Skip), &line)?;
                }
                Outcome::Failed { step, error } => {
                    let line = format!("{} at '{step}'", case.name);
                    self.line(&self.tag("FAIL", Tag::Fail), &line)?;
                    self.term.write_line(&format!("     {error}"))?;
                }
                _ => {}
            }
        }
        let summary = report.summary();
        let summary = if !self.use_color {
            summary
        } else if report.all_passed() {
            style(summary).green().bold().to_string()
        } else {
            style(summary).red().bold().to_string()
        };
        self.term.write_line(&summary)
    }

    /// Print each planned case with its gate decision
    pub fn listing(&self, cases: &[(String, GateDecision)]) -> std::io::Result<()> {
        for (name, decision) in cases {
            match decision {
                GateDecision::Run => self.line(&self.tag("RUN ", Tag::Pass), name)?,
                GateDecision::Skip { reason } => {
                    self.line(&self.tag("SKIP", Tag::Skip), &format!("{name} ({reason})"))?;
                }
            }
        }
        let runnable = cases.iter().filter(|(_, d)| d.is_run()).count();
        self.term
            .write_line(&format!("{runnable} of {} case(s) would run", cases.len()))
    }

    fn tag(&self, text: &str, tag: Tag) -> String {
        if !self.use_color {
            return text.to_string();
        }
        match tag {
            Tag::Pass => style(text).green().bold().to_string(),
            Tag::Skip => style(text).yellow().to_string(),
            Tag::Fail => style(text).red().bold().to_string(),
        }
    }

    fn line(&self, tag: &str, message: &str) -> std::io::Result<()> {
        self.term.write_line(&format!("{tag} {message}"))
    }
}

#[derive(Clone, Copy)]
enum Tag {
    Pass,
    Skip,
    Fail,
}
