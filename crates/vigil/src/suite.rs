//! Declarative YAML suites.
//!
//! A suite is a list of cases; a case is a list of steps, optional skip
//! annotations and optional parameters. A parametrized case expands into one
//! case per parameter, `name[value]`, each carrying the case's skips plus
//! the parameter's own. Targets may use `nth: $param`.
//!
//! ```yaml
//! name: st_video
//! cases:
//!   - name: end_time
//!     params:
//!       - value: 5
//!         skip_on: [{engine: webkit}]
//!       - value: 6
//!         skip_on: [{engine: chromium}]
//!     steps:
//!       - action: count
//!         target: {test_id: stVideo}
//!         equals: 11
//!       - action: invoke
//!         target: {test_id: stVideo, nth: $param}
//!         method: play
//! ```

use crate::condition::NumericExpectation;
use crate::engine::Engine;
use crate::expect::{expect, TextMatcher};
use crate::gate::{evaluate, GateDecision, SkipAnnotation};
use crate::locator::Locator;
use crate::page::Page;
use crate::report::SuiteReport;
use crate::result::{VigilError, VigilResult};
use crate::scenario::{ScenarioContext, ScenarioRunner, TestCase};
use crate::spec_json::JsonSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Placeholder for the current parameter value in a target ordinal
pub const PARAM_PLACEHOLDER: &str = "$param";

/// A suite file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteSpec {
    /// Suite name
    pub name: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Cases in execution order
    pub cases: Vec<CaseSpec>,
}

/// One case (possibly parametrized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseSpec {
    /// Case name
    pub name: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Engines the whole case is excluded on
    #[serde(default)]
    pub skip_on: Vec<SkipAnnotation>,
    /// Parameter instances; empty means a single unparametrized case
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// Steps in order
    pub steps: Vec<Step>,
}

/// One parameter instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSpec {
    /// The value, substituted for `$param`
    pub value: Value,
    /// Engines this instance is excluded on
    #[serde(default)]
    pub skip_on: Vec<SkipAnnotation>,
}

/// Element ordinal: a literal or `$param`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ordinal {
    /// Literal zero-based index
    Index(usize),
    /// Placeholder, must be `$param`
    Param(String),
}

/// What a step acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Test id of the element
    pub test_id: String,
    /// Test id of an enclosing element
    #[serde(default)]
    pub within: Option<String>,
    /// Pick one match
    #[serde(default)]
    pub nth: Option<Ordinal>,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(outer) = &self.within {
            write!(f, "{outer} >> ")?;
        }
        f.write_str(&self.test_id)?;
        match &self.nth {
            Some(Ordinal::Index(i)) => write!(f, "[{i}]"),
            Some(Ordinal::Param(p)) => write!(f, "[{p}]"),
            None => Ok(()),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_spec_attribute() -> String {
    String::from("data-spec")
}

/// A single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Assert the number of matches
    Count {
        /// Elements to count
        target: Target,
        /// Expected count
        equals: usize,
    },
    /// Fixed warm-up delay
    WaitForTimeout {
        /// Milliseconds
        ms: u64,
    },
    /// Assert visibility
    Visible {
        /// Element
        target: Target,
        /// `false` asserts hidden
        #[serde(default = "default_true")]
        visible: bool,
    },
    /// Assert an attribute, exactly or by regex
    Attribute {
        /// Element
        target: Target,
        /// Attribute name
        name: String,
        /// Exact value
        #[serde(default)]
        equals: Option<String>,
        /// Regex (search)
        #[serde(default)]
        matches: Option<String>,
    },
    /// Assert a live property equals a JSON value
    Property {
        /// Element
        target: Target,
        /// Property name
        name: String,
        /// Expected value
        equals: Value,
    },
    /// Assert a numeric property against a tolerance form
    Numeric {
        /// Element
        target: Target,
        /// Property name
        name: String,
        /// Tolerance form
        expect: NumericExpectation,
        /// Use the explicit wait budget (reports a timeout) instead of the
        /// assertion budget (reports a mismatch)
        #[serde(default)]
        wait_until: bool,
    },
    /// Compare against a reference image
    Snapshot {
        /// Element, or the whole page when absent
        #[serde(default)]
        target: Option<Target>,
        /// Reference name
        name: String,
        /// Allowed difference (0-1)
        #[serde(default)]
        threshold: f64,
    },
    /// Call an element method
    Invoke {
        /// Element
        target: Target,
        /// Method name
        method: String,
        /// Arguments
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Write a live property
    SetProperty {
        /// Element
        target: Target,
        /// Property name
        name: String,
        /// New value
        value: Value,
    },
    /// Scroll into view
    ScrollIntoView {
        /// Element
        target: Target,
    },
    /// Click
    Click {
        /// Element
        target: Target,
    },
    /// Click a checkbox by label
    ClickCheckbox {
        /// Accessible label
        label: String,
    },
    /// Click a button by label
    ClickButton {
        /// Accessible label
        label: String,
    },
    /// Every element with this test id carries it as a class
    TopLevelClass {
        /// Test id
        test_id: String,
    },
    /// Assert a value inside a JSON document attribute
    JsonField {
        /// Element
        target: Target,
        /// Attribute holding the document
        #[serde(default = "default_spec_attribute")]
        attribute: String,
        /// JSON pointer or dotted path
        path: String,
        /// Expected value
        #[serde(default)]
        equals: Option<Value>,
        /// Expected presence
        #[serde(default)]
        present: Option<bool>,
        /// Expected number of entries of an array or object
        #[serde(default)]
        len: Option<usize>,
    },
}

impl Step {
    /// Label used in reports
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Count { target, equals } => format!("count {target} == {equals}"),
            Self::WaitForTimeout { ms } => format!("wait {ms}ms"),
            Self::Visible { target, visible } => {
                format!("{target} {}", if *visible { "visible" } else { "hidden" })
            }
            Self::Attribute {
                target,
                name,
                equals,
                matches,
            } => match (equals, matches) {
                (Some(v), _) => format!("{target} @{name} == {v:?}"),
                (None, Some(re)) => format!("{target} @{name} ~ /{re}/"),
                (None, None) => format!("{target} @{name}"),
            },
            Self::Property {
                target,
                name,
                equals,
            } => format!("{target}.{name} == {equals}"),
            Self::Numeric {
                target,
                name,
                expect,
                ..
            } => format!("{target}.{name}: {}", expect.describe(name)),
            Self::Snapshot { target, name, .. } => match target {
                Some(t) => format!("snapshot {t} as {name}"),
                None => format!("snapshot page as {name}"),
            },
            Self::Invoke { target, method, .. } => format!("{target}.{method}()"),
            Self::SetProperty {
                target,
                name,
                value,
            } => format!("{target}.{name} = {value}"),
            Self::ScrollIntoView { target } => format!("scroll {target} into view"),
            Self::Click { target } => format!("click {target}"),
            Self::ClickCheckbox { label } => format!("click checkbox {label:?}"),
            Self::ClickButton { label } => format!("click button {label:?}"),
            Self::TopLevelClass { test_id } => format!("top-level class {test_id}"),
            Self::JsonField {
                target, path, len, ..
            } => match len {
                Some(n) => format!("{target} spec len({path}) == {n}"),
                None => format!("{target} spec {path}"),
            },
        }
    }

    fn target(&self) -> Option<&Target> {
        match self {
            Self::Count { target, .. }
            | Self::Visible { target, .. }
            | Self::Attribute { target, .. }
            | Self::Property { target, .. }
            | Self::Numeric { target, .. }
            | Self::Invoke { target, .. }
            | Self::SetProperty { target, .. }
            | Self::ScrollIntoView { target }
            | Self::Click { target }
            | Self::JsonField { target, .. } => Some(target),
            Self::Snapshot { target, .. } => target.as_ref(),
            Self::WaitForTimeout { .. }
            | Self::ClickCheckbox { .. }
            | Self::ClickButton { .. }
            | Self::TopLevelClass { .. } => None,
        }
    }
}

/// A case after parameter expansion
#[derive(Debug, Clone)]
pub struct PlannedCase<'s> {
    /// Name and combined skip annotations
    pub case: TestCase,
    /// Parameter value, if any
    pub param: Option<&'s Value>,
    /// Steps to run
    pub steps: &'s [Step],
}

impl SuiteSpec {
    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> VigilResult<Self> {
        let suite: Self = serde_yaml_ng::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> VigilResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| VigilError::Config {
            message: format!("cannot read suite {}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Static checks that do not need a page
    pub fn validate(&self) -> VigilResult<()> {
        let mut names = HashSet::new();
        for planned in self.plan() {
            let name = planned.case.full_name();
            if !names.insert(name.clone()) {
                return Err(invalid(format!("duplicate case name '{name}'")));
            }
        }
        for case in &self.cases {
            for step in &case.steps {
                validate_step(case, step)?;
            }
        }
        Ok(())
    }

    /// Expand parameters into concrete cases, in order
    #[must_use]
    pub fn plan(&self) -> Vec<PlannedCase<'_>> {
        let mut planned = Vec::new();
        for case in &self.cases {
            if case.params.is_empty() {
                let mut test_case = TestCase::new(&case.name);
                test_case.skip_on.clone_from(&case.skip_on);
                planned.push(PlannedCase {
                    case: test_case,
                    param: None,
                    steps: &case.steps,
                });
                continue;
            }
            for param in &case.params {
                let mut test_case = TestCase::new(&case.name).with_param(param_label(&param.value));
                test_case.skip_on = case
                    .skip_on
                    .iter()
                    .chain(&param.skip_on)
                    .cloned()
                    .collect();
                planned.push(PlannedCase {
                    case: test_case,
                    param: Some(&param.value),
                    steps: &case.steps,
                });
            }
        }
        planned
    }

    /// Gate decisions for every planned case on `engine`
    #[must_use]
    pub fn list(&self, engine: Engine) -> Vec<(String, GateDecision)> {
        self.plan()
            .into_iter()
            .map(|p| (p.case.full_name(), evaluate(&p.case.skip_on, engine)))
            .collect()
    }
}

fn invalid(message: String) -> VigilError {
    VigilError::Config { message }
}

fn param_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn validate_step(case: &CaseSpec, step: &Step) -> VigilResult<()> {
    let context = |msg: &str| invalid(format!("case '{}', step '{}': {msg}", case.name, step.label()));

    if let Some(target) = step.target() {
        match &target.nth {
            Some(Ordinal::Param(p)) if p != PARAM_PLACEHOLDER => {
                return Err(context(&format!("ordinal must be a number or {PARAM_PLACEHOLDER}, got '{p}'")));
            }
            Some(Ordinal::Param(_)) if case.params.is_empty() => {
                return Err(context("uses $param but the case has no params"));
            }
            _ => {}
        }
    }

    match step {
        Step::Attribute {
            equals, matches, ..
        } => match (equals, matches) {
            (Some(_), None) => Ok(()),
            (None, Some(pattern)) => TextMatcher::pattern(pattern).map(|_| ()),
            _ => Err(context("exactly one of 'equals' or 'matches' is required")),
        },
        Step::Snapshot { threshold, .. } if !(0.0..=1.0).contains(threshold) => {
            Err(VigilError::InvalidThreshold {
                threshold: *threshold,
            })
        }
        Step::Numeric { expect, .. } => expect
            .validate()
            .map_err(|e| context(&e.to_string())),
        Step::JsonField {
            equals,
            present,
            len,
            ..
        } if [equals.is_some(), present.is_some(), len.is_some()]
            .iter()
            .filter(|set| **set)
            .count()
            != 1 =>
        {
            Err(context("exactly one of 'equals', 'present' or 'len' is required"))
        }
        _ => Ok(()),
    }
}

/// Resolve a step target on a page
pub fn locate<'p>(page: &'p Page, target: &Target, param: Option<&Value>) -> VigilResult<Locator<'p>> {
    let base = match &target.within {
        Some(outer) => page.get_by_test_id(outer).get_by_test_id(&target.test_id),
        None => page.get_by_test_id(&target.test_id),
    };
    match &target.nth {
        None => Ok(base),
        Some(Ordinal::Index(i)) => base.nth(*i),
        Some(Ordinal::Param(_)) => {
            let index = param
                .and_then(Value::as_u64)
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| {
                    invalid(format!(
                        "{target}: parameter {} is not an element index",
                        param.map_or_else(|| String::from("<none>"), ToString::to_string)
                    ))
                })?;
            base.nth(index)
        }
    }
}

/// Execute one step
pub fn execute_step(ctx: &ScenarioContext<'_>, step: &Step, param: Option<&Value>) -> VigilResult<()> {
    let page = ctx.page();
    match step {
        Step::Count { target, equals } => {
            // count applies to the collection even when an ordinal is given
            let all = Target {
                nth: None,
                ..target.clone()
            };
            expect(&locate(page, &all, param)?).to_have_count(*equals)
        }
        Step::WaitForTimeout { ms } => {
            page.wait_for_timeout(*ms);
            Ok(())
        }
        Step::Visible { target, visible } => {
            let locator = locate(page, target, param)?;
            if *visible {
                expect(&locator).to_be_visible()
            } else {
                expect(&locator).to_be_hidden()
            }
        }
        Step::Attribute {
            target,
            name,
            equals,
            matches,
        } => {
            let matcher = match (equals, matches) {
                (Some(value), _) => TextMatcher::exact(value.clone()),
                (None, Some(pattern)) => TextMatcher::pattern(pattern)?,
                (None, None) => return Err(invalid(format!("{}: no matcher", step.label()))),
            };
            expect(&locate(page, target, param)?).to_have_attribute(name, matcher)
        }
        Step::Property {
            target,
            name,
            equals,
        } => expect(&locate(page, target, param)?).to_have_js_property(name, equals.clone()),
        Step::Numeric {
            target,
            name,
            expect: expected,
            wait_until,
        } => {
            let locator = locate(page, target, param)?;
            if *wait_until {
                page.wait_until(step.label(), || {
                    Ok(locator
                        .property(name)?
                        .as_f64()
                        .is_some_and(|x| expected.matches(x)))
                })
                .map(|_| ())
            } else {
                expect(&locator).to_have_numeric_property(name, *expected)
            }
        }
        Step::Snapshot {
            target,
            name,
            threshold,
        } => match target {
            Some(t) => ctx
                .assert_snapshot(&locate(page, t, param)?, name, *threshold)
                .map(|_| ()),
            None => ctx
                .snapshots()
                .assert_page(page, name, *threshold)
                .map(|_| ()),
        },
        Step::Invoke {
            target,
            method,
            args,
        } => locate(page, target, param)?.invoke(method, args).map(|_| ()),
        Step::SetProperty {
            target,
            name,
            value,
        } => locate(page, target, param)?.set_property(name, value.clone()),
        Step::ScrollIntoView { target } => locate(page, target, param)?.scroll_into_view_if_needed(),
        Step::Click { target } => locate(page, target, param)?.click(),
        Step::ClickCheckbox { label } => page.click_checkbox(label),
        Step::ClickButton { label } => page.click_button(label),
        Step::TopLevelClass { test_id } => page.check_top_level_class(test_id),
        Step::JsonField {
            target,
            attribute,
            path,
            equals,
            present,
            len,
        } => {
            let locator = locate(page, target, param)?;
            if let Some(expected) = equals {
                return expect(&locator).to_have_json_at(attribute, path, expected);
            }
            let raw = locator.attribute(attribute)?.unwrap_or_default();
            let spec = JsonSpec::parse(&raw)?;
            match (present, len) {
                (Some(true), _) => spec.assert_present(path),
                (Some(false), _) => spec.assert_absent(path),
                (None, Some(n)) => spec.assert_len_at(path, *n),
                (None, None) => Err(invalid(format!("{}: no expectation", step.label()))),
            }
        }
    }
}

/// Runs a whole suite on one engine
#[derive(Debug)]
pub struct SuiteRunner {
    runner: ScenarioRunner,
    fail_fast: bool,
}

impl SuiteRunner {
    /// Wrap a scenario runner
    #[must_use]
    pub const fn new(runner: ScenarioRunner) -> Self {
        Self {
            runner,
            fail_fast: false,
        }
    }

    /// Stop at the first failing case
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// The underlying scenario runner
    #[must_use]
    pub const fn scenario_runner(&self) -> &ScenarioRunner {
        &self.runner
    }

    /// Run every planned case, each with a fresh session
    pub fn run<F>(&self, suite: &SuiteSpec, session_factory: F) -> SuiteReport
    where
        F: Fn() -> VigilResult<Page>,
    {
        let engine = self.runner.engine();
        let mut report = SuiteReport::new(&suite.name, engine);
        let planned = suite.plan();
        let total = planned.len();
        tracing::info!(suite = %suite.name, %engine, cases = total, "suite started");

        for (i, planned_case) in planned.iter().enumerate() {
            let case_report = self.runner.run(&planned_case.case, &session_factory, |ctx| {
                for step in planned_case.steps {
                    ctx.step(step.label(), |c| execute_step(c, step, planned_case.param))?;
                }
                Ok(())
            });
            let failed = case_report.outcome.is_failed();
            report.record(case_report);
            if failed && self.fail_fast {
                report.not_run = total - i - 1;
                tracing::warn!(suite = %suite.name, not_run = report.not_run, "fail-fast: stopping suite");
                break;
            }
        }

        tracing::info!(summary = %report.summary(), "suite finished");
        report
    }
}
