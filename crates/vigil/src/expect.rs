//! Auto-waiting assertions (Playwright's `expect()`).
//!
//! `expect(&locator).to_have_count(11)?` keeps re-reading the page until the
//! assertion holds or the page's assertion timeout passes. On timeout the
//! error is an [`VigilError::AssertionMismatch`] carrying the last value
//! that was observed, not a bare timeout.

use crate::condition::NumericExpectation;
use crate::locator::Locator;
use crate::result::{VigilError, VigilResult};
use crate::spec_json::{json_eq, JsonSpec};
use crate::wait::WaitOptions;
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// How an observed string is compared
#[derive(Debug, Clone)]
pub enum TextMatcher {
    /// Whole-string equality
    Exact(String),
    /// Regex search (unanchored)
    Pattern(Regex),
}

impl TextMatcher {
    /// Exact match
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    /// Regex match; fails if the pattern does not compile
    pub fn pattern(pattern: &str) -> VigilResult<Self> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    /// Whether `actual` satisfies this matcher
    #[must_use]
    pub fn matches(&self, actual: &str) -> bool {
        match self {
            Self::Exact(expected) => actual == expected,
            Self::Pattern(re) => re.is_match(actual),
        }
    }
}

impl From<&str> for TextMatcher {
    fn from(text: &str) -> Self {
        Self::exact(text)
    }
}

impl From<Regex> for TextMatcher {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

impl fmt::Display for TextMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => write!(f, "{text:?}"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Assertion builder bound to a locator
#[derive(Debug, Clone)]
pub struct Expect<'a, 'p> {
    locator: &'a Locator<'p>,
    options: WaitOptions,
}

/// Create an expectation for a locator
#[must_use]
pub fn expect<'a, 'p>(locator: &'a Locator<'p>) -> Expect<'a, 'p> {
    Expect {
        locator,
        options: locator.page().options().assert_wait(),
    }
}

impl Expect<'_, '_> {
    /// Override the assertion timeout for this expectation
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = timeout_ms;
        self
    }

    /// Assert the number of matches
    pub fn to_have_count(&self, expected: usize) -> VigilResult<()> {
        self.poll(
            format!("count of {}", self.locator.selector()),
            expected,
            || self.locator.count(),
            |n| *n == expected,
        )
    }

    /// Assert the element exists and is visible
    pub fn to_be_visible(&self) -> VigilResult<()> {
        self.poll(
            format!("visibility of {}", self.locator),
            "visible",
            || self.locator.is_visible().map(Visibility),
            |v| v.0,
        )
    }

    /// Assert the element is missing or hidden
    pub fn to_be_hidden(&self) -> VigilResult<()> {
        self.poll(
            format!("visibility of {}", self.locator),
            "hidden",
            || self.locator.is_visible().map(Visibility),
            |v| !v.0,
        )
    }

    /// Assert an attribute value
    pub fn to_have_attribute(&self, name: &str, matcher: impl Into<TextMatcher>) -> VigilResult<()> {
        let matcher = matcher.into();
        self.poll(
            format!("attribute '{name}' of {}", self.locator),
            &matcher,
            || self.locator.attribute(name).map(Attribute),
            |a| a.0.as_deref().is_some_and(|v| matcher.matches(v)),
        )
    }

    /// Assert a live property equals a JSON value. Numbers compare by
    /// value, so `6` matches `6.0`.
    pub fn to_have_js_property(&self, name: &str, expected: impl Into<Value>) -> VigilResult<()> {
        let expected = expected.into();
        self.poll(
            format!("property '{name}' of {}", self.locator),
            &expected,
            || self.locator.property(name),
            |v| json_eq(v, &expected),
        )
    }

    /// Assert a numeric property satisfies a tolerance form
    pub fn to_have_numeric_property(
        &self,
        name: &str,
        expected: NumericExpectation,
    ) -> VigilResult<()> {
        expected.validate()?;
        self.poll(
            format!("property '{name}' of {}", self.locator),
            expected,
            || self.locator.property(name),
            |v| v.as_f64().is_some_and(|x| expected.matches(x)),
        )
    }

    /// Assert the element's `class` list contains `class`
    pub fn to_have_class(&self, class: &str) -> VigilResult<()> {
        self.poll(
            format!("class list of {}", self.locator),
            format!("to contain {class:?}"),
            || self.locator.attribute("class").map(Attribute),
            |a| {
                a.0.as_deref()
                    .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
            },
        )
    }

    /// Assert a value inside a JSON document stored in an attribute.
    ///
    /// `pointer` is a JSON pointer (`/encoding/x`) or a dotted path
    /// (`encoding.x`).
    pub fn to_have_json_at(&self, attribute: &str, pointer: &str, expected: &Value) -> VigilResult<()> {
        self.poll(
            format!("{pointer} in attribute '{attribute}' of {}", self.locator),
            expected,
            || {
                let raw = self.locator.attribute(attribute)?.unwrap_or_default();
                // not-yet-rendered documents read as absent
                Ok(SpecAt {
                    spec: JsonSpec::parse(&raw).ok(),
                    path: pointer,
                })
            },
            |at| {
                at.spec
                    .as_ref()
                    .is_some_and(|spec| spec.assert_eq_at(pointer, expected).is_ok())
            },
        )
    }

    /// Poll `observe` until `accept` holds. On timeout, report the last
    /// observation as the actual value.
    fn poll<T, O, A>(
        &self,
        subject: String,
        expected: impl fmt::Display,
        mut observe: O,
        accept: A,
    ) -> VigilResult<()>
    where
        T: fmt::Display,
        O: FnMut() -> VigilResult<T>,
        A: Fn(&T) -> bool,
    {
        let expected = expected.to_string();
        let mut last = String::from("<not observed>");
        let outcome = self.locator.page().waiter().wait_until(
            format!("{subject} to be {expected}"),
            || match observe() {
                Ok(value) => {
                    last = value.to_string();
                    Ok(accept(&value))
                }
                Err(e) => {
                    if e.is_transient_lookup() {
                        last = format!("<{e}>");
                    }
                    Err(e)
                }
            },
            &self.options,
        );
        match outcome {
            Ok(_) => Ok(()),
            Err(VigilError::Timeout { .. }) => Err(VigilError::mismatch(subject, expected, last)),
            Err(e) => Err(e),
        }
    }
}

struct Visibility(bool);

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "visible" } else { "hidden" })
    }
}

struct SpecAt<'a> {
    spec: Option<JsonSpec>,
    path: &'a str,
}

impl fmt::Display for SpecAt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.spec.as_ref().and_then(|spec| spec.get(self.path)) {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("<absent>"),
        }
    }
}

struct Attribute(Option<String>);

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => write!(f, "{v:?}"),
            None => f.write_str("<absent>"),
        }
    }
}
