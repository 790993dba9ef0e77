//! Locator abstraction for element selection and interaction.
//!
//! A [`Locator`] is a selector plus an optional ordinal, bound to a page. It
//! holds no node references: every method re-queries the engine, so a
//! locator keeps working across remounts while an [`ElementHandle`] taken
//! earlier goes stale.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::engine::{CaptureTarget, ElementHandle};
use crate::page::Page;
use crate::result::{VigilError, VigilResult};

/// Accessible role used by role selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// `<input type=checkbox>` or equivalent
    Checkbox,
    /// Clickable button
    Button,
}

impl Role {
    /// ARIA role name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Checkbox => "checkbox",
            Self::Button => "button",
        }
    }
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Semantic test id (`data-testid` attribute)
    TestId(String),
    /// Elements whose text contains the given string
    Text(String),
    /// Role with accessible name
    Role {
        /// Role to match
        role: Role,
        /// Accessible name (label text)
        name: String,
    },
    /// `inner` matches that are descendants of an `outer` match
    Within {
        /// Scoping selector
        outer: Box<Selector>,
        /// Selector applied inside the scope
        inner: Box<Selector>,
    },
}

impl Selector {
    /// Create a test id selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: Role, name: impl Into<String>) -> Self {
        Self::Role {
            role,
            name: name.into(),
        }
    }

    /// Scope `inner` to descendants of `self`
    #[must_use]
    pub fn within(self, inner: Self) -> Self {
        Self::Within {
            outer: Box::new(self),
            inner: Box::new(inner),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestId(id) => write!(f, "[data-testid={id:?}]"),
            Self::Text(t) => write!(f, "text={t:?}"),
            Self::Role { role, name } => write!(f, "role={}[name={name:?}]", role.as_str()),
            Self::Within { outer, inner } => write!(f, "{outer} >> {inner}"),
        }
    }
}

/// A page-bound locator
#[derive(Debug, Clone)]
pub struct Locator<'p> {
    page: &'p Page,
    selector: Selector,
    index: Option<usize>,
}

impl<'p> Locator<'p> {
    pub(crate) const fn new(page: &'p Page, selector: Selector) -> Self {
        Self {
            page,
            selector,
            index: None,
        }
    }

    /// The selector behind this locator
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Ordinal this locator is pinned to, if any
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// The page this locator queries
    #[must_use]
    pub const fn page(&self) -> &'p Page {
        self.page
    }

    /// Human-readable description used in error messages
    #[must_use]
    pub fn description(&self) -> String {
        match self.index {
            Some(i) => format!("{} >> nth={i}", self.selector),
            None => self.selector.to_string(),
        }
    }

    /// Current number of matches
    pub fn count(&self) -> VigilResult<usize> {
        Ok(self.page.engine().query(&self.selector)?.len())
    }

    /// Zero-based ordinal access.
    ///
    /// Fails with [`VigilError::OutOfRange`] if `index` is not below the
    /// current match count.
    pub fn nth(&self, index: usize) -> VigilResult<Self> {
        let count = self.count()?;
        if index >= count {
            return Err(VigilError::OutOfRange {
                selector: self.selector.to_string(),
                index,
                count,
            });
        }
        Ok(Self {
            page: self.page,
            selector: self.selector.clone(),
            index: Some(index),
        })
    }

    /// First match
    pub fn first(&self) -> VigilResult<Self> {
        self.nth(0)
    }

    /// Scope a test id lookup to descendants of this locator's matches
    #[must_use]
    pub fn get_by_test_id(&self, id: impl Into<String>) -> Self {
        Self::new(
            self.page,
            self.selector.clone().within(Selector::test_id(id)),
        )
    }

    /// Resolve to a single live element.
    ///
    /// With an ordinal, picks that match (re-checking the range). Without
    /// one, exactly one match is required.
    pub fn resolve(&self) -> VigilResult<ElementHandle> {
        let nodes = self.page.engine().query(&self.selector)?;
        let ordinal = match self.index {
            Some(i) if i < nodes.len() => i,
            Some(i) => {
                return Err(VigilError::OutOfRange {
                    selector: self.selector.to_string(),
                    index: i,
                    count: nodes.len(),
                })
            }
            None if nodes.len() == 1 => 0,
            None if nodes.is_empty() => {
                return Err(VigilError::ElementNotFound {
                    selector: self.selector.to_string(),
                })
            }
            None => {
                return Err(VigilError::mismatch(
                    format!("strict resolution of {}", self.selector),
                    "exactly 1 element",
                    format!("{} elements", nodes.len()),
                ))
            }
        };
        Ok(ElementHandle {
            node: nodes[ordinal],
            selector: self.selector.to_string(),
            ordinal,
        })
    }

    /// Read an attribute of the resolved element
    pub fn attribute(&self, name: &str) -> VigilResult<Option<String>> {
        let handle = self.resolve()?;
        self.page.engine().attribute(handle.node, name)
    }

    /// Read a live property of the resolved element
    pub fn property(&self, name: &str) -> VigilResult<Value> {
        let handle = self.resolve()?;
        self.page.engine().property(handle.node, name)
    }

    /// Read a numeric property
    pub fn property_f64(&self, name: &str) -> VigilResult<f64> {
        let value = self.property(name)?;
        value.as_f64().ok_or_else(|| {
            VigilError::mismatch(
                format!("property '{name}' of {}", self.description()),
                "a number",
                &value,
            )
        })
    }

    /// Read a boolean property
    pub fn property_bool(&self, name: &str) -> VigilResult<bool> {
        let value = self.property(name)?;
        value.as_bool().ok_or_else(|| {
            VigilError::mismatch(
                format!("property '{name}' of {}", self.description()),
                "a boolean",
                &value,
            )
        })
    }

    /// Write a live property
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> VigilResult<()> {
        let handle = self.resolve()?;
        self.page.engine().set_property(handle.node, name, value.into())
    }

    /// Call a method on the element, e.g. `invoke("play", &[])`
    pub fn invoke(&self, method: &str, args: &[Value]) -> VigilResult<Value> {
        let handle = self.resolve()?;
        tracing::debug!(target = %self.description(), method, "invoke");
        self.page.engine().invoke(handle.node, method, args)
    }

    /// Simulate a click
    pub fn click(&self) -> VigilResult<()> {
        let handle = self.resolve()?;
        tracing::debug!(target = %self.description(), "click");
        self.page.engine().click(handle.node)
    }

    /// Scroll into view
    pub fn scroll_into_view_if_needed(&self) -> VigilResult<()> {
        let handle = self.resolve()?;
        self.page.engine().scroll_into_view(handle.node)
    }

    /// Whether the element exists and is visible
    pub fn is_visible(&self) -> VigilResult<bool> {
        match self.resolve() {
            Ok(handle) => self.page.engine().is_visible(handle.node),
            Err(e) if e.is_transient_lookup() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether the element's `class` attribute contains `class`
    pub fn has_class(&self, class: &str) -> VigilResult<bool> {
        Ok(self
            .attribute("class")?
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)))
    }

    /// Capture the element as PNG bytes
    pub fn screenshot(&self) -> VigilResult<Vec<u8>> {
        let handle = self.resolve()?;
        self.page.engine().capture(CaptureTarget::Element(handle.node))
    }
}

impl fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_test_id_display() {
            assert_eq!(
                Selector::test_id("stVideo").to_string(),
                "[data-testid=\"stVideo\"]"
            );
        }

        #[test]
        fn test_role_display() {
            let selector = Selector::role(Role::Checkbox, "Autoplay");
            assert_eq!(selector.to_string(), "role=checkbox[name=\"Autoplay\"]");
        }

        #[test]
        fn test_within_display() {
            let selector =
                Selector::test_id("stNumberInput").within(Selector::test_id("stNumberInputStepDown"));
            assert_eq!(
                selector.to_string(),
                "[data-testid=\"stNumberInput\"] >> [data-testid=\"stNumberInputStepDown\"]"
            );
        }

        #[test]
        fn test_text_selector_equality() {
            assert_eq!(Selector::text("Play"), Selector::Text("Play".into()));
            assert_ne!(Selector::text("Play"), Selector::test_id("Play"));
        }
    }
}
