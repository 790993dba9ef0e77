//! Page session.
//!
//! A [`Page`] is one scenario's session: an engine channel, the clock the
//! poller sleeps on and the default timeouts. Locators borrow the page, so
//! they cannot outlive the session that produced them.

use crate::clock::SharedClock;
use crate::engine::{CaptureTarget, Engine, EngineChannel};
use crate::expect::expect;
use crate::locator::{Locator, Role, Selector};
use crate::result::{VigilError, VigilResult};
use crate::wait::{WaitOptions, WaitResult, Waiter};
use serde::{Deserialize, Serialize};

/// Default timeouts applied by a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOptions {
    /// Budget for `expect(..)` assertions in milliseconds
    pub assert_timeout_ms: u64,
    /// Budget for explicit `wait_until` calls in milliseconds
    pub wait_timeout_ms: u64,
    /// Interval between predicate evaluations in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            assert_timeout_ms: 5_000,
            wait_timeout_ms: 5_000,
            poll_interval_ms: 100,
        }
    }
}

impl PageOptions {
    /// Set the assertion timeout
    #[must_use]
    pub const fn with_assert_timeout(mut self, ms: u64) -> Self {
        self.assert_timeout_ms = ms;
        self
    }

    /// Set the explicit wait timeout
    #[must_use]
    pub const fn with_wait_timeout(mut self, ms: u64) -> Self {
        self.wait_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Wait options used by `expect(..)`
    #[must_use]
    pub fn assert_wait(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(self.assert_timeout_ms)
            .with_poll_interval(self.poll_interval_ms)
    }

    /// Wait options used by `wait_until`
    #[must_use]
    pub fn explicit_wait(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(self.wait_timeout_ms)
            .with_poll_interval(self.poll_interval_ms)
    }
}

/// A live page session
#[derive(Debug)]
pub struct Page {
    engine: Box<dyn EngineChannel>,
    waiter: Waiter,
    options: PageOptions,
}

impl Page {
    /// Wrap an engine channel with default options
    #[must_use]
    pub fn new(engine: Box<dyn EngineChannel>, clock: SharedClock) -> Self {
        Self::with_options(engine, clock, PageOptions::default())
    }

    /// Wrap an engine channel with explicit options
    #[must_use]
    pub fn with_options(
        engine: Box<dyn EngineChannel>,
        clock: SharedClock,
        options: PageOptions,
    ) -> Self {
        Self {
            engine,
            waiter: Waiter::new(clock),
            options,
        }
    }

    /// The engine channel
    #[must_use]
    pub fn engine(&self) -> &dyn EngineChannel {
        self.engine.as_ref()
    }

    /// Identity of the engine behind this page
    #[must_use]
    pub fn engine_id(&self) -> Engine {
        self.engine.engine()
    }

    /// The clock this page waits on
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        self.waiter.clock()
    }

    /// The poller bound to this page's clock
    #[must_use]
    pub const fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Default timeouts
    #[must_use]
    pub const fn options(&self) -> &PageOptions {
        &self.options
    }

    /// Locate elements by semantic test id
    #[must_use]
    pub fn get_by_test_id(&self, id: impl Into<String>) -> Locator<'_> {
        self.locator(Selector::test_id(id))
    }

    /// Locate elements by visible text
    #[must_use]
    pub fn get_by_text(&self, text: impl Into<String>) -> Locator<'_> {
        self.locator(Selector::text(text))
    }

    /// Locate elements by role and accessible name
    #[must_use]
    pub fn get_by_role(&self, role: Role, name: impl Into<String>) -> Locator<'_> {
        self.locator(Selector::role(role, name))
    }

    /// Locate elements by an arbitrary selector
    #[must_use]
    pub const fn locator(&self, selector: Selector) -> Locator<'_> {
        Locator::new(self, selector)
    }

    /// Fixed delay. Only for warm-ups with a known minimum latency.
    pub fn wait_for_timeout(&self, ms: u64) {
        self.waiter.wait_for_timeout(ms);
    }

    /// Poll `predicate` with the page's explicit wait budget
    pub fn wait_until<F>(&self, description: impl Into<String>, predicate: F) -> VigilResult<WaitResult>
    where
        F: FnMut() -> VigilResult<bool>,
    {
        self.waiter
            .wait_until(description, predicate, &self.options.explicit_wait())
    }

    /// Click the first checkbox labelled `label`
    pub fn click_checkbox(&self, label: &str) -> VigilResult<()> {
        tracing::info!(label, "click checkbox");
        self.get_by_role(Role::Checkbox, label).first()?.click()
    }

    /// Click the first button labelled `label`
    pub fn click_button(&self, label: &str) -> VigilResult<()> {
        tracing::info!(label, "click button");
        self.get_by_role(Role::Button, label).first()?.click()
    }

    /// Assert that every element with `test_id` carries `test_id` as a class
    pub fn check_top_level_class(&self, test_id: &str) -> VigilResult<()> {
        let elements = self.get_by_test_id(test_id);
        let count = elements.count()?;
        if count == 0 {
            return Err(VigilError::ElementNotFound {
                selector: elements.description(),
            });
        }
        for i in 0..count {
            expect(&elements.nth(i)?).to_have_class(test_id)?;
        }
        Ok(())
    }

    /// Capture the whole page as PNG bytes
    pub fn screenshot(&self) -> VigilResult<Vec<u8>> {
        self.engine.capture(CaptureTarget::Page)
    }
}
