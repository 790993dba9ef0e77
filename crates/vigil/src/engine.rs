//! Engine control channel.
//!
//! Everything Vigil knows about a rendered page comes through
//! [`EngineChannel`]. A backend (CDP, WebDriver, the in-process simulator)
//! implements it once; locators, waits and snapshots stay backend-agnostic.
//!
//! Every call is a synchronous request/response. There are no push
//! notifications, which is why waiting is done by polling.

use crate::locator::Selector;
use crate::result::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Rendering engine identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Chromium (Blink), shipped without proprietary codecs
    Chromium,
    /// Firefox (Gecko)
    Firefox,
    /// WebKit
    Webkit,
}

impl Engine {
    /// All known engines
    pub const ALL: [Self; 3] = [Self::Chromium, Self::Firefox, Self::Webkit];

    /// Lowercase name used in configuration and annotations
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Webkit => "webkit",
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::Chromium
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Self::Chromium),
            "firefox" | "gecko" => Ok(Self::Firefox),
            "webkit" | "safari" => Ok(Self::Webkit),
            other => Err(VigilError::Config {
                message: format!("unknown engine '{other}' (expected chromium, firefox or webkit)"),
            }),
        }
    }
}

/// Opaque identity of a live node.
///
/// The generation changes whenever the node is remounted, so a handle taken
/// before a re-render is detected as stale on its next use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Slot in the engine's node table
    pub index: usize,
    /// Mount generation of that slot
    pub generation: u64,
}

impl NodeId {
    /// Create a node id
    #[must_use]
    pub const fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}@{}", self.index, self.generation)
    }
}

/// Handle to a resolved element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// Engine node identity
    pub node: NodeId,
    /// Description of the selector that produced it
    pub selector: String,
    /// Position among the selector's matches at resolution time
    pub ordinal: usize,
}

impl ElementHandle {
    /// Read a live property through the engine
    pub fn property(&self, engine: &dyn EngineChannel, name: &str) -> VigilResult<Value> {
        engine.property(self.node, name)
    }

    /// Read an attribute through the engine
    pub fn attribute(&self, engine: &dyn EngineChannel, name: &str) -> VigilResult<Option<String>> {
        engine.attribute(self.node, name)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (nth={}, {})", self.selector, self.ordinal, self.node)
    }
}

/// What to capture for a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    /// The whole page
    Page,
    /// A single element
    Element(NodeId),
}

/// Request/response channel to a rendering engine
pub trait EngineChannel: fmt::Debug + Send {
    /// Identity of the engine behind this channel
    fn engine(&self) -> Engine;

    /// All nodes matching `selector`, in document order
    fn query(&self, selector: &Selector) -> VigilResult<Vec<NodeId>>;

    /// Read an attribute (`None` if absent)
    fn attribute(&self, node: NodeId, name: &str) -> VigilResult<Option<String>>;

    /// Read a live property (e.g. `currentTime`, `paused`)
    fn property(&self, node: NodeId, name: &str) -> VigilResult<Value>;

    /// Write a live property
    fn set_property(&self, node: NodeId, name: &str, value: Value) -> VigilResult<()>;

    /// Call a method on the element (e.g. `play`)
    fn invoke(&self, node: NodeId, method: &str, args: &[Value]) -> VigilResult<Value>;

    /// Simulate a primary-button click
    fn click(&self, node: NodeId) -> VigilResult<()>;

    /// Scroll the element into the viewport if it is not already there
    fn scroll_into_view(&self, node: NodeId) -> VigilResult<()>;

    /// Whether the element is rendered and visible
    fn is_visible(&self, node: NodeId) -> VigilResult<bool>;

    /// Capture a region as PNG bytes
    fn capture(&self, target: CaptureTarget) -> VigilResult<Vec<u8>>;
}
