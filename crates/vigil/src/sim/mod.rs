//! In-process simulated media page.
//!
//! [`SimEngine`] implements [`EngineChannel`] over a page described by a
//! [`SimFixture`]: media elements, the controls that drive them and chart
//! elements exposing a JSON spec. Playback follows the clock passed in, so
//! with a [`ManualClock`](crate::clock::ManualClock) a run is fully
//! deterministic.
//!
//! ```yaml
//! media:
//!   - src: /media/abc.mp4
//!     unsupported_on: [chromium]
//!   - key: autoplay
//!     src: https://example.com/clip.mp4
//! controls:
//!   - kind: checkbox
//!     label: Autoplay
//!     flag: autoplay
//!     targets: [autoplay]
//! ```

pub mod media;
pub mod render;

pub use media::{MediaFlag, MediaKind, MediaSpec, MediaState};

use crate::clock::SharedClock;
use crate::engine::{CaptureTarget, Engine, EngineChannel, NodeId};
use crate::locator::{Role, Selector};
use crate::result::{VigilError, VigilResult};
use crate::snapshot::encode;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// An input control on the simulated page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlSpec {
    /// Toggles a media flag on its targets
    Checkbox {
        /// Accessible label
        label: String,
        /// Flag driven by the checkbox
        flag: MediaFlag,
        /// Initial state
        #[serde(default)]
        checked: bool,
        /// Media keys (or ordinals) affected
        targets: Vec<String>,
    },
    /// Remounts its targets
    Button {
        /// Accessible label
        label: String,
        /// Media keys (or ordinals) remounted on click
        targets: Vec<String>,
    },
    /// Drives the start time of its targets; stepping remounts them
    NumberInput {
        /// Accessible label
        label: String,
        /// Initial value, applied as the targets' start time
        value: f64,
        /// Increment per step
        #[serde(default = "default_step")]
        step: f64,
        /// Media keys (or ordinals) affected
        targets: Vec<String>,
    },
}

const fn default_step() -> f64 {
    1.0
}

impl ControlSpec {
    fn targets(&self) -> &[String] {
        match self {
            Self::Checkbox { targets, .. }
            | Self::Button { targets, .. }
            | Self::NumberInput { targets, .. } => targets,
        }
    }

    fn label(&self) -> &str {
        match self {
            Self::Checkbox { label, .. }
            | Self::Button { label, .. }
            | Self::NumberInput { label, .. } => label,
        }
    }
}

/// A chart element exposing its plotting spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartSpec {
    /// Test id of the chart element
    #[serde(default = "default_chart_test_id")]
    pub test_id: String,
    /// Serialized plotting spec, exposed as `data-spec`
    pub spec: Value,
}

fn default_chart_test_id() -> String {
    String::from("stVegaLiteChart")
}

/// Description of a simulated page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimFixture {
    /// Media elements in document order
    #[serde(default)]
    pub media: Vec<MediaSpec>,
    /// Controls, rendered after the media
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
    /// Charts, rendered last
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

impl SimFixture {
    /// Empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a media element
    #[must_use]
    pub fn with_media(mut self, media: MediaSpec) -> Self {
        self.media.push(media);
        self
    }

    /// Append a control
    #[must_use]
    pub fn with_control(mut self, control: ControlSpec) -> Self {
        self.controls.push(control);
        self
    }

    /// Append a chart with the default test id
    #[must_use]
    pub fn with_chart(mut self, spec: Value) -> Self {
        self.charts.push(ChartSpec {
            test_id: default_chart_test_id(),
            spec,
        });
        self
    }

    /// Parse and validate a YAML fixture
    pub fn from_yaml_str(yaml: &str) -> VigilResult<Self> {
        let fixture: Self = serde_yaml_ng::from_str(yaml)?;
        fixture.validate()?;
        Ok(fixture)
    }

    /// Load and validate a YAML fixture file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> VigilResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| VigilError::Config {
            message: format!("cannot read fixture {}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check every control target names a media element
    pub fn validate(&self) -> VigilResult<()> {
        for control in &self.controls {
            for target in control.targets() {
                if self.resolve_target(target).is_none() {
                    return Err(VigilError::Config {
                        message: format!(
                            "control '{}' targets unknown media '{target}'",
                            control.label()
                        ),
                    });
                }
            }
        }
        for (i, media) in self.media.iter().enumerate() {
            if let Some(end) = media.end_time {
                if end <= media.start_time && media.looping {
                    return Err(VigilError::Config {
                        message: format!("media {i}: looping window [{}, {end}) is empty", media.start_time),
                    });
                }
            }
        }
        Ok(())
    }

    /// Media index for a key or ordinal
    fn resolve_target(&self, target: &str) -> Option<usize> {
        self.media
            .iter()
            .position(|m| m.key.as_deref() == Some(target))
            .or_else(|| target.parse::<usize>().ok().filter(|i| *i < self.media.len()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Media(usize),
    Checkbox(usize),
    Button(usize),
    NumberInput(usize),
    StepDown(usize),
    StepUp(usize),
    Chart(usize),
}

#[derive(Debug, Clone)]
struct SimNode {
    test_id: String,
    text: String,
    role: Option<(Role, String)>,
    parent: Option<usize>,
    kind: NodeKind,
    generation: u64,
}

#[derive(Debug)]
enum ControlState {
    Checkbox {
        flag: MediaFlag,
        checked: bool,
        targets: Vec<usize>,
    },
    Button {
        targets: Vec<usize>,
    },
    NumberInput {
        value: f64,
        step: f64,
        targets: Vec<usize>,
    },
}

#[derive(Debug)]
struct SimState {
    nodes: Vec<SimNode>,
    media: Vec<MediaState>,
    hidden: Vec<bool>,
    controls: Vec<ControlState>,
    charts: Vec<ChartSpec>,
}

/// Shared record of every command an engine received
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    fn push(&self, entry: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of all entries so far
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of commands received
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no command was received
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Simulated engine serving a [`SimFixture`]
#[derive(Debug)]
pub struct SimEngine {
    engine: Engine,
    clock: SharedClock,
    state: Mutex<SimState>,
    log: CallLog,
}

impl SimEngine {
    /// Mount `fixture` as rendered by `engine`.
    ///
    /// Control targets that do not resolve are ignored; fixtures loaded
    /// from YAML are validated before they get here.
    #[must_use]
    pub fn new(fixture: SimFixture, engine: Engine, clock: SharedClock) -> Self {
        let now = clock.now();
        let mut media_specs = fixture.media.clone();
        let mut nodes = Vec::new();
        let mut controls = Vec::new();

        let resolve = |targets: &[String]| -> Vec<usize> {
            targets
                .iter()
                .filter_map(|t| fixture.resolve_target(t))
                .collect()
        };

        for control in &fixture.controls {
            if let ControlSpec::NumberInput { value, targets, .. } = control {
                for i in resolve(targets) {
                    media_specs[i].start_time = *value;
                }
            }
        }

        for (i, spec) in media_specs.iter().enumerate() {
            nodes.push(SimNode {
                test_id: spec.kind.test_id().to_string(),
                text: String::new(),
                role: None,
                parent: None,
                kind: NodeKind::Media(i),
                generation: 0,
            });
        }

        for (i, control) in fixture.controls.iter().enumerate() {
            let label = control.label().to_string();
            match control {
                ControlSpec::Checkbox {
                    flag,
                    checked,
                    targets,
                    ..
                } => {
                    nodes.push(SimNode {
                        test_id: "stCheckbox".into(),
                        text: label.clone(),
                        role: Some((Role::Checkbox, label)),
                        parent: None,
                        kind: NodeKind::Checkbox(i),
                        generation: 0,
                    });
                    controls.push(ControlState::Checkbox {
                        flag: *flag,
                        checked: *checked,
                        targets: resolve(targets),
                    });
                }
                ControlSpec::Button { targets, .. } => {
                    nodes.push(SimNode {
                        test_id: "stButton".into(),
                        text: label.clone(),
                        role: Some((Role::Button, label)),
                        parent: None,
                        kind: NodeKind::Button(i),
                        generation: 0,
                    });
                    controls.push(ControlState::Button {
                        targets: resolve(targets),
                    });
                }
                ControlSpec::NumberInput {
                    value,
                    step,
                    targets,
                    ..
                } => {
                    let container = nodes.len();
                    nodes.push(SimNode {
                        test_id: "stNumberInput".into(),
                        text: label,
                        role: None,
                        parent: None,
                        kind: NodeKind::NumberInput(i),
                        generation: 0,
                    });
                    for (test_id, name, kind) in [
                        ("stNumberInputStepDown", "Decrement", NodeKind::StepDown(i)),
                        ("stNumberInputStepUp", "Increment", NodeKind::StepUp(i)),
                    ] {
                        nodes.push(SimNode {
                            test_id: test_id.into(),
                            text: String::new(),
                            role: Some((Role::Button, name.into())),
                            parent: Some(container),
                            kind,
                            generation: 0,
                        });
                    }
                    controls.push(ControlState::NumberInput {
                        value: *value,
                        step: *step,
                        targets: resolve(targets),
                    });
                }
            }
        }

        for (i, chart) in fixture.charts.iter().enumerate() {
            nodes.push(SimNode {
                test_id: chart.test_id.clone(),
                text: String::new(),
                role: None,
                parent: None,
                kind: NodeKind::Chart(i),
                generation: 0,
            });
        }

        let hidden = media_specs.iter().map(|m| m.hidden).collect();
        let media = media_specs
            .into_iter()
            .map(|spec| MediaState::mount(spec, engine, now))
            .collect();

        tracing::debug!(%engine, nodes = nodes.len(), "simulated page mounted");
        Self {
            engine,
            clock,
            state: Mutex::new(SimState {
                nodes,
                media,
                hidden,
                controls,
                charts: fixture.charts,
            }),
            log: CallLog::default(),
        }
    }

    /// Handle on this engine's command log
    #[must_use]
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> Duration {
        self.clock.now()
    }
}

impl SimState {
    fn node(&self, id: NodeId) -> VigilResult<&SimNode> {
        match self.nodes.get(id.index) {
            Some(node) if node.generation == id.generation => Ok(node),
            _ => Err(VigilError::StaleElement {
                handle: id.to_string(),
            }),
        }
    }

    fn matches(&self, index: usize, selector: &Selector) -> bool {
        let node = &self.nodes[index];
        match selector {
            Selector::TestId(id) => node.test_id == *id,
            Selector::Text(text) => !text.is_empty() && node.text.contains(text.as_str()),
            Selector::Role { role, name } => node.role.as_ref().is_some_and(|(r, label)| {
                r == role && label.to_lowercase().contains(&name.to_lowercase())
            }),
            Selector::Within { outer, inner } => {
                self.matches(index, inner) && self.has_ancestor_matching(index, outer)
            }
        }
    }

    fn has_ancestor_matching(&self, index: usize, selector: &Selector) -> bool {
        let mut current = self.nodes[index].parent;
        while let Some(parent) = current {
            if self.matches(parent, selector) {
                return true;
            }
            current = self.nodes[parent].parent;
        }
        false
    }

    fn is_hidden(&self, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            if let NodeKind::Media(m) = self.nodes[i].kind {
                if self.hidden[m] {
                    return true;
                }
            }
            current = self.nodes[i].parent;
        }
        false
    }

    fn media_node(&self, media: usize) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.kind == NodeKind::Media(media))
    }

    fn remount(&mut self, media: usize, now: Duration) {
        self.media[media].remount(now);
        if let Some(node) = self.media_node(media) {
            self.nodes[node].generation += 1;
        }
    }

    fn media_property(&self, media: usize, name: &str, now: Duration) -> Value {
        let state = &self.media[media];
        let spec = state.spec();
        match name {
            "currentTime" => json!(state.current_time(now)),
            "paused" => json!(state.paused(now)),
            "ended" => json!(state.ended(now)),
            "autoplay" => json!(spec.autoplay),
            "muted" => json!(spec.muted),
            "loop" => json!(spec.looping),
            "readyState" => json!(state.ready_state(now)),
            "duration" => json!(spec.duration),
            "src" | "currentSrc" => json!(spec.src),
            _ => Value::Null,
        }
    }

    fn attribute(&self, index: usize, name: &str) -> Option<String> {
        let node = &self.nodes[index];
        match (name, node.kind) {
            ("data-testid", _) => Some(node.test_id.clone()),
            ("class", NodeKind::Media(_)) => Some(format!("{} stElement", node.test_id)),
            ("class", _) => Some(node.test_id.clone()),
            ("aria-label", _) => node.role.as_ref().map(|(_, label)| label.clone()),
            ("src", NodeKind::Media(m)) => Some(self.media[m].spec().src.clone()),
            ("autoplay", NodeKind::Media(m)) => self.media[m].spec().autoplay.then(String::new),
            ("muted", NodeKind::Media(m)) => self.media[m].spec().muted.then(String::new),
            ("loop", NodeKind::Media(m)) => self.media[m].spec().looping.then(String::new),
            ("aria-checked", NodeKind::Checkbox(c)) => match self.controls.get(c) {
                Some(ControlState::Checkbox { checked, .. }) => Some(checked.to_string()),
                _ => None,
            },
            ("data-spec", NodeKind::Chart(c)) => Some(self.charts[c].spec.to_string()),
            _ => None,
        }
    }

    fn click(&mut self, index: usize, now: Duration) {
        match self.nodes[index].kind {
            NodeKind::Media(m) => self.media[m].toggle(now),
            NodeKind::Checkbox(c) => {
                if let Some(ControlState::Checkbox {
                    flag,
                    checked,
                    targets,
                }) = self.controls.get_mut(c)
                {
                    *checked = !*checked;
                    for &m in targets.iter() {
                        self.media[m].set_flag(*flag, *checked, now);
                    }
                }
            }
            NodeKind::Button(c) => {
                let targets = match self.controls.get(c) {
                    Some(ControlState::Button { targets }) => targets.clone(),
                    _ => Vec::new(),
                };
                for m in targets {
                    self.remount(m, now);
                }
            }
            NodeKind::StepDown(c) | NodeKind::StepUp(c) => {
                let down = matches!(self.nodes[index].kind, NodeKind::StepDown(_));
                let (new_value, targets) = match self.controls.get_mut(c) {
                    Some(ControlState::NumberInput {
                        value,
                        step,
                        targets,
                    }) => {
                        *value = if down { *value - *step } else { *value + *step };
                        (*value, targets.clone())
                    }
                    _ => return,
                };
                for m in targets {
                    self.media[m].set_start_time(new_value);
                    self.remount(m, now);
                }
            }
            NodeKind::NumberInput(_) | NodeKind::Chart(_) => {}
        }
    }

    fn render(&self, index: usize, now: Duration) -> RgbaImage {
        let node = &self.nodes[index];
        match node.kind {
            NodeKind::Media(m) => render::media(&self.media[m], now),
            NodeKind::Checkbox(c) => {
                let checked = matches!(
                    self.controls.get(c),
                    Some(ControlState::Checkbox { checked: true, .. })
                );
                render::swatch(&format!("{}:{checked}", node.text), 24, 12)
            }
            NodeKind::NumberInput(c) => {
                let value = match self.controls.get(c) {
                    Some(ControlState::NumberInput { value, .. }) => *value,
                    _ => 0.0,
                };
                render::swatch(&format!("{}:{value}", node.text), 48, 12)
            }
            NodeKind::Chart(c) => render::swatch(&self.charts[c].spec.to_string(), 64, 48),
            NodeKind::Button(_) | NodeKind::StepDown(_) | NodeKind::StepUp(_) => {
                render::swatch(&node.test_id, 24, 12)
            }
        }
    }
}

impl EngineChannel for SimEngine {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn query(&self, selector: &Selector) -> VigilResult<Vec<NodeId>> {
        self.log.push(format!("query {selector}"));
        let state = self.lock();
        Ok((0..state.nodes.len())
            .filter(|&i| state.matches(i, selector))
            .map(|i| NodeId::new(i, state.nodes[i].generation))
            .collect())
    }

    fn attribute(&self, node: NodeId, name: &str) -> VigilResult<Option<String>> {
        self.log.push(format!("attribute {node} {name}"));
        let state = self.lock();
        state.node(node)?;
        Ok(state.attribute(node.index, name))
    }

    fn property(&self, node: NodeId, name: &str) -> VigilResult<Value> {
        self.log.push(format!("property {node} {name}"));
        let now = self.now();
        let state = self.lock();
        let sim_node = state.node(node)?;
        Ok(match sim_node.kind {
            NodeKind::Media(m) => state.media_property(m, name, now),
            _ if name == "textContent" => json!(sim_node.text),
            NodeKind::Checkbox(c) if name == "checked" => match state.controls.get(c) {
                Some(ControlState::Checkbox { checked, .. }) => json!(checked),
                _ => Value::Null,
            },
            NodeKind::NumberInput(c) if name == "value" => match state.controls.get(c) {
                Some(ControlState::NumberInput { value, .. }) => json!(value),
                _ => Value::Null,
            },
            _ => Value::Null,
        })
    }

    fn set_property(&self, node: NodeId, name: &str, value: Value) -> VigilResult<()> {
        self.log.push(format!("set_property {node} {name}={value}"));
        let now = self.now();
        let mut state = self.lock();
        let NodeKind::Media(m) = state.node(node)?.kind else {
            return Err(VigilError::engine(format!("{node} has no writable property '{name}'")));
        };
        let media = &mut state.media[m];
        match (name, &value) {
            ("currentTime", Value::Number(n)) => {
                media.seek(n.as_f64().unwrap_or(0.0), now);
            }
            ("muted", Value::Bool(on)) => media.set_flag(MediaFlag::Muted, *on, now),
            ("loop", Value::Bool(on)) => media.set_flag(MediaFlag::Loop, *on, now),
            ("autoplay", Value::Bool(on)) => media.set_flag(MediaFlag::Autoplay, *on, now),
            _ => {
                return Err(VigilError::engine(format!(
                    "cannot set '{name}' to {value} on {node}"
                )))
            }
        }
        Ok(())
    }

    fn invoke(&self, node: NodeId, method: &str, _args: &[Value]) -> VigilResult<Value> {
        self.log.push(format!("invoke {node} {method}"));
        let now = self.now();
        let mut state = self.lock();
        let NodeKind::Media(m) = state.node(node)?.kind else {
            return Err(VigilError::engine(format!("{node} has no method '{method}'")));
        };
        match method {
            "play" => state.media[m].play(now),
            "pause" => state.media[m].pause(now),
            "load" => state.remount(m, now),
            other => return Err(VigilError::engine(format!("unknown media method '{other}'"))),
        }
        Ok(Value::Null)
    }

    fn click(&self, node: NodeId) -> VigilResult<()> {
        self.log.push(format!("click {node}"));
        let now = self.now();
        let mut state = self.lock();
        state.node(node)?;
        if state.is_hidden(node.index) {
            return Err(VigilError::engine(format!("{node} is not visible")));
        }
        state.click(node.index, now);
        Ok(())
    }

    fn scroll_into_view(&self, node: NodeId) -> VigilResult<()> {
        self.log.push(format!("scroll_into_view {node}"));
        self.lock().node(node).map(|_| ())
    }

    fn is_visible(&self, node: NodeId) -> VigilResult<bool> {
        self.log.push(format!("is_visible {node}"));
        let state = self.lock();
        state.node(node)?;
        Ok(!state.is_hidden(node.index))
    }

    fn capture(&self, target: CaptureTarget) -> VigilResult<Vec<u8>> {
        self.log.push(format!("capture {target:?}"));
        let now = self.now();
        let state = self.lock();
        let img = match target {
            CaptureTarget::Element(node) => {
                state.node(node)?;
                state.render(node.index, now)
            }
            CaptureTarget::Page => {
                let parts: Vec<RgbaImage> = (0..state.nodes.len())
                    .filter(|&i| state.nodes[i].parent.is_none() && !state.is_hidden(i))
                    .map(|i| state.render(i, now))
                    .collect();
                render::page(&parts)
            }
        };
        encode(&img)
    }
}
