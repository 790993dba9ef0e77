//! Playback model for simulated media elements.
//!
//! Time is whatever the clock says. A playing element advances from an
//! anchor position at 1x speed once it is ready; `loop` wraps inside
//! `[start_time, end)`, otherwise playback pauses at `end`.

use crate::engine::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Media element flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// `<video>`, test id `stVideo`
    #[default]
    Video,
    /// `<audio>`, test id `stAudio`
    Audio,
}

impl MediaKind {
    /// Test id (and top-level class) of elements of this kind
    #[must_use]
    pub const fn test_id(&self) -> &'static str {
        match self {
            Self::Video => "stVideo",
            Self::Audio => "stAudio",
        }
    }
}

/// Boolean media attribute a checkbox can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFlag {
    /// `autoplay`
    Autoplay,
    /// `muted`
    Muted,
    /// `loop`
    Loop,
}

/// Static description of a media element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaSpec {
    /// Name used by controls to target this element
    #[serde(default)]
    pub key: Option<String>,
    /// Video or audio
    #[serde(default)]
    pub kind: MediaKind,
    /// Source URL
    pub src: String,
    /// Initial playback position in seconds
    #[serde(default)]
    pub start_time: f64,
    /// Position at which playback stops or loops
    #[serde(default)]
    pub end_time: Option<f64>,
    /// Length of the media in seconds
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// Wrap at the end instead of pausing
    #[serde(default, rename = "loop")]
    pub looping: bool,
    /// Start playing as soon as ready
    #[serde(default)]
    pub autoplay: bool,
    /// Audio muted
    #[serde(default)]
    pub muted: bool,
    /// Render a subtitle track
    #[serde(default)]
    pub subtitles: bool,
    /// Time from mount until `readyState` reaches 4
    #[serde(default)]
    pub load_ms: u64,
    /// Engines lacking a codec for this source
    #[serde(default)]
    pub unsupported_on: Vec<Engine>,
    /// Rendered but not visible
    #[serde(default)]
    pub hidden: bool,
}

const fn default_duration() -> f64 {
    60.0
}

impl MediaSpec {
    /// A video with defaults
    #[must_use]
    pub fn video(src: impl Into<String>) -> Self {
        Self {
            key: None,
            kind: MediaKind::Video,
            src: src.into(),
            start_time: 0.0,
            end_time: None,
            duration: default_duration(),
            looping: false,
            autoplay: false,
            muted: false,
            subtitles: false,
            load_ms: 0,
            unsupported_on: Vec::new(),
            hidden: false,
        }
    }

    /// Set the control key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set start and end times
    #[must_use]
    pub const fn with_window(mut self, start_time: f64, end_time: Option<f64>) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    /// Enable looping
    #[must_use]
    pub const fn with_loop(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Enable autoplay
    #[must_use]
    pub const fn with_autoplay(mut self) -> Self {
        self.autoplay = true;
        self
    }

    /// Mute
    #[must_use]
    pub const fn with_muted(mut self) -> Self {
        self.muted = true;
        self
    }

    /// Enable subtitles
    #[must_use]
    pub const fn with_subtitles(mut self) -> Self {
        self.subtitles = true;
        self
    }

    /// Set load latency
    #[must_use]
    pub const fn with_load_ms(mut self, load_ms: u64) -> Self {
        self.load_ms = load_ms;
        self
    }

    /// Mark the source unplayable on `engine`
    #[must_use]
    pub fn unsupported_on(mut self, engine: Engine) -> Self {
        self.unsupported_on.push(engine);
        self
    }

    /// Where playback stops or wraps
    #[must_use]
    pub fn end(&self) -> f64 {
        self.end_time.map_or(self.duration, |end| end.min(self.duration))
    }
}

/// Live state of one mounted media element
#[derive(Debug, Clone)]
pub struct MediaState {
    spec: MediaSpec,
    supported: bool,
    mounted_at: Duration,
    anchor: f64,
    playing_since: Option<Duration>,
}

impl MediaState {
    /// Mount `spec` at `now` on `engine`
    #[must_use]
    pub fn mount(spec: MediaSpec, engine: Engine, now: Duration) -> Self {
        let supported = !spec.unsupported_on.contains(&engine);
        let mut state = Self {
            anchor: spec.start_time,
            playing_since: None,
            mounted_at: now,
            supported,
            spec,
        };
        if state.spec.autoplay {
            state.playing_since = Some(now);
        }
        state
    }

    /// Drop all runtime state and mount again from the current spec
    pub fn remount(&mut self, now: Duration) {
        let engine_supported = self.supported;
        *self = Self {
            anchor: self.spec.start_time,
            playing_since: self.spec.autoplay.then_some(now),
            mounted_at: now,
            supported: engine_supported,
            spec: self.spec.clone(),
        };
    }

    /// Current (possibly control-modified) description
    #[must_use]
    pub const fn spec(&self) -> &MediaSpec {
        &self.spec
    }

    /// Whether the engine can decode this source
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.supported
    }

    fn ready_at(&self) -> Option<Duration> {
        self.supported
            .then(|| self.mounted_at + Duration::from_millis(self.spec.load_ms))
    }

    /// HTML `readyState` (0-4)
    #[must_use]
    pub fn ready_state(&self, now: Duration) -> u8 {
        if !self.supported {
            return 0;
        }
        let load_ms = u128::from(self.spec.load_ms);
        if load_ms == 0 {
            return 4;
        }
        let elapsed_ms = now.saturating_sub(self.mounted_at).as_millis();
        u8::try_from((elapsed_ms * 4 / load_ms).min(4)).unwrap_or(4)
    }

    /// Playback position in seconds
    #[must_use]
    pub fn current_time(&self, now: Duration) -> f64 {
        let (Some(since), Some(ready_at)) = (self.playing_since, self.ready_at()) else {
            return self.anchor;
        };
        let started = since.max(ready_at);
        if now <= started {
            return self.anchor;
        }
        self.advance(now.saturating_sub(started).as_secs_f64())
    }

    fn advance(&self, elapsed: f64) -> f64 {
        let start = self.spec.start_time;
        let end = self.spec.end();
        let raw = self.anchor + elapsed;
        if raw < end {
            return raw;
        }
        if self.spec.looping {
            let span = end - start;
            if span <= 0.0 {
                return start;
            }
            start + (raw - start).rem_euclid(span)
        } else {
            end
        }
    }

    /// Whether playback reached the end (never true while looping)
    #[must_use]
    pub fn ended(&self, now: Duration) -> bool {
        !self.spec.looping && self.current_time(now) >= self.spec.end()
    }

    /// HTML `paused`
    #[must_use]
    pub fn paused(&self, now: Duration) -> bool {
        self.playing_since.is_none() || self.ended(now)
    }

    /// `play()`: restarts from `start_time` if playback had ended
    pub fn play(&mut self, now: Duration) {
        if self.ended(now) {
            self.anchor = self.spec.start_time;
            self.playing_since = Some(now);
            return;
        }
        if self.playing_since.is_none() {
            self.playing_since = Some(now);
        }
    }

    /// `pause()`
    pub fn pause(&mut self, now: Duration) {
        self.anchor = self.current_time(now);
        self.playing_since = None;
    }

    /// Toggle between playing and paused
    pub fn toggle(&mut self, now: Duration) {
        if self.paused(now) {
            self.play(now);
        } else {
            self.pause(now);
        }
    }

    /// Seek to `position`, clamped to `[0, duration]`
    pub fn seek(&mut self, position: f64, now: Duration) {
        self.anchor = position.clamp(0.0, self.spec.duration);
        if self.playing_since.is_some() {
            self.playing_since = Some(now);
        }
    }

    /// Set a flag. Turning autoplay on starts playback.
    pub fn set_flag(&mut self, flag: MediaFlag, on: bool, now: Duration) {
        match flag {
            MediaFlag::Autoplay => {
                self.spec.autoplay = on;
                if on {
                    self.play(now);
                }
            }
            MediaFlag::Muted => self.spec.muted = on,
            MediaFlag::Loop => {
                // freeze the position so the new end rule applies from here
                self.anchor = self.current_time(now);
                if self.playing_since.is_some() {
                    self.playing_since = Some(now.max(self.ready_at().unwrap_or(now)));
                }
                self.spec.looping = on;
            }
        }
    }

    /// Change `start_time` (takes effect on the next remount)
    pub fn set_start_time(&mut self, start_time: f64) {
        self.spec.start_time = start_time;
    }
}
