//! # Trajectory Playback
//!
//! A small state machine that replays a trajectory one ping at a time and
//! yields a smoothly interpolated marker position for every animation frame.
//!
//! ```text
//!            play()                 reached last ping
//! Stopped ──────────▶ Playing ─────────────────────────▶ Paused
//!    ▲                 │  ▲                                 │
//!    │      pause()    │  │             play()              │
//!    │                 ▼  │                                 │
//!    │               Paused ◀───────────────────────────────┘
//!    └──────── stop() / set_trajectory() from any state
//! ```
//!
//! The controller never spawns timers. The host calls [`PlaybackController::tick`]
//! from its frame scheduler (about every [`FRAME_INTERVAL`]); the controller
//! reads elapsed time from an injected [`Clock`]. Tests use [`ManualClock`] to
//! step time deterministically.
//!
//! While playing, elapsed time accumulates until it reaches
//! `step_interval_ms / speed_multiplier`, then the cursor moves one ping
//! forward and the accumulator resets. Each cursor move starts a linear
//! interpolation from the currently displayed position to the new ping over
//! `interpolation_ms`. With nothing displayed yet, the marker snaps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::{GeoPosition, Ping};

/// Speed multipliers offered by the playback control.
pub const PLAYBACK_SPEEDS: [f64; 8] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 10.0, 20.0];

/// Suggested scheduler period (~60 Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

// =============================================================================
// Clocks
// =============================================================================

/// Monotonic time source for the controller.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time from [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

// =============================================================================
// Configuration & State
// =============================================================================

/// Configuration for trajectory playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial speed multiplier (default 1)
    pub speed_multiplier: f64,
    /// Time per ping at 1x (ms, default 1000)
    pub step_interval_ms: f64,
    /// Marker glide time between pings (ms, default 500)
    pub interpolation_ms: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            step_interval_ms: 1000.0,
            interpolation_ms: 500.0,
        }
    }
}

/// Lifecycle of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

/// Snapshot handed to renderers each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub cursor_index: usize,
    pub is_playing: bool,
    pub speed_multiplier: f64,
    pub interpolated_position: Option<GeoPosition>,
}

/// What a call to [`PlaybackController::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing to do
    Idle,
    /// Playing, but the next step is not due yet
    Waiting,
    /// The cursor moved to this index
    Advanced(usize),
    /// The cursor is on the last ping; playback paused itself
    Finished(usize),
}

#[derive(Debug, Clone, Copy)]
struct Interpolation {
    from: GeoPosition,
    to: GeoPosition,
    started: Duration,
}

// =============================================================================
// Controller
// =============================================================================

/// Replays one trajectory. Each controller owns its state; run one per
/// animated layer.
pub struct PlaybackController<C: Clock = SystemClock> {
    clock: C,
    trajectory: Vec<Ping>,
    status: PlaybackStatus,
    cursor: usize,
    speed_multiplier: f64,
    step_interval_ms: f64,
    interpolation: Duration,
    accumulated: Duration,
    last_tick: Duration,
    /// Displayed position once any interpolation completes
    position: Option<GeoPosition>,
    in_flight: Option<Interpolation>,
    generation: u64,
}

impl PlaybackController<SystemClock> {
    /// Controller driven by wall-clock time.
    pub fn with_system_clock(trajectory: Vec<Ping>, config: &PlaybackConfig) -> Self {
        Self::new(trajectory, config, SystemClock::new())
    }
}

impl<C: Clock> PlaybackController<C> {
    /// Create a stopped controller positioned on the first ping.
    ///
    /// Unusable config values fall back to the defaults.
    pub fn new(trajectory: Vec<Ping>, config: &PlaybackConfig, clock: C) -> Self {
        let defaults = PlaybackConfig::default();
        let pick = |value: f64, fallback: f64, name: &str| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                warn!("[TrackEngine] playback {} {} is not usable, using {}", name, value, fallback);
                fallback
            }
        };

        let speed_multiplier = pick(config.speed_multiplier, defaults.speed_multiplier, "speed multiplier");
        let step_interval_ms = pick(config.step_interval_ms, defaults.step_interval_ms, "step interval");
        let interpolation_ms = pick(config.interpolation_ms, defaults.interpolation_ms, "interpolation");

        let now = clock.now();
        let position = trajectory.first().and_then(Ping::position);
        Self {
            clock,
            trajectory,
            status: PlaybackStatus::Stopped,
            cursor: 0,
            speed_multiplier,
            step_interval_ms,
            interpolation: Duration::try_from_secs_f64(interpolation_ms / 1000.0)
                .unwrap_or(Duration::MAX),
            accumulated: Duration::ZERO,
            last_tick: now,
            position,
            in_flight: None,
            generation: 0,
        }
    }

    /// Start or resume. Playing again from the last ping restarts at the
    /// first one. No-op on an empty trajectory.
    pub fn play(&mut self) {
        if self.trajectory.is_empty() || self.status == PlaybackStatus::Playing {
            return;
        }

        if self.status == PlaybackStatus::Stopped {
            self.accumulated = Duration::ZERO;
        }
        if self.trajectory.len() > 1 && self.cursor == self.last_index() {
            self.reset_to_start();
        }

        self.last_tick = self.clock.now();
        self.status = PlaybackStatus::Playing;
        debug!("[TrackEngine] playback started at {}/{}", self.cursor, self.trajectory.len());
    }

    /// Pause, freezing the marker where it is drawn right now.
    pub fn pause(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        self.settle();
        self.status = PlaybackStatus::Paused;
    }

    /// Stop and rewind to the first ping.
    pub fn stop(&mut self) {
        self.reset_to_start();
        self.status = PlaybackStatus::Stopped;
        self.generation += 1;
    }

    /// Jump to `index`, clamped to the trajectory. Valid in any state.
    pub fn seek(&mut self, index: i64) {
        if self.trajectory.is_empty() {
            return;
        }
        let target = index.clamp(0, self.last_index() as i64) as usize;
        self.accumulated = Duration::ZERO;
        if target != self.cursor {
            self.move_cursor(target);
        }
    }

    /// Change the playback rate. Any positive, finite multiplier is accepted.
    pub fn set_speed_multiplier(&mut self, multiplier: f64) -> Result<()> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(TrackError::InvalidSpeedMultiplier(multiplier));
        }
        self.speed_multiplier = multiplier;
        Ok(())
    }

    /// Swap in a new trajectory. Cancels playback and any in-flight glide;
    /// the marker snaps to the new first ping.
    pub fn set_trajectory(&mut self, trajectory: Vec<Ping>) {
        self.trajectory = trajectory;
        self.stop();
        debug!(
            "[TrackEngine] playback trajectory replaced ({} pings, generation {})",
            self.trajectory.len(),
            self.generation
        );
    }

    /// Advance time. Call once per animation frame.
    pub fn tick(&mut self) -> TickOutcome {
        if self.status != PlaybackStatus::Playing {
            return TickOutcome::Idle;
        }

        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.last_tick);
        self.last_tick = now;

        if self.cursor >= self.last_index() {
            self.settle();
            self.status = PlaybackStatus::Paused;
            return TickOutcome::Finished(self.cursor);
        }

        self.accumulated += elapsed;
        if self.accumulated.as_secs_f64() * 1000.0 < self.step_interval_ms / self.speed_multiplier {
            return TickOutcome::Waiting;
        }
        self.accumulated = Duration::ZERO;

        self.move_cursor(self.cursor + 1);
        if self.cursor == self.last_index() {
            self.status = PlaybackStatus::Paused;
            TickOutcome::Finished(self.cursor)
        } else {
            TickOutcome::Advanced(self.cursor)
        }
    }

    /// Marker position for the current frame.
    pub fn interpolated_position(&self) -> Option<GeoPosition> {
        match self.in_flight {
            Some(glide) => Some(self.glide_position(&glide, self.clock.now())),
            None => self.position,
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            status: self.status,
            cursor_index: self.cursor,
            is_playing: self.status == PlaybackStatus::Playing,
            speed_multiplier: self.speed_multiplier,
            interpolated_position: self.interpolated_position(),
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    /// Ping under the cursor.
    pub fn current_ping(&self) -> Option<&Ping> {
        self.trajectory.get(self.cursor)
    }

    pub fn trajectory(&self) -> &[Ping] {
        &self.trajectory
    }

    /// `cursor_index / trajectory.len()`, `0.0` for an empty trajectory.
    pub fn progress(&self) -> f64 {
        if self.trajectory.is_empty() {
            0.0
        } else {
            self.cursor as f64 / self.trajectory.len() as f64
        }
    }

    /// Bumped whenever playback is stopped or the trajectory replaced.
    /// Schedulers can compare it to drop callbacks queued for an old run.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn last_index(&self) -> usize {
        self.trajectory.len().saturating_sub(1)
    }

    fn reset_to_start(&mut self) {
        self.cursor = 0;
        self.accumulated = Duration::ZERO;
        self.in_flight = None;
        self.position = self.trajectory.first().and_then(Ping::position);
    }

    fn move_cursor(&mut self, index: usize) {
        let now = self.clock.now();
        let shown = self.interpolated_position();
        self.cursor = index;

        match (shown, self.trajectory[index].position()) {
            (Some(from), Some(to)) => {
                self.in_flight = Some(Interpolation { from, to, started: now });
                self.position = Some(to);
            }
            (None, Some(to)) => {
                self.in_flight = None;
                self.position = Some(to);
            }
            // Target has no usable coordinates: hold the marker where it is
            (shown, None) => {
                self.in_flight = None;
                self.position = shown;
            }
        }
    }

    fn settle(&mut self) {
        self.position = self.interpolated_position();
        self.in_flight = None;
    }

    fn glide_position(&self, glide: &Interpolation, now: Duration) -> GeoPosition {
        let t = now.saturating_sub(glide.started).as_secs_f64() / self.interpolation.as_secs_f64();
        if t >= 1.0 {
            return glide.to;
        }
        GeoPosition::new(
            glide.from.latitude + (glide.to.latitude - glide.from.latitude) * t,
            glide.from.longitude + (glide.to.longitude - glide.from.longitude) * t,
        )
    }
}
