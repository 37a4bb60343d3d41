// src/state_machine.rs - Debounced repetition counter and pausable hold timer
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::features::Feature;
use crate::landmarks::JointRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the calibration pose.
    NotReady,
    Up,
    Down,
    Resting,
    Holding,
    Warning,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::NotReady => "not_ready",
            Phase::Up => "up",
            Phase::Down => "down",
            Phase::Resting => "resting",
            Phase::Holding => "holding",
            Phase::Warning => "warning",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body segment whose length is latched as the scale reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: JointRole,
    pub to: JointRole,
}

/// Pose required before counting starts, and what it latches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub feature: Feature,
    /// The calibration feature must exceed this value.
    pub above: f64,
    pub reference: Segment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepConfig {
    /// Read against `down_threshold`.
    pub down_signal: Feature,
    /// Read against `up_threshold`.
    pub up_signal: Feature,
    pub down_threshold: f64,
    pub up_threshold: f64,
    pub min_consecutive: u32,
    /// Do not count a rep whose closing frame has a [`FormCheck::Blocking`] error.
    #[serde(default)]
    pub count_requires_form: bool,
    #[serde(default)]
    pub calibration: Option<CalibrationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldConfig {
    pub alignment: Feature,
    /// Alignment strictly above this is a valid hold.
    pub hold_threshold: f64,
    /// Alignment at or below this stops the hold; in between is a warning.
    pub rest_threshold: f64,
}

impl HoldConfig {
    /// Phase an alignment value maps to, ignoring history.
    pub fn classify(&self, alignment: f64) -> Phase {
        if alignment > self.hold_threshold {
            Phase::Holding
        } else if alignment > self.rest_threshold {
            Phase::Warning
        } else {
            Phase::Resting
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum MachineConfig {
    Reps(RepConfig),
    Hold(HoldConfig),
}

/// Form verdict for one frame, as seen by the rep counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormCheck {
    #[default]
    Clean,
    /// Spoils the cycle's perfect flag.
    Flawed,
    /// Spoils the perfect flag and can withhold the count.
    Blocking,
}

impl FormCheck {
    pub fn is_error(self) -> bool {
        self != FormCheck::Clean
    }
}

/// What a single rep-counter update committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepUpdate {
    /// Phase entered on this frame, if a transition committed.
    pub entered: Option<Phase>,
    /// A repetition was added to the counter on this frame.
    pub counted: bool,
    /// The counted repetition had no form error during its cycle.
    pub perfect: bool,
}

/// Hysteresis + debounce counter for discrete repetitions.
#[derive(Debug, Clone, PartialEq)]
pub struct RepCounter {
    phase: Phase,
    count: u32,
    perfect_count: u32,
    down_frames: u32,
    up_frames: u32,
    cycle_clean: bool,
    last_rep_at: Option<f64>,
    reference_length: Option<f64>,
}

impl RepCounter {
    pub fn new(config: &RepConfig) -> Self {
        Self {
            phase: if config.calibration.is_some() {
                Phase::NotReady
            } else {
                Phase::Up
            },
            count: 0,
            perfect_count: 0,
            down_frames: 0,
            up_frames: 0,
            cycle_clean: true,
            last_rep_at: None,
            reference_length: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn perfect_count(&self) -> u32 {
        self.perfect_count
    }

    pub fn debounce(&self) -> (u32, u32) {
        (self.down_frames, self.up_frames)
    }

    pub fn last_rep_at(&self) -> Option<f64> {
        self.last_rep_at
    }

    pub fn reference_length(&self) -> Option<f64> {
        self.reference_length
    }

    pub fn is_calibrated(&self) -> bool {
        self.phase != Phase::NotReady
    }

    /// Lock the scale reference and start counting. Only the first call has
    /// an effect.
    pub fn latch(&mut self, reference_length: f64) -> bool {
        if self.phase != Phase::NotReady {
            return false;
        }
        self.reference_length = Some(reference_length);
        self.phase = Phase::Up;
        self.down_frames = 0;
        self.up_frames = 0;
        true
    }

    /// Input could not be trusted: drop any progress toward a transition.
    pub fn interrupt(&mut self) {
        self.down_frames = 0;
        self.up_frames = 0;
    }

    /// Advance the machine by one trusted frame.
    pub fn update(
        &mut self,
        config: &RepConfig,
        down_value: f64,
        up_value: f64,
        form: FormCheck,
        now: f64,
    ) -> RepUpdate {
        let mut update = RepUpdate::default();
        if self.phase == Phase::NotReady {
            return update;
        }

        if down_value < config.down_threshold {
            self.down_frames = self.down_frames.saturating_add(1);
            self.up_frames = 0;
        } else if up_value > config.up_threshold {
            self.up_frames = self.up_frames.saturating_add(1);
            self.down_frames = 0;
        } else {
            self.down_frames = self.down_frames.saturating_sub(1);
            self.up_frames = self.up_frames.saturating_sub(1);
        }

        let needed = config.min_consecutive.max(1);
        match self.phase {
            Phase::Up if self.down_frames >= needed => {
                self.phase = Phase::Down;
                self.interrupt();
                self.cycle_clean = !form.is_error();
                update.entered = Some(Phase::Down);
            }
            Phase::Down => {
                if form.is_error() {
                    self.cycle_clean = false;
                }
                if self.up_frames >= needed {
                    self.phase = Phase::Up;
                    self.interrupt();
                    update.entered = Some(Phase::Up);

                    if !(config.count_requires_form && form == FormCheck::Blocking) {
                        self.count += 1;
                        self.last_rep_at = Some(now);
                        update.counted = true;
                        update.perfect = self.cycle_clean;
                        if self.cycle_clean {
                            self.perfect_count += 1;
                        }
                    }
                }
            }
            _ => {}
        }

        update
    }
}

/// Accumulates active hold time, pausing whenever alignment degrades.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldTimer {
    phase: Phase,
    start: Option<f64>,
    pause_start: Option<f64>,
    total_paused: f64,
    best_active: f64,
}

impl Default for HoldTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldTimer {
    pub fn new() -> Self {
        Self {
            phase: Phase::Resting,
            start: None,
            pause_start: None,
            total_paused: 0.0,
            best_active: 0.0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn has_started(&self) -> bool {
        self.start.is_some()
    }

    pub fn total_paused(&self) -> f64 {
        self.total_paused
    }

    /// Whole seconds of active hold time.
    pub fn count(&self) -> u32 {
        self.best_active.floor() as u32
    }

    pub fn active_seconds(&self) -> f64 {
        self.best_active
    }

    pub fn update(&mut self, config: &HoldConfig, alignment: f64, now: f64) -> Phase {
        let target = config.classify(alignment);
        self.transition(target, now);
        target
    }

    /// Untrustworthy input behaves like a form failure.
    pub fn interrupt(&mut self, now: f64) {
        self.transition(Phase::Resting, now);
    }

    fn transition(&mut self, target: Phase, now: f64) {
        match (self.phase == Phase::Holding, target == Phase::Holding) {
            (false, true) => match self.start {
                None => self.start = Some(now),
                Some(_) => {
                    if let Some(paused_at) = self.pause_start.take() {
                        self.total_paused += (now - paused_at).max(0.0);
                    }
                }
            },
            (true, false) => self.pause_start = Some(now),
            _ => {}
        }
        self.phase = target;
        self.refresh(now);
    }

    fn refresh(&mut self, now: f64) {
        let Some(start) = self.start else {
            return;
        };
        let current_pause = match (self.phase, self.pause_start) {
            (Phase::Holding, _) | (_, None) => 0.0,
            (_, Some(paused_at)) => (now - paused_at).max(0.0),
        };
        let active = now - start - self.total_paused - current_pause;
        // Out-of-order timestamps must not make the counter go backwards
        if active > self.best_active {
            self.best_active = active;
        }
    }
}
