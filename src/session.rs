// src/session.rs - Per-session state and the per-frame pipeline
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use crate::config::{ExerciseConfig, ExerciseKind};
use crate::error::{ConfigError, EngineError, Result};
use crate::features::{Feature, FeatureContext, FeatureVector};
use crate::feedback::{encode_hold, encode_rep, encode_untracked, FeedbackEvent, TrackingIssue};
use crate::landmarks::LandmarkFrame;
use crate::rules::Rule;
use crate::selector::{Selection, SideSelector, Skeleton};
use crate::smoothing::EmaSmoother;
use crate::state_machine::{CalibrationConfig, FormCheck, HoldTimer, MachineConfig, Phase, RepCounter};

/// Minimum frame-time gap between two feature dumps.
const DEBUG_DUMP_INTERVAL: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub enum MachineState {
    Reps(RepCounter),
    Hold(HoldTimer),
}

impl MachineState {
    pub fn new(config: &MachineConfig) -> Self {
        match config {
            MachineConfig::Reps(reps) => MachineState::Reps(RepCounter::new(reps)),
            MachineConfig::Hold(_) => MachineState::Hold(HoldTimer::new()),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            MachineState::Reps(counter) => counter.phase(),
            MachineState::Hold(timer) => timer.phase(),
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            MachineState::Reps(counter) => counter.count(),
            MachineState::Hold(timer) => timer.count(),
        }
    }

    fn interrupt(&mut self, now: f64) {
        match self {
            MachineState::Reps(counter) => counter.interrupt(),
            MachineState::Hold(timer) => timer.interrupt(now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    Tracking,
    Lost(TrackingIssue),
}

/// Everything one session accumulates between frames.
///
/// Built from the same [`ExerciseConfig`] that is later passed to
/// [`process_frame`].
#[derive(Debug, Clone)]
pub struct SessionState {
    id: Uuid,
    machine: MachineState,
    smoother: EmaSmoother,
    selector: SideSelector,
    features: Vec<Feature>,
    tracking: TrackingStatus,
    frames: u64,
    tracked_frames: u64,
    last_debug_dump: Option<f64>,
}

impl SessionState {
    pub fn new(config: &ExerciseConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            machine: MachineState::new(&config.machine),
            smoother: EmaSmoother::new(config.smoothing_alpha),
            selector: config.selector(),
            features: config.features(),
            tracking: TrackingStatus::Tracking,
            frames: 0,
            tracked_frames: 0,
            last_debug_dump: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn machine(&self) -> &MachineState {
        &self.machine
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn count(&self) -> u32 {
        self.machine.count()
    }

    pub fn perfect_reps(&self) -> u32 {
        match &self.machine {
            MachineState::Reps(counter) => counter.perfect_count(),
            MachineState::Hold(_) => 0,
        }
    }

    pub fn reference_length(&self) -> Option<f64> {
        match &self.machine {
            MachineState::Reps(counter) => counter.reference_length(),
            MachineState::Hold(_) => None,
        }
    }

    pub fn smoother(&self) -> &EmaSmoother {
        &self.smoother
    }

    pub fn tracking(&self) -> TrackingStatus {
        self.tracking
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tracked_frames(&self) -> u64 {
        self.tracked_frames
    }

    fn lose_tracking(
        &mut self,
        issue: TrackingIssue,
        now: f64,
        cause: Option<&EngineError>,
    ) -> FeedbackEvent {
        if self.tracking == TrackingStatus::Tracking {
            match cause {
                Some(err) => warn!(error = %err, t = now, "frame could not be processed"),
                None => warn!(reason = issue.label(), t = now, "tracking lost"),
            }
        }
        self.tracking = TrackingStatus::Lost(issue);
        self.machine.interrupt(now);
        encode_untracked(issue, self.machine.count(), self.machine.phase())
    }

    fn regain_tracking(&mut self, now: f64) {
        if let TrackingStatus::Lost(issue) = self.tracking {
            info!(after = issue.label(), t = now, "tracking recovered");
        }
        self.tracking = TrackingStatus::Tracking;
        self.tracked_frames += 1;
    }
}

/// Run one frame through selection, smoothing, rules and the state machine.
///
/// Never fails: untrustworthy frames and computation faults become
/// reposition feedback and leave the smoother and debounce progress frozen.
pub fn process_frame(
    config: &ExerciseConfig,
    state: &mut SessionState,
    frame: &LandmarkFrame,
) -> FeedbackEvent {
    state.frames += 1;
    let now = frame.timestamp;

    let skeleton = match state.selector.select(frame) {
        Ok(Selection::Tracked(skeleton)) => skeleton,
        Ok(Selection::NoDetection) => {
            return state.lose_tracking(TrackingIssue::NoDetection, now, None);
        }
        Ok(Selection::LowConfidence { joint, visibility }) => {
            debug!(%joint, visibility, "joint below visibility threshold");
            return state.lose_tracking(TrackingIssue::LowConfidence, now, None);
        }
        Err(err) => return state.lose_tracking(TrackingIssue::Fault, now, Some(&err)),
    };

    match advance(config, state, &skeleton, now) {
        Ok(event) => {
            state.regain_tracking(now);
            event
        }
        Err(err) => state.lose_tracking(TrackingIssue::Fault, now, Some(&err)),
    }
}

/// Everything fallible happens before the first mutation of `state`.
fn advance(
    config: &ExerciseConfig,
    state: &mut SessionState,
    raw: &Skeleton,
    now: f64,
) -> Result<FeedbackEvent> {
    let smoothed = state.smoother.blend(raw);

    match (&config.machine, &mut state.machine) {
        (MachineConfig::Reps(reps), MachineState::Reps(counter)) => {
            let latch = match &reps.calibration {
                Some(calibration) if !counter.is_calibrated() => calibration_length(calibration, raw)?,
                _ => None,
            };
            let ctx = FeatureContext {
                reference_length: latch.or(counter.reference_length()),
                seconds_since_rep: counter.last_rep_at().map_or(f64::INFINITY, |t| now - t),
            };
            let features = FeatureVector::extract(&state.features, &smoothed, &ctx)?;
            let before = counter.phase();
            let matched = config.rules.evaluate(&features, before)?;
            let down = features.get(reps.down_signal)?;
            let up = features.get(reps.up_signal)?;

            state.smoother.store(&smoothed);
            dump_features(&mut state.last_debug_dump, &features, now);
            if let Some(length) = latch {
                counter.latch(length);
                info!(reference_length = length, "calibrated");
            }

            let form = matched.map_or(FormCheck::Clean, Rule::form_check);
            let update = counter.update(reps, down, up, form, now);
            if let Some(entered) = update.entered {
                debug!(from = %before, to = %entered, t = now, "phase changed");
            }
            if update.counted {
                info!(count = counter.count(), perfect = update.perfect, "rep counted");
            }

            Ok(encode_rep(
                &config.guidance,
                counter.count(),
                counter.phase(),
                &update,
                matched,
            ))
        }
        (MachineConfig::Hold(hold), MachineState::Hold(timer)) => {
            let features = FeatureVector::extract(&state.features, &smoothed, &FeatureContext::default())?;
            let alignment = features.get(hold.alignment)?;
            let matched = config.rules.evaluate(&features, hold.classify(alignment))?;

            state.smoother.store(&smoothed);
            dump_features(&mut state.last_debug_dump, &features, now);

            let before = timer.phase();
            let phase = timer.update(hold, alignment, now);
            if phase != before {
                debug!(from = %before, to = %phase, active = timer.active_seconds(), "hold phase changed");
            }

            Ok(encode_hold(
                &config.guidance,
                timer.count(),
                phase,
                timer.has_started(),
                matched,
            ))
        }
        _ => Err(EngineError::MachineMismatch),
    }
}

/// Reference length to latch if the raw pose satisfies the calibration check.
fn calibration_length(calibration: &CalibrationConfig, raw: &Skeleton) -> Result<Option<f64>> {
    let probe = FeatureVector::extract(&[calibration.feature], raw, &FeatureContext::default())?;
    if probe.get(calibration.feature)? <= calibration.above {
        return Ok(None);
    }
    let length = raw.segment_length(raw.primary(), calibration.reference.from, calibration.reference.to)?;
    Ok((length > f64::EPSILON).then_some(length))
}

fn dump_features(last: &mut Option<f64>, features: &FeatureVector, now: f64) {
    if last.map_or(true, |t| now - t >= DEBUG_DUMP_INTERVAL) {
        debug!(t = now, ?features, "features");
        *last = Some(now);
    }
}

/// A validated exercise bound to its own state and tracing span.
pub struct Session {
    config: ExerciseConfig,
    state: SessionState,
    span: Span,
}

impl Session {
    pub fn new(config: ExerciseConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let state = SessionState::new(&config);
        let span = info_span!("session", id = %state.id(), exercise = %config.name);
        span.in_scope(|| info!("session started"));
        Ok(Self { config, state, span })
    }

    pub fn preset(kind: ExerciseKind) -> std::result::Result<Self, ConfigError> {
        Self::new(ExerciseConfig::preset(kind))
    }

    pub fn process(&mut self, frame: &LandmarkFrame) -> FeedbackEvent {
        let _entered = self.span.enter();
        process_frame(&self.config, &mut self.state, frame)
    }

    pub fn config(&self) -> &ExerciseConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn count(&self) -> u32 {
        self.state.count()
    }

    pub fn finish(&self) {
        self.span.in_scope(|| {
            info!(
                frames = self.state.frames(),
                tracked = self.state.tracked_frames(),
                count = self.state.count(),
                perfect = self.state.perfect_reps(),
                "session finished"
            )
        });
    }
}
