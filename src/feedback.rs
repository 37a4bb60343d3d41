// src/feedback.rs - Collapse a frame's outcome into a single feedback message
use serde::{Deserialize, Serialize};

use crate::rules::Rule;
use crate::state_machine::{Phase, RepUpdate};

/// What the client shows and speaks for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub guidance: String,
    pub perfect: bool,
    pub phase: Phase,
    #[serde(default = "default_tracked")]
    pub tracked: bool,
}

fn default_tracked() -> bool {
    true
}

impl FeedbackEvent {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Why a frame could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingIssue {
    NoDetection,
    LowConfidence,
    /// A joint or feature the exercise needs could not be produced.
    Fault,
}

impl TrackingIssue {
    pub fn label(self) -> &'static str {
        match self {
            TrackingIssue::NoDetection => "Not tracking. Are you in frame?",
            TrackingIssue::LowConfidence => "Come closer / step into frame",
            TrackingIssue::Fault => "Make sure you are fully in frame",
        }
    }
}

/// Per-exercise coaching strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseGuidance {
    pub not_ready: String,
    pub up: String,
    pub down: String,
    pub good_rep: String,
    pub holding: String,
    pub warning: String,
    /// Hold interrupted after it had started.
    pub paused: String,
    /// Hold not started yet.
    pub idle: String,
}

impl Default for PhaseGuidance {
    fn default() -> Self {
        Self {
            not_ready: "Get into position".to_string(),
            up: "Go down".to_string(),
            down: "Come up".to_string(),
            good_rep: "Good rep!".to_string(),
            holding: "Good form!".to_string(),
            warning: "Warning: hips are sagging".to_string(),
            paused: "Timer paused - get back up!".to_string(),
            idle: "Get into position".to_string(),
        }
    }
}

impl PhaseGuidance {
    pub fn reps(up: &str, down: &str) -> Self {
        Self {
            up: up.to_string(),
            down: down.to_string(),
            ..Self::default()
        }
    }

    fn for_rep_phase(&self, phase: Phase) -> &str {
        match phase {
            Phase::NotReady => &self.not_ready,
            Phase::Down => &self.down,
            _ => &self.up,
        }
    }
}

/// Feedback for a repetition exercise.
///
/// A freshly counted perfect rep outranks everything else, then the matched
/// form error, then a matched guidance rule, then the phase text.
pub fn encode_rep(
    guidance: &PhaseGuidance,
    count: u32,
    phase: Phase,
    update: &RepUpdate,
    matched: Option<&Rule>,
) -> FeedbackEvent {
    let mut event = FeedbackEvent {
        count,
        error: None,
        guidance: guidance.for_rep_phase(phase).to_string(),
        perfect: false,
        phase,
        tracked: true,
    };

    if update.counted && update.perfect {
        event.guidance = guidance.good_rep.clone();
        event.perfect = true;
        return event;
    }

    if let Some(rule) = matched {
        if rule.is_form() {
            event.error = Some(rule.label.clone());
        }
        event.guidance = rule.label.clone();
    }
    event
}

/// Feedback for an accumulating hold.
pub fn encode_hold(
    guidance: &PhaseGuidance,
    count: u32,
    phase: Phase,
    started: bool,
    matched: Option<&Rule>,
) -> FeedbackEvent {
    let mut event = FeedbackEvent {
        count,
        error: None,
        guidance: String::new(),
        perfect: false,
        phase,
        tracked: true,
    };

    if let Some(rule) = matched {
        if rule.is_form() {
            event.error = Some(rule.label.clone());
        }
        event.guidance = rule.label.clone();
        return event;
    }

    match phase {
        Phase::Holding => {
            event.guidance = guidance.holding.clone();
            event.perfect = true;
        }
        Phase::Warning => {
            event.error = Some(guidance.warning.clone());
            event.guidance = guidance.warning.clone();
        }
        _ if started => {
            event.error = Some(guidance.paused.clone());
            event.guidance = guidance.paused.clone();
        }
        _ => event.guidance = guidance.idle.clone(),
    }
    event
}

/// Feedback for a frame that could not be used. The count is carried over.
pub fn encode_untracked(issue: TrackingIssue, count: u32, phase: Phase) -> FeedbackEvent {
    FeedbackEvent {
        count,
        error: Some(issue.label().to_string()),
        guidance: issue.label().to_string(),
        perfect: false,
        phase,
        tracked: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;
    use crate::rules::Predicate;

    fn counted(perfect: bool) -> RepUpdate {
        RepUpdate {
            entered: Some(Phase::Up),
            counted: true,
            perfect,
        }
    }

    #[test]
    fn test_perfect_rep_outranks_everything() {
        let rule = Rule::form("Keep your body straight", Predicate::below(Feature::BodyAngle, 150.0));
        let event = encode_rep(&PhaseGuidance::default(), 4, Phase::Up, &counted(true), Some(&rule));
        assert_eq!(event.guidance, "Good rep!");
        assert!(event.perfect);
        assert!(event.error.is_none());
    }

    #[test]
    fn test_form_error_then_guidance_then_phase_text() {
        let texts = PhaseGuidance::reps("Squat down", "Stand up");
        let form = Rule::form("Knees past toes!", Predicate::above(Feature::KneeOverToe, 0.25));
        let hint = Rule::guidance("Go deeper", Predicate::within(Feature::KneeAngle, 100.0, 150.0));
        let idle = RepUpdate::default();

        let event = encode_rep(&texts, 1, Phase::Down, &idle, Some(&form));
        assert_eq!(event.error.as_deref(), Some("Knees past toes!"));
        assert_eq!(event.guidance, "Knees past toes!");

        let event = encode_rep(&texts, 1, Phase::Up, &idle, Some(&hint));
        assert!(event.error.is_none());
        assert_eq!(event.guidance, "Go deeper");

        let event = encode_rep(&texts, 1, Phase::Down, &idle, None);
        assert_eq!(event.guidance, "Stand up");
        assert!(!event.perfect);
    }

    #[test]
    fn test_imperfect_rep_keeps_error() {
        let form = Rule::form("Uneven arms", Predicate::above(Feature::ElbowAsymmetry, 15.0));
        let event = encode_rep(&PhaseGuidance::default(), 2, Phase::Up, &counted(false), Some(&form));
        assert_eq!(event.count, 2);
        assert!(!event.perfect);
        assert_eq!(event.error.as_deref(), Some("Uneven arms"));
    }

    #[test]
    fn test_hold_messages() {
        let texts = PhaseGuidance::default();
        let good = encode_hold(&texts, 12, Phase::Holding, true, None);
        assert!(good.perfect);
        assert_eq!(good.guidance, "Good form!");

        let warning = encode_hold(&texts, 12, Phase::Warning, true, None);
        assert_eq!(warning.error.as_deref(), Some("Warning: hips are sagging"));

        let paused = encode_hold(&texts, 12, Phase::Resting, true, None);
        assert_eq!(paused.error.as_deref(), Some("Timer paused - get back up!"));

        let idle = encode_hold(&texts, 0, Phase::Resting, false, None);
        assert!(idle.error.is_none());
        assert_eq!(idle.guidance, "Get into position");
    }

    #[test]
    fn test_untracked_json_shape() {
        let event = encode_untracked(TrackingIssue::NoDetection, 3, Phase::Down);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["count"], 3);
        assert_eq!(json["error"], "Not tracking. Are you in frame?");
        assert_eq!(json["phase"], "down");
        assert_eq!(json["tracked"], false);

        let clean = encode_rep(&PhaseGuidance::default(), 0, Phase::Up, &RepUpdate::default(), None);
        let json = serde_json::to_value(&clean).unwrap();
        assert!(json.get("error").is_none());
    }
}
