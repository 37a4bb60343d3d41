// src/config.rs - Exercise definitions, built-in presets and validation
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::features::Feature;
use crate::feedback::PhaseGuidance;
use crate::landmarks::JointRole;
use crate::rules::{Predicate, Rule, RuleSpec};
use crate::selector::{SideSelector, SideStrategy};
use crate::state_machine::{CalibrationConfig, HoldConfig, MachineConfig, Phase, RepConfig, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExerciseKind {
    BarbellCurl,
    ShoulderPress,
    Pushups,
    Squats,
    Plank,
}

static EXERCISE_ALIASES: Lazy<HashMap<&'static str, ExerciseKind>> = Lazy::new(|| {
    use ExerciseKind::*;
    HashMap::from([
        ("BARBELL CURLS", BarbellCurl),
        ("BARBELL CURL", BarbellCurl),
        ("CURLS", BarbellCurl),
        ("CURL", BarbellCurl),
        ("SHOULDER PRESS", ShoulderPress),
        ("PRESS", ShoulderPress),
        ("PUSHUPS", Pushups),
        ("PUSHUP", Pushups),
        ("PUSH UPS", Pushups),
        ("SQUATS", Squats),
        ("SQUAT", Squats),
        ("PLANK", Plank),
    ])
});

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 5] = [
        ExerciseKind::BarbellCurl,
        ExerciseKind::ShoulderPress,
        ExerciseKind::Pushups,
        ExerciseKind::Squats,
        ExerciseKind::Plank,
    ];

    /// Name clients use to select the exercise.
    pub fn name(self) -> &'static str {
        match self {
            ExerciseKind::BarbellCurl => "BARBELL CURLS",
            ExerciseKind::ShoulderPress => "SHOULDER PRESS",
            ExerciseKind::Pushups => "PUSHUPS",
            ExerciseKind::Squats => "SQUATS",
            ExerciseKind::Plank => "PLANK",
        }
    }

    /// File stem used for override configs and session directories.
    pub fn slug(self) -> &'static str {
        match self {
            ExerciseKind::BarbellCurl => "barbell_curls",
            ExerciseKind::ShoulderPress => "shoulder_press",
            ExerciseKind::Pushups => "pushups",
            ExerciseKind::Squats => "squats",
            ExerciseKind::Plank => "plank",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExerciseKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_uppercase().replace(['_', '-'], " ");
        EXERCISE_ALIASES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| ConfigError::UnknownExercise(s.to_string()))
    }
}

fn default_visibility() -> f64 {
    0.5
}

fn default_alpha() -> f64 {
    0.5
}

/// Everything the engine needs to coach one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseConfig {
    pub name: String,
    pub side: SideStrategy,
    #[serde(default = "default_visibility")]
    pub visibility_threshold: f64,
    #[serde(default = "default_alpha")]
    pub smoothing_alpha: f64,
    pub machine: MachineConfig,
    #[serde(default)]
    pub rules: RuleSpec,
    #[serde(default)]
    pub guidance: PhaseGuidance,
}

impl ExerciseConfig {
    pub fn preset(kind: ExerciseKind) -> Self {
        match kind {
            ExerciseKind::BarbellCurl => barbell_curl(),
            ExerciseKind::ShoulderPress => shoulder_press(),
            ExerciseKind::Pushups => pushups(),
            ExerciseKind::Squats => squats(),
            ExerciseKind::Plank => plank(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Every feature the engine computes per frame, deduplicated.
    pub fn features(&self) -> Vec<Feature> {
        let mut features = match &self.machine {
            MachineConfig::Reps(reps) => vec![reps.down_signal, reps.up_signal],
            MachineConfig::Hold(hold) => vec![hold.alignment],
        };
        features.extend(self.rules.features());
        features.sort();
        features.dedup();
        features
    }

    /// Joint roles the selector must resolve on each tracked side.
    pub fn required_roles(&self) -> Vec<JointRole> {
        let mut roles: Vec<JointRole> = self
            .features()
            .iter()
            .flat_map(|f| f.roles().iter().copied())
            .collect();
        if let SideStrategy::Dominant { anchor } = self.side {
            roles.push(anchor);
        }
        if let MachineConfig::Reps(RepConfig {
            calibration: Some(calibration),
            ..
        }) = &self.machine
        {
            roles.extend(calibration.feature.roles().iter().copied());
            roles.push(calibration.reference.from);
            roles.push(calibration.reference.to);
        }

        let mut unique = Vec::with_capacity(roles.len());
        for role in roles {
            if !unique.contains(&role) {
                unique.push(role);
            }
        }
        unique
    }

    pub fn selector(&self) -> SideSelector {
        SideSelector::new(self.side, self.required_roles(), self.visibility_threshold)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::InvalidThreshold(format!(
                "smoothing alpha {} must be in (0, 1]",
                self.smoothing_alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(ConfigError::InvalidThreshold(format!(
                "visibility threshold {} must be in [0, 1]",
                self.visibility_threshold
            )));
        }

        match &self.machine {
            MachineConfig::Reps(reps) => {
                if reps.down_threshold >= reps.up_threshold {
                    return Err(ConfigError::InvalidThreshold(format!(
                        "down threshold {} must be below up threshold {}",
                        reps.down_threshold, reps.up_threshold
                    )));
                }
                if reps.min_consecutive == 0 {
                    return Err(ConfigError::InvalidThreshold(
                        "min_consecutive must be at least 1".to_string(),
                    ));
                }
                for signal in [reps.down_signal, reps.up_signal] {
                    if signal.is_temporal() {
                        return Err(ConfigError::UnavailableFeature {
                            feature: signal,
                            reason: "a phase signal must come from the skeleton".to_string(),
                        });
                    }
                }
                if let Some(calibration) = &reps.calibration {
                    if calibration.feature.is_temporal() || calibration.feature.is_bilateral() {
                        return Err(ConfigError::UnavailableFeature {
                            feature: calibration.feature,
                            reason: "calibration reads a single-side skeleton feature".to_string(),
                        });
                    }
                }
            }
            MachineConfig::Hold(hold) => {
                if hold.rest_threshold >= hold.hold_threshold {
                    return Err(ConfigError::InvalidThreshold(format!(
                        "rest threshold {} must be below hold threshold {}",
                        hold.rest_threshold, hold.hold_threshold
                    )));
                }
                if hold.alignment.is_temporal() {
                    return Err(ConfigError::UnavailableFeature {
                        feature: hold.alignment,
                        reason: "alignment must come from the skeleton".to_string(),
                    });
                }
            }
        }

        self.rules.validate()?;

        for feature in self.features() {
            if feature.is_bilateral() && self.side != SideStrategy::Bilateral {
                return Err(ConfigError::UnavailableFeature {
                    feature,
                    reason: "needs both sides but the exercise tracks one".to_string(),
                });
            }
            if feature.is_temporal() && matches!(self.machine, MachineConfig::Hold(_)) {
                return Err(ConfigError::UnavailableFeature {
                    feature,
                    reason: "holds do not count repetitions".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn barbell_curl() -> ExerciseConfig {
    ExerciseConfig {
        name: ExerciseKind::BarbellCurl.name().to_string(),
        side: SideStrategy::Bilateral,
        visibility_threshold: 0.5,
        smoothing_alpha: 0.6,
        // Both arms must curl past 40 and extend past 150
        machine: MachineConfig::Reps(RepConfig {
            down_signal: Feature::ElbowAngleMax,
            up_signal: Feature::ElbowAngleMin,
            down_threshold: 40.0,
            up_threshold: 150.0,
            min_consecutive: 2,
            count_requires_form: false,
            calibration: None,
        }),
        rules: RuleSpec::new(vec![
            Rule::form("Pin your elbows", Predicate::above(Feature::ShoulderAngleMax, 35.0)),
            Rule::form("Uneven arms", Predicate::above(Feature::ElbowAsymmetry, 15.0)),
            Rule::form("Too fast", Predicate::below(Feature::SecondsSinceRep, 1.5)).during(&[Phase::Down]),
        ]),
        guidance: PhaseGuidance::reps("Curl up", "Lower slowly"),
    }
}

fn shoulder_press() -> ExerciseConfig {
    let elbow_flared = |elbow, shoulder| Predicate::All {
        of: vec![Predicate::above(elbow, 110.0), Predicate::below(shoulder, 115.0)],
    };
    ExerciseConfig {
        name: ExerciseKind::ShoulderPress.name().to_string(),
        side: SideStrategy::Bilateral,
        visibility_threshold: 0.5,
        smoothing_alpha: 0.6,
        machine: MachineConfig::Reps(RepConfig {
            down_signal: Feature::ElbowAngleMax,
            up_signal: Feature::ElbowAngleMin,
            down_threshold: 90.0,
            up_threshold: 160.0,
            min_consecutive: 2,
            count_requires_form: false,
            calibration: None,
        }),
        rules: RuleSpec::new(vec![
            Rule::form("Bring your elbows up", Predicate::below(Feature::ShoulderAngleMin, 55.0)),
            Rule::form(
                "Tuck your elbows in",
                Predicate::Any {
                    of: vec![
                        elbow_flared(Feature::LeftElbowAngle, Feature::LeftShoulderAngle),
                        elbow_flared(Feature::RightElbowAngle, Feature::RightShoulderAngle),
                    ],
                },
            ),
            Rule::form("Keep shoulders level", Predicate::above(Feature::ShoulderTilt, 5.0)),
            Rule::form(
                "Elbows too close to shoulders",
                Predicate::below(Feature::ElbowAngleMin, 45.0),
            ),
        ]),
        guidance: PhaseGuidance::reps("Lower the bar", "Press up"),
    }
}

fn pushups() -> ExerciseConfig {
    ExerciseConfig {
        name: ExerciseKind::Pushups.name().to_string(),
        side: SideStrategy::Dominant {
            anchor: JointRole::Shoulder,
        },
        visibility_threshold: 0.5,
        smoothing_alpha: 0.5,
        machine: MachineConfig::Reps(RepConfig {
            down_signal: Feature::ElbowAngle,
            up_signal: Feature::ElbowAngle,
            down_threshold: 90.0,
            up_threshold: 160.0,
            min_consecutive: 3,
            count_requires_form: true,
            calibration: None,
        }),
        rules: RuleSpec::new(vec![
            Rule::form("Keep your body straight", Predicate::below(Feature::BodyAngle, 150.0)),
            Rule::form("Straighten your legs", Predicate::below(Feature::KneeAngle, 160.0)),
            Rule::form("Don't flare your elbows", Predicate::above(Feature::ElbowTorsoAngle, 100.0))
                .during(&[Phase::Down]),
            Rule::form("Tuck your elbows closer", Predicate::below(Feature::ElbowTorsoAngle, 50.0))
                .during(&[Phase::Down]),
        ]),
        guidance: PhaseGuidance::reps("Go lower", "Push up"),
    }
}

fn squats() -> ExerciseConfig {
    ExerciseConfig {
        name: ExerciseKind::Squats.name().to_string(),
        side: SideStrategy::Dominant {
            anchor: JointRole::Hip,
        },
        visibility_threshold: 0.5,
        smoothing_alpha: 0.5,
        // Knee and hip must both close past 100 and both open past 160
        machine: MachineConfig::Reps(RepConfig {
            down_signal: Feature::LegAngleMax,
            up_signal: Feature::LegAngleMin,
            down_threshold: 100.0,
            up_threshold: 160.0,
            min_consecutive: 2,
            count_requires_form: false,
            calibration: Some(CalibrationConfig {
                feature: Feature::KneeAngle,
                above: 165.0,
                reference: Segment {
                    from: JointRole::Knee,
                    to: JointRole::Ankle,
                },
            }),
        }),
        rules: RuleSpec::new(vec![
            Rule::form("Knees past toes!", Predicate::above(Feature::KneeOverToe, 0.25)),
            Rule::form("Keep your heels down", Predicate::above(Feature::HeelLift, 0.2)),
            Rule::form("Keep your chest up!", Predicate::below(Feature::BodyAngle, 70.0)),
            Rule::guidance("Go deeper", Predicate::within(Feature::KneeAngle, 100.0, 150.0))
                .during(&[Phase::Up]),
        ]),
        guidance: PhaseGuidance {
            not_ready: "Stand tall to calibrate".to_string(),
            good_rep: "Rep counted!".to_string(),
            ..PhaseGuidance::reps("Squat down", "Stand up")
        },
    }
}

fn plank() -> ExerciseConfig {
    ExerciseConfig {
        name: ExerciseKind::Plank.name().to_string(),
        side: SideStrategy::Dominant {
            anchor: JointRole::Hip,
        },
        visibility_threshold: 0.5,
        smoothing_alpha: 0.6,
        machine: MachineConfig::Hold(HoldConfig {
            alignment: Feature::BodyAngle,
            hold_threshold: 160.0,
            rest_threshold: 140.0,
        }),
        rules: RuleSpec::new(vec![
            Rule::form(
                "Align shoulders over elbows",
                Predicate::outside(Feature::ShoulderAngle, 75.0, 105.0),
            )
            .during(&[Phase::Holding]),
            Rule::form("Keep forearms flat", Predicate::outside(Feature::ElbowAngle, 75.0, 105.0))
                .during(&[Phase::Holding]),
        ]),
        guidance: PhaseGuidance {
            idle: "Get into plank position".to_string(),
            ..PhaseGuidance::default()
        },
    }
}
