//! Error types for the form coaching engine.

use thiserror::Error;

use crate::features::Feature;
use crate::landmarks::JointId;

/// Faults inside per-frame processing. These never escape
/// `session::process_frame`; they are turned into reposition feedback there.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("joint {0} is missing from the frame")]
    MissingJoint(JointId),

    #[error("feature {0:?} was not computed for this frame")]
    MissingFeature(Feature),

    #[error("session state was built for a different state machine shape")]
    MachineMismatch,
}

/// Problems with an exercise configuration, reported before a session starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown exercise: {0}")]
    UnknownExercise(String),

    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("form rule '{form}' is listed after guidance rule '{guidance}'")]
    GuidanceBeforeForm { guidance: String, form: String },

    #[error("feature {feature:?} cannot be produced: {reason}")]
    UnavailableFeature { feature: Feature, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
