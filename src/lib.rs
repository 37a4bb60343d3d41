//! Real-time exercise form coaching from 2D pose landmarks.
//!
//! Each frame of MediaPipe pose output passes through side selection,
//! smoothing, feature extraction and prioritized form rules before a rep
//! counter or hold timer turns it into one [`FeedbackEvent`].

pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod feedback;
pub mod geometry;
pub mod landmarks;
pub mod rules;
pub mod selector;
pub mod session;
pub mod smoothing;
pub mod state_machine;

#[cfg(test)]
mod testing;

pub use config::{ExerciseConfig, ExerciseKind};
pub use error::{ConfigError, EngineError};
pub use export::{SessionRecorder, SessionSummary};
pub use feedback::FeedbackEvent;
pub use landmarks::{Landmark, LandmarkFrame};
pub use session::{process_frame, Session, SessionState};
pub use state_machine::Phase;
