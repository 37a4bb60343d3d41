// src/landmarks.rs - Pose landmark model (MediaPipe Pose indexing)
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// MediaPipe Pose emits 33 landmarks per detected body.
pub const POSE_LANDMARK_COUNT: usize = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySide {
    Left,
    Right,
}

impl BodySide {
    pub const BOTH: [BodySide; 2] = [BodySide::Left, BodySide::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            BodySide::Left => "left",
            BodySide::Right => "right",
        }
    }
}

/// Anatomical role of a joint, independent of body side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointRole {
    Shoulder,
    Elbow,
    Wrist,
    Hip,
    Knee,
    Ankle,
    Heel,
    FootIndex,
}

impl JointRole {
    pub fn as_str(self) -> &'static str {
        match self {
            JointRole::Shoulder => "shoulder",
            JointRole::Elbow => "elbow",
            JointRole::Wrist => "wrist",
            JointRole::Hip => "hip",
            JointRole::Knee => "knee",
            JointRole::Ankle => "ankle",
            JointRole::Heel => "heel",
            JointRole::FootIndex => "foot_index",
        }
    }
}

/// A concrete sided joint, e.g. `left_knee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JointId {
    pub side: BodySide,
    pub role: JointRole,
}

impl JointId {
    pub const fn new(side: BodySide, role: JointRole) -> Self {
        Self { side, role }
    }

    /// Index into the MediaPipe Pose landmark list. Left joints sit on the
    /// odd index, the matching right joint directly after it.
    pub fn index(self) -> usize {
        let left = match self.role {
            JointRole::Shoulder => 11,
            JointRole::Elbow => 13,
            JointRole::Wrist => 15,
            JointRole::Hip => 23,
            JointRole::Knee => 25,
            JointRole::Ankle => 27,
            JointRole::Heel => 29,
            JointRole::FootIndex => 31,
        };
        match self.side {
            BodySide::Left => left,
            BodySide::Right => left + 1,
        }
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.side.as_str(), self.role.as_str())
    }
}

fn full_visibility() -> f64 {
    1.0
}

/// A single landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default = "full_visibility")]
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

/// One frame of pose-estimator output. `landmarks == None` means the
/// estimator found nobody in the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub landmarks: Option<Vec<Landmark>>,
}

impl LandmarkFrame {
    pub fn new(timestamp: f64, landmarks: Vec<Landmark>) -> Self {
        Self {
            timestamp,
            landmarks: Some(landmarks),
        }
    }

    pub fn empty(timestamp: f64) -> Self {
        Self {
            timestamp,
            landmarks: None,
        }
    }

    pub fn has_detection(&self) -> bool {
        self.landmarks.as_ref().map(|l| !l.is_empty()).unwrap_or(false)
    }

    pub fn landmark(&self, joint: JointId) -> Option<&Landmark> {
        self.landmarks.as_ref()?.get(joint.index())
    }
}
