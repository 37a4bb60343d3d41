// src/selector.rs - Per-frame body side selection and confidence gating
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::geometry::{self, Point};
use crate::landmarks::{BodySide, JointId, JointRole, LandmarkFrame};

/// How joints are taken from the two body sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SideStrategy {
    /// Use only the side whose anchor joint is more visible.
    Dominant { anchor: JointRole },
    /// Use both sides; the more visible shoulder still picks the primary side.
    Bilateral,
}

impl SideStrategy {
    fn anchor(self) -> JointRole {
        match self {
            SideStrategy::Dominant { anchor } => anchor,
            SideStrategy::Bilateral => JointRole::Shoulder,
        }
    }
}

/// Resolved joint positions for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    primary: BodySide,
    joints: HashMap<JointId, Point>,
}

impl Skeleton {
    pub fn new(primary: BodySide) -> Self {
        Self {
            primary,
            joints: HashMap::new(),
        }
    }

    pub fn primary(&self) -> BodySide {
        self.primary
    }

    pub fn insert(&mut self, joint: JointId, position: Point) {
        self.joints.insert(joint, position);
    }

    pub fn point(&self, joint: JointId) -> Result<Point> {
        self.joints
            .get(&joint)
            .copied()
            .ok_or(EngineError::MissingJoint(joint))
    }

    /// Position of a role on one side.
    pub fn on(&self, side: BodySide, role: JointRole) -> Result<Point> {
        self.point(JointId::new(side, role))
    }

    pub fn segment_length(&self, side: BodySide, from: JointRole, to: JointRole) -> Result<f64> {
        Ok(geometry::distance(&self.on(side, from)?, &self.on(side, to)?))
    }

    pub fn joints(&self) -> impl Iterator<Item = (&JointId, &Point)> {
        self.joints.iter()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

/// Outcome of side selection. Untrustworthy frames carry no partial data.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Tracked(Skeleton),
    LowConfidence { joint: JointId, visibility: f64 },
    NoDetection,
}

#[derive(Debug, Clone)]
pub struct SideSelector {
    strategy: SideStrategy,
    roles: Vec<JointRole>,
    visibility_threshold: f64,
}

impl SideSelector {
    pub fn new(strategy: SideStrategy, roles: Vec<JointRole>, visibility_threshold: f64) -> Self {
        Self {
            strategy,
            roles,
            visibility_threshold,
        }
    }

    /// Resolve the required roles from `frame`.
    ///
    /// Returns `Err` only when the landmark list is too short to contain a
    /// required joint, which the session boundary treats as a fault.
    pub fn select(&self, frame: &LandmarkFrame) -> Result<Selection> {
        if !frame.has_detection() {
            return Ok(Selection::NoDetection);
        }

        let anchor = self.strategy.anchor();
        let left_anchor = JointId::new(BodySide::Left, anchor);
        let right_anchor = JointId::new(BodySide::Right, anchor);
        let left = frame
            .landmark(left_anchor)
            .ok_or(EngineError::MissingJoint(left_anchor))?;
        let right = frame
            .landmark(right_anchor)
            .ok_or(EngineError::MissingJoint(right_anchor))?;

        // Ties go to the left side
        let primary = if left.visibility >= right.visibility || right.visibility.is_nan() {
            BodySide::Left
        } else {
            BodySide::Right
        };

        let sides: &[BodySide] = match self.strategy {
            SideStrategy::Dominant { .. } => std::slice::from_ref(&primary),
            SideStrategy::Bilateral => &BodySide::BOTH,
        };

        let mut skeleton = Skeleton::new(primary);
        for &side in sides {
            for &role in &self.roles {
                let joint = JointId::new(side, role);
                let landmark = frame.landmark(joint).ok_or(EngineError::MissingJoint(joint))?;

                let trusted = landmark.visibility >= self.visibility_threshold
                    && landmark.x.is_finite()
                    && landmark.y.is_finite();
                if !trusted {
                    return Ok(Selection::LowConfidence {
                        joint,
                        visibility: landmark.visibility,
                    });
                }

                skeleton.insert(joint, landmark.position());
            }
        }

        Ok(Selection::Tracked(skeleton))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, POSE_LANDMARK_COUNT};

    fn frame_with(visibilities: &[(JointId, f64)]) -> LandmarkFrame {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.9); POSE_LANDMARK_COUNT];
        for (joint, visibility) in visibilities {
            landmarks[joint.index()].visibility = *visibility;
            landmarks[joint.index()].x = if joint.side == BodySide::Left { 0.4 } else { 0.6 };
        }
        LandmarkFrame::new(0.0, landmarks)
    }

    fn arm_roles() -> Vec<JointRole> {
        vec![JointRole::Shoulder, JointRole::Elbow, JointRole::Wrist]
    }

    #[test]
    fn test_picks_more_visible_side() {
        let frame = frame_with(&[
            (JointId::new(BodySide::Left, JointRole::Shoulder), 0.6),
            (JointId::new(BodySide::Right, JointRole::Shoulder), 0.95),
        ]);
        let selector = SideSelector::new(
            SideStrategy::Dominant { anchor: JointRole::Shoulder },
            arm_roles(),
            0.5,
        );

        match selector.select(&frame).unwrap() {
            Selection::Tracked(skeleton) => {
                assert_eq!(skeleton.primary(), BodySide::Right);
                assert_eq!(skeleton.len(), 3);
                // No left-side joints leak into a dominant selection
                assert!(skeleton.joints().all(|(joint, _)| joint.side == BodySide::Right));
            }
            other => panic!("expected tracked selection, got {other:?}"),
        }
    }

    #[test]
    fn test_low_visibility_rejects_whole_frame() {
        let elbow = JointId::new(BodySide::Left, JointRole::Elbow);
        let frame = frame_with(&[(elbow, 0.2)]);
        let selector = SideSelector::new(
            SideStrategy::Dominant { anchor: JointRole::Shoulder },
            arm_roles(),
            0.5,
        );

        assert_eq!(
            selector.select(&frame).unwrap(),
            Selection::LowConfidence {
                joint: elbow,
                visibility: 0.2
            }
        );
    }

    #[test]
    fn test_bilateral_needs_both_sides() {
        let wrist = JointId::new(BodySide::Right, JointRole::Wrist);
        let selector = SideSelector::new(SideStrategy::Bilateral, arm_roles(), 0.5);

        let good = frame_with(&[]);
        match selector.select(&good).unwrap() {
            Selection::Tracked(skeleton) => assert_eq!(skeleton.len(), 6),
            other => panic!("expected tracked selection, got {other:?}"),
        }

        let occluded = frame_with(&[(wrist, 0.1)]);
        assert!(matches!(
            selector.select(&occluded).unwrap(),
            Selection::LowConfidence { joint, .. } if joint == wrist
        ));
    }

    #[test]
    fn test_no_detection_and_short_frames() {
        let selector = SideSelector::new(SideStrategy::Bilateral, arm_roles(), 0.5);
        assert_eq!(
            selector.select(&LandmarkFrame::empty(1.0)).unwrap(),
            Selection::NoDetection
        );

        let short = LandmarkFrame::new(1.0, vec![Landmark::new(0.5, 0.5, 1.0); 12]);
        assert!(matches!(
            selector.select(&short),
            Err(EngineError::MissingJoint(_))
        ));
    }

    #[test]
    fn test_non_finite_coordinates_are_untrusted() {
        let mut frame = frame_with(&[]);
        let elbow = JointId::new(BodySide::Left, JointRole::Elbow);
        if let Some(landmarks) = frame.landmarks.as_mut() {
            landmarks[elbow.index()].x = f64::NAN;
        }
        let selector = SideSelector::new(
            SideStrategy::Dominant { anchor: JointRole::Shoulder },
            arm_roles(),
            0.5,
        );
        assert!(matches!(
            selector.select(&frame).unwrap(),
            Selection::LowConfidence { .. }
        ));
    }
}
