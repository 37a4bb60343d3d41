// src/testing.rs - Synthetic poses with chosen joint angles
use nalgebra::Rotation2;

use crate::geometry::Point;
use crate::landmarks::{BodySide, JointId, JointRole, Landmark, LandmarkFrame, POSE_LANDMARK_COUNT};

use BodySide::*;
use JointRole::*;

pub struct PoseBuilder {
    landmarks: Vec<Landmark>,
}

impl PoseBuilder {
    pub fn new() -> Self {
        Self {
            landmarks: vec![Landmark::new(0.5, 0.5, 0.9); POSE_LANDMARK_COUNT],
        }
    }

    pub fn set(&mut self, side: BodySide, role: JointRole, at: Point) -> &mut Self {
        let landmark = &mut self.landmarks[JointId::new(side, role).index()];
        landmark.x = at.x;
        landmark.y = at.y;
        self
    }

    pub fn visibility(&mut self, side: BodySide, role: JointRole, visibility: f64) -> &mut Self {
        self.landmarks[JointId::new(side, role).index()].visibility = visibility;
        self
    }

    pub fn get(&self, side: BodySide, role: JointRole) -> Point {
        self.landmarks[JointId::new(side, role).index()].position()
    }

    pub fn frame(&self, timestamp: f64) -> LandmarkFrame {
        LandmarkFrame::new(timestamp, self.landmarks.clone())
    }
}

/// Point at `length` from `vertex` such that the angle `from`-`vertex`-result
/// is `degrees`.
pub fn swing(vertex: Point, from: Point, degrees: f64, length: f64) -> Point {
    let direction = (from - vertex).normalize();
    vertex + Rotation2::new(degrees.to_radians()) * direction * length
}

/// Upright torso facing the camera with both arms posed.
pub fn arms_frame(t: f64, elbows: (f64, f64), shoulders: (f64, f64)) -> LandmarkFrame {
    let mut pose = PoseBuilder::new();
    for (side, x, elbow, shoulder, outward) in [
        (Left, 0.6, elbows.0, shoulders.0, -1.0),
        (Right, 0.4, elbows.1, shoulders.1, 1.0),
    ] {
        let s = Point::new(x, 0.3);
        let h = Point::new(x, 0.6);
        let e = swing(s, h, outward * shoulder, 0.15);
        let w = swing(e, s, outward * elbow, 0.15);
        pose.set(side, Shoulder, s).set(side, Hip, h).set(side, Elbow, e).set(side, Wrist, w);
    }
    pose.frame(t)
}

/// Side-view push-up on the left side with a straight body.
pub fn pushup_frame(t: f64, elbow_angle: f64) -> LandmarkFrame {
    let mut pose = PoseBuilder::new();
    let s = Point::new(0.3, 0.5);
    let e = Point::new(0.36, 0.62);
    pose.set(Left, Shoulder, s)
        .set(Left, Elbow, e)
        .set(Left, Wrist, swing(e, s, elbow_angle, 0.15))
        .set(Left, Hip, Point::new(0.6, 0.5))
        .set(Left, Knee, Point::new(0.75, 0.5))
        .set(Left, Ankle, Point::new(0.9, 0.5))
        .visibility(Right, Shoulder, 0.4);
    pose.frame(t)
}

/// Side-view squat on the left side: vertical shin of length `shin`, heel
/// raised by `heel_lift` shin lengths.
pub fn squat_frame(t: f64, knee_angle: f64, shin: f64, heel_lift: f64) -> LandmarkFrame {
    squat_pose(knee_angle, shin, heel_lift).frame(t)
}

/// Same legs as [`squat_frame`] but the torso continues the thigh line, so
/// the hip stays fully open however far the knee bends.
pub fn knee_bend_frame(t: f64, knee_angle: f64, shin: f64) -> LandmarkFrame {
    let mut pose = squat_pose(knee_angle, shin, 0.0);
    let hip = pose.get(Left, Hip);
    let knee = pose.get(Left, Knee);
    pose.set(Left, Shoulder, hip + (hip - knee).normalize() * 0.3);
    pose.frame(t)
}

fn squat_pose(knee_angle: f64, shin: f64, heel_lift: f64) -> PoseBuilder {
    let mut pose = PoseBuilder::new();
    let ankle = Point::new(0.5, 0.8);
    let knee = Point::new(0.5, 0.8 - shin);
    let hip = swing(knee, ankle, knee_angle, 0.2);
    let toe = Point::new(0.5 + 0.5 * shin, 0.82);
    let heel = Point::new(0.48, 0.82 - heel_lift * shin);
    pose.set(Left, Ankle, ankle)
        .set(Left, Knee, knee)
        .set(Left, Hip, hip)
        .set(Left, Shoulder, Point::new(hip.x, hip.y - 0.3))
        .set(Left, FootIndex, toe)
        .set(Left, Heel, heel)
        .visibility(Right, Hip, 0.4);
    pose
}

/// Side-view forearm plank with shoulder and elbow at right angles.
pub fn plank_frame(t: f64, body_angle: f64) -> LandmarkFrame {
    let mut pose = PoseBuilder::new();
    let s = Point::new(0.3, 0.5);
    let h = Point::new(0.6, 0.5);
    pose.set(Left, Shoulder, s)
        .set(Left, Elbow, Point::new(0.3, 0.65))
        .set(Left, Wrist, Point::new(0.15, 0.65))
        .set(Left, Hip, h)
        .set(Left, Ankle, swing(h, s, body_angle, 0.4))
        .visibility(Right, Hip, 0.4);
    pose.frame(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry;

    #[test]
    fn test_swing_produces_requested_angle() {
        let vertex = Point::new(0.5, 0.5);
        let from = Point::new(0.5, 0.8);
        for degrees in [0.0, 35.0, 90.0, 145.0, 180.0] {
            for sign in [1.0, -1.0] {
                let p = swing(vertex, from, sign * degrees, 0.2);
                assert!((geometry::angle(&from, &vertex, &p) - degrees).abs() < 1e-6);
                assert!((geometry::distance(&vertex, &p) - 0.2).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_squat_pose_geometry() {
        let frame = squat_frame(0.0, 120.0, 0.15, 0.1);
        let at = |role| frame.landmark(JointId::new(Left, role)).map(|l| l.position()).unwrap();
        assert!((geometry::angle(&at(Hip), &at(Knee), &at(Ankle)) - 120.0).abs() < 1e-6);
        assert!((geometry::distance(&at(Knee), &at(Ankle)) - 0.15).abs() < 1e-9);
        assert!((at(FootIndex).y - at(Heel).y - 0.015).abs() < 1e-9);
    }
}
