// src/features.rs - Named scalar measurements derived from a skeleton
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::geometry;
use crate::landmarks::{BodySide, JointRole};
use crate::selector::Skeleton;

use JointRole::*;

/// A measurement the rule evaluator and state machine can read.
///
/// Single-side features are computed on the skeleton's primary side. `Left*`,
/// `Right*`, `*Min`, `*Max`, `*Asymmetry` and `ShoulderTilt` need both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// shoulder-elbow-wrist
    ElbowAngle,
    /// hip-shoulder-elbow
    ShoulderAngle,
    /// shoulder-elbow-hip, large when the elbow flares away from the torso
    ElbowTorsoAngle,
    /// hip-knee-ankle
    KneeAngle,
    /// shoulder-hip-knee
    HipAngle,
    /// shoulder-hip-ankle
    BodyAngle,
    /// Larger of the knee and hip angles; below a threshold only when both are
    LegAngleMax,
    /// Smaller of the knee and hip angles
    LegAngleMin,
    /// knee-ankle distance in normalized units
    ShinLength,
    /// How far the knee travels past the toes, as a fraction of the reference length
    KneeOverToe,
    /// Height of the heel above the toes, as a fraction of the reference length
    HeelLift,
    LeftElbowAngle,
    RightElbowAngle,
    LeftShoulderAngle,
    RightShoulderAngle,
    ElbowAngleMin,
    ElbowAngleMax,
    ShoulderAngleMin,
    ShoulderAngleMax,
    ElbowAsymmetry,
    ShoulderAsymmetry,
    /// Deviation of the shoulder line from horizontal, degrees
    ShoulderTilt,
    /// Seconds since the last counted repetition (infinite before the first)
    SecondsSinceRep,
}

impl Feature {
    /// Joint roles the feature reads.
    pub fn roles(self) -> &'static [JointRole] {
        match self {
            Feature::ElbowAngle
            | Feature::LeftElbowAngle
            | Feature::RightElbowAngle
            | Feature::ElbowAngleMin
            | Feature::ElbowAngleMax
            | Feature::ElbowAsymmetry => &[Shoulder, Elbow, Wrist],
            Feature::ShoulderAngle
            | Feature::ElbowTorsoAngle
            | Feature::LeftShoulderAngle
            | Feature::RightShoulderAngle
            | Feature::ShoulderAngleMin
            | Feature::ShoulderAngleMax
            | Feature::ShoulderAsymmetry => &[Hip, Shoulder, Elbow],
            Feature::KneeAngle => &[Hip, Knee, Ankle],
            Feature::HipAngle => &[Shoulder, Hip, Knee],
            Feature::BodyAngle => &[Shoulder, Hip, Ankle],
            Feature::LegAngleMax | Feature::LegAngleMin => &[Shoulder, Hip, Knee, Ankle],
            Feature::ShinLength => &[Knee, Ankle],
            Feature::KneeOverToe | Feature::HeelLift => &[Knee, Ankle, Heel, FootIndex],
            Feature::ShoulderTilt => &[Shoulder],
            Feature::SecondsSinceRep => &[],
        }
    }

    pub fn is_bilateral(self) -> bool {
        matches!(
            self,
            Feature::LeftElbowAngle
                | Feature::RightElbowAngle
                | Feature::LeftShoulderAngle
                | Feature::RightShoulderAngle
                | Feature::ElbowAngleMin
                | Feature::ElbowAngleMax
                | Feature::ShoulderAngleMin
                | Feature::ShoulderAngleMax
                | Feature::ElbowAsymmetry
                | Feature::ShoulderAsymmetry
                | Feature::ShoulderTilt
        )
    }

    /// Depends on the repetition history rather than the skeleton.
    pub fn is_temporal(self) -> bool {
        matches!(self, Feature::SecondsSinceRep)
    }

    fn compute(self, skeleton: &Skeleton, ctx: &FeatureContext) -> Result<f64> {
        let side = skeleton.primary();
        match self {
            Feature::ElbowAngle => elbow_angle(skeleton, side),
            Feature::ShoulderAngle => shoulder_angle(skeleton, side),
            Feature::ElbowTorsoAngle => joint_angle(skeleton, side, Shoulder, Elbow, Hip),
            Feature::KneeAngle => joint_angle(skeleton, side, Hip, Knee, Ankle),
            Feature::HipAngle => joint_angle(skeleton, side, Shoulder, Hip, Knee),
            Feature::BodyAngle => joint_angle(skeleton, side, Shoulder, Hip, Ankle),
            Feature::LegAngleMax => leg_angles(skeleton, side).map(|(k, h)| k.max(h)),
            Feature::LegAngleMin => leg_angles(skeleton, side).map(|(k, h)| k.min(h)),
            Feature::ShinLength => skeleton.segment_length(side, Knee, Ankle),
            Feature::KneeOverToe => {
                let knee = skeleton.on(side, Knee)?;
                let heel = skeleton.on(side, Heel)?;
                let toe = skeleton.on(side, FootIndex)?;
                // Positive along the direction the foot points
                let facing = if toe.x >= heel.x { 1.0 } else { -1.0 };
                Ok(scaled((knee.x - toe.x) * facing, reference(skeleton, side, ctx)?))
            }
            Feature::HeelLift => {
                let heel = skeleton.on(side, Heel)?;
                let toe = skeleton.on(side, FootIndex)?;
                // Image y grows downward
                Ok(scaled(toe.y - heel.y, reference(skeleton, side, ctx)?))
            }
            Feature::LeftElbowAngle => elbow_angle(skeleton, BodySide::Left),
            Feature::RightElbowAngle => elbow_angle(skeleton, BodySide::Right),
            Feature::LeftShoulderAngle => shoulder_angle(skeleton, BodySide::Left),
            Feature::RightShoulderAngle => shoulder_angle(skeleton, BodySide::Right),
            Feature::ElbowAngleMin => both(skeleton, elbow_angle).map(|(l, r)| l.min(r)),
            Feature::ElbowAngleMax => both(skeleton, elbow_angle).map(|(l, r)| l.max(r)),
            Feature::ShoulderAngleMin => both(skeleton, shoulder_angle).map(|(l, r)| l.min(r)),
            Feature::ShoulderAngleMax => both(skeleton, shoulder_angle).map(|(l, r)| l.max(r)),
            Feature::ElbowAsymmetry => both(skeleton, elbow_angle).map(|(l, r)| (l - r).abs()),
            Feature::ShoulderAsymmetry => both(skeleton, shoulder_angle).map(|(l, r)| (l - r).abs()),
            Feature::ShoulderTilt => Ok(geometry::tilt_from_horizontal(
                &skeleton.on(BodySide::Left, Shoulder)?,
                &skeleton.on(BodySide::Right, Shoulder)?,
            )),
            Feature::SecondsSinceRep => Ok(ctx.seconds_since_rep),
        }
    }
}

fn joint_angle(
    skeleton: &Skeleton,
    side: BodySide,
    a: JointRole,
    vertex: JointRole,
    c: JointRole,
) -> Result<f64> {
    Ok(geometry::angle(
        &skeleton.on(side, a)?,
        &skeleton.on(side, vertex)?,
        &skeleton.on(side, c)?,
    ))
}

fn elbow_angle(skeleton: &Skeleton, side: BodySide) -> Result<f64> {
    joint_angle(skeleton, side, Shoulder, Elbow, Wrist)
}

fn shoulder_angle(skeleton: &Skeleton, side: BodySide) -> Result<f64> {
    joint_angle(skeleton, side, Hip, Shoulder, Elbow)
}

/// (knee, hip) on one side.
fn leg_angles(skeleton: &Skeleton, side: BodySide) -> Result<(f64, f64)> {
    Ok((
        joint_angle(skeleton, side, Hip, Knee, Ankle)?,
        joint_angle(skeleton, side, Shoulder, Hip, Knee)?,
    ))
}

fn both(
    skeleton: &Skeleton,
    measure: fn(&Skeleton, BodySide) -> Result<f64>,
) -> Result<(f64, f64)> {
    Ok((measure(skeleton, BodySide::Left)?, measure(skeleton, BodySide::Right)?))
}

/// Locked calibration length if present, otherwise this frame's shin length.
fn reference(skeleton: &Skeleton, side: BodySide, ctx: &FeatureContext) -> Result<f64> {
    match ctx.reference_length {
        Some(length) => Ok(length),
        None => skeleton.segment_length(side, Knee, Ankle),
    }
}

fn scaled(displacement: f64, reference: f64) -> f64 {
    if reference <= f64::EPSILON {
        0.0
    } else {
        displacement / reference
    }
}

/// Session-derived inputs to feature extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureContext {
    pub reference_length: Option<f64>,
    pub seconds_since_rep: f64,
}

impl Default for FeatureContext {
    fn default() -> Self {
        Self {
            reference_length: None,
            seconds_since_rep: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    values: BTreeMap<Feature, f64>,
}

impl FeatureVector {
    pub fn extract(features: &[Feature], skeleton: &Skeleton, ctx: &FeatureContext) -> Result<Self> {
        let mut values = BTreeMap::new();
        for &feature in features {
            values.insert(feature, feature.compute(skeleton, ctx)?);
        }
        Ok(Self { values })
    }

    pub fn get(&self, feature: Feature) -> Result<f64> {
        self.values
            .get(&feature)
            .copied()
            .ok_or(EngineError::MissingFeature(feature))
    }

    pub fn insert(&mut self, feature: Feature, value: f64) {
        self.values.insert(feature, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Feature, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
