// src/smoothing.rs - Per-joint exponential moving average
use std::collections::HashMap;

use crate::geometry::Point;
use crate::landmarks::JointId;
use crate::selector::Skeleton;

/// EMA over joint positions: `smoothed = alpha * raw + (1 - alpha) * prev`.
///
/// The first sample of a joint seeds the filter unblended. Owned by exactly
/// one session.
#[derive(Debug, Clone)]
pub struct EmaSmoother {
    alpha: f64,
    state: HashMap<JointId, Point>,
}

impl EmaSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            state: HashMap::new(),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn update(&mut self, joint: JointId, raw: Point) -> Point {
        let alpha = self.alpha;
        let smoothed = self
            .state
            .entry(joint)
            .and_modify(|prev| *prev = raw * alpha + *prev * (1.0 - alpha))
            .or_insert(raw);
        *smoothed
    }

    /// Feed every joint of a trusted skeleton and return the smoothed copy.
    pub fn smooth(&mut self, skeleton: &Skeleton) -> Skeleton {
        let smoothed = self.blend(skeleton);
        self.store(&smoothed);
        smoothed
    }

    /// What `smooth` would return, without advancing the filter.
    pub fn blend(&self, skeleton: &Skeleton) -> Skeleton {
        let mut smoothed = Skeleton::new(skeleton.primary());
        for (joint, raw) in skeleton.joints() {
            let point = match self.state.get(joint) {
                Some(prev) => raw * self.alpha + prev * (1.0 - self.alpha),
                None => *raw,
            };
            smoothed.insert(*joint, point);
        }
        smoothed
    }

    /// Accept a previously blended skeleton as the new filter state.
    pub fn store(&mut self, smoothed: &Skeleton) {
        for (joint, point) in smoothed.joints() {
            self.state.insert(*joint, *point);
        }
    }

    pub fn get(&self, joint: JointId) -> Option<Point> {
        self.state.get(&joint).copied()
    }

    /// Number of joints seen so far.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}
