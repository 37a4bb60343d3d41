// src/geometry.rs - Joint angles and distances in normalized 2D image space
use nalgebra::Vector2;

pub type Point = Vector2<f64>;

/// Edges shorter than this are treated as degenerate.
const MIN_EDGE: f64 = 1e-9;

/// Interior angle at vertex `b` in degrees, in [0, 180].
///
/// Computed from the difference of the two edge polar angles and reflected
/// into [0, 180]. A zero-length edge yields 0.
pub fn angle(a: &Point, b: &Point, c: &Point) -> f64 {
    let ba = a - b;
    let bc = c - b;

    if ba.norm() < MIN_EDGE || bc.norm() < MIN_EDGE {
        return 0.0;
    }

    let radians = bc.y.atan2(bc.x) - ba.y.atan2(ba.x);
    let degrees = radians.abs().to_degrees();

    if degrees > 180.0 {
        360.0 - degrees
    } else {
        degrees
    }
}

pub fn distance(a: &Point, b: &Point) -> f64 {
    (b - a).norm()
}

/// Inclination of the segment a→b from horizontal in degrees, folded into
/// [0, 90] so the result does not depend on which end is left.
pub fn tilt_from_horizontal(a: &Point, b: &Point) -> f64 {
    let d = b - a;
    if d.norm() < MIN_EDGE {
        return 0.0;
    }

    let degrees = d.y.atan2(d.x).abs().to_degrees();
    if degrees > 90.0 {
        180.0 - degrees
    } else {
        degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_straight_and_right_angles() {
        assert!((angle(&p(0.0, 0.0), &p(0.5, 0.0), &p(1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((angle(&p(0.0, 0.0), &p(0.5, 0.0), &p(0.5, 0.5)) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_reflex_is_reflected() {
        // Polar difference is 270 degrees here, interior angle is 90
        let a = p(0.0, -1.0);
        let b = p(0.0, 0.0);
        let c = p(-1.0, 0.0);
        let result = angle(&a, &b, &c);
        assert!((result - 90.0).abs() < 1e-9, "got {result}");
    }

    #[test]
    fn test_angle_symmetry() {
        let triples = [
            (p(0.1, 0.2), p(0.4, 0.5), p(0.9, 0.1)),
            (p(0.3, 0.3), p(0.5, 0.7), p(0.2, 0.9)),
            (p(0.9, 0.9), p(0.1, 0.2), p(0.15, 0.85)),
            (p(0.5, 0.1), p(0.5, 0.5), p(0.51, 0.1)),
        ];
        for (a, b, c) in triples {
            let forward = angle(&a, &b, &c);
            let backward = angle(&c, &b, &a);
            assert!((forward - backward).abs() < 1e-9);
            assert!((0.0..=180.0).contains(&forward));
        }
    }

    #[test]
    fn test_degenerate_edges_return_zero() {
        let b = p(0.4, 0.4);
        assert_eq!(angle(&b, &b, &p(0.9, 0.9)), 0.0);
        assert_eq!(angle(&p(0.1, 0.1), &b, &b), 0.0);
    }

    #[test]
    fn test_distance_and_tilt() {
        assert!((distance(&p(0.0, 0.0), &p(0.3, 0.4)) - 0.5).abs() < 1e-12);
        assert!(tilt_from_horizontal(&p(0.2, 0.5), &p(0.8, 0.5)).abs() < 1e-9);
        // Same tilt whichever shoulder is listed first
        let forward = tilt_from_horizontal(&p(0.2, 0.5), &p(0.8, 0.6));
        let backward = tilt_from_horizontal(&p(0.8, 0.6), &p(0.2, 0.5));
        assert!((forward - backward).abs() < 1e-9);
        assert!((tilt_from_horizontal(&p(0.5, 0.1), &p(0.5, 0.9)) - 90.0).abs() < 1e-9);
    }
}
