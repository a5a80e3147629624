//! Gaze vector and screen coordinate conversions.
//!
//! Vectors use the device's backend frame: X positive to the right, Y
//! positive up, Z positive behind the user (a forward gaze has negative Z).
//! Positive azimuth is a rotation to the right.

use crate::tracker::host::CoordBounds;
use serde::{Deserialize, Serialize};

/// Euler rotation order used to split a direction into two angles.
///
/// Uppercase letters name the local (moving) axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationOrder {
    /// Rotate about local X first, then local Y (also written yx').
    #[default]
    XY,
    /// Rotate about local Y first, then local X (also written xy').
    YX,
}

/// Convert a gaze vector to `(azimuth, elevation)` in radians.
///
/// Degenerate input propagates: NaN components give NaN angles.
pub fn vector_to_angles(x: f64, y: f64, z: f64, order: RotationOrder) -> (f64, f64) {
    match order {
        RotationOrder::XY => {
            let azimuth = x.atan2((y * y + z * z).sqrt());
            let elevation = y.atan2(-z);
            (azimuth, elevation)
        }
        RotationOrder::YX => {
            let azimuth = x.atan2(-z);
            let elevation = y.atan2((x * x + z * z).sqrt());
            (azimuth, elevation)
        }
    }
}

/// Inverse of [`vector_to_angles`]: rebuild a vector of length `norm`.
pub fn angles_to_vector(azimuth: f64, elevation: f64, norm: f64, order: RotationOrder) -> [f64; 3] {
    let (sin_az, cos_az) = azimuth.sin_cos();
    let (sin_el, cos_el) = elevation.sin_cos();
    let unit = match order {
        RotationOrder::XY => [sin_az, cos_az * sin_el, -cos_az * cos_el],
        RotationOrder::YX => [cos_el * sin_az, sin_el, -cos_el * cos_az],
    };
    [unit[0] * norm, unit[1] * norm, unit[2] * norm]
}

/// Batch form of [`vector_to_angles`].
pub fn vectors_to_angles(vectors: &[[f64; 3]], order: RotationOrder) -> Vec<(f64, f64)> {
    vectors
        .iter()
        .map(|v| vector_to_angles(v[0], v[1], v[2], order))
        .collect()
}

/// Map a normalized `[0, 1]²` gaze-in-screen position to display units.
///
/// Origin of the normalized space is the top-left corner; the display space
/// is centered with Y up. Without bounds the result is `(0, 0)`.
pub fn normalized_to_display(pos: (f64, f64), bounds: Option<&CoordBounds>) -> (f64, f64) {
    let Some(bounds) = bounds else {
        return (0.0, 0.0);
    };
    let (w, h) = (bounds.width(), bounds.height());
    (w * (pos.0 - 0.5), h * (0.5 - pos.1))
}

/// Inverse of [`normalized_to_display`].
///
/// Zero-sized bounds cannot be inverted and yield `(0, 0)`.
pub fn display_to_normalized(pos: (f64, f64), bounds: Option<&CoordBounds>) -> (f64, f64) {
    let Some(bounds) = bounds else {
        return (0.0, 0.0);
    };
    let (w, h) = (bounds.width(), bounds.height());
    if w == 0.0 || h == 0.0 {
        return (0.0, 0.0);
    }
    (pos.0 / w + 0.5, 0.5 - pos.1 / h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    const EPS: f64 = 1e-9;

    fn hd_bounds() -> CoordBounds {
        CoordBounds {
            left: -960.0,
            top: 540.0,
            right: 960.0,
            bottom: -540.0,
        }
    }

    #[test]
    fn straight_ahead_is_zero() {
        for order in [RotationOrder::XY, RotationOrder::YX] {
            let (az, el) = vector_to_angles(0.0, 0.0, -1.0, order);
            assert!(az.abs() < EPS);
            assert!(el.abs() < EPS);
        }
    }

    #[test]
    fn right_and_up_are_positive() {
        let (az, el) = vector_to_angles(1.0, 0.0, -1.0, RotationOrder::YX);
        assert!((az - FRAC_PI_4).abs() < EPS);
        assert!(el.abs() < EPS);

        let (az, el) = vector_to_angles(0.0, 1.0, -1.0, RotationOrder::XY);
        assert!(az.abs() < EPS);
        assert!((el - FRAC_PI_4).abs() < EPS);
    }

    #[test]
    fn orders_differ_off_axis() {
        let v = (0.3, 0.4, -0.866);
        let xy = vector_to_angles(v.0, v.1, v.2, RotationOrder::XY);
        let yx = vector_to_angles(v.0, v.1, v.2, RotationOrder::YX);
        assert!((xy.0 - yx.0).abs() > 1e-3);
        assert!((xy.1 - yx.1).abs() > 1e-3);
    }

    #[test]
    fn angles_round_trip_for_both_orders() {
        let samples: [[f64; 3]; 4] = [
            [0.1, -0.2, -0.97],
            [-0.5, 0.3, -0.8],
            [0.25, 0.25, -2.0],
            [-0.05, -0.6, -0.4],
        ];
        for order in [RotationOrder::XY, RotationOrder::YX] {
            for v in samples {
                let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                let (az, el) = vector_to_angles(v[0], v[1], v[2], order);
                let back = angles_to_vector(az, el, norm, order);
                for i in 0..3 {
                    assert!(
                        (back[i] - v[i]).abs() < 1e-9,
                        "{order:?} {v:?} -> {back:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn nan_propagates() {
        let (az, el) = vector_to_angles(f64::NAN, 0.0, -1.0, RotationOrder::XY);
        assert!(az.is_nan());
        assert!(!el.is_nan());
    }

    #[test]
    fn batch_matches_single() {
        let vectors = [[0.1, 0.2, -0.9], [0.0, 0.0, -1.0]];
        let batch = vectors_to_angles(&vectors, RotationOrder::XY);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], vector_to_angles(0.1, 0.2, -0.9, RotationOrder::XY));
    }

    #[test]
    fn screen_center_maps_to_origin() {
        let bounds = hd_bounds();
        assert_eq!(normalized_to_display((0.5, 0.5), Some(&bounds)), (0.0, 0.0));
        assert_eq!(
            normalized_to_display((0.0, 0.0), Some(&bounds)),
            (-960.0, 540.0)
        );
        assert_eq!(
            normalized_to_display((1.0, 1.0), Some(&bounds)),
            (960.0, -540.0)
        );
    }

    #[test]
    fn display_round_trip() {
        let bounds = hd_bounds();
        for p in [(0.0, 0.0), (-400.5, 120.25), (959.0, -539.0), (10.0, 500.0)] {
            let n = display_to_normalized(p, Some(&bounds));
            let back = normalized_to_display(n, Some(&bounds));
            assert!((back.0 - p.0).abs() < EPS);
            assert!((back.1 - p.1).abs() < EPS);
        }
    }

    #[test]
    fn missing_bounds_default_to_origin() {
        assert_eq!(normalized_to_display((0.2, 0.9), None), (0.0, 0.0));
        assert_eq!(display_to_normalized((12.0, 3.0), None), (0.0, 0.0));
    }
}
