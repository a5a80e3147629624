//! Synthetic eye movement.

use mindlink_common::geometry::{RotationOrder, angles_to_vector};
use mindlink_common::tracker::types::StreamPacket;

/// Smooth synthetic gaze wandering over the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticGaze {
    /// Fixation depth, meters.
    pub depth_m: f64,
    /// Horizontal field covered by the normalized screen, radians.
    pub field_h_rad: f64,
    /// Vertical field covered by the normalized screen, radians.
    pub field_v_rad: f64,
    /// Half the angle between the two eyes' gaze vectors, radians.
    pub half_vergence_rad: f64,
}

impl Default for SyntheticGaze {
    fn default() -> Self {
        Self {
            depth_m: 0.6,
            field_h_rad: 0.8,
            field_v_rad: 0.5,
            half_vergence_rad: 0.05,
        }
    }
}

impl SyntheticGaze {
    /// Normalized screen position at `t` seconds, origin top-left.
    pub fn screen_position(&self, t: f64) -> (f64, f64) {
        (0.5 + 0.2 * (t * 0.5).sin(), 0.5 + 0.15 * (t * 0.3).cos())
    }

    /// Pupil diameters `(right, left)` at `t`, millimeters.
    pub fn pupil_diameter(&self, t: f64) -> (f64, f64) {
        let base = 3.5 + 0.3 * (t * 0.7).sin();
        (base, base + 0.1)
    }

    /// One sample's packets at `t`. The extended gaze trigger comes last.
    pub fn packets(&self, t: f64) -> [StreamPacket; 4] {
        let (sx, sy) = self.screen_position(t);
        let azimuth = (sx - 0.5) * self.field_h_rad;
        let elevation = (0.5 - sy) * self.field_v_rad;

        let gaze = angles_to_vector(azimuth, elevation, self.depth_m, RotationOrder::XY);
        let right = angles_to_vector(
            azimuth - self.half_vergence_rad,
            elevation,
            1.0,
            RotationOrder::XY,
        );
        let left = angles_to_vector(
            azimuth + self.half_vergence_rad,
            elevation,
            1.0,
            RotationOrder::XY,
        );
        let (right_pupil, left_pupil) = self.pupil_diameter(t);

        [
            StreamPacket::PerEyeGaze {
                timestamp: t,
                right,
                left,
            },
            StreamPacket::GazeInScreen {
                timestamp: t,
                x: sx,
                y: sy,
            },
            StreamPacket::PupilDiameter {
                timestamp: t,
                right: right_pupil,
                left: left_pupil,
            },
            StreamPacket::ExtendedGaze {
                timestamp: t,
                x: gaze[0],
                y: gaze[1],
                z: gaze[2],
                vergence: 2.0 * self.half_vergence_rad,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindlink_common::geometry::vector_to_angles;
    use mindlink_common::tracker::types::PacketKind;

    #[test]
    fn trigger_is_last() {
        let packets = SyntheticGaze::default().packets(1.0);
        assert_eq!(packets[3].kind(), PacketKind::ExtendedGaze);
        assert!(packets[..3].iter().all(|p| p.kind() != PacketKind::ExtendedGaze));
    }

    #[test]
    fn stays_on_screen_and_in_front() {
        let synth = SyntheticGaze::default();
        for i in 0..200_u32 {
            let t = f64::from(i) * 0.25;
            let (x, y) = synth.screen_position(t);
            assert!((0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y));

            if let StreamPacket::ExtendedGaze { x, y, z, .. } = synth.packets(t)[3] {
                assert!(z < 0.0);
                let (az, _) = vector_to_angles(x, y, z, RotationOrder::XY);
                assert!(az.abs() <= synth.field_h_rad / 2.0);
            }
        }
    }
}
