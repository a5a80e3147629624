//! Typed host records and their positional row form.
//!
//! The host stores events as flat rows whose column order is fixed by its
//! event tables. Each record keeps only what the device measures and fills
//! the remaining columns with [`UNDEFINED`](crate::consts::UNDEFINED) when
//! rendered with `to_row`.

use crate::consts::{BINOCULAR_AVERAGED, BINOCULAR_EYE_SAMPLE, BLINK_END, PUPIL_DIAMETER, UNDEFINED};

const UNDEF: f64 = UNDEFINED as f64;

/// Per-eye part of a binocular sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EyeSample {
    /// Gaze position X in display units (shared by both eyes).
    pub gaze_x: f64,
    /// Gaze position Y in display units (shared by both eyes).
    pub gaze_y: f64,
    /// Gaze depth, meters.
    pub gaze_z: f64,
    /// Azimuth, degrees.
    pub angle_x: f64,
    /// Elevation, degrees.
    pub angle_y: f64,
    /// Pupil diameter, millimeters.
    pub pupil_diameter: f64,
}

impl EyeSample {
    fn push_row(&self, row: &mut Vec<f64>) {
        row.extend_from_slice(&[
            self.gaze_x,
            self.gaze_y,
            self.gaze_z,
            UNDEF, // eye_cam_x
            UNDEF, // eye_cam_y
            UNDEF, // eye_cam_z
            self.angle_x,
            self.angle_y,
            UNDEF, // raw_x
            UNDEF, // raw_y
            self.pupil_diameter,
            f64::from(PUPIL_DIAMETER),
            UNDEF, // pupil_measure2
            UNDEF, // pupil_measure2_type
            UNDEF, // ppd_x
            UNDEF, // ppd_y
            UNDEF, // velocity_x
            UNDEF, // velocity_y
            UNDEF, // velocity_xy
        ]);
    }
}

/// Binocular eye sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BinocularEyeSample {
    /// Host-unique event id.
    pub event_id: u64,
    /// Tracker timestamp, seconds.
    pub device_time: f64,
    /// Host time the sample was logged, seconds.
    pub logged_time: f64,
    /// Left eye.
    pub left: EyeSample,
    /// Right eye.
    pub right: EyeSample,
}

const EYE_FIELDS: [&str; 19] = [
    "gaze_x",
    "gaze_y",
    "gaze_z",
    "eye_cam_x",
    "eye_cam_y",
    "eye_cam_z",
    "angle_x",
    "angle_y",
    "raw_x",
    "raw_y",
    "pupil_measure1",
    "pupil_measure1_type",
    "pupil_measure2",
    "pupil_measure2_type",
    "ppd_x",
    "ppd_y",
    "velocity_x",
    "velocity_y",
    "velocity_xy",
];

const HEADER_FIELDS: [&str; 11] = [
    "experiment_id",
    "session_id",
    "device_id",
    "event_id",
    "type",
    "device_time",
    "logged_time",
    "time",
    "confidence_interval",
    "delay",
    "filter_id",
];

impl BinocularEyeSample {
    /// Number of columns of the row form.
    pub const ROW_LEN: usize = 50;

    /// Column names of the row form, in order.
    pub fn field_names() -> Vec<String> {
        let mut names: Vec<String> = HEADER_FIELDS.iter().map(|s| s.to_string()).collect();
        for eye in ["left", "right"] {
            names.extend(EYE_FIELDS.iter().map(|f| format!("{eye}_{f}")));
        }
        names.push("status".to_string());
        names
    }

    /// Positional row in host column order.
    pub fn to_row(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(Self::ROW_LEN);
        row.extend_from_slice(&[
            0.0,
            0.0,
            0.0,
            self.event_id as f64,
            f64::from(BINOCULAR_EYE_SAMPLE),
            self.device_time,
            self.logged_time,
            self.logged_time,
            0.0,
            0.0,
            0.0,
        ]);
        self.left.push_row(&mut row);
        self.right.push_row(&mut row);
        row.push(0.0);
        row
    }
}

/// End of a blink, reported for both eyes averaged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlinkEndEvent {
    /// Host-unique event id.
    pub event_id: u64,
    /// Tracker timestamp, seconds.
    pub device_time: f64,
    /// Host time the event was logged, seconds.
    pub logged_time: f64,
    /// Blink duration, seconds.
    pub duration: f64,
}

impl BlinkEndEvent {
    /// Column names of the row form, in order.
    pub const FIELD_NAMES: [&'static str; 14] = [
        "experiment_id",
        "session_id",
        "device_id",
        "event_id",
        "type",
        "device_time",
        "logged_time",
        "time",
        "confidence_interval",
        "delay",
        "filter_id",
        "eye",
        "duration",
        "status",
    ];

    /// Positional row in host column order.
    pub fn to_row(&self) -> Vec<f64> {
        vec![
            0.0,
            0.0,
            0.0,
            self.event_id as f64,
            f64::from(BLINK_END),
            self.device_time,
            self.logged_time,
            self.logged_time,
            0.0,
            0.0,
            0.0,
            f64::from(BINOCULAR_AVERAGED),
            self.duration,
            0.0,
        ]
    }
}

/// Record published into the host event buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// Binocular eye sample.
    BinocularSample(BinocularEyeSample),
    /// Blink end.
    BlinkEnd(BlinkEndEvent),
}

impl HostEvent {
    /// Host event type id.
    pub const fn event_type(&self) -> u32 {
        match self {
            HostEvent::BinocularSample(_) => BINOCULAR_EYE_SAMPLE,
            HostEvent::BlinkEnd(_) => BLINK_END,
        }
    }

    /// Host-unique event id.
    pub const fn event_id(&self) -> u64 {
        match self {
            HostEvent::BinocularSample(s) => s.event_id,
            HostEvent::BlinkEnd(b) => b.event_id,
        }
    }

    /// Tracker timestamp, seconds.
    pub const fn device_time(&self) -> f64 {
        match self {
            HostEvent::BinocularSample(s) => s.device_time,
            HostEvent::BlinkEnd(b) => b.device_time,
        }
    }

    /// Positional row in host column order.
    pub fn to_row(&self) -> Vec<f64> {
        match self {
            HostEvent::BinocularSample(s) => s.to_row(),
            HostEvent::BlinkEnd(b) => b.to_row(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(names: &[String], name: &str) -> usize {
        names.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_sample_row_layout() {
        let names = BinocularEyeSample::field_names();
        assert_eq!(names.len(), BinocularEyeSample::ROW_LEN);
        assert_eq!(names[11], "left_gaze_x");
        assert_eq!(names[30], "right_gaze_x");
        assert_eq!(names[49], "status");

        let sample = BinocularEyeSample {
            event_id: 7,
            device_time: 12.5,
            logged_time: 100.25,
            left: EyeSample {
                gaze_x: 10.0,
                gaze_y: -20.0,
                gaze_z: 0.6,
                angle_x: 1.5,
                angle_y: -2.5,
                pupil_diameter: 3.1,
            },
            right: EyeSample {
                gaze_x: 10.0,
                gaze_y: -20.0,
                gaze_z: 0.6,
                angle_x: 1.0,
                angle_y: -2.0,
                pupil_diameter: 3.3,
            },
        };
        let row = sample.to_row();
        assert_eq!(row.len(), BinocularEyeSample::ROW_LEN);
        assert_eq!(row[column(&names, "event_id")], 7.0);
        assert_eq!(row[column(&names, "type")], f64::from(BINOCULAR_EYE_SAMPLE));
        assert_eq!(row[column(&names, "time")], 100.25);
        assert_eq!(row[column(&names, "left_angle_x")], 1.5);
        assert_eq!(row[column(&names, "right_pupil_measure1")], 3.3);
        assert_eq!(
            row[column(&names, "right_pupil_measure1_type")],
            f64::from(PUPIL_DIAMETER)
        );
        assert_eq!(row[column(&names, "left_eye_cam_x")], UNDEF);
        assert_eq!(row[column(&names, "right_velocity_xy")], UNDEF);
    }

    #[test]
    fn test_blink_row_layout() {
        let blink = BlinkEndEvent {
            event_id: 3,
            device_time: 4.0,
            logged_time: 5.0,
            duration: 0.15,
        };
        let row = blink.to_row();
        assert_eq!(row.len(), BlinkEndEvent::FIELD_NAMES.len());
        assert_eq!(
            row,
            vec![
                0.0,
                0.0,
                0.0,
                3.0,
                f64::from(BLINK_END),
                4.0,
                5.0,
                5.0,
                0.0,
                0.0,
                0.0,
                f64::from(BINOCULAR_AVERAGED),
                0.15,
                0.0
            ]
        );
    }

    #[test]
    fn test_host_event_accessors() {
        let event = HostEvent::BlinkEnd(BlinkEndEvent {
            event_id: 9,
            device_time: 1.0,
            ..Default::default()
        });
        assert_eq!(event.event_type(), BLINK_END);
        assert_eq!(event.event_id(), 9);
        assert_eq!(event.device_time(), 1.0);
        assert_eq!(event.to_row().len(), 14);
    }
}
