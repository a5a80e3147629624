//! Native event to host record translation.

use crate::stream::{NativeEvent, NativeSample};
use mindlink_common::geometry::{RotationOrder, vector_to_angles};
use mindlink_common::tracker::records::{BinocularEyeSample, BlinkEndEvent, EyeSample, HostEvent};

/// Converts aggregated native events into host records.
///
/// Event ids increase monotonically over the translator's lifetime and are
/// never reused, including across recording sessions.
#[derive(Debug, Clone)]
pub struct EventTranslator {
    next_event_id: u64,
    latest_sample: Option<BinocularEyeSample>,
    latest_gaze_position: Option<(f64, f64)>,
    order: RotationOrder,
}

impl Default for EventTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTranslator {
    /// Create a translator. Angles use the XY rotation order.
    pub fn new() -> Self {
        Self {
            next_event_id: 1,
            latest_sample: None,
            latest_gaze_position: None,
            order: RotationOrder::XY,
        }
    }

    /// Most recent binocular sample.
    pub fn latest_sample(&self) -> Option<&BinocularEyeSample> {
        self.latest_sample.as_ref()
    }

    /// Most recent gaze position in display units.
    pub fn latest_gaze_position(&self) -> Option<(f64, f64)> {
        self.latest_gaze_position
    }

    /// Forget the latest sample and gaze position.
    pub fn clear_latest(&mut self) {
        self.latest_sample = None;
        self.latest_gaze_position = None;
    }

    /// Translate `event` logged at host time `logged_time`. Procedure
    /// events have no host record.
    pub fn translate(&mut self, event: &NativeEvent, logged_time: f64) -> Option<HostEvent> {
        match *event {
            NativeEvent::Sample(ref sample) => {
                let record = self.binocular_sample(sample, logged_time);
                self.latest_sample = Some(record);
                self.latest_gaze_position = Some(sample.cache.gaze_in_screen);
                Some(HostEvent::BinocularSample(record))
            }
            NativeEvent::BlinkEnd {
                timestamp,
                duration,
            } => Some(HostEvent::BlinkEnd(BlinkEndEvent {
                event_id: self.take_id(),
                device_time: timestamp,
                logged_time,
                duration,
            })),
            NativeEvent::ProcedureStarted | NativeEvent::ProcedureEnded(_) => None,
        }
    }

    fn binocular_sample(&mut self, sample: &NativeSample, logged_time: f64) -> BinocularEyeSample {
        let (gaze_x, gaze_y) = sample.cache.gaze_in_screen;
        let depth = -sample.gaze[2];
        let (right_pupil, left_pupil) = sample.cache.pupil_diameter;
        let order = self.order;

        let eye = |vector: [f64; 3], pupil: f64| {
            let (azimuth, elevation) = vector_to_angles(vector[0], vector[1], vector[2], order);
            EyeSample {
                gaze_x,
                gaze_y,
                gaze_z: depth,
                angle_x: azimuth.to_degrees(),
                angle_y: elevation.to_degrees(),
                pupil_diameter: pupil,
            }
        };
        let left = eye(sample.cache.left_gaze, left_pupil);
        let right = eye(sample.cache.right_gaze, right_pupil);

        BinocularEyeSample {
            event_id: self.take_id(),
            device_time: sample.timestamp,
            logged_time,
            left,
            right,
        }
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::LatestSampleCache;
    use mindlink_common::consts::{BINOCULAR_AVERAGED, BLINK_END};
    use mindlink_common::tracker::types::AckCode;

    fn native_sample() -> NativeEvent {
        NativeEvent::Sample(NativeSample {
            timestamp: 10.0,
            gaze: [0.05, -0.02, -0.65],
            vergence: 0.1,
            cache: LatestSampleCache {
                right_gaze: [1.0, 0.0, -1.0],
                left_gaze: [0.0, 1.0, -1.0],
                gaze_in_screen: (120.0, -40.0),
                pupil_diameter: (3.5, 3.7),
            },
        })
    }

    #[test]
    fn binocular_sample_fields() {
        let mut translator = EventTranslator::new();
        let Some(HostEvent::BinocularSample(s)) = translator.translate(&native_sample(), 99.0)
        else {
            panic!("expected binocular sample");
        };

        assert_eq!(s.device_time, 10.0);
        assert_eq!(s.logged_time, 99.0);
        for eye in [s.left, s.right] {
            assert_eq!((eye.gaze_x, eye.gaze_y), (120.0, -40.0));
            assert!((eye.gaze_z - 0.65).abs() < 1e-12);
        }
        // XY order: right eye looks 45 deg right, left eye 45 deg up.
        assert!((s.right.angle_x - 45.0).abs() < 1e-9);
        assert!(s.right.angle_y.abs() < 1e-9);
        assert!(s.left.angle_x.abs() < 1e-9);
        assert!((s.left.angle_y - 45.0).abs() < 1e-9);
        assert_eq!(s.right.pupil_diameter, 3.5);
        assert_eq!(s.left.pupil_diameter, 3.7);

        assert_eq!(translator.latest_sample(), Some(&s));
        assert_eq!(translator.latest_gaze_position(), Some((120.0, -40.0)));
    }

    #[test]
    fn depth_is_negated_z_for_both_eyes() {
        let mut translator = EventTranslator::new();
        let Some(HostEvent::BinocularSample(s)) = translator.translate(&native_sample(), 0.0)
        else {
            panic!("expected binocular sample");
        };
        assert_eq!(s.left.gaze_z, 0.65);
        assert_eq!(s.right.gaze_z, s.left.gaze_z);
    }

    #[test]
    fn blink_record() {
        let mut translator = EventTranslator::new();
        let event = translator
            .translate(
                &NativeEvent::BlinkEnd {
                    timestamp: 4.0,
                    duration: 0.2,
                },
                5.0,
            )
            .unwrap();
        let row = event.to_row();
        assert_eq!(row[4], f64::from(BLINK_END));
        assert_eq!(row[11], f64::from(BINOCULAR_AVERAGED));
        assert_eq!(row[12], 0.2);
        // Blinks do not touch the latest sample.
        assert!(translator.latest_sample().is_none());
    }

    #[test]
    fn event_ids_increase() {
        let mut translator = EventTranslator::new();
        let mut last = 0;
        for i in 0..10_u32 {
            let event = if i % 3 == 0 {
                NativeEvent::BlinkEnd {
                    timestamp: f64::from(i),
                    duration: 0.1,
                }
            } else {
                native_sample()
            };
            let id = translator.translate(&event, 0.0).unwrap().event_id();
            assert!(id > last);
            last = id;
        }
        translator.clear_latest();
        let id = translator.translate(&native_sample(), 0.0).unwrap().event_id();
        assert!(id > last);
    }

    #[test]
    fn procedure_events_have_no_record() {
        let mut translator = EventTranslator::new();
        assert!(
            translator
                .translate(&NativeEvent::ProcedureEnded(AckCode::Success), 0.0)
                .is_none()
        );
        assert!(translator.translate(&NativeEvent::ProcedureStarted, 0.0).is_none());
    }
}
