//! Stream aggregation.
//!
//! The device publishes gaze, per-eye gaze, gaze-in-screen and pupil data
//! on separate channels. Secondary channels only refresh the
//! [`LatestSampleCache`]; an extended gaze packet triggers a
//! [`NativeSample`] combining its own values with whatever the cache holds
//! at that moment.

use mindlink_common::geometry::normalized_to_display;
use mindlink_common::tracker::host::CoordBounds;
use mindlink_common::tracker::types::{AckCode, DeviceEvent, StreamPacket};

/// Latest values of the secondary channels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatestSampleCache {
    /// Right eye gaze vector.
    pub right_gaze: [f64; 3],
    /// Left eye gaze vector.
    pub left_gaze: [f64; 3],
    /// Gaze position in display units.
    pub gaze_in_screen: (f64, f64),
    /// Pupil diameters, `(right, left)`.
    pub pupil_diameter: (f64, f64),
}

/// Sample emitted on every extended gaze packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeSample {
    /// Tracker timestamp, seconds.
    pub timestamp: f64,
    /// Combined gaze vector.
    pub gaze: [f64; 3],
    /// Vergence angle, radians.
    pub vergence: f64,
    /// Secondary channel values at emission time.
    pub cache: LatestSampleCache,
}

/// Output of the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeEvent {
    /// Binocular sample.
    Sample(NativeSample),
    /// Blink end.
    BlinkEnd {
        /// Tracker timestamp, seconds.
        timestamp: f64,
        /// Duration, seconds.
        duration: f64,
    },
    /// A GUI procedure started.
    ProcedureStarted,
    /// A GUI procedure finished.
    ProcedureEnded(AckCode),
}

/// Merges channel packets into samples.
#[derive(Debug, Clone, Default)]
pub struct StreamAggregator {
    cache: LatestSampleCache,
    bounds: Option<CoordBounds>,
    latest_timestamp: Option<f64>,
}

impl StreamAggregator {
    /// Create an aggregator converting gaze-in-screen positions with `bounds`.
    pub fn new(bounds: Option<CoordBounds>) -> Self {
        Self {
            cache: LatestSampleCache::default(),
            bounds,
            latest_timestamp: None,
        }
    }

    /// Current cache.
    pub fn cache(&self) -> &LatestSampleCache {
        &self.cache
    }

    /// Most recent tracker timestamp seen on any channel.
    pub fn latest_timestamp(&self) -> Option<f64> {
        self.latest_timestamp
    }

    /// Zero the cache.
    pub fn reset(&mut self) {
        self.cache = LatestSampleCache::default();
    }

    /// Feed one packet.
    pub fn ingest(&mut self, packet: &StreamPacket) -> Option<NativeEvent> {
        match *packet {
            StreamPacket::PerEyeGaze {
                timestamp,
                right,
                left,
            } => {
                self.touch(timestamp);
                self.cache.right_gaze = right;
                self.cache.left_gaze = left;
                None
            }
            StreamPacket::GazeInScreen { timestamp, x, y } => {
                self.touch(timestamp);
                self.cache.gaze_in_screen = normalized_to_display((x, y), self.bounds.as_ref());
                None
            }
            StreamPacket::PupilDiameter {
                timestamp,
                right,
                left,
            } => {
                self.touch(timestamp);
                self.cache.pupil_diameter = (right, left);
                None
            }
            StreamPacket::ExtendedGaze {
                timestamp,
                x,
                y,
                z,
                vergence,
            } => {
                self.touch(timestamp);
                Some(NativeEvent::Sample(NativeSample {
                    timestamp,
                    gaze: [x, y, z],
                    vergence,
                    cache: self.cache,
                }))
            }
            StreamPacket::Event(event) => match event {
                DeviceEvent::Blink {
                    timestamp,
                    duration,
                } => {
                    self.touch(timestamp);
                    Some(NativeEvent::BlinkEnd {
                        timestamp,
                        duration,
                    })
                }
                DeviceEvent::ProcedureStarted { .. } => Some(NativeEvent::ProcedureStarted),
                DeviceEvent::ProcedureEnded { result, .. } => {
                    Some(NativeEvent::ProcedureEnded(result))
                }
                DeviceEvent::Other { .. } => None,
            },
        }
    }

    fn touch(&mut self, timestamp: f64) {
        self.latest_timestamp = Some(match self.latest_timestamp {
            Some(prev) => prev.max(timestamp),
            None => timestamp,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaze(timestamp: f64) -> StreamPacket {
        StreamPacket::ExtendedGaze {
            timestamp,
            x: 0.1,
            y: 0.2,
            z: -0.8,
            vergence: 0.05,
        }
    }

    fn sample(event: Option<NativeEvent>) -> NativeSample {
        match event {
            Some(NativeEvent::Sample(s)) => s,
            other => panic!("expected sample, got {other:?}"),
        }
    }

    #[test]
    fn secondary_channels_emit_nothing() {
        let mut agg = StreamAggregator::new(None);
        assert!(
            agg.ingest(&StreamPacket::PupilDiameter {
                timestamp: 1.0,
                right: 3.0,
                left: 3.2
            })
            .is_none()
        );
        assert!(
            agg.ingest(&StreamPacket::PerEyeGaze {
                timestamp: 1.0,
                right: [0.0, 0.0, -1.0],
                left: [0.0, 0.0, -1.0]
            })
            .is_none()
        );
        assert_eq!(agg.cache().pupil_diameter, (3.0, 3.2));
    }

    #[test]
    fn trigger_combines_cache() {
        let mut agg = StreamAggregator::new(Some(CoordBounds::centered(1920.0, 1080.0)));
        agg.ingest(&StreamPacket::GazeInScreen {
            timestamp: 1.0,
            x: 0.75,
            y: 0.25,
        });
        agg.ingest(&StreamPacket::PupilDiameter {
            timestamp: 1.0,
            right: 4.0,
            left: 4.1,
        });

        let s = sample(agg.ingest(&gaze(1.01)));
        assert_eq!(s.timestamp, 1.01);
        assert_eq!(s.gaze, [0.1, 0.2, -0.8]);
        assert_eq!(s.cache.gaze_in_screen, (480.0, 270.0));
        assert_eq!(s.cache.pupil_diameter, (4.0, 4.1));
    }

    #[test]
    fn no_future_leakage() {
        let mut agg = StreamAggregator::new(None);
        agg.ingest(&StreamPacket::PupilDiameter {
            timestamp: 1.0,
            right: 3.0,
            left: 3.0,
        });
        let first = sample(agg.ingest(&gaze(1.0)));

        agg.ingest(&StreamPacket::PupilDiameter {
            timestamp: 2.0,
            right: 5.0,
            left: 5.0,
        });
        let second = sample(agg.ingest(&gaze(2.0)));

        assert_eq!(first.cache.pupil_diameter, (3.0, 3.0));
        assert_eq!(second.cache.pupil_diameter, (5.0, 5.0));
    }

    #[test]
    fn gaze_in_screen_without_bounds_is_origin() {
        let mut agg = StreamAggregator::new(None);
        agg.ingest(&StreamPacket::GazeInScreen {
            timestamp: 1.0,
            x: 0.9,
            y: 0.1,
        });
        assert_eq!(agg.cache().gaze_in_screen, (0.0, 0.0));
    }

    #[test]
    fn events_channel() {
        let mut agg = StreamAggregator::new(None);
        let blink = agg.ingest(&StreamPacket::Event(DeviceEvent::Blink {
            timestamp: 3.0,
            duration: 0.12,
        }));
        assert_eq!(
            blink,
            Some(NativeEvent::BlinkEnd {
                timestamp: 3.0,
                duration: 0.12
            })
        );

        let ended = agg.ingest(&StreamPacket::Event(DeviceEvent::ProcedureEnded {
            timestamp: 3.5,
            result: AckCode::Success,
        }));
        assert_eq!(ended, Some(NativeEvent::ProcedureEnded(AckCode::Success)));

        let other = agg.ingest(&StreamPacket::Event(DeviceEvent::Other {
            id: 9,
            timestamp: 4.0,
        }));
        assert!(other.is_none());
    }

    #[test]
    fn reset_zeroes_cache_and_keeps_time() {
        let mut agg = StreamAggregator::new(None);
        agg.ingest(&StreamPacket::PupilDiameter {
            timestamp: 7.0,
            right: 3.0,
            left: 3.0,
        });
        agg.ingest(&gaze(6.0));
        assert_eq!(agg.latest_timestamp(), Some(7.0));

        agg.reset();
        assert_eq!(*agg.cache(), LatestSampleCache::default());
        assert_eq!(agg.latest_timestamp(), Some(7.0));
    }
}
