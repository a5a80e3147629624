//! Host-facing eye tracker device.
//!
//! `EyeTracker` is the object the experiment host talks to. It owns the
//! [`ConnectionManager`], the stream aggregation and event translation
//! pipeline and the host event buffer. Nothing happens in the background:
//! packets queued by client callbacks are processed when the host calls
//! [`EyeTracker::poll`], during bounded waits, and on every calibration
//! heartbeat.

use crate::calibration::{CalibrationDevice, CalibrationOutcome, CalibrationRunner, ProcedureSignal};
use crate::connection::{CameraState, ConnectionManager, ConnectionState, ScreenTrackingState};
use crate::events::EventTranslator;
use crate::markers::{MarkerPlacement, MarkerSheet};
use crate::registry::{ClientRegistry, InstanceGuard, InstanceRegistry};
use crate::stream::{NativeEvent, StreamAggregator};
use crossbeam_channel::Receiver;
use mindlink_common::config::ConfigLoader;
use mindlink_common::consts::TrackerStatus;
use mindlink_common::tracker::client::{FrontendApi, TrackerError};
use mindlink_common::tracker::config::TrackerConfig;
use mindlink_common::tracker::host::{CalibrationHost, EventBuffer};
use mindlink_common::tracker::records::BinocularEyeSample;
use mindlink_common::tracker::types::StreamPacket;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// AdHawk MindLink eye tracker device.
pub struct EyeTracker {
    /// Connection, camera and screen tracking lifecycle
    connection: ConnectionManager,
    /// Packets forwarded by the client's stream handlers
    data_rx: Receiver<StreamPacket>,
    aggregator: StreamAggregator,
    translator: EventTranslator,
    /// Host event buffer records are published to
    buffer: Box<dyn EventBuffer>,
    config: TrackerConfig,
    markers: MarkerSheet,
    /// Whether records are forwarded to the buffer
    recording: bool,
    /// Procedure results seen while polling, consumed by calibration
    procedure_signals: Vec<ProcedureSignal>,
    /// Host clock origin for `logged_time`
    epoch: Instant,
    closed: bool,
    /// Held for the tracker's lifetime; dropped last
    _instance: InstanceGuard,
}

impl EyeTracker {
    /// Load a tracker configuration from a TOML file.
    ///
    /// A relative `aruco_info_file` is resolved against the directory of
    /// the configuration file.
    ///
    /// # Errors
    /// Returns `TrackerError::ConfigError` if the file cannot be read or parsed.
    pub fn load_config(path: &Path) -> Result<TrackerConfig, TrackerError> {
        info!("Loading configuration from {:?}", path);
        let mut config = TrackerConfig::load(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        if let Some(sheet) = config.runtime_settings.aruco_info_file.as_mut() {
            *sheet = resolve_path(config_dir, sheet);
        }
        info!(
            "Loaded config: client={}, sampling_rate={} Hz, screen_tracking={}",
            config.client,
            config.runtime_settings.sampling_rate,
            config.runtime_settings.enable_screen_tracking
        );
        Ok(config)
    }

    /// Create the tracker using the client named in `config.client` and
    /// connect to the device.
    ///
    /// A device that does not answer is not an error: the tracker is
    /// returned disconnected and `set_connection_state(true)` may be retried.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the client is unknown,
    /// or another tracker is alive on `instances`.
    pub fn new(
        config: TrackerConfig,
        clients: &ClientRegistry,
        instances: &InstanceRegistry,
        buffer: Box<dyn EventBuffer>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let instance = instances.claim()?;
        let client = clients.create_client(&config.client)?;
        Ok(Self::build(config, client, instance, buffer))
    }

    /// Create the tracker around an already constructed client.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or another tracker is
    /// alive on `instances`.
    pub fn with_client(
        config: TrackerConfig,
        client: Box<dyn FrontendApi>,
        instances: &InstanceRegistry,
        buffer: Box<dyn EventBuffer>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let instance = instances.claim()?;
        Ok(Self::build(config, client, instance, buffer))
    }

    fn build(
        config: TrackerConfig,
        client: Box<dyn FrontendApi>,
        instance: InstanceGuard,
        buffer: Box<dyn EventBuffer>,
    ) -> Self {
        info!(
            "Creating MindLink eye tracker with '{}' client v{}",
            client.name(),
            client.version()
        );
        let (data_tx, data_rx) = crossbeam_channel::unbounded();
        let connection = ConnectionManager::new(client, &config, data_tx);
        let markers =
            MarkerSheet::load_or_empty(config.runtime_settings.aruco_info_file.as_deref());
        let bounds = config.display.as_ref().map(|d| d.coord_bounds);

        let mut tracker = Self {
            connection,
            data_rx,
            aggregator: StreamAggregator::new(bounds),
            translator: EventTranslator::new(),
            buffer,
            config,
            markers,
            recording: false,
            procedure_signals: Vec::new(),
            epoch: Instant::now(),
            closed: false,
            _instance: instance,
        };
        if !tracker.set_connection_state(true) {
            warn!("MindLink not connected after construction");
        }
        tracker
    }

    /// Active configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Current marker sheet.
    pub fn marker_sheet(&self) -> &MarkerSheet {
        &self.markers
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.connection_state()
    }

    /// Current camera state.
    pub fn camera_state(&self) -> CameraState {
        self.connection.camera_state()
    }

    /// Current screen tracking state.
    pub fn screen_tracking_state(&self) -> ScreenTrackingState {
        self.connection.screen_tracking_state()
    }

    /// Latest tracker timestamp seen on any stream, seconds. Zero before the
    /// first packet.
    pub fn tracker_time(&self) -> f64 {
        self.aggregator.latest_timestamp().unwrap_or(0.0)
    }

    /// Same as [`tracker_time`](Self::tracker_time); the device clock already
    /// counts seconds.
    pub fn tracker_sec(&self) -> f64 {
        self.tracker_time()
    }

    /// Connect or disconnect. Returns whether the device is connected.
    pub fn set_connection_state(&mut self, enable: bool) -> bool {
        if !enable && self.recording {
            self.set_recording_state(false);
        }
        self.connection.set_connection_state(enable)
    }

    /// Whether the device is connected.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Device commands are not supported by MindLink.
    pub fn send_command(&mut self, key: &str, value: Option<&str>) -> TrackerStatus {
        debug!("Ignoring command {key}={value:?}");
        TrackerStatus::FunctionalityNotSupported
    }

    /// Device messages are not supported by MindLink.
    pub fn send_message(&mut self, message: &str, time_offset: Option<f64>) -> TrackerStatus {
        debug!("Ignoring message {message:?} (offset {time_offset:?})");
        TrackerStatus::FunctionalityNotSupported
    }

    /// Run autotune and calibration with the user driving it from `host`.
    ///
    /// Returns `true` only if both procedures succeeded. On success the
    /// camera keeps running for screen tracking when it is enabled.
    pub fn run_setup_procedure(&mut self, host: &mut dyn CalibrationHost) -> bool {
        if !self.connection.is_connected() {
            warn!("Cannot calibrate: MindLink not connected");
            return false;
        }

        self.connection
            .set_camera_sampling_duration(self.config.runtime_settings.calibration_sampling_duration);
        if !self.connection.start_camera() {
            error!("Cannot calibrate: front camera did not start");
            return false;
        }

        // Leftovers from an earlier procedure must not end this one.
        self.poll();
        self.connection.take_procedure_acks();
        self.procedure_signals.clear();

        let mut runner = CalibrationRunner::new(
            host,
            &self.config.calibration,
            self.config.display.as_ref(),
            self.config.timing.heartbeat(),
            self.config.timing.cancel_timeout(),
        );
        let outcome = runner.run(self);

        match outcome {
            CalibrationOutcome::Succeeded => info!("Eye tracker calibration successful"),
            CalibrationOutcome::Cancelled => info!("Calibration cancelled by user"),
            CalibrationOutcome::TimedOut => warn!("Calibration aborted: device did not answer cancel"),
            CalibrationOutcome::Failed => error!("Eye tracker calibration not successful"),
        }

        if outcome.is_success() && self.config.runtime_settings.enable_screen_tracking {
            if !self.activate_screen_tracking() {
                warn!("Screen tracking unavailable after calibration");
            }
        } else {
            self.connection.stop_camera();
        }
        outcome.is_success()
    }

    /// Start or stop forwarding samples and blinks to the event buffer.
    /// Returns the recording state afterwards.
    ///
    /// Starting resets the sample caches and, when screen tracking is
    /// enabled, starts the camera and screen tracking first. Stopping also
    /// stops the camera and forgets the latest sample.
    pub fn set_recording_state(&mut self, recording: bool) -> bool {
        if recording {
            if !self.connection.is_connected() {
                warn!("Cannot record: MindLink not connected");
                return self.stop_recording();
            }
            // Process what is queued so stale values do not survive the reset.
            self.poll();
            self.aggregator.reset();
            self.translator.clear_latest();

            if self.config.runtime_settings.enable_screen_tracking
                && !self.activate_screen_tracking()
            {
                warn!("Recording without screen tracking; gaze positions stay at the origin");
            }
            self.recording = true;
            info!("Recording started");
            return true;
        }
        self.stop_recording()
    }

    fn stop_recording(&mut self) -> bool {
        self.connection.stop_screen_tracking();
        self.connection.stop_camera();
        self.translator.clear_latest();
        if self.recording {
            info!("Recording stopped");
        }
        self.recording = false;
        false
    }

    /// Whether samples are forwarded to the event buffer.
    pub fn is_recording_enabled(&self) -> bool {
        self.recording
    }

    /// Most recent binocular sample recorded.
    pub fn get_last_sample(&self) -> Option<&BinocularEyeSample> {
        self.translator.latest_sample()
    }

    /// Most recent gaze position in display units.
    pub fn get_last_gaze_position(&self) -> Option<(f64, f64)> {
        self.translator.latest_gaze_position()
    }

    /// Alias of [`get_last_gaze_position`](Self::get_last_gaze_position).
    pub fn get_position(&self) -> Option<(f64, f64)> {
        self.get_last_gaze_position()
    }

    /// Reload the configured marker sheet and compute marker image sizes for
    /// a window `win_width_px` pixels wide.
    ///
    /// Returns `None`, leaving screen tracking unavailable, when no markers
    /// are defined or the display size is unknown.
    pub fn generate_markers(&mut self, win_width_px: u32) -> Option<Vec<MarkerPlacement>> {
        self.markers =
            MarkerSheet::load_or_empty(self.config.runtime_settings.aruco_info_file.as_deref());
        if self.markers.is_empty() {
            return None;
        }
        let Some(display) = self.config.display.as_ref() else {
            warn!("Display size unknown, cannot size screen markers");
            return None;
        };
        Some(self.markers.placements(win_width_px, display.physical_width_mm))
    }

    /// Replace the marker sheet with the one at `path`. Returns the number
    /// of markers loaded.
    ///
    /// # Errors
    /// Returns `TrackerError::MarkerSheet` if the file cannot be read; the
    /// current sheet is kept.
    pub fn load_marker_sheet(&mut self, path: &Path) -> Result<usize, TrackerError> {
        self.markers = MarkerSheet::load(path)?;
        info!("Loaded {} markers from {}", self.markers.len(), path.display());
        Ok(self.markers.len())
    }

    /// Apply pending acks and process queued packets. Returns the number of
    /// records published to the event buffer.
    pub fn poll(&mut self) -> usize {
        self.connection.pump_acks();
        let mut published = 0;
        while let Ok(packet) = self.data_rx.try_recv() {
            if self.process_packet(&packet) {
                published += 1;
            }
        }
        published
    }

    fn process_packet(&mut self, packet: &StreamPacket) -> bool {
        let Some(event) = self.aggregator.ingest(packet) else {
            return false;
        };
        match event {
            NativeEvent::ProcedureStarted => {
                debug!("Device procedure started");
                false
            }
            NativeEvent::ProcedureEnded(code) => {
                self.procedure_signals.push(ProcedureSignal::Ended(code));
                false
            }
            NativeEvent::Sample(_) | NativeEvent::BlinkEnd { .. } => {
                if !self.recording {
                    return false;
                }
                let logged_time = self.epoch.elapsed().as_secs_f64();
                match self.translator.translate(&event, logged_time) {
                    Some(record) => {
                        self.buffer.add_event(record);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Register the marker board and start screen tracking.
    fn activate_screen_tracking(&mut self) -> bool {
        if self.connection.screen_tracking_state() == ScreenTrackingState::Active {
            return true;
        }
        let Some(screen_size) = self.config.display.as_ref().map(|d| d.physical_size_m()) else {
            warn!("Display size unknown, screen tracking stays inactive");
            return false;
        };
        if !self.connection.start_camera() {
            return false;
        }
        self.connection.register_screen_board(&self.markers, screen_size)
            && self.connection.start_screen_tracking()
    }

    /// Stop recording and disconnect. Called automatically on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.set_recording_state(false);
        self.connection.set_connection_state(false);
        self.closed = true;
        info!("MindLink eye tracker closed");
    }
}

/// Resolve a path relative to a base directory.
fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl CalibrationDevice for EyeTracker {
    fn enable_procedure_events(&mut self) {
        self.connection.enable_procedure_events();
    }

    fn start_autotune(&mut self) {
        self.connection.start_autotune();
    }

    fn start_calibration(&mut self, n_points: u32, randomize: bool) {
        self.connection.start_calibration(n_points, randomize);
    }

    fn poll_procedure(&mut self) -> Vec<ProcedureSignal> {
        self.poll();
        let mut signals: Vec<ProcedureSignal> = self
            .connection
            .take_procedure_acks()
            .into_iter()
            .map(|ack| ProcedureSignal::RequestAck(ack.code))
            .collect();
        signals.append(&mut self.procedure_signals);
        signals
    }

    fn clear_events(&mut self) {
        self.buffer.clear();
    }
}

impl Drop for EyeTracker {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::simulation::{SimulatedMindLink, SimulationBehavior, SimulationHandle};
    use crossbeam_channel::Sender;
    use mindlink_common::tracker::host::{Key, Prompt, SharedEventBuffer};
    use mindlink_common::tracker::types::AckCode;

    fn tracker(behavior: SimulationBehavior) -> (EyeTracker, SimulationHandle, SharedEventBuffer) {
        let mut config = TrackerConfig::default();
        config.timing.connect_timeout_ms = 30;
        let client = SimulatedMindLink::new(behavior);
        let handle = client.handle();
        let buffer = SharedEventBuffer::default();
        let tracker = EyeTracker::with_client(
            config,
            Box::new(client),
            &InstanceRegistry::new(),
            Box::new(buffer.clone()),
        )
        .expect("tracker");
        (tracker, handle, buffer)
    }

    fn gaze(handle: &SimulationHandle, timestamp: f64) {
        handle.emit(StreamPacket::ExtendedGaze {
            timestamp,
            x: 0.0,
            y: 0.0,
            z: -0.6,
            vergence: 0.1,
        });
    }

    #[test]
    fn connects_on_construction() {
        let (tracker, handle, _) = tracker(SimulationBehavior::default());
        assert!(tracker.is_connected());
        assert_eq!(handle.request_count("start"), 1);
    }

    #[test]
    fn construction_survives_unreachable_device() {
        let (tracker, _, _) = tracker(SimulationBehavior {
            connect: AckCode::CommunicationError,
            ..SimulationBehavior::default()
        });
        assert!(!tracker.is_connected());
    }

    #[test]
    fn tracker_time_follows_latest_packet() {
        let (mut tracker, handle, _) = tracker(SimulationBehavior::default());
        assert_eq!(tracker.tracker_time(), 0.0);
        gaze(&handle, 12.5);
        tracker.poll();
        assert_eq!(tracker.tracker_time(), 12.5);
        assert_eq!(tracker.tracker_sec(), 12.5);
    }

    #[test]
    fn commands_not_supported() {
        let (mut tracker, _, _) = tracker(SimulationBehavior::default());
        assert_eq!(
            tracker.send_command("rate", Some("250")),
            TrackerStatus::FunctionalityNotSupported
        );
        assert_eq!(
            tracker.send_message("trial 1", None),
            TrackerStatus::FunctionalityNotSupported
        );
    }

    #[test]
    fn samples_only_forwarded_while_recording() {
        let (mut tracker, handle, buffer) = tracker(SimulationBehavior::default());
        gaze(&handle, 1.0);
        assert_eq!(tracker.poll(), 0);
        assert!(buffer.is_empty());
        assert!(tracker.get_last_sample().is_none());

        assert!(tracker.set_recording_state(true));
        gaze(&handle, 2.0);
        assert_eq!(tracker.poll(), 1);
        assert_eq!(buffer.len(), 1);
        assert_eq!(tracker.get_last_sample().map(|s| s.device_time), Some(2.0));

        assert!(!tracker.set_recording_state(false));
        assert!(tracker.get_last_sample().is_none());
        assert!(tracker.get_position().is_none());
        gaze(&handle, 3.0);
        assert_eq!(tracker.poll(), 0);
    }

    #[test]
    fn recording_requires_connection() {
        let (mut tracker, _, _) = tracker(SimulationBehavior {
            connect: AckCode::CommunicationError,
            ..SimulationBehavior::default()
        });
        assert!(!tracker.set_recording_state(true));
        assert!(!tracker.is_recording_enabled());
    }

    #[test]
    fn setup_requires_connection() {
        struct NoHost;
        impl CalibrationHost for NoHost {
            fn register_key_listener(&mut self, _keys: Sender<Key>) -> bool {
                false
            }
            fn unregister_key_listener(&mut self) {}
            fn show_prompt(&mut self, _prompt: &Prompt) {}
            fn hide_prompt(&mut self) {}
            fn clear_event_buffers(&mut self) {}
            fn pump(&mut self) {}
        }

        let (mut tracker, handle, _) = tracker(SimulationBehavior {
            connect: AckCode::CommunicationError,
            ..SimulationBehavior::default()
        });
        assert!(!tracker.run_setup_procedure(&mut NoHost));
        assert_eq!(handle.request_count("start_camera_capture"), 0);
    }

    #[test]
    fn close_disconnects_once() {
        let (mut tracker, handle, _) = tracker(SimulationBehavior::default());
        tracker.close();
        tracker.close();
        assert!(!tracker.is_connected());
        assert_eq!(handle.request_count("shutdown"), 1);
        drop(tracker);
        assert_eq!(handle.request_count("shutdown"), 1);
    }
}
