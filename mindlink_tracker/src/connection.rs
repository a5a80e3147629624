//! Connection, front camera and screen tracking lifecycle.
//!
//! The `ConnectionManager` owns the vendor client. Client callbacks never
//! touch manager state: each request carries an [`AckCallback`] that only
//! sends an [`Ack`] on the control channel. State changes happen when the
//! owning thread drains that channel, either in [`ConnectionManager::pump_acks`]
//! or inside a bounded wait.
//!
//! # State Diagram
//!
//! ```text
//! Disconnected ──start()──► Connecting ──ack ok──► Connected
//!      ▲                        │                      │
//!      └──────── ack failure ───┘                      │
//!      └───────────────────── shutdown() ──────────────┘
//! ```

use crate::markers::MarkerSheet;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use mindlink_common::tracker::client::{AckCallback, FrontendApi};
use mindlink_common::tracker::config::TrackerConfig;
use mindlink_common::tracker::types::{
    AckCode, CameraResolution, CameraUserSetting, EventControl, MarkerSequenceMode, PacketKind,
    StreamPacket,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Marker size used by GUI procedures, millimeters.
pub const PROCEDURE_MARKER_SIZE_MM: f64 = 35.0;

/// Front camera index.
const CAMERA_INDEX: u32 = 0;

/// Device connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connect requested, ack pending.
    Connecting,
    /// Connected and streaming.
    Connected,
}

/// Front camera state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraState {
    /// Camera off.
    #[default]
    Stopped,
    /// Start requested, ack pending.
    Starting,
    /// Camera running.
    Started,
}

/// Screen tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenTrackingState {
    /// Not tracking.
    #[default]
    Inactive,
    /// Board registration or tracking start pending.
    Registering,
    /// Tracking the screen.
    Active,
}

/// Request an ack belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// `start`
    Connect,
    /// `set_stream_control`
    StreamControl(PacketKind),
    /// `set_event_control`
    EventControl,
    /// `set_camera_user_settings`
    CameraSetting,
    /// `start_camera_capture`
    StartCamera,
    /// `stop_camera_capture`
    StopCamera,
    /// `register_screen_board`
    RegisterBoard,
    /// `start_screen_tracking`
    StartScreenTracking,
    /// `stop_screen_tracking`
    StopScreenTracking,
    /// `autotune_gui`
    Autotune,
    /// `start_calibration_gui`
    Calibration,
}

/// Acknowledgement delivered on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Originating request.
    pub request: Request,
    /// Device result.
    pub code: AckCode,
}

/// Owner of the vendor client and of the connection, camera and screen
/// tracking state flags.
pub struct ConnectionManager {
    client: Box<dyn FrontendApi>,
    ack_tx: Sender<Ack>,
    ack_rx: Receiver<Ack>,
    data_tx: Sender<StreamPacket>,
    connection: ConnectionState,
    camera: CameraState,
    screen: ScreenTrackingState,
    board_registered: bool,
    procedure_acks: VecDeque<Ack>,
    sampling_rate: f64,
    screen_tracking_enabled: bool,
    connect_timeout: Duration,
    poll_interval: Duration,
}

impl ConnectionManager {
    /// Create a manager around `client`. Stream packets are forwarded to
    /// `data_tx` once connected.
    pub fn new(
        client: Box<dyn FrontendApi>,
        config: &TrackerConfig,
        data_tx: Sender<StreamPacket>,
    ) -> Self {
        let (ack_tx, ack_rx) = crossbeam_channel::unbounded();
        Self {
            client,
            ack_tx,
            ack_rx,
            data_tx,
            connection: ConnectionState::Disconnected,
            camera: CameraState::Stopped,
            screen: ScreenTrackingState::Inactive,
            board_registered: false,
            procedure_acks: VecDeque::new(),
            sampling_rate: config.runtime_settings.sampling_rate,
            screen_tracking_enabled: config.runtime_settings.enable_screen_tracking,
            connect_timeout: config.timing.connect_timeout(),
            poll_interval: config.timing.poll_interval(),
        }
    }

    /// Name of the wrapped client.
    pub fn client_name(&self) -> &'static str {
        self.client.name()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    /// Current camera state.
    pub fn camera_state(&self) -> CameraState {
        self.camera
    }

    /// Current screen tracking state.
    pub fn screen_tracking_state(&self) -> ScreenTrackingState {
        self.screen
    }

    /// Whether the device is connected.
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Whether a screen board is registered with the device.
    pub fn is_board_registered(&self) -> bool {
        self.board_registered
    }

    /// Connect (`true`) or disconnect (`false`). Returns whether the device
    /// is connected afterwards.
    pub fn set_connection_state(&mut self, enable: bool) -> bool {
        if enable {
            self.connect()
        } else {
            self.disconnect();
            false
        }
    }

    fn connect(&mut self) -> bool {
        match self.connection {
            ConnectionState::Connected => return true,
            ConnectionState::Connecting => {
                debug!("Connect already pending, waiting for ack");
            }
            ConnectionState::Disconnected => {
                self.register_stream_handlers();
                self.connection = ConnectionState::Connecting;
                info!("Connecting to MindLink via '{}' client", self.client.name());
                let cb = self.callback(Request::Connect);
                self.client.start(cb);
            }
        }

        let connected = self.wait_until(self.connect_timeout, |m| {
            m.connection != ConnectionState::Connecting
        });
        if !connected {
            warn!(
                "No connect ack within {} ms, leaving connection pending",
                self.connect_timeout.as_millis()
            );
        }
        self.is_connected()
    }

    fn disconnect(&mut self) {
        if self.connection == ConnectionState::Disconnected {
            return;
        }
        self.stop_screen_tracking();
        self.stop_camera();
        self.client.shutdown();
        self.connection = ConnectionState::Disconnected;
        self.board_registered = false;
        self.procedure_acks.clear();
        info!("Disconnected from MindLink");
    }

    fn register_stream_handlers(&mut self) {
        let kinds = PacketKind::SAMPLE_STREAMS
            .into_iter()
            .chain(std::iter::once(PacketKind::Events));
        for kind in kinds {
            let tx = self.data_tx.clone();
            self.client.register_stream_handler(
                kind,
                Box::new(move |packet| {
                    let _ = tx.send(packet);
                }),
            );
        }
    }

    /// Enable the sample streams and blink events after a successful connect.
    fn configure_streams(&mut self) {
        for kind in PacketKind::SAMPLE_STREAMS {
            if kind == PacketKind::GazeInScreen && !self.screen_tracking_enabled {
                continue;
            }
            let cb = self.callback(Request::StreamControl(kind));
            self.client.set_stream_control(kind, self.sampling_rate, cb);
        }
        let cb = self.callback(Request::EventControl);
        self.client.set_event_control(EventControl::BLINK, true, cb);
    }

    /// Start the front camera. Returns whether it runs afterwards.
    pub fn start_camera(&mut self) -> bool {
        if !self.is_connected() {
            warn!("Cannot start camera: not connected");
            return false;
        }
        match self.camera {
            CameraState::Started => return true,
            CameraState::Starting => debug!("Camera start already pending"),
            CameraState::Stopped => {
                self.camera = CameraState::Starting;
                let cb = self.callback(Request::StartCamera);
                self.client
                    .start_camera_capture(CAMERA_INDEX, CameraResolution::Medium, false, cb);
            }
        }

        let answered = self.wait_until(self.connect_timeout, |m| m.camera != CameraState::Starting);
        if !answered {
            warn!(
                "Camera did not start within {} ms",
                self.connect_timeout.as_millis()
            );
        }
        self.camera == CameraState::Started
    }

    /// Stop the front camera without waiting for the ack.
    pub fn stop_camera(&mut self) {
        if self.camera == CameraState::Stopped {
            return;
        }
        let cb = self.callback(Request::StopCamera);
        self.client.stop_camera_capture(cb);
        self.camera = CameraState::Stopped;
        // Tracking depends on the camera.
        self.screen = ScreenTrackingState::Inactive;
        debug!("Camera stopped");
    }

    /// Register the marker board built from `sheet` for a screen of
    /// `screen_size_m` meters. An empty sheet is logged and rejected.
    pub fn register_screen_board(&mut self, sheet: &MarkerSheet, screen_size_m: (f64, f64)) -> bool {
        if sheet.is_empty() {
            warn!("No screen markers defined, screen tracking stays inactive");
            return false;
        }
        if !self.is_connected() {
            warn!("Cannot register screen board: not connected");
            return false;
        }

        let board = sheet.screen_board(screen_size_m);
        self.screen = ScreenTrackingState::Registering;
        self.board_registered = false;
        let cb = self.callback(Request::RegisterBoard);
        self.client.register_screen_board(&board, cb);

        self.wait_until(self.connect_timeout, |m| {
            m.screen != ScreenTrackingState::Registering
        });
        if self.screen == ScreenTrackingState::Registering {
            warn!("Screen board registration not acknowledged");
            self.screen = ScreenTrackingState::Inactive;
        }
        if self.board_registered {
            info!("Registered screen board with {} markers", board.markers.len());
        }
        self.board_registered
    }

    /// Start screen tracking, starting the camera if needed.
    pub fn start_screen_tracking(&mut self) -> bool {
        if self.screen == ScreenTrackingState::Active {
            return true;
        }
        if !self.start_camera() {
            return false;
        }
        if !self.board_registered {
            warn!("Cannot start screen tracking: no screen board registered");
            return false;
        }

        self.screen = ScreenTrackingState::Registering;
        let cb = self.callback(Request::StartScreenTracking);
        self.client.start_screen_tracking(cb);

        self.wait_until(self.connect_timeout, |m| {
            m.screen != ScreenTrackingState::Registering
        });
        if self.screen == ScreenTrackingState::Registering {
            warn!("Screen tracking start not acknowledged");
            self.screen = ScreenTrackingState::Inactive;
        }
        self.screen == ScreenTrackingState::Active
    }

    /// Stop screen tracking without waiting for the ack.
    pub fn stop_screen_tracking(&mut self) {
        if self.screen == ScreenTrackingState::Inactive {
            return;
        }
        let cb = self.callback(Request::StopScreenTracking);
        self.client.stop_screen_tracking(cb);
        self.screen = ScreenTrackingState::Inactive;
    }

    /// Set the marker sampling duration used by GUI procedures.
    pub fn set_camera_sampling_duration(&mut self, duration_ms: u32) {
        let cb = self.callback(Request::CameraSetting);
        self.client
            .set_camera_user_settings(CameraUserSetting::SamplingDuration, duration_ms, cb);
    }

    /// Enable procedure start/end events.
    pub fn enable_procedure_events(&mut self) {
        let cb = self.callback(Request::EventControl);
        self.client
            .set_event_control(EventControl::PROCEDURE_START_END, true, cb);
    }

    /// Launch the autotune GUI.
    pub fn start_autotune(&mut self) {
        let cb = self.callback(Request::Autotune);
        self.client
            .autotune_gui(MarkerSequenceMode::FixedHead, PROCEDURE_MARKER_SIZE_MM, cb);
    }

    /// Launch the calibration GUI with `n_points` targets.
    pub fn start_calibration(&mut self, n_points: u32, randomize: bool) {
        let cb = self.callback(Request::Calibration);
        self.client.start_calibration_gui(
            MarkerSequenceMode::FixedHead,
            n_points,
            PROCEDURE_MARKER_SIZE_MM,
            randomize,
            cb,
        );
    }

    /// Apply every ack waiting on the control channel.
    pub fn pump_acks(&mut self) {
        while let Ok(ack) = self.ack_rx.try_recv() {
            self.apply(ack);
        }
    }

    /// Remove and return acks of GUI procedure requests, oldest first.
    pub fn take_procedure_acks(&mut self) -> Vec<Ack> {
        self.procedure_acks.drain(..).collect()
    }

    /// Build the callback for `request`.
    fn callback(&self, request: Request) -> AckCallback {
        let tx = self.ack_tx.clone();
        Box::new(move |code| {
            let _ = tx.send(Ack { request, code });
        })
    }

    /// Drain acks until `done` holds or `timeout` expires.
    fn wait_until(&mut self, timeout: Duration, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump_acks();
            if done(self) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = self.poll_interval.min(deadline - now);
            match self.ack_rx.recv_timeout(wait) {
                Ok(ack) => self.apply(ack),
                Err(RecvTimeoutError::Timeout) => {}
                // The manager holds a sender, so this cannot happen.
                Err(RecvTimeoutError::Disconnected) => return done(self),
            }
        }
    }

    fn apply(&mut self, ack: Ack) {
        let Ack { request, code } = ack;
        match request {
            Request::Connect => {
                if self.connection != ConnectionState::Connecting {
                    debug!("Ignoring late connect ack ({code})");
                    return;
                }
                if code.is_success() {
                    self.connection = ConnectionState::Connected;
                    info!("Connected to MindLink");
                    self.configure_streams();
                } else {
                    error!("Failed to connect: {code}");
                    self.connection = ConnectionState::Disconnected;
                }
            }
            Request::StartCamera => {
                if self.camera != CameraState::Starting {
                    debug!("Ignoring camera ack ({code}) in state {:?}", self.camera);
                    return;
                }
                if code.is_success() {
                    self.camera = CameraState::Started;
                    info!("Camera started");
                } else {
                    error!("Failed to start camera: {code}");
                    self.camera = CameraState::Stopped;
                }
            }
            Request::RegisterBoard => {
                if code.is_success() {
                    self.board_registered = true;
                } else {
                    error!("Failed to register screen board: {code}");
                    self.board_registered = false;
                }
                if self.screen == ScreenTrackingState::Registering {
                    self.screen = ScreenTrackingState::Inactive;
                }
            }
            Request::StartScreenTracking => {
                if self.screen != ScreenTrackingState::Registering {
                    debug!("Ignoring screen tracking ack ({code})");
                    return;
                }
                if code.is_success() {
                    self.screen = ScreenTrackingState::Active;
                    info!("Screen tracking started");
                } else {
                    error!("Failed to start screen tracking: {code}");
                    self.screen = ScreenTrackingState::Inactive;
                }
            }
            Request::Autotune | Request::Calibration => {
                self.procedure_acks.push_back(ack);
            }
            Request::StreamControl(_)
            | Request::EventControl
            | Request::CameraSetting
            | Request::StopCamera
            | Request::StopScreenTracking => {
                if !code.is_success() {
                    error!("{request:?} request failed: {code}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::simulation::{SimulatedMindLink, SimulationBehavior, SimulationHandle};
    use crate::markers::MarkerDefinition;

    fn manager(behavior: SimulationBehavior) -> (ConnectionManager, SimulationHandle) {
        manager_with(behavior, TrackerConfig::default())
    }

    fn manager_with(
        behavior: SimulationBehavior,
        mut config: TrackerConfig,
    ) -> (ConnectionManager, SimulationHandle) {
        config.timing.connect_timeout_ms = 30;
        let client = SimulatedMindLink::new(behavior);
        let handle = client.handle();
        let (data_tx, _data_rx) = crossbeam_channel::unbounded();
        (
            ConnectionManager::new(Box::new(client), &config, data_tx),
            handle,
        )
    }

    fn sheet() -> MarkerSheet {
        MarkerSheet::from_definitions(vec![MarkerDefinition::new(0, 5.0, 5.0, 4.5)])
    }

    #[test]
    fn connect_is_idempotent() {
        let (mut mgr, handle) = manager(SimulationBehavior::default());
        assert!(mgr.set_connection_state(true));
        assert!(mgr.set_connection_state(true));
        assert_eq!(handle.request_count("start"), 1);
        assert_eq!(handle.handler_registrations(), 5);
        assert!(handle.events_enabled().contains(EventControl::BLINK));
        assert_eq!(handle.stream_rate(PacketKind::ExtendedGaze), Some(125.0));
    }

    #[test]
    fn gaze_in_screen_stream_needs_screen_tracking() {
        let mut config = TrackerConfig::default();
        config.runtime_settings.enable_screen_tracking = false;
        let (mut mgr, handle) = manager_with(SimulationBehavior::default(), config);
        assert!(mgr.set_connection_state(true));
        assert_eq!(handle.stream_rate(PacketKind::GazeInScreen), None);
        assert_eq!(handle.stream_rate(PacketKind::PupilDiameter), Some(125.0));
    }

    #[test]
    fn connect_failure_returns_false() {
        let (mut mgr, _) = manager(SimulationBehavior {
            connect: AckCode::CommunicationError,
            ..SimulationBehavior::default()
        });
        assert!(!mgr.set_connection_state(true));
        assert_eq!(mgr.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn unresponsive_device_stays_pending() {
        let (mut mgr, handle) = manager(SimulationBehavior {
            unresponsive: true,
            ..SimulationBehavior::default()
        });
        assert!(!mgr.set_connection_state(true));
        assert_eq!(mgr.connection_state(), ConnectionState::Connecting);

        // A second attempt waits again without re-issuing start.
        assert!(!mgr.set_connection_state(true));
        assert_eq!(handle.request_count("start"), 1);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut mgr, handle) = manager(SimulationBehavior::default());
        assert!(!mgr.set_connection_state(false));
        assert_eq!(handle.request_count("shutdown"), 0);

        mgr.set_connection_state(true);
        assert!(mgr.start_camera());
        assert!(!mgr.set_connection_state(false));
        assert!(!mgr.set_connection_state(false));
        assert_eq!(handle.request_count("shutdown"), 1);
        assert_eq!(handle.request_count("stop_camera_capture"), 1);
        assert_eq!(mgr.camera_state(), CameraState::Stopped);
    }

    #[test]
    fn camera_requires_connection() {
        let (mut mgr, handle) = manager(SimulationBehavior::default());
        assert!(!mgr.start_camera());
        assert_eq!(handle.request_count("start_camera_capture"), 0);
    }

    #[test]
    fn camera_start_stop_idempotent() {
        let (mut mgr, handle) = manager(SimulationBehavior::default());
        mgr.set_connection_state(true);
        assert!(mgr.start_camera());
        assert!(mgr.start_camera());
        assert_eq!(handle.request_count("start_camera_capture"), 1);

        mgr.stop_camera();
        mgr.stop_camera();
        assert_eq!(handle.request_count("stop_camera_capture"), 1);
    }

    #[test]
    fn camera_failure_leaves_stopped() {
        let (mut mgr, _) = manager(SimulationBehavior {
            camera: AckCode::CameraFault,
            ..SimulationBehavior::default()
        });
        mgr.set_connection_state(true);
        assert!(!mgr.start_camera());
        assert_eq!(mgr.camera_state(), CameraState::Stopped);
    }

    #[test]
    fn empty_sheet_keeps_tracking_inactive() {
        let (mut mgr, handle) = manager(SimulationBehavior::default());
        mgr.set_connection_state(true);
        assert!(!mgr.register_screen_board(&MarkerSheet::default(), (0.5, 0.3)));
        assert!(!mgr.start_screen_tracking());
        assert_eq!(mgr.screen_tracking_state(), ScreenTrackingState::Inactive);
        assert_eq!(handle.request_count("register_screen_board"), 0);
        assert_eq!(handle.request_count("start_screen_tracking"), 0);
    }

    #[test]
    fn screen_tracking_with_board() {
        let (mut mgr, handle) = manager(SimulationBehavior::default());
        mgr.set_connection_state(true);
        assert!(mgr.register_screen_board(&sheet(), (0.5, 0.3)));
        assert!(mgr.start_screen_tracking());
        assert_eq!(mgr.camera_state(), CameraState::Started);
        assert_eq!(mgr.screen_tracking_state(), ScreenTrackingState::Active);

        let board = handle.last_board().unwrap();
        assert_eq!(board.markers.len(), 1);
        assert!((board.width_m - 0.5).abs() < 1e-12);

        mgr.stop_camera();
        assert_eq!(mgr.screen_tracking_state(), ScreenTrackingState::Inactive);
    }

    #[test]
    fn procedure_acks_are_queued() {
        let (mut mgr, _) = manager(SimulationBehavior::default());
        mgr.set_connection_state(true);
        mgr.start_autotune();
        mgr.pump_acks();
        let acks = mgr.take_procedure_acks();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].request, Request::Autotune);
        assert!(acks[0].code.is_success());
        assert!(mgr.take_procedure_acks().is_empty());
    }
}
