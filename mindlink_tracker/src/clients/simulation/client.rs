//! Simulated client implementation.
//!
//! The `SimulatedMindLink` implements the `FrontendApi` trait. Request acks
//! are delivered synchronously on the caller's thread; procedure-ended events
//! and streamed samples may arrive from background threads, like the real
//! client.

use super::synthetic::SyntheticGaze;
use mindlink_common::tracker::client::{AckCallback, FrontendApi, StreamHandler};
use mindlink_common::tracker::types::{
    AckCode, CameraResolution, CameraUserSetting, DeviceEvent, EventControl, MarkerSequenceMode,
    PacketKind, ScreenBoard, StreamPacket,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How the simulated headset answers requests.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationBehavior {
    /// Connect result.
    pub connect: AckCode,
    /// Camera start result.
    pub camera: AckCode,
    /// Screen board registration result.
    pub screen_board: AckCode,
    /// Screen tracking start result.
    pub screen_tracking: AckCode,
    /// Ack of the autotune request.
    pub autotune_request: AckCode,
    /// Result reported by the autotune procedure-ended event.
    pub autotune_result: AckCode,
    /// Ack of the calibration request.
    pub calibration_request: AckCode,
    /// Result reported by the calibration procedure-ended event.
    pub calibration_result: AckCode,
    /// Delay before a procedure ends. Zero ends it synchronously.
    pub procedure_duration: Duration,
    /// Never answer anything.
    pub unresponsive: bool,
    /// Stream synthetic samples once connected.
    pub stream: bool,
    /// Interval between synthetic blinks.
    pub blink_interval: Duration,
}

impl Default for SimulationBehavior {
    fn default() -> Self {
        Self {
            connect: AckCode::Success,
            camera: AckCode::Success,
            screen_board: AckCode::Success,
            screen_tracking: AckCode::Success,
            autotune_request: AckCode::Success,
            autotune_result: AckCode::Success,
            calibration_request: AckCode::Success,
            calibration_result: AckCode::Success,
            procedure_duration: Duration::ZERO,
            unresponsive: false,
            stream: false,
            blink_interval: Duration::from_secs(3),
        }
    }
}

impl SimulationBehavior {
    /// Successful headset streaming synthetic data, with procedures taking
    /// a couple of seconds.
    pub fn streaming() -> Self {
        Self {
            stream: true,
            procedure_duration: Duration::from_secs(2),
            ..Self::default()
        }
    }
}

/// Mutable headset state shared with the handle and background threads.
#[derive(Default)]
struct SimState {
    handlers: HashMap<PacketKind, StreamHandler>,
    handler_registrations: usize,
    requests: Vec<&'static str>,
    connected: bool,
    camera_running: bool,
    screen_tracking: bool,
    stream_rates: HashMap<PacketKind, f64>,
    events: EventControl,
    board: Option<ScreenBoard>,
    behavior: SimulationBehavior,
}

impl SimState {
    fn emit(&mut self, packet: StreamPacket) {
        if let Some(handler) = self.handlers.get_mut(&packet.kind()) {
            handler(packet);
        }
    }

    fn emit_procedure(&mut self, event: DeviceEvent) {
        if self.connected && self.events.contains(EventControl::PROCEDURE_START_END) {
            self.emit(StreamPacket::Event(event));
        }
    }
}

/// Simulated MindLink headset.
pub struct SimulatedMindLink {
    state: Arc<Mutex<SimState>>,
    running: Arc<AtomicBool>,
    streamer: Option<JoinHandle<()>>,
    epoch: Instant,
}

/// Test-side view of a [`SimulatedMindLink`].
#[derive(Clone)]
pub struct SimulationHandle {
    state: Arc<Mutex<SimState>>,
    epoch: Instant,
}

impl SimulatedMindLink {
    /// Create a headset answering according to `behavior`.
    pub fn new(behavior: SimulationBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                behavior,
                ..SimState::default()
            })),
            running: Arc::new(AtomicBool::new(false)),
            streamer: None,
            epoch: Instant::now(),
        }
    }

    /// Handle for injecting packets and inspecting requests.
    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            state: Arc::clone(&self.state),
            epoch: self.epoch,
        }
    }

    /// Record `request` and answer with the code picked by `pick`, unless the
    /// headset is unresponsive.
    fn answer(
        &self,
        request: &'static str,
        on_ack: AckCallback,
        pick: impl FnOnce(&SimulationBehavior) -> AckCode,
    ) -> Option<AckCode> {
        let code = {
            let mut state = self.state.lock();
            state.requests.push(request);
            if state.behavior.unresponsive {
                debug!("Simulated headset ignoring {request}");
                return None;
            }
            pick(&state.behavior)
        };
        on_ack(code);
        Some(code)
    }

    fn launch_procedure(&self, result: AckCode) {
        let duration = {
            let mut state = self.state.lock();
            let timestamp = self.epoch.elapsed().as_secs_f64();
            state.emit_procedure(DeviceEvent::ProcedureStarted { timestamp });
            state.behavior.procedure_duration
        };

        if duration.is_zero() {
            let timestamp = self.epoch.elapsed().as_secs_f64();
            self.state
                .lock()
                .emit_procedure(DeviceEvent::ProcedureEnded { timestamp, result });
            return;
        }

        let state = Arc::clone(&self.state);
        let epoch = self.epoch;
        std::thread::spawn(move || {
            std::thread::sleep(duration);
            let timestamp = epoch.elapsed().as_secs_f64();
            state
                .lock()
                .emit_procedure(DeviceEvent::ProcedureEnded { timestamp, result });
        });
    }

    fn start_streamer(&mut self) {
        if self.streamer.is_some() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let epoch = self.epoch;

        self.streamer = Some(std::thread::spawn(move || {
            let synth = SyntheticGaze::default();
            let mut last_blink = Instant::now();
            while running.load(Ordering::SeqCst) {
                let period = {
                    let mut state = state.lock();
                    let rate = state
                        .stream_rates
                        .get(&PacketKind::ExtendedGaze)
                        .copied()
                        .unwrap_or(0.0);
                    if rate > 0.0 {
                        let t = epoch.elapsed().as_secs_f64();
                        for packet in synth.packets(t) {
                            let kind = packet.kind();
                            if kind == PacketKind::GazeInScreen && !state.screen_tracking {
                                continue;
                            }
                            if state.stream_rates.get(&kind).is_some_and(|r| *r > 0.0) {
                                state.emit(packet);
                            }
                        }
                        if state.events.contains(EventControl::BLINK)
                            && last_blink.elapsed() >= state.behavior.blink_interval
                        {
                            last_blink = Instant::now();
                            state.emit(StreamPacket::Event(DeviceEvent::Blink {
                                timestamp: t,
                                duration: 0.15,
                            }));
                        }
                        Duration::from_secs_f64(1.0 / rate)
                    } else {
                        Duration::from_millis(10)
                    }
                };
                std::thread::sleep(period);
            }
        }));
        debug!("Simulated stream started");
    }

    fn stop_streamer(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.streamer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimulatedMindLink {
    fn drop(&mut self) {
        self.stop_streamer();
    }
}

impl FrontendApi for SimulatedMindLink {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn register_stream_handler(&mut self, kind: PacketKind, handler: StreamHandler) {
        let mut state = self.state.lock();
        state.handlers.insert(kind, handler);
        state.handler_registrations += 1;
    }

    fn start(&mut self, on_connect: AckCallback) {
        let stream = {
            let mut state = self.state.lock();
            state.requests.push("start");
            if state.behavior.unresponsive {
                return;
            }
            state.connected = state.behavior.connect.is_success();
            state.connected && state.behavior.stream
        };
        info!("Simulated headset connecting");
        let code = self.state.lock().behavior.connect;
        on_connect(code);
        if stream {
            self.start_streamer();
        }
    }

    fn shutdown(&mut self) {
        self.stop_streamer();
        let mut state = self.state.lock();
        state.requests.push("shutdown");
        state.connected = false;
        state.camera_running = false;
        state.screen_tracking = false;
        state.stream_rates.clear();
        state.events = EventControl::empty();
        state.handlers.clear();
    }

    fn set_stream_control(&mut self, kind: PacketKind, rate_hz: f64, on_ack: AckCallback) {
        if self
            .answer("set_stream_control", on_ack, |_| AckCode::Success)
            .is_some()
        {
            self.state.lock().stream_rates.insert(kind, rate_hz);
        }
    }

    fn set_event_control(&mut self, events: EventControl, enable: bool, on_ack: AckCallback) {
        if self
            .answer("set_event_control", on_ack, |_| AckCode::Success)
            .is_some()
        {
            let mut state = self.state.lock();
            state.events.set(events, enable);
        }
    }

    fn set_camera_user_settings(
        &mut self,
        _setting: CameraUserSetting,
        _value: u32,
        on_ack: AckCallback,
    ) {
        self.answer("set_camera_user_settings", on_ack, |_| AckCode::Success);
    }

    fn start_camera_capture(
        &mut self,
        _camera_index: u32,
        _resolution: CameraResolution,
        _correct_distortion: bool,
        on_ack: AckCallback,
    ) {
        if let Some(code) = self.answer("start_camera_capture", on_ack, |b| b.camera) {
            self.state.lock().camera_running = code.is_success();
        }
    }

    fn stop_camera_capture(&mut self, on_ack: AckCallback) {
        if self
            .answer("stop_camera_capture", on_ack, |_| AckCode::Success)
            .is_some()
        {
            let mut state = self.state.lock();
            state.camera_running = false;
            state.screen_tracking = false;
        }
    }

    fn start_screen_tracking(&mut self, on_ack: AckCallback) {
        if let Some(code) = self.answer("start_screen_tracking", on_ack, |b| b.screen_tracking) {
            let mut state = self.state.lock();
            state.screen_tracking = code.is_success() && state.camera_running;
        }
    }

    fn stop_screen_tracking(&mut self, on_ack: AckCallback) {
        if self
            .answer("stop_screen_tracking", on_ack, |_| AckCode::Success)
            .is_some()
        {
            self.state.lock().screen_tracking = false;
        }
    }

    fn register_screen_board(&mut self, board: &ScreenBoard, on_ack: AckCallback) {
        self.state.lock().board = Some(board.clone());
        self.answer("register_screen_board", on_ack, |b| b.screen_board);
    }

    fn autotune_gui(&mut self, _mode: MarkerSequenceMode, _marker_size_mm: f64, on_ack: AckCallback) {
        let Some(code) = self.answer("autotune_gui", on_ack, |b| b.autotune_request) else {
            return;
        };
        if code.is_success() {
            let result = self.state.lock().behavior.autotune_result;
            self.launch_procedure(result);
        }
    }

    fn start_calibration_gui(
        &mut self,
        _mode: MarkerSequenceMode,
        _n_points: u32,
        _marker_size_mm: f64,
        _randomize: bool,
        on_ack: AckCallback,
    ) {
        let Some(code) = self.answer("start_calibration_gui", on_ack, |b| b.calibration_request)
        else {
            return;
        };
        if code.is_success() {
            let result = self.state.lock().behavior.calibration_result;
            self.launch_procedure(result);
        }
    }
}

impl SimulationHandle {
    /// Deliver `packet` to the handler registered for its channel.
    pub fn emit(&self, packet: StreamPacket) {
        self.state.lock().emit(packet);
    }

    /// Seconds since the headset was created, the simulated tracker clock.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Replace the answering behavior.
    pub fn set_behavior(&self, behavior: SimulationBehavior) {
        self.state.lock().behavior = behavior;
    }

    /// Number of times `request` was issued.
    pub fn request_count(&self, request: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| **r == request)
            .count()
    }

    /// Every request issued so far, in order.
    pub fn requests(&self) -> Vec<&'static str> {
        self.state.lock().requests.clone()
    }

    /// Number of stream handler registrations.
    pub fn handler_registrations(&self) -> usize {
        self.state.lock().handler_registrations
    }

    /// Currently enabled events.
    pub fn events_enabled(&self) -> EventControl {
        self.state.lock().events
    }

    /// Rate of an enabled stream.
    pub fn stream_rate(&self, kind: PacketKind) -> Option<f64> {
        self.state
            .lock()
            .stream_rates
            .get(&kind)
            .copied()
            .filter(|r| *r > 0.0)
    }

    /// Last registered screen board.
    pub fn last_board(&self) -> Option<ScreenBoard> {
        self.state.lock().board.clone()
    }

    /// Whether the headset is connected.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Whether the front camera runs.
    pub fn is_camera_running(&self) -> bool {
        self.state.lock().camera_running
    }

    /// Whether screen tracking runs.
    pub fn is_screen_tracking(&self) -> bool {
        self.state.lock().screen_tracking
    }
}
