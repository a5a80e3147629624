//! Vendor client trait and error types.
//!
//! This module defines:
//! - `FrontendApi` trait - Callback-based interface of a MindLink SDK client
//! - `TrackerError` enum - Error types for adapter construction and loading
//! - `ClientFactory` type alias - Factory function type
//! - `AckCallback` / `StreamHandler` - Callback shapes used by the client

use crate::tracker::types::{
    AckCode, CameraResolution, CameraUserSetting, EventControl, MarkerSequenceMode, PacketKind,
    ScreenBoard, StreamPacket,
};
use thiserror::Error;

/// Error types for adapter construction and resource loading.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// Adapter initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Client not found
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Another adapter instance is alive on the same registry
    #[error("An eye tracker instance already exists")]
    AlreadyInstantiated,

    /// Marker sheet could not be read
    #[error("Marker sheet error: {0}")]
    MarkerSheet(String),
}

impl From<crate::config::ConfigError> for TrackerError {
    fn from(err: crate::config::ConfigError) -> Self {
        TrackerError::ConfigError(err.to_string())
    }
}

/// One-shot acknowledgement callback.
pub type AckCallback = Box<dyn FnOnce(AckCode) + Send>;

/// Stream handler invoked for every packet of a channel.
pub type StreamHandler = Box<dyn FnMut(StreamPacket) + Send>;

/// Factory function type for creating client instances.
pub type ClientFactory = fn() -> Box<dyn FrontendApi>;

/// Trait defining the interface of a MindLink SDK client.
///
/// Every request is asynchronous: the client acknowledges it later by
/// invoking the supplied callback, possibly on another thread. Stream
/// handlers may likewise run on any thread.
///
/// # Lifecycle
///
/// 1. `register_stream_handler()` - Subscribe to channels
/// 2. `start()` - Connect; the callback receives the connect result
/// 3. Requests (stream control, camera, GUI procedures, ...)
/// 4. `shutdown()` - Disconnect and drop subscriptions
pub trait FrontendApi: Send {
    /// Returns the client's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the client's semantic version.
    fn version(&self) -> &'static str;

    /// Subscribe `handler` to the packets of `kind`, replacing any prior one.
    fn register_stream_handler(&mut self, kind: PacketKind, handler: StreamHandler);

    /// Connect to the device.
    fn start(&mut self, on_connect: AckCallback);

    /// Disconnect from the device.
    fn shutdown(&mut self);

    /// Set the rate of a sample stream in Hz. A rate of 0 disables it.
    fn set_stream_control(&mut self, kind: PacketKind, rate_hz: f64, on_ack: AckCallback);

    /// Enable or disable the events in `events`.
    fn set_event_control(&mut self, events: EventControl, enable: bool, on_ack: AckCallback);

    /// Change a camera user setting.
    fn set_camera_user_settings(
        &mut self,
        setting: CameraUserSetting,
        value: u32,
        on_ack: AckCallback,
    );

    /// Start the front camera.
    fn start_camera_capture(
        &mut self,
        camera_index: u32,
        resolution: CameraResolution,
        correct_distortion: bool,
        on_ack: AckCallback,
    );

    /// Stop the front camera.
    fn stop_camera_capture(&mut self, on_ack: AckCallback);

    /// Start screen tracking against the registered board.
    fn start_screen_tracking(&mut self, on_ack: AckCallback);

    /// Stop screen tracking.
    fn stop_screen_tracking(&mut self, on_ack: AckCallback);

    /// Register the marker board used by screen tracking.
    fn register_screen_board(&mut self, board: &ScreenBoard, on_ack: AckCallback);

    /// Launch the autotune GUI procedure. The ack reports whether the
    /// procedure could be started; its result arrives as a procedure-ended
    /// event.
    fn autotune_gui(&mut self, mode: MarkerSequenceMode, marker_size_mm: f64, on_ack: AckCallback);

    /// Launch the calibration GUI procedure.
    fn start_calibration_gui(
        &mut self,
        mode: MarkerSequenceMode,
        n_points: u32,
        marker_size_mm: f64,
        randomize: bool,
        on_ack: AckCallback,
    );
}
