//! Vendor wire types.
//!
//! This module defines the values exchanged with a MindLink client:
//! - `AckCode` - Acknowledgement codes delivered to request callbacks
//! - `PacketKind` / `StreamPacket` - Stream channels and their payloads
//! - `DeviceEvent` - Items of the generic events channel
//! - `EventControl` - Event enable bits
//! - `ScreenBoard` - Marker board registered for screen tracking

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Acknowledgement code reported by the device for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckCode {
    /// Request succeeded.
    Success,
    /// Generic failure.
    Failure,
    /// A request argument was rejected.
    InvalidArgument,
    /// Tracker not ready.
    TrackerNotReady,
    /// No eyes detected.
    EyesNotFound,
    /// Right eye not detected.
    RightEyeNotFound,
    /// Left eye not detected.
    LeftEyeNotFound,
    /// Tracker is not calibrated.
    NotCalibrated,
    /// Request is not supported by this device.
    NotSupported,
    /// A session is already running.
    SessionAlreadyRunning,
    /// No session is running.
    NoCurrentSession,
    /// Device did not answer in time.
    RequestTimeout,
    /// Device sent an unexpected response.
    UnexpectedResponse,
    /// Hardware fault.
    HardwareFault,
    /// Front camera fault.
    CameraFault,
    /// Device busy.
    Busy,
    /// Transport error.
    CommunicationError,
    /// Device needs a factory calibration.
    DeviceCalibrationRequired,
    /// Procedure was interrupted before completion.
    ProcessIncomplete,
    /// Interface inactive.
    InactiveInterface,
    /// Code not known to this adapter.
    Other(u8),
}

impl AckCode {
    /// Whether the code reports success.
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, AckCode::Success)
    }

    /// Raw code value.
    pub const fn code(self) -> u8 {
        match self {
            AckCode::Success => 0,
            AckCode::Failure => 1,
            AckCode::InvalidArgument => 2,
            AckCode::TrackerNotReady => 3,
            AckCode::EyesNotFound => 4,
            AckCode::RightEyeNotFound => 5,
            AckCode::LeftEyeNotFound => 6,
            AckCode::NotCalibrated => 7,
            AckCode::NotSupported => 8,
            AckCode::SessionAlreadyRunning => 9,
            AckCode::NoCurrentSession => 10,
            AckCode::RequestTimeout => 11,
            AckCode::UnexpectedResponse => 12,
            AckCode::HardwareFault => 13,
            AckCode::CameraFault => 14,
            AckCode::Busy => 15,
            AckCode::CommunicationError => 16,
            AckCode::DeviceCalibrationRequired => 17,
            AckCode::ProcessIncomplete => 18,
            AckCode::InactiveInterface => 19,
            AckCode::Other(code) => code,
        }
    }

    /// Human readable message for this code.
    pub const fn message(self) -> &'static str {
        match self {
            AckCode::Success => "Success",
            AckCode::Failure => "Internal failure",
            AckCode::InvalidArgument => "Invalid argument",
            AckCode::TrackerNotReady => "Tracker not ready",
            AckCode::EyesNotFound => "No eyes detected",
            AckCode::RightEyeNotFound => "Right eye not detected",
            AckCode::LeftEyeNotFound => "Left eye not detected",
            AckCode::NotCalibrated => "Tracker not calibrated",
            AckCode::NotSupported => "Not supported",
            AckCode::SessionAlreadyRunning => "Session already running",
            AckCode::NoCurrentSession => "No current session",
            AckCode::RequestTimeout => "Request timed out",
            AckCode::UnexpectedResponse => "Unexpected response",
            AckCode::HardwareFault => "Hardware fault",
            AckCode::CameraFault => "Camera fault",
            AckCode::Busy => "System busy",
            AckCode::CommunicationError => "Communication error",
            AckCode::DeviceCalibrationRequired => "Device calibration required",
            AckCode::ProcessIncomplete => "Process incomplete",
            AckCode::InactiveInterface => "Interface inactive",
            AckCode::Other(_) => "Unknown error",
        }
    }
}

impl From<u8> for AckCode {
    fn from(code: u8) -> Self {
        match code {
            0 => AckCode::Success,
            1 => AckCode::Failure,
            2 => AckCode::InvalidArgument,
            3 => AckCode::TrackerNotReady,
            4 => AckCode::EyesNotFound,
            5 => AckCode::RightEyeNotFound,
            6 => AckCode::LeftEyeNotFound,
            7 => AckCode::NotCalibrated,
            8 => AckCode::NotSupported,
            9 => AckCode::SessionAlreadyRunning,
            10 => AckCode::NoCurrentSession,
            11 => AckCode::RequestTimeout,
            12 => AckCode::UnexpectedResponse,
            13 => AckCode::HardwareFault,
            14 => AckCode::CameraFault,
            15 => AckCode::Busy,
            16 => AckCode::CommunicationError,
            17 => AckCode::DeviceCalibrationRequired,
            18 => AckCode::ProcessIncomplete,
            19 => AckCode::InactiveInterface,
            other => AckCode::Other(other),
        }
    }
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

/// Stream channel identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Combined gaze vector plus vergence. Drives sample emission.
    ExtendedGaze,
    /// Per-eye unit gaze vectors.
    PerEyeGaze,
    /// Normalized position on the tracked screen.
    GazeInScreen,
    /// Pupil diameters.
    PupilDiameter,
    /// Generic events channel (blinks, procedure start/end, ...).
    Events,
}

impl PacketKind {
    /// Channels that carry periodic samples and take a stream rate.
    pub const SAMPLE_STREAMS: [PacketKind; 4] = [
        PacketKind::ExtendedGaze,
        PacketKind::PerEyeGaze,
        PacketKind::GazeInScreen,
        PacketKind::PupilDiameter,
    ];
}

/// Item delivered on the events channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceEvent {
    /// A blink ended.
    Blink {
        /// Device timestamp of the blink, seconds.
        timestamp: f64,
        /// Blink duration, seconds.
        duration: f64,
    },
    /// A GUI procedure (autotune, calibration) started.
    ProcedureStarted {
        /// Device timestamp, seconds.
        timestamp: f64,
    },
    /// A GUI procedure finished with the given result.
    ProcedureEnded {
        /// Device timestamp, seconds.
        timestamp: f64,
        /// Procedure result.
        result: AckCode,
    },
    /// Any other event the adapter does not consume.
    Other {
        /// Vendor event id.
        id: u8,
        /// Device timestamp, seconds.
        timestamp: f64,
    },
}

/// One packet from a stream channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamPacket {
    /// Combined gaze vector and vergence angle.
    ExtendedGaze {
        /// Device timestamp, seconds.
        timestamp: f64,
        /// Gaze vector X, meters.
        x: f64,
        /// Gaze vector Y, meters.
        y: f64,
        /// Gaze vector Z, meters.
        z: f64,
        /// Vergence angle, radians.
        vergence: f64,
    },
    /// Per-eye gaze vectors.
    PerEyeGaze {
        /// Device timestamp, seconds.
        timestamp: f64,
        /// Right eye vector.
        right: [f64; 3],
        /// Left eye vector.
        left: [f64; 3],
    },
    /// Normalized gaze-in-screen position, origin top-left.
    GazeInScreen {
        /// Device timestamp, seconds.
        timestamp: f64,
        /// Normalized X.
        x: f64,
        /// Normalized Y.
        y: f64,
    },
    /// Pupil diameters, millimeters.
    PupilDiameter {
        /// Device timestamp, seconds.
        timestamp: f64,
        /// Right pupil.
        right: f64,
        /// Left pupil.
        left: f64,
    },
    /// Events channel item.
    Event(DeviceEvent),
}

impl StreamPacket {
    /// Channel this packet belongs to.
    pub const fn kind(&self) -> PacketKind {
        match self {
            StreamPacket::ExtendedGaze { .. } => PacketKind::ExtendedGaze,
            StreamPacket::PerEyeGaze { .. } => PacketKind::PerEyeGaze,
            StreamPacket::GazeInScreen { .. } => PacketKind::GazeInScreen,
            StreamPacket::PupilDiameter { .. } => PacketKind::PupilDiameter,
            StreamPacket::Event(_) => PacketKind::Events,
        }
    }
}

bitflags! {
    /// Event enable bits for `set_event_control`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventControl: u32 {
        /// Blink events.
        const BLINK = 1 << 0;
        /// Eye open/close events.
        const EYE_CLOSE_OPEN = 1 << 1;
        /// Trackloss start/end events.
        const TRACKLOSS_START_END = 1 << 2;
        /// Saccade events.
        const SACCADE = 1 << 3;
        /// GUI procedure start/end events.
        const PROCEDURE_START_END = 1 << 5;
    }
}

/// Front camera capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraResolution {
    /// Low resolution.
    Low,
    /// Medium resolution.
    #[default]
    Medium,
    /// High resolution.
    High,
}

/// Camera user settings adjustable through `set_camera_user_settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraUserSetting {
    /// Marker sampling duration during GUI procedures, milliseconds.
    SamplingDuration,
}

/// Marker sequence mode of GUI procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerSequenceMode {
    /// Head stays still, markers move.
    #[default]
    FixedHead,
    /// Gaze stays on one marker while the head moves.
    FixedGaze,
}

/// ArUco dictionaries understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArucoDictionary {
    /// 5x5 bits, 50 markers.
    #[default]
    #[serde(rename = "DICT_5X5_50")]
    Dict5x5_50,
    /// 4x4 bits, 50 markers.
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
}

impl ArucoDictionary {
    /// Number of code bits per marker side.
    pub const fn bits(self) -> u32 {
        match self {
            ArucoDictionary::Dict5x5_50 => 5,
            ArucoDictionary::Dict4x4_50 => 4,
        }
    }

    /// Number of markers in the dictionary.
    pub const fn len(self) -> u32 {
        match self {
            ArucoDictionary::Dict5x5_50 | ArucoDictionary::Dict4x4_50 => 50,
        }
    }
}

/// One marker of a screen board, meters, bottom-left corner origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardMarker {
    /// ArUco id.
    pub id: u32,
    /// Corner X.
    pub x_m: f64,
    /// Corner Y.
    pub y_m: f64,
    /// Side length of the code area.
    pub size_m: f64,
}

/// Marker board registered with the device for screen tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenBoard {
    /// Physical screen width, meters.
    pub width_m: f64,
    /// Physical screen height, meters.
    pub height_m: f64,
    /// Marker dictionary.
    pub dictionary: ArucoDictionary,
    /// Markers placed on the screen.
    pub markers: Vec<BoardMarker>,
}
