//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use mindlink_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use mindlink_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::tracker::config::{CalibrationSettings, CalibrationType, TrackerConfig};

// ─── Vendor client ──────────────────────────────────────────────────
pub use crate::tracker::client::{FrontendApi, TrackerError};
pub use crate::tracker::types::{AckCode, DeviceEvent, PacketKind, StreamPacket};

// ─── Host ───────────────────────────────────────────────────────────
pub use crate::tracker::host::{CalibrationHost, DisplayInfo, EventBuffer, Key};
pub use crate::tracker::records::HostEvent;

/// Default heartbeat of cooperative wait loops.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(50);
