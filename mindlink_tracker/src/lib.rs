//! # MindLink Tracker Library
//!
//! AdHawk MindLink eye tracker adapter with pluggable vendor client
//! architecture.
//!
//! Vendor clients implement the `FrontendApi` trait defined in
//! `mindlink_common::tracker::client`. The [`EyeTracker`] device drives a
//! client, merges its streams into binocular samples and publishes host
//! records into the host's event buffer.
//!
//! # Module Structure
//!
//! - [`eyetracker`] - EyeTracker device, the host-facing entry point
//! - [`connection`] - Connection, camera and screen tracking lifecycle
//! - [`stream`] - Stream aggregation into native samples
//! - [`events`] - Native event to host record translation
//! - [`calibration`] - Autotune and calibration choreography
//! - [`markers`] - Screen marker sheet and board construction
//! - [`registry`] - Client factory and single-instance registries
//! - [`clients`] - Vendor client implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          EyeTracker                              │
//! │  ┌──────────────────┐  acks   ┌───────────────────────────────┐  │
//! │  │ ConnectionManager│◄────────│  FrontendApi (trait object)   │  │
//! │  └──────────────────┘         └──────────────┬────────────────┘  │
//! │                                   packets    │                   │
//! │  ┌──────────────────┐   ┌─────────────────┐  │                   │
//! │  │ StreamAggregator │◄──│  data channel   │◄─┘                   │
//! │  └────────┬─────────┘   └─────────────────┘                      │
//! │           ▼                                                      │
//! │  ┌──────────────────┐         ┌───────────────────────────────┐  │
//! │  │ EventTranslator  │────────►│  EventBuffer (host)           │  │
//! │  └──────────────────┘         └───────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod calibration;
pub mod clients;
pub mod connection;
pub mod events;
pub mod eyetracker;
pub mod markers;
pub mod registry;
pub mod stream;

// Re-export key types for convenience
pub use crate::calibration::{CalibrationOutcome, CalibrationRunner};
pub use crate::eyetracker::EyeTracker;
pub use crate::markers::{MarkerPlacement, MarkerSheet};
pub use crate::registry::{ClientRegistry, InstanceRegistry};
