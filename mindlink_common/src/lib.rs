//! MindLink Common Library
//!
//! This crate provides shared constants, configuration loading utilities and
//! the vendor client contract for the MindLink eye tracker adapter crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Host event and status constants
//! - [`geometry`] - Gaze vector and screen coordinate conversions
//! - [`tracker`] - Vendor client trait, wire types, host seams and records
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use mindlink_common::config::{ConfigLoader, SharedConfig};
//! use mindlink_common::geometry::{vector_to_angles, RotationOrder};
//! ```

pub mod config;
pub mod consts;
pub mod geometry;
pub mod prelude;
pub mod tracker;
