//! Eye tracker contract shared between the adapter and its clients.
//!
//! This module contains the vendor client trait, the wire types it speaks,
//! the host-facing seams and records, and the tracker configuration.

pub mod client;
pub mod config;
pub mod host;
pub mod records;
pub mod types;
