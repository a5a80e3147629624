//! Vendor client implementations.
//!
//! This module contains the built-in MindLink clients:
//!
//! - [`simulation`] - Software simulated headset for development and testing
//!
//! # Adding New Clients
//!
//! 1. Create a new submodule under `clients/`
//! 2. Implement the `FrontendApi` trait from `mindlink_common::tracker::client`
//! 3. Register the client in [`register_builtin_clients`]

pub mod simulation;

use crate::registry::ClientRegistry;

/// Register all built-in clients on `registry`.
pub fn register_builtin_clients(registry: &mut ClientRegistry) {
    registry.register("simulation", simulation::create_client);
}
