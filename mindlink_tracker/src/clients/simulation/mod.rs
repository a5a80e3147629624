//! Simulated MindLink client.
//!
//! Acknowledges requests according to a [`SimulationBehavior`], reports GUI
//! procedure results as procedure-ended events and can stream synthetic
//! gaze, pupil and blink data from a background thread.

mod client;
mod synthetic;

pub use client::{SimulatedMindLink, SimulationBehavior, SimulationHandle};
pub use synthetic::SyntheticGaze;

use mindlink_common::tracker::client::FrontendApi;

/// Factory function to create a streaming simulated client.
pub fn create_client() -> Box<dyn FrontendApi> {
    Box::new(SimulatedMindLink::new(SimulationBehavior::streaming()))
}
