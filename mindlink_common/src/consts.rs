//! Host-side constants shared by all adapter crates.
//!
//! Numeric values follow the experiment host's event and eye tracker
//! constant tables so that positional records stay wire compatible.

/// Event type id of a binocular eye sample record.
pub const BINOCULAR_EYE_SAMPLE: u32 = 52;

/// Event type id of a blink end record.
pub const BLINK_END: u32 = 58;

/// Placeholder for fields the device does not measure.
pub const UNDEFINED: i32 = 0;

/// Eye selector: both eyes, averaged.
pub const BINOCULAR_AVERAGED: i32 = 24;

/// Pupil measure type: diameter.
pub const PUPIL_DIAMETER: i32 = 71;

/// Sentinel status returned by the host's eye tracker interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    /// The adapter does not implement the requested call.
    FunctionalityNotSupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_distinct() {
        assert_ne!(BINOCULAR_EYE_SAMPLE, BLINK_END);
    }
}
