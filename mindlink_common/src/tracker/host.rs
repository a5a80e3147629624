//! Host-side seams of the adapter.
//!
//! The experiment host supplies a display description, an event buffer the
//! adapter publishes records into, and the keyboard / prompt / message pump
//! facilities used while calibrating.

use crate::tracker::records::HostEvent;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Display coordinate bounds, display units, Y up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordBounds {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Right edge.
    pub right: f64,
    /// Bottom edge.
    pub bottom: f64,
}

impl CoordBounds {
    /// Centered bounds for a display of `width` x `height` units.
    pub fn centered(width: f64, height: f64) -> Self {
        Self {
            left: -width / 2.0,
            top: height / 2.0,
            right: width / 2.0,
            bottom: -height / 2.0,
        }
    }

    /// Horizontal extent.
    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Vertical extent.
    #[inline]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

/// Color space of host color triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Channels in `[-1, 1]`.
    Rgb,
    /// Channels in `[0, 255]`.
    #[default]
    Rgb255,
}

impl ColorSpace {
    /// Convert a color from this space to `[0, 255]` channels.
    pub fn to_rgb255(self, color: [f64; 3]) -> [f64; 3] {
        match self {
            ColorSpace::Rgb255 => color,
            ColorSpace::Rgb => color.map(|c| (c + 1.0) * 127.5),
        }
    }

    /// Convert a `[0, 255]` color into this space.
    pub fn from_rgb255(self, color: [f64; 3]) -> [f64; 3] {
        match self {
            ColorSpace::Rgb255 => color,
            ColorSpace::Rgb => color.map(|c| c / 127.5 - 1.0),
        }
    }
}

fn default_unit_type() -> String {
    "pix".to_string()
}

/// Description of the experiment display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    /// Display index.
    #[serde(default)]
    pub index: u32,
    /// Resolution in pixels, `[width, height]`.
    pub pixel_resolution: [u32; 2],
    /// Coordinate bounds in display units.
    pub coord_bounds: CoordBounds,
    /// Physical width, millimeters.
    pub physical_width_mm: f64,
    /// Physical height, millimeters.
    pub physical_height_mm: f64,
    /// Display unit type (e.g. "pix", "norm").
    #[serde(default = "default_unit_type")]
    pub coord_type: String,
    /// Color space used by the display.
    #[serde(default)]
    pub color_space: ColorSpace,
    /// Monitor calibration name.
    #[serde(default)]
    pub monitor_name: Option<String>,
}

impl DisplayInfo {
    /// Pixel display of `width` x `height` with centered pixel bounds.
    pub fn pixels(width: u32, height: u32, physical_width_mm: f64, physical_height_mm: f64) -> Self {
        Self {
            index: 0,
            pixel_resolution: [width, height],
            coord_bounds: CoordBounds::centered(f64::from(width), f64::from(height)),
            physical_width_mm,
            physical_height_mm,
            coord_type: default_unit_type(),
            color_space: ColorSpace::default(),
            monitor_name: None,
        }
    }

    /// Physical size in meters, `(width, height)`.
    pub fn physical_size_m(&self) -> (f64, f64) {
        (self.physical_width_mm * 1e-3, self.physical_height_mm * 1e-3)
    }
}

/// Host event buffer the adapter publishes records into.
pub trait EventBuffer: Send {
    /// Append a record.
    fn add_event(&mut self, event: HostEvent);

    /// Drop all pending records.
    fn clear(&mut self);
}

/// Bounded in-memory event buffer shareable between the adapter and the
/// host thread that consumes it. The oldest record is dropped on overflow.
#[derive(Debug, Clone)]
pub struct SharedEventBuffer {
    inner: Arc<Mutex<VecDeque<HostEvent>>>,
    capacity: usize,
}

impl SharedEventBuffer {
    /// Create a buffer holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(4096)))),
            capacity: capacity.max(1),
        }
    }

    /// Remove and return all pending records.
    pub fn drain(&self) -> Vec<HostEvent> {
        self.inner.lock().drain(..).collect()
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no records are pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for SharedEventBuffer {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBuffer for SharedEventBuffer {
    fn add_event(&mut self, event: HostEvent) {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(event);
    }

    fn clear(&mut self) {
        self.inner.lock().clear();
    }
}

/// Keys the calibration choreography reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Space bar.
    Space,
    /// Escape.
    Escape,
    /// Anything else, by host key name.
    Other(String),
}

impl Key {
    /// Parse a host key name.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "space" => Key::Space,
            "escape" | "esc" => Key::Escape,
            _ if name == " " => Key::Space,
            _ => Key::Other(name.to_string()),
        }
    }
}

/// Instruction prompt drawn by the host during calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Text to display.
    pub text: String,
    /// Background color in `color_space`.
    pub background: [f64; 3],
    /// Text color in `color_space`.
    pub text_color: [f64; 3],
    /// Color space of both colors.
    pub color_space: ColorSpace,
    /// Unit type for layout.
    pub unit_type: String,
}

/// Keyboard, prompt window and message pump of the experiment host.
pub trait CalibrationHost {
    /// Forward key presses to `keys` until unregistered. Returns `false` if
    /// the host has no keyboard available.
    fn register_key_listener(&mut self, keys: Sender<Key>) -> bool;

    /// Stop forwarding key presses.
    fn unregister_key_listener(&mut self);

    /// Show (or refresh) the instruction prompt.
    fn show_prompt(&mut self, prompt: &Prompt);

    /// Hide the instruction prompt.
    fn hide_prompt(&mut self);

    /// Clear the host's event buffers.
    fn clear_event_buffers(&mut self);

    /// Run one iteration of the host's message pump.
    fn pump(&mut self);
}
