//! Keyboard backlight monitor daemon.
//!
//! Drives the per-zone RGB LEDs of a backlit keyboard (System76 style
//! sysfs interface) to visualise system or network state. Each configured
//! monitor computes a color on its own cadence and writes it to the zones
//! it owns.
//!
//! This module provides the pieces every other module shares:
//! - The [`Color`] type and its hex codec
//! - Signal handling for clean shutdown
//!
//! The remaining modules are layered leaves first: [`zone`] and [`device`]
//! describe the hardware, [`monitor`] and its variants ([`health`],
//! [`load`], [`pulse`]) compute colors, [`config`] builds monitors from the
//! configuration file, [`scheduler`] runs the polling loop and [`server`]
//! exposes the optional status API.

pub mod config;
pub mod device;
pub mod health;
pub mod load;
pub mod monitor;
pub mod pulse;
pub mod scheduler;
pub mod server;
pub mod zone;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Color ──────────────────────────────────────────────────────────

/// A color as written to the keyboard, already clamped to 8-bit channels.
///
/// Monitors do their arithmetic on `[f64; 3]` (interpolation and load
/// scaling produce fractional, sometimes out-of-range values) and only
/// collapse to a `Color` at the end via [`Color::from_channels`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLUE: Color = Color::new(0, 0, 255);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const OLIVE: Color = Color::new(192, 192, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Clamp each channel into 0-255, truncating any fractional part.
    pub fn from_channels(channels: [f64; 3]) -> Self {
        let [r, g, b] = channels.map(clamp_channel);
        Self { r, g, b }
    }

    /// Parse a 6-digit hex string such as `"00ff00"` (a leading `#` is allowed).
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorError::InvalidHex(hex.to_string()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorError::InvalidHex(hex.to_string()))
        };

        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// The channels as floats, for interpolation.
    pub fn channels(self) -> [f64; 3] {
        [self.r as f64, self.g as f64, self.b as f64]
    }

    /// Serialized form written to the device: six lowercase hex digits.
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLUE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("'{0}' is not a 6-digit hex color")]
    InvalidHex(String),
}

/// `>255` saturates, `<0` floors, anything else is truncated toward zero.
fn clamp_channel(value: f64) -> u8 {
    if value > 255.0 {
        255
    } else if value < 0.0 {
        0
    } else {
        value as u8
    }
}

/// Two lowercase hex digits for one channel value.
///
/// Truncates rather than rounds: `127.9` becomes `"7f"`.
pub fn channel_to_hex(value: f64) -> String {
    format!("{:02x}", clamp_channel(value))
}

/// Six lowercase hex digits for an `[r, g, b]` triple.
pub fn color_to_hex(channels: [f64; 3]) -> String {
    channels.iter().map(|&c| channel_to_hex(c)).collect()
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Set up a Ctrl+C / SIGTERM handler that sets `running` to false.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────
