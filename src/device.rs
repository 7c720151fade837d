//! Device sinks: where zone colors and brightness end up.
//!
//! The keyboard driver exposes plain text files under
//! `/sys/class/leds/system76::kbd_backlight/`:
//! - `color_<zone>` takes six hex digits
//! - `brightness` takes a number
//!
//! [`DeviceSink`] is the raw write primitive. [`Backlight`] wraps a sink
//! with the daemon's write policy so a failing zone can be logged and
//! skipped instead of taking the whole process down.

use crate::Color;
use crate::zone::{Zone, ZoneSet};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::PathBuf;

pub const DEFAULT_DEVICE_PATH: &str = "/sys/class/leds/system76::kbd_backlight";

/// Brightness applied when the daemon starts, in percent.
pub const DEFAULT_BRIGHTNESS: u8 = 100;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Raw "write this string to this named target" primitive.
pub trait DeviceSink: Send {
    fn write_zone_color(&mut self, zone: Zone, hex: &str) -> Result<(), DeviceError>;
    fn write_brightness(&mut self, percent: u8) -> Result<(), DeviceError>;
}

/// Writes straight to the sysfs LED class directory.
#[derive(Clone, Debug)]
pub struct SysfsDevice {
    root: PathBuf,
}

impl SysfsDevice {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn zone_path(&self, zone: Zone) -> PathBuf {
        self.root.join(format!("color_{zone}"))
    }

    pub fn brightness_path(&self) -> PathBuf {
        self.root.join("brightness")
    }

    fn write(path: PathBuf, payload: &str) -> Result<(), DeviceError> {
        fs::write(&path, payload).map_err(|source| DeviceError::Write { path, source })
    }
}

impl Default for SysfsDevice {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_PATH)
    }
}

impl DeviceSink for SysfsDevice {
    fn write_zone_color(&mut self, zone: Zone, hex: &str) -> Result<(), DeviceError> {
        Self::write(self.zone_path(zone), hex)
    }

    fn write_brightness(&mut self, percent: u8) -> Result<(), DeviceError> {
        Self::write(self.brightness_path(), &percent.to_string())
    }
}

/// Dry-run sink: logs every write and touches nothing.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl DeviceSink for LogSink {
    fn write_zone_color(&mut self, zone: Zone, hex: &str) -> Result<(), DeviceError> {
        tracing::info!("[dry-run] color_{} <- {}", zone, hex);
        Ok(())
    }

    fn write_brightness(&mut self, percent: u8) -> Result<(), DeviceError> {
        tracing::info!("[dry-run] brightness <- {}", percent);
        Ok(())
    }
}

/// What to do when a device write fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Log the failure, skip that write and keep looping.
    #[default]
    Warn,
    /// Propagate the failure; the daemon exits non-zero.
    Fatal,
}

/// Clamp a requested brightness into 0-100.
pub fn clamp_brightness(requested: i64) -> u8 {
    requested.clamp(0, 100) as u8
}

/// A device sink plus the policy for handling its failures.
pub struct Backlight {
    sink: Box<dyn DeviceSink>,
    policy: WritePolicy,
    brightness: u8,
}

impl Backlight {
    pub fn new(sink: Box<dyn DeviceSink>, policy: WritePolicy) -> Self {
        Self {
            sink,
            policy,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }

    /// Last brightness that reached the device.
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Write `color` to every zone in `zones`.
    ///
    /// Every zone is attempted even if an earlier one fails. Under
    /// [`WritePolicy::Fatal`] the first failure is returned afterwards.
    pub fn paint(&mut self, zones: &ZoneSet, color: Color) -> Result<(), DeviceError> {
        let hex = color.to_hex();
        let mut first_error = None;

        for zone in zones.iter() {
            if let Err(e) = self.sink.write_zone_color(zone, &hex) {
                tracing::warn!("Zone {} write failed: {}", zone, e);
                first_error.get_or_insert(e);
            }
        }

        self.settle(first_error)
    }

    /// Set the whole keyboard's brightness, clamped into 0-100.
    pub fn set_brightness(&mut self, requested: i64) -> Result<(), DeviceError> {
        let percent = clamp_brightness(requested);

        match self.sink.write_brightness(percent) {
            Ok(()) => {
                self.brightness = percent;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Brightness write failed: {}", e);
                self.settle(Some(e))
            }
        }
    }

    fn settle(&self, error: Option<DeviceError>) -> Result<(), DeviceError> {
        match (error, self.policy) {
            (Some(e), WritePolicy::Fatal) => Err(e),
            _ => Ok(()),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
