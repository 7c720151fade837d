//! Pulse monitor: a decorative ramp from color A to color B.
//!
//! The ramp restarts at A once it passes B; it does not reverse.

use crate::Color;
use crate::device::{Backlight, DeviceError};
use crate::monitor::{Monitor, MonitorKind, interpolate};
use crate::zone::ZoneSet;
use std::time::Instant;

pub const DEFAULT_SPEED: f64 = 5.0;

/// End of the ramp; `position` runs from 0 to this.
const RAMP_END: f64 = 100.0;

pub struct PulseMonitor {
    zones: ZoneSet,
    color: Color,
    a: [f64; 3],
    b: [f64; 3],
    position: f64,
    speed: f64,
}

impl PulseMonitor {
    pub fn new(zones: ZoneSet, initial: Color, a: [f64; 3], b: [f64; 3], speed: f64) -> Self {
        let monitor = Self {
            zones,
            color: initial,
            a,
            b,
            position: 0.0,
            speed,
        };
        tracing::info!("pulse setup for {}", monitor.zones);
        monitor
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    fn advance(&mut self) {
        self.position += self.speed;
        if self.position > RAMP_END {
            self.position = 0.0;
        }
    }
}

impl Monitor for PulseMonitor {
    fn kind(&self) -> MonitorKind {
        MonitorKind::Pulse
    }

    fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    fn color(&self) -> Color {
        self.color
    }

    fn update(&mut self, _now: Instant, backlight: &mut Backlight) -> Result<(), DeviceError> {
        self.color = Color::from_channels(interpolate(self.a, self.b, self.position));
        let written = backlight.paint(&self.zones, self.color);
        self.advance();
        tracing::debug!("pulse {}", self.color);
        written
    }
}
