//! Load average monitor: green when idle, red when every core is busy.

use crate::Color;
use crate::device::{Backlight, DeviceError};
use crate::monitor::{Monitor, MonitorKind};
use crate::zone::ZoneSet;
use std::fs;
use std::io;
use std::time::Instant;

/// Core count used when the host cannot report one.
pub const FALLBACK_CORES: u32 = 8;

/// Source of the 1-minute load average.
pub trait LoadSource: Send {
    fn one_minute(&self) -> io::Result<f64>;
}

/// Reads the first field of `/proc/loadavg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcLoadAvg;

impl LoadSource for ProcLoadAvg {
    fn one_minute(&self) -> io::Result<f64> {
        let contents = fs::read_to_string("/proc/loadavg")?;
        parse_loadavg(&contents)
    }
}

fn parse_loadavg(contents: &str) -> io::Result<f64> {
    contents
        .split_whitespace()
        .next()
        .and_then(|field| field.parse::<f64>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed /proc/loadavg"))
}

/// Number of cores this host reports, or [`FALLBACK_CORES`].
pub fn detected_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(FALLBACK_CORES)
}

/// Map a load average onto the green→red scale.
pub fn load_color(load: f64, cores: u32) -> Color {
    let fraction = (255.0 * load / cores.max(1) as f64).min(255.0);
    Color::from_channels([fraction, 255.0 - fraction, 0.0])
}

pub struct LoadMonitor {
    zones: ZoneSet,
    color: Color,
    cores: u32,
    source: Box<dyn LoadSource>,
}

impl LoadMonitor {
    pub fn new(zones: ZoneSet, initial: Color, cores: u32, source: Box<dyn LoadSource>) -> Self {
        let monitor = Self {
            zones,
            color: initial,
            cores: cores.max(1),
            source,
        };
        tracing::info!(
            "load_average monitor setup for {} ({} cores)",
            monitor.zones,
            monitor.cores
        );
        monitor
    }

    pub fn cores(&self) -> u32 {
        self.cores
    }
}

impl Monitor for LoadMonitor {
    fn kind(&self) -> MonitorKind {
        MonitorKind::LoadAverage
    }

    fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    fn color(&self) -> Color {
        self.color
    }

    fn update(&mut self, _now: Instant, backlight: &mut Backlight) -> Result<(), DeviceError> {
        let load = match self.source.one_minute() {
            Ok(load) => load,
            Err(e) => {
                tracing::warn!("Could not read load average: {}", e);
                return Ok(());
            }
        };

        self.color = load_color(load, self.cores);
        backlight.paint(&self.zones, self.color)
    }
}
