//! The monitor abstraction shared by every color source.
//!
//! A monitor owns a set of zones and a current color. The scheduler calls
//! [`Monitor::update`] once per tick; each variant decides for itself
//! whether anything needs recomputing (the health monitor rate-limits
//! itself, the load and pulse monitors repaint every tick).
//!
//! `update` must absorb its own failures. The only error it may return is
//! a [`DeviceError`] that the [`Backlight`] policy chose to propagate.

use crate::Color;
use crate::device::{Backlight, DeviceError};
use crate::zone::ZoneSet;
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// The three monitor kinds the registry knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    SiteHealth,
    LoadAverage,
    Pulse,
}

impl MonitorKind {
    pub const ALL: [MonitorKind; 3] = [
        MonitorKind::SiteHealth,
        MonitorKind::LoadAverage,
        MonitorKind::Pulse,
    ];

    /// Name used as the key in the configuration file.
    pub fn as_str(self) -> &'static str {
        match self {
            MonitorKind::SiteHealth => "site_health",
            MonitorKind::LoadAverage => "load_average",
            MonitorKind::Pulse => "pulse",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Monitor: Send {
    fn kind(&self) -> MonitorKind;

    fn zones(&self) -> &ZoneSet;

    /// The color most recently computed (and written).
    fn color(&self) -> Color;

    /// Recompute the color if due and write it to every owned zone.
    fn update(&mut self, now: Instant, backlight: &mut Backlight) -> Result<(), DeviceError>;

    /// Startup write: paint the initial color before the first tick.
    fn paint_initial(&self, backlight: &mut Backlight) -> Result<(), DeviceError> {
        backlight.paint(self.zones(), self.color())
    }

    fn status(&self) -> MonitorStatus {
        MonitorStatus {
            kind: self.kind(),
            zones: self.zones().names().into_iter().map(String::from).collect(),
            color: self.color().to_hex(),
        }
    }
}

/// Point-in-time view of one monitor, published to the status API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct MonitorStatus {
    /// Monitor kind
    pub kind: MonitorKind,
    /// Zones this monitor paints
    pub zones: Vec<String>,
    /// Current color as six hex digits
    #[schema(example = "00ff00")]
    pub color: String,
}

/// Linear interpolation between two colors; `position` runs 0-100.
pub fn interpolate(a: [f64; 3], b: [f64; 3], position: f64) -> [f64; 3] {
    std::array::from_fn(|c| a[c] * (100.0 - position) / 100.0 + b[c] * position / 100.0)
}
