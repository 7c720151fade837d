//! Configuration file and the monitor registry.
//!
//! The file is YAML (JSON works too, being a subset):
//!
//! ```yaml
//! brightness: 100
//! tick_ms: 100
//! device:
//!   path: /sys/class/leds/system76::kbd_backlight
//!   on_write_error: warn
//! monitors:
//!   site_health: {locations: [left], url: "https://example.com", frequency: 10}
//!   load_average: {locations: center}
//!   pulse: {locations: [right, extra], speed: 5}
//! ```
//!
//! `monitors` is either a mapping of kind → params (one monitor per kind)
//! or a list of single-key mappings, which allows repeating a kind. Either
//! way the order in the file is the order monitors are updated in.
//!
//! Every error here is fatal at startup.

use crate::Color;
use crate::device::{DEFAULT_BRIGHTNESS, DEFAULT_DEVICE_PATH, WritePolicy, clamp_brightness};
use crate::health::{DEFAULT_FREQUENCY, DEFAULT_TIMEOUT, HealthMonitor, HttpProbe, ReqwestProbe};
use crate::load::{LoadMonitor, LoadSource, ProcLoadAvg, detected_cores};
use crate::monitor::{Monitor, MonitorKind};
use crate::pulse::{DEFAULT_SPEED, PulseMonitor};
use crate::zone::{Locations, Zone, ZoneError, ZoneSet};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/led_control.yaml";
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unknown monitor kind '{0}' (expected one of: site_health, load_average, pulse)")]
    UnknownKind(String),
    #[error("{kind}: {source}")]
    Zone {
        kind: String,
        #[source]
        source: ZoneError,
    },
    #[error("{kind}: {message}")]
    InvalidParams { kind: String, message: String },
    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    fn params(kind: MonitorKind, message: impl ToString) -> Self {
        ConfigError::InvalidParams {
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }
}

// ── File format ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Brightness applied at startup; clamped into 0-100.
    #[serde(default = "default_brightness")]
    brightness: i64,
    #[serde(default = "default_tick_ms")]
    tick_ms: u64,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(deserialize_with = "deserialize_monitors")]
    pub monitors: Vec<MonitorEntry>,
}

fn default_brightness() -> i64 {
    DEFAULT_BRIGHTNESS as i64
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK.as_millis() as u64
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    #[serde(default = "default_device_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub on_write_error: WritePolicy,
}

fn default_device_path() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE_PATH)
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
            on_write_error: WritePolicy::default(),
        }
    }
}

/// One `(kind, params)` pair, params still untyped.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorEntry {
    pub kind: String,
    pub params: serde_yaml::Value,
}

fn deserialize_monitors<'de, D>(deserializer: D) -> Result<Vec<MonitorEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    fn entries(mapping: serde_yaml::Mapping) -> Result<Vec<MonitorEntry>, String> {
        mapping
            .into_iter()
            .map(|(key, params)| match key {
                Value::String(kind) => Ok(MonitorEntry { kind, params }),
                other => Err(format!("monitor kind must be a string, got {other:?}")),
            })
            .collect()
    }

    match Value::deserialize(deserializer)? {
        Value::Mapping(mapping) => entries(mapping).map_err(D::Error::custom),
        Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Mapping(mapping) if mapping.len() == 1 => {
                        out.extend(entries(mapping).map_err(D::Error::custom)?);
                    }
                    _ => {
                        return Err(D::Error::custom(
                            "each monitors list item must be a single `kind: params` mapping",
                        ));
                    }
                }
            }
            Ok(out)
        }
        _ => Err(D::Error::custom(
            "monitors must be a mapping or a list of mappings",
        )),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        if config.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be greater than zero".into()));
        }
        if config.monitors.is_empty() {
            return Err(ConfigError::Invalid("no monitors configured".into()));
        }
        Ok(config)
    }

    pub fn brightness(&self) -> u8 {
        clamp_brightness(self.brightness)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

// ── Per-kind parameters ──────────────────────────────────────────────

/// A color in the config: `"00ff00"` or `[0, 255, 0]`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ColorSpec {
    Hex(String),
    Channels([f64; 3]),
}

impl ColorSpec {
    fn resolve(&self, kind: MonitorKind) -> Result<Color, ConfigError> {
        match self {
            ColorSpec::Hex(hex) => Color::from_hex(hex).map_err(|e| ConfigError::params(kind, e)),
            ColorSpec::Channels(channels) => Ok(Color::from_channels(*channels)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteHealthParams {
    locations: Locations,
    url: String,
    headers: Option<BTreeMap<String, String>>,
    /// Seconds.
    timeout: Option<f64>,
    /// Seconds between polls.
    frequency: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoadAverageParams {
    locations: Locations,
    default: Option<ColorSpec>,
    cores: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PulseParams {
    locations: Locations,
    default: Option<ColorSpec>,
    #[serde(alias = "a_color")]
    a_colour: Option<[f64; 3]>,
    #[serde(alias = "b_color")]
    b_colour: Option<[f64; 3]>,
    #[serde(default = "default_speed")]
    speed: f64,
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

fn parse_params<T: serde::de::DeserializeOwned>(
    kind: MonitorKind,
    params: serde_yaml::Value,
) -> Result<T, ConfigError> {
    serde_yaml::from_value(params).map_err(|e| ConfigError::params(kind, e))
}

fn zones(kind: MonitorKind, locations: Locations) -> Result<ZoneSet, ConfigError> {
    ZoneSet::try_from(locations).map_err(|source| ConfigError::Zone {
        kind: kind.to_string(),
        source,
    })
}

fn seconds(kind: MonitorKind, name: &str, value: Option<f64>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|_| ConfigError::params(kind, format!("{name} must be a non-negative number of seconds"))),
    }
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<Vec<(String, String)>, ConfigError> {
    use reqwest::header::{HeaderName, HeaderValue};

    headers
        .iter()
        .map(|(name, value)| {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::params(MonitorKind::SiteHealth, format!("invalid header name '{name}'")))?;
            HeaderValue::from_str(value)
                .map_err(|_| ConfigError::params(MonitorKind::SiteHealth, format!("invalid value for header '{name}'")))?;
            Ok((name.clone(), value.clone()))
        })
        .collect()
}

// ── Registry ─────────────────────────────────────────────────────────

type Constructor = Box<dyn Fn(serde_yaml::Value) -> Result<Box<dyn Monitor>, ConfigError>>;

/// Maps configuration kind names to monitor constructors.
pub struct Registry {
    constructors: HashMap<MonitorKind, Constructor>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// The three built-in kinds, talking to the real network and `/proc`.
    pub fn standard() -> Self {
        Self::with_sources(
            || Box::new(ReqwestProbe::new()),
            || Box::new(ProcLoadAvg),
        )
    }

    /// The three built-in kinds with caller-supplied collaborators.
    pub fn with_sources<P, L>(probe: P, load: L) -> Self
    where
        P: Fn() -> Box<dyn HttpProbe> + 'static,
        L: Fn() -> Box<dyn LoadSource> + 'static,
    {
        let mut registry = Self::empty();

        registry.register(MonitorKind::SiteHealth, move |params| {
            let kind = MonitorKind::SiteHealth;
            let p: SiteHealthParams = parse_params(kind, params)?;
            let monitor = HealthMonitor::new(zones(kind, p.locations)?, p.url, probe())
                .with_headers(validate_headers(&p.headers.unwrap_or_default())?)
                .with_timeout(seconds(kind, "timeout", p.timeout, DEFAULT_TIMEOUT)?)
                .with_frequency(seconds(kind, "frequency", p.frequency, DEFAULT_FREQUENCY)?);
            Ok(Box::new(monitor))
        });

        registry.register(MonitorKind::LoadAverage, move |params| {
            let kind = MonitorKind::LoadAverage;
            let p: LoadAverageParams = parse_params(kind, params)?;
            let initial = match p.default {
                Some(spec) => spec.resolve(kind)?,
                None => Color::default(),
            };
            let cores = p.cores.unwrap_or_else(detected_cores);
            if cores == 0 {
                return Err(ConfigError::params(kind, "cores must be at least 1"));
            }
            Ok(Box::new(LoadMonitor::new(zones(kind, p.locations)?, initial, cores, load())))
        });

        registry.register(MonitorKind::Pulse, |params| {
            let kind = MonitorKind::Pulse;
            let p: PulseParams = parse_params(kind, params)?;
            let initial = match p.default {
                Some(spec) => spec.resolve(kind)?,
                None => Color::default(),
            };
            if !p.speed.is_finite() || p.speed <= 0.0 {
                return Err(ConfigError::params(kind, "speed must be a positive number"));
            }
            let a = p.a_colour.unwrap_or(Color::BLUE.channels());
            let b = p.b_colour.unwrap_or(Color::RED.channels());
            Ok(Box::new(PulseMonitor::new(zones(kind, p.locations)?, initial, a, b, p.speed)))
        });

        registry
    }

    pub fn register<F>(&mut self, kind: MonitorKind, constructor: F)
    where
        F: Fn(serde_yaml::Value) -> Result<Box<dyn Monitor>, ConfigError> + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
    }

    pub fn build(&self, entry: &MonitorEntry) -> Result<Box<dyn Monitor>, ConfigError> {
        let constructor = MonitorKind::from_name(&entry.kind)
            .and_then(|kind| self.constructors.get(&kind))
            .ok_or_else(|| ConfigError::UnknownKind(entry.kind.clone()))?;
        constructor(entry.params.clone())
    }

    /// Build every configured monitor, in file order.
    ///
    /// Zones claimed by more than one monitor are allowed (last write wins)
    /// but logged, since it is almost always a mistake.
    pub fn build_all(&self, config: &Config) -> Result<Vec<Box<dyn Monitor>>, ConfigError> {
        let monitors = config
            .monitors
            .iter()
            .map(|entry| self.build(entry))
            .collect::<Result<Vec<_>, _>>()?;

        for zone in Zone::ALL {
            let owners: Vec<&str> = monitors
                .iter()
                .filter(|m| m.zones().contains(zone))
                .map(|m| m.kind().as_str())
                .collect();
            if owners.len() > 1 {
                tracing::warn!(
                    "Zone {} is claimed by several monitors ({}); the last write wins",
                    zone,
                    owners.join(", ")
                );
            }
        }

        Ok(monitors)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
