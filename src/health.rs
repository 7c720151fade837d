//! Site health monitor: polls an HTTP endpoint and shows the outcome.
//!
//! | outcome                         | color  |
//! |---------------------------------|--------|
//! | not polled yet / transport error| blue   |
//! | 200 in under a second           | green  |
//! | 200, slow                       | olive  |
//! | anything else                   | red    |
//!
//! The HTTP call blocks the scheduler thread for up to `timeout`. The next
//! poll is due `frequency` after the previous one finished, whatever its
//! outcome, so a slow or dead endpoint never holds up consecutive ticks.

use crate::Color;
use crate::device::{Backlight, DeviceError};
use crate::monitor::{Monitor, MonitorKind};
use crate::zone::ZoneSet;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FREQUENCY: Duration = Duration::from_secs(10);

/// Responses slower than this are reported as degraded.
pub const SLOW_RESPONSE: Duration = Duration::from_secs(1);

// ── HTTP probe ───────────────────────────────────────────────────────

/// Outcome of a GET that reached the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
#[error("request to {url} failed: {message}")]
pub struct ProbeError {
    pub url: String,
    pub message: String,
}

/// Blocking GET with headers and a timeout.
pub trait HttpProbe: Send + Sync {
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<ProbeResponse, ProbeError>;
}

/// [`HttpProbe`] backed by `reqwest`'s blocking client.
#[derive(Clone, Debug, Default)]
pub struct ReqwestProbe {
    client: reqwest::blocking::Client,
}

impl ReqwestProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HttpProbe for ReqwestProbe {
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<ProbeResponse, ProbeError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let start = Instant::now();
        let response = request.send().map_err(|e| ProbeError {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            elapsed: start.elapsed(),
        })
    }
}

// ── Status table ─────────────────────────────────────────────────────

/// The four states a site can be shown in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SiteStatus {
    Unknown,
    Good,
    Degraded,
    Bad,
}

impl SiteStatus {
    pub fn color(self) -> Color {
        match self {
            SiteStatus::Unknown => Color::BLUE,
            SiteStatus::Good => Color::GREEN,
            SiteStatus::Degraded => Color::OLIVE,
            SiteStatus::Bad => Color::RED,
        }
    }

    pub fn from_response(response: &ProbeResponse) -> Self {
        match response.status {
            200 if response.elapsed < SLOW_RESPONSE => SiteStatus::Good,
            200 => SiteStatus::Degraded,
            _ => SiteStatus::Bad,
        }
    }
}

// ── Monitor ──────────────────────────────────────────────────────────

pub struct HealthMonitor {
    zones: ZoneSet,
    url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    frequency: Duration,
    status: SiteStatus,
    last_poll: Option<Instant>,
    probe: Box<dyn HttpProbe>,
}

impl HealthMonitor {
    pub fn new(zones: ZoneSet, url: impl Into<String>, probe: Box<dyn HttpProbe>) -> Self {
        let monitor = Self {
            zones,
            url: url.into(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            frequency: DEFAULT_FREQUENCY,
            status: SiteStatus::Unknown,
            last_poll: None,
            probe,
        };
        tracing::info!("site_health monitor setup for {}", monitor.zones);
        monitor
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_frequency(mut self, frequency: Duration) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn site_status(&self) -> SiteStatus {
        self.status
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_poll {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.frequency,
        }
    }

    fn poll(&self) -> SiteStatus {
        match self.probe.get(&self.url, &self.headers, self.timeout) {
            Ok(response) => {
                let status = SiteStatus::from_response(&response);
                tracing::debug!(
                    "{} answered {} in {}ms -> {:?}",
                    self.url,
                    response.status,
                    response.elapsed.as_millis(),
                    status
                );
                status
            }
            Err(e) => {
                tracing::warn!("Failed to get status of {}: {}", self.url, e);
                SiteStatus::Unknown
            }
        }
    }
}

impl Monitor for HealthMonitor {
    fn kind(&self) -> MonitorKind {
        MonitorKind::SiteHealth
    }

    fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    fn color(&self) -> Color {
        self.status.color()
    }

    fn update(&mut self, now: Instant, backlight: &mut Backlight) -> Result<(), DeviceError> {
        if !self.is_due(now) {
            return Ok(());
        }

        let started = Instant::now();
        self.status = self.poll();
        // Rate limit runs from the end of the request.
        self.last_poll = Some(now + started.elapsed());
        backlight.paint(&self.zones, self.color())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeProbe;
    use super::*;
    use crate::device::testing::RecordingSink;
    use crate::zone::Zone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn monitor(probe: &FakeProbe) -> HealthMonitor {
        let zones = ZoneSet::parse(&["left"]).unwrap();
        HealthMonitor::new(zones, "http://example.test/health", Box::new(probe.clone()))
    }

    #[test]
    fn starts_unknown() {
        let probe = FakeProbe::responding(200, Duration::ZERO);
        let m = monitor(&probe);
        assert_eq!(m.site_status(), SiteStatus::Unknown);
        assert_eq!(m.color().to_hex(), "0000ff");
        assert_eq!(probe.calls(), 0);
    }

    #[rstest]
    #[case(200, 200, "00ff00")]
    #[case(200, 1500, "c0c000")]
    #[case(200, 1000, "c0c000")]
    #[case(503, 100, "ff0000")]
    #[case(404, 3000, "ff0000")]
    fn maps_response_to_color(#[case] status: u16, #[case] millis: u64, #[case] expected: &str) {
        let probe = FakeProbe::responding(status, Duration::from_millis(millis));
        let sink = RecordingSink::default();
        let mut backlight = sink.backlight();
        let mut m = monitor(&probe);

        m.update(Instant::now(), &mut backlight).unwrap();

        assert_eq!(m.color().to_hex(), expected);
        assert_eq!(sink.zone_writes(Zone::Left), vec![expected.to_string()]);
    }

    #[test]
    fn transport_error_is_absorbed_as_unknown() {
        let probe = FakeProbe::failing("connection refused");
        let sink = RecordingSink::default();
        let mut backlight = sink.backlight();
        let mut m = monitor(&probe);

        assert!(m.update(Instant::now(), &mut backlight).is_ok());

        assert_eq!(m.color().to_hex(), "0000ff");
        assert_eq!(sink.zone_writes(Zone::Left), vec!["0000ff"]);
    }

    #[test]
    fn error_after_success_returns_to_unknown() {
        let probe = FakeProbe::responding(200, Duration::from_millis(10));
        let sink = RecordingSink::default();
        let mut backlight = sink.backlight();
        let mut m = monitor(&probe).with_frequency(Duration::from_secs(10));
        let t0 = Instant::now();

        m.update(t0, &mut backlight).unwrap();
        assert_eq!(m.site_status(), SiteStatus::Good);

        *probe.outcome.lock().unwrap() = Err("timed out".into());
        m.update(t0 + Duration::from_millis(10_100), &mut backlight).unwrap();
        assert_eq!(m.site_status(), SiteStatus::Unknown);
    }

    #[test]
    fn polls_at_most_once_per_frequency() {
        let probe = FakeProbe::responding(200, Duration::from_millis(10));
        let sink = RecordingSink::default();
        let mut backlight = sink.backlight();
        let mut m = monitor(&probe).with_frequency(Duration::from_secs(10));
        let t0 = Instant::now();

        m.update(t0, &mut backlight).unwrap();
        m.update(t0 + Duration::from_secs(3), &mut backlight).unwrap();
        m.update(t0 + Duration::from_millis(9_999), &mut backlight).unwrap();
        assert_eq!(probe.calls(), 1);
        assert_eq!(sink.zone_writes(Zone::Left).len(), 1);

        m.update(t0 + Duration::from_millis(10_100), &mut backlight).unwrap();
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn slow_request_delays_next_poll_by_full_frequency() {
        let probe = FakeProbe::failing("timed out").slow(Duration::from_millis(300));
        let sink = RecordingSink::default();
        let mut backlight = sink.backlight();
        let mut m = monitor(&probe).with_frequency(Duration::from_millis(200));

        // Back-to-back ticks after a request that outlasted the frequency.
        m.update(Instant::now(), &mut backlight).unwrap();
        m.update(Instant::now(), &mut backlight).unwrap();
        assert_eq!(probe.calls(), 1);

        std::thread::sleep(Duration::from_millis(150));
        m.update(Instant::now(), &mut backlight).unwrap();
        assert_eq!(probe.calls(), 1);

        m.update(Instant::now() + Duration::from_millis(200), &mut backlight).unwrap();
        assert_eq!(probe.calls(), 2);
        assert_eq!(sink.zone_writes(Zone::Left), vec!["0000ff", "0000ff"]);
    }

    #[test]
    fn slow_request_is_timed_from_its_end_not_the_tick() {
        let probe = FakeProbe::responding(200, Duration::from_millis(10)).slow(Duration::from_millis(300));
        let sink = RecordingSink::default();
        let mut backlight = sink.backlight();
        let mut m = monitor(&probe).with_frequency(Duration::from_millis(200));
        let t0 = Instant::now();

        m.update(t0, &mut backlight).unwrap();
        // 450ms after the tick is past the frequency, but the request only
        // returned at 300ms.
        m.update(t0 + Duration::from_millis(450), &mut backlight).unwrap();
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn failing_endpoint_is_rate_limited_too() {
        let probe = FakeProbe::failing("dns failure");
        let sink = RecordingSink::default();
        let mut backlight = sink.backlight();
        let mut m = monitor(&probe).with_frequency(Duration::from_secs(5));
        let t0 = Instant::now();

        m.update(t0, &mut backlight).unwrap();
        m.update(t0 + Duration::from_secs(1), &mut backlight).unwrap();

        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn instances_do_not_share_rate_limit_state() {
        let probe = FakeProbe::responding(200, Duration::from_millis(10));
        let sink = RecordingSink::default();
        let mut backlight = sink.backlight();
        let mut first = monitor(&probe);
        let mut second = monitor(&probe);
        let now = Instant::now();

        first.update(now, &mut backlight).unwrap();
        second.update(now, &mut backlight).unwrap();

        assert_eq!(probe.calls(), 2);
    }
}
