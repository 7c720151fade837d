//! End-to-end: config text → registry → scheduler → files in a fake
//! sysfs LED directory.

use led_control_rs::config::{Config, Registry};
use led_control_rs::device::{Backlight, SysfsDevice};
use led_control_rs::health::{HttpProbe, ProbeError, ProbeResponse};
use led_control_rs::load::LoadSource;
use led_control_rs::scheduler::{DaemonStatus, Scheduler};
use pretty_assertions::assert_eq;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct CountingProbe {
    status: u16,
    calls: Arc<AtomicUsize>,
}

impl HttpProbe for CountingProbe {
    fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<ProbeResponse, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.status == 0 {
            return Err(ProbeError {
                url: url.to_string(),
                message: "connection refused".into(),
            });
        }
        Ok(ProbeResponse {
            status: self.status,
            elapsed: Duration::from_millis(20),
        })
    }
}

struct BusyHost;

impl LoadSource for BusyHost {
    fn one_minute(&self) -> io::Result<f64> {
        Ok(4.0)
    }
}

fn registry(status: u16, calls: &Arc<AtomicUsize>) -> Registry {
    let calls = calls.clone();
    Registry::with_sources(
        move || {
            Box::new(CountingProbe {
                status,
                calls: calls.clone(),
            })
        },
        || Box::new(BusyHost),
    )
}

fn read(dir: &Path, file: &str) -> String {
    fs::read_to_string(dir.join(file)).unwrap()
}

const CONFIG: &str = "
brightness: 60
monitors:
  site_health:
    locations: left
    url: http://status.example.test/health
    frequency: 10
  load_average:
    locations: [center]
    cores: 4
  pulse:
    locations: [right, extra]
    a_colour: [0, 0, 255]
    b_colour: [255, 0, 0]
    speed: 50
";

#[test]
fn startup_paints_initial_colors_and_brightness() {
    let tmp = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = Config::from_yaml(CONFIG).unwrap();
    let monitors = registry(200, &calls).build_all(&config).unwrap();
    let backlight = Backlight::new(
        Box::new(SysfsDevice::new(tmp.path())),
        config.device.on_write_error,
    );

    let mut scheduler = Scheduler::new(monitors, backlight, config.tick());
    scheduler.start(config.brightness()).unwrap();

    for zone in ["left", "center", "right", "extra"] {
        assert_eq!(read(tmp.path(), &format!("color_{zone}")), "0000ff");
    }
    assert_eq!(read(tmp.path(), "brightness"), "60");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn ticks_drive_every_monitor_independently() {
    let tmp = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = Config::from_yaml(CONFIG).unwrap();
    let monitors = registry(200, &calls).build_all(&config).unwrap();
    let backlight = Backlight::new(Box::new(SysfsDevice::new(tmp.path())), config.device.on_write_error);
    let status = Arc::new(Mutex::new(DaemonStatus::new()));
    let mut scheduler = Scheduler::new(monitors, backlight, config.tick()).with_status(status.clone());
    let t0 = Instant::now();

    scheduler.tick(t0).unwrap();
    assert_eq!(read(tmp.path(), "color_left"), "00ff00");
    // 4.0 load on 4 cores is fully red.
    assert_eq!(read(tmp.path(), "color_center"), "ff0000");
    assert_eq!(read(tmp.path(), "color_right"), "0000ff");

    scheduler.tick(t0 + Duration::from_millis(100)).unwrap();
    assert_eq!(read(tmp.path(), "color_extra"), "7f007f");

    scheduler.tick(t0 + Duration::from_millis(200)).unwrap();
    assert_eq!(read(tmp.path(), "color_extra"), "ff0000");

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let s = status.lock().unwrap();
    assert_eq!(s.ticks, 3);
    assert_eq!(s.monitors.len(), 3);
    assert_eq!(s.monitors[2].color, "ff0000");
}

#[test]
fn unreachable_site_shows_unknown_and_loop_continues() {
    let tmp = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = Config::from_yaml(CONFIG).unwrap();
    let monitors = registry(0, &calls).build_all(&config).unwrap();
    let backlight = Backlight::new(Box::new(SysfsDevice::new(tmp.path())), config.device.on_write_error);
    let mut scheduler = Scheduler::new(monitors, backlight, config.tick());

    scheduler.tick(Instant::now()).unwrap();

    assert_eq!(read(tmp.path(), "color_left"), "0000ff");
    assert_eq!(read(tmp.path(), "color_center"), "ff0000");
}

#[test]
fn fatal_policy_surfaces_missing_device() {
    let tmp = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let yaml = format!("device: {{on_write_error: fatal}}\n{CONFIG}");
    let config = Config::from_yaml(&yaml).unwrap();
    let monitors = registry(200, &calls).build_all(&config).unwrap();
    let backlight = Backlight::new(
        Box::new(SysfsDevice::new(tmp.path().join("no-such-led"))),
        config.device.on_write_error,
    );
    let mut scheduler = Scheduler::new(monitors, backlight, config.tick());

    assert!(scheduler.start(config.brightness()).is_err());
}

#[test]
fn warn_policy_survives_missing_device() {
    let tmp = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = Config::from_yaml(CONFIG).unwrap();
    let monitors = registry(200, &calls).build_all(&config).unwrap();
    let backlight = Backlight::new(
        Box::new(SysfsDevice::new(tmp.path().join("no-such-led"))),
        config.device.on_write_error,
    );
    let mut scheduler = Scheduler::new(monitors, backlight, config.tick());

    scheduler.start(config.brightness()).unwrap();
    scheduler.tick(Instant::now()).unwrap();
    assert_eq!(scheduler.ticks(), 1);
}

#[test]
fn run_exits_when_stopped() {
    let tmp = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = Config::from_yaml("tick_ms: 1\nmonitors:\n  pulse: {locations: left}\n").unwrap();
    let monitors = registry(200, &calls).build_all(&config).unwrap();
    let backlight = Backlight::new(Box::new(SysfsDevice::new(tmp.path())), config.device.on_write_error);
    let mut scheduler = Scheduler::new(monitors, backlight, config.tick());
    let running = Arc::new(AtomicBool::new(true));

    let stopper = {
        let running = running.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            running.store(false, Ordering::SeqCst);
        })
    };

    scheduler.run(&running).unwrap();
    stopper.join().unwrap();

    assert!(scheduler.ticks() > 0);
    assert!(tmp.path().join("color_left").exists());
}
