//! Scheduler: owns the monitors and the backlight, ticks them forever.
//!
//! Every tick calls [`Monitor::update`] on each monitor in configuration
//! order, then sleeps. Updates are sequential, so a slow health check
//! delays the monitors after it for that tick. Monitor rate limits are
//! based on `Instant`s rather than tick counts, so the delay does not
//! accumulate.
//!
//! The optional status API talks to the loop the same way a UI would talk
//! to a render thread:
//! - [`SchedulerCommand`]s arrive over an `mpsc` channel and are drained
//!   with `try_recv()` between ticks
//! - a [`DaemonStatus`] snapshot is published behind `Arc<Mutex<_>>`
//!   after every tick

use crate::device::{Backlight, DeviceError};
use crate::is_running;
use crate::monitor::{Monitor, MonitorStatus};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ── Commands ─────────────────────────────────────────────────────────

/// Requests sent to the scheduler thread from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Set keyboard brightness (clamped into 0-100)
    SetBrightness(u8),
    /// Leave the loop after the current tick
    Stop,
}

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of the daemon, as reported by `GET /api/v1/status`.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct DaemonStatus {
    /// Monitors in update order
    pub monitors: Vec<MonitorStatus>,
    /// Current brightness (0-100)
    pub brightness: u8,
    /// Ticks completed since startup
    pub ticks: u64,
    /// Daemon version
    pub version: String,
}

impl DaemonStatus {
    pub fn new() -> Self {
        Self {
            monitors: Vec::new(),
            brightness: 0,
            ticks: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self::new()
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

pub struct Scheduler {
    monitors: Vec<Box<dyn Monitor>>,
    backlight: Backlight,
    tick: Duration,
    ticks: u64,
    commands: Option<Receiver<SchedulerCommand>>,
    status: Option<Arc<Mutex<DaemonStatus>>>,
}

impl Scheduler {
    pub fn new(monitors: Vec<Box<dyn Monitor>>, backlight: Backlight, tick: Duration) -> Self {
        Self {
            monitors,
            backlight,
            tick,
            ticks: 0,
            commands: None,
            status: None,
        }
    }

    /// Accept commands from the status API.
    pub fn with_commands(mut self, rx: Receiver<SchedulerCommand>) -> Self {
        self.commands = Some(rx);
        self
    }

    /// Publish a snapshot after every tick.
    pub fn with_status(mut self, status: Arc<Mutex<DaemonStatus>>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Paint every monitor's initial color, then apply the startup brightness.
    pub fn start(&mut self, brightness: u8) -> Result<(), DeviceError> {
        for monitor in &self.monitors {
            monitor.paint_initial(&mut self.backlight)?;
        }
        self.backlight.set_brightness(brightness as i64)?;
        self.publish();
        Ok(())
    }

    /// One pass over every monitor, in order.
    pub fn tick(&mut self, now: Instant) -> Result<(), DeviceError> {
        for monitor in &mut self.monitors {
            monitor.update(now, &mut self.backlight)?;
        }
        self.ticks += 1;
        self.publish();
        Ok(())
    }

    /// Tick until `running` goes false or a `Stop` command arrives.
    ///
    /// Returns early only when a device write fails under the fatal
    /// write policy.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), DeviceError> {
        tracing::info!(
            "Scheduler started: {} monitors, {}ms tick",
            self.monitors.len(),
            self.tick.as_millis()
        );

        while is_running(running) {
            if !self.drain_commands()? {
                break;
            }
            self.tick(Instant::now())?;
            thread::sleep(self.tick);
        }

        tracing::info!("Scheduler stopped after {} ticks", self.ticks);
        Ok(())
    }

    /// Apply pending commands. Returns `false` once the loop should stop.
    fn drain_commands(&mut self) -> Result<bool, DeviceError> {
        let Some(rx) = &self.commands else {
            return Ok(true);
        };

        loop {
            match rx.try_recv() {
                Ok(SchedulerCommand::SetBrightness(value)) => {
                    self.backlight.set_brightness(value as i64)?;
                    tracing::info!("Brightness set to {}", self.backlight.brightness());
                }
                Ok(SchedulerCommand::Stop) => {
                    tracing::info!("Stop requested");
                    return Ok(false);
                }
                Err(TryRecvError::Empty) => return Ok(true),
                Err(TryRecvError::Disconnected) => {
                    // Status API gone; keep ticking without it.
                    self.commands = None;
                    return Ok(true);
                }
            }
        }
    }

    fn publish(&self) {
        let Some(status) = &self.status else {
            return;
        };
        let Ok(mut s) = status.lock() else {
            return;
        };

        s.monitors = self.monitors.iter().map(|m| m.status()).collect();
        s.brightness = self.backlight.brightness();
        s.ticks = self.ticks;
    }
}

// ── Tests ──────────────────────────────────────────────────────────
