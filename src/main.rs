//! Keyboard backlight monitor daemon
//!
//! Reads `/etc/led_control.yaml`, builds the configured monitors and
//! repaints the keyboard zones every tick until killed.
//!
//! ## Architecture
//! - **Scheduler** (std::thread or the main thread): owns the monitors and
//!   the sysfs device, runs the polling loop
//! - **Status API** (tokio/axum, only with `--listen`): reports state and
//!   sends commands to the scheduler via channel
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/led-control-rs --config /etc/led_control.yaml
//! ./target/release/led-control-rs --dry-run --listen 127.0.0.1:8080
//! ```

use clap::Parser;
use led_control_rs::config::{Config, DEFAULT_CONFIG_PATH, Registry};
use led_control_rs::device::{Backlight, DeviceSink, LogSink, SysfsDevice};
use led_control_rs::scheduler::{DaemonStatus, Scheduler};
use led_control_rs::server::{self, AppState};
use led_control_rs::setup_signal_handler;
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Keyboard backlight monitor daemon
#[derive(Parser)]
#[command(name = "led-control-rs")]
#[command(about = "Drive keyboard backlight zones from health, load and pulse monitors")]
#[command(version)]
struct Args {
    /// Configuration file (YAML or JSON)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// LED class directory; overrides `device.path` from the config
    #[arg(long)]
    device: Option<PathBuf>,

    /// Log writes instead of touching the device
    #[arg(long)]
    dry_run: bool,

    /// Serve the status API on this address (e.g. 127.0.0.1:8080)
    #[arg(long)]
    listen: Option<SocketAddr>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    tracing::info!("Keyboard LED monitor v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Loading config from {}", args.config.display());
    let config = Config::load(&args.config)?;

    let device_path = args.device.unwrap_or_else(|| config.device.path.clone());
    let sink: Box<dyn DeviceSink> = if args.dry_run {
        tracing::info!("Dry run: device writes are logged only");
        Box::new(LogSink)
    } else {
        tracing::info!("Device: {}", device_path.display());
        Box::new(SysfsDevice::new(device_path))
    };
    let backlight = Backlight::new(sink, config.device.on_write_error);

    // Construction errors (bad zone, unknown kind, bad params) stop us here,
    // before anything is polled.
    let monitors = Registry::standard().build_all(&config)?;

    let running = setup_signal_handler()?;
    let status = Arc::new(Mutex::new(DaemonStatus::new()));
    let mut scheduler =
        Scheduler::new(monitors, backlight, config.tick()).with_status(status.clone());
    scheduler.start(config.brightness())?;

    let Some(addr) = args.listen else {
        scheduler.run(&running)?;
        return Ok(());
    };

    // With the status API enabled the scheduler moves to its own thread and
    // the main thread runs the HTTP server until the scheduler finishes.
    let (command_tx, command_rx) = mpsc::channel();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let mut scheduler = scheduler.with_commands(command_rx);
    let scheduler_running = running.clone();
    let scheduler_handle = std::thread::spawn(move || {
        let result = scheduler.run(&scheduler_running);
        let _ = done_tx.send(());
        result
    });

    let app = server::create_router(AppState { command_tx, status });
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Status API on http://{}", addr);
        tracing::info!("API Documentation: http://{}/docs", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = done_rx.await;
            })
            .await
    })?;

    scheduler_handle
        .join()
        .map_err(|_| "scheduler thread panicked")??;
    Ok(())
}
