//! Padlink host: entry point.
//!
//! This binary accepts WebSocket connections from phones and turns their
//! button presses into key presses on one virtual keyboard shared by every
//! player.
//!
//! # Usage
//!
//! ```text
//! padlink-host [OPTIONS]
//!
//! Options:
//!   --port        <PORT>   WebSocket listener port [default: 8000]
//!   --bind        <IP>     Address to bind [default: 0.0.0.0]
//!   --layouts     <PATH>   Layouts JSON file [default: layouts.json]
//!   --device      <KIND>   uinput | log [default: uinput on Linux]
//!   --device-name <NAME>   Name of the virtual keyboard
//!   --ping-interval <SECS>    How often phones are pinged [default: 5]
//!   --liveness-timeout <SECS> Silence before a phone is dropped [default: 15]
//!   --config      <PATH>   Optional TOML config file
//!   --log-level   <LEVEL>  Log level when RUST_LOG is unset
//! ```
//!
//! # Where settings come from
//!
//! Each setting is taken from the first source that has it:
//!
//! 1. the command-line flag,
//! 2. its environment variable (`PADLINK_PORT`, `PADLINK_BIND`, ...),
//! 3. the TOML file given by `--config`,
//! 4. the built-in default.
//!
//! Phones connect to `ws://HOST:PORT/ws/{playerId}?layout={name}`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use padlink_host::application::{KeyMultiplexer, SessionManager};
use padlink_host::domain::{DeviceKind, HostConfig};
use padlink_host::infrastructure::config_file::{load_config, FileConfig};
use padlink_host::infrastructure::key_device::open_device;
use padlink_host::infrastructure::layout_store::JsonFileLayoutStore;
use padlink_host::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Padlink host.
///
/// Accepts phone controllers over WebSocket and drives a shared virtual
/// keyboard.
#[derive(Debug, Parser)]
#[command(
    name = "padlink-host",
    about = "Turns phone controllers into key presses on a shared virtual keyboard",
    version
)]
struct Cli {
    /// TCP port for the WebSocket server.
    #[arg(long, env = "PADLINK_PORT")]
    port: Option<u16>,

    /// IP address to bind.  `0.0.0.0` accepts phones on the LAN.
    #[arg(long, env = "PADLINK_BIND")]
    bind: Option<IpAddr>,

    /// Layouts JSON file shared with the layout editor.
    #[arg(long, env = "PADLINK_LAYOUTS")]
    layouts: Option<PathBuf>,

    /// Virtual keyboard backend: `uinput` or `log`.
    #[arg(long, env = "PADLINK_DEVICE")]
    device: Option<DeviceKind>,

    /// Name the virtual keyboard advertises to the OS.
    #[arg(long, env = "PADLINK_DEVICE_NAME")]
    device_name: Option<String>,

    /// Seconds between pings to each phone.
    #[arg(long, env = "PADLINK_PING_INTERVAL")]
    ping_interval: Option<u64>,

    /// Seconds of silence after which a phone is treated as gone and its
    /// keys are released.
    #[arg(long, env = "PADLINK_LIVENESS_TIMEOUT")]
    liveness_timeout: Option<u64>,

    /// Optional TOML config file.
    #[arg(long, env = "PADLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "PADLINK_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Layers the CLI flags over `file` and returns the host config and the
    /// log level.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's bind address is not an IP address, or
    /// if the resulting ping settings cannot detect a dead phone.
    fn into_host_config(self, file: &FileConfig) -> anyhow::Result<(HostConfig, String)> {
        let mut config = file
            .to_host_config()
            .context("invalid [server] section in config file")?;

        if let Some(ip) = self.bind {
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(path) = self.layouts {
            config.layouts_path = path;
        }
        if let Some(kind) = self.device {
            config.device = kind;
        }
        if let Some(name) = self.device_name {
            config.device_name = name;
        }
        if let Some(secs) = self.ping_interval {
            config.ping_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.liveness_timeout {
            config.liveness_timeout = Duration::from_secs(secs);
        }
        config.check_liveness()?;
        let level = self.log_level.unwrap_or_else(|| file.logging.level.clone());

        Ok((config, level))
    }
}

/// Reads the `--config` file, or returns the defaults when none was given.
fn load_file_config(path: Option<&PathBuf>) -> anyhow::Result<FileConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config file {}", path.display())),
        None => Ok(FileConfig::default()),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and layered over the config file.
/// 2. `tracing_subscriber` is initialised.  `RUST_LOG` wins over the
///    configured level.
/// 3. The virtual keyboard is created.  Failing here exits before any phone
///    can connect.
/// 4. A Ctrl+C handler is spawned; it clears a shared `AtomicBool`.
/// 5. [`run_server`] accepts phones until Ctrl+C or a fatal device error,
///    then releases every key that is still down.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = load_file_config(cli.config.as_ref())?;
    let (config, level) = cli.into_host_config(&file)?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    info!(
        "padlink host starting: bind={}, layouts={}, device={} ({})",
        config.bind_addr,
        config.layouts_path.display(),
        config.device,
        config.device_name
    );

    // ── Wiring ────────────────────────────────────────────────────────────────
    let device = open_device(config.device, &config.device_name)
        .context("failed to open virtual keyboard")?;
    let mux = Arc::new(KeyMultiplexer::new(device));
    let store = Arc::new(JsonFileLayoutStore::new(config.layouts_path.clone()));
    let manager = Arc::new(SessionManager::new(store, mux));

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ──────────────────────────────────────────────────────
    run_server(config, manager, running).await?;

    info!("padlink host stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
