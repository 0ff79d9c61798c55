//! Host configuration types.
//!
//! [`HostConfig`] is the single source of truth for runtime settings.  It is
//! assembled in `main.rs` from defaults, the optional TOML file, and CLI
//! flags, then shared read-only with the server.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which virtual keyboard backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// A real keyboard created through `/dev/uinput` (Linux only).
    Uinput,
    /// Dry run: key transitions are only logged.
    Log,
}

impl DeviceKind {
    /// `uinput` on Linux, `log` everywhere else.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "linux") {
            DeviceKind::Uinput
        } else {
            DeviceKind::Log
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Uinput => f.write_str("uinput"),
            DeviceKind::Log => f.write_str("log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device kind '{0}' (expected 'uinput' or 'log')")]
pub struct UnknownDeviceKind(pub String);

impl FromStr for DeviceKind {
    type Err = UnknownDeviceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uinput" => Ok(DeviceKind::Uinput),
            "log" => Ok(DeviceKind::Log),
            _ => Err(UnknownDeviceKind(s.to_string())),
        }
    }
}

/// The ping interval and liveness timeout cannot detect a dead phone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "liveness timeout ({timeout:?}) must be longer than a non-zero ping interval ({interval:?})"
)]
pub struct InvalidLiveness {
    pub interval: Duration,
    pub timeout: Duration,
}

/// All runtime configuration for the host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address the WebSocket server binds to.
    pub bind_addr: SocketAddr,

    /// Path of the layouts JSON file written by the editor.
    pub layouts_path: PathBuf,

    /// Virtual keyboard backend.
    pub device: DeviceKind,

    /// Name the virtual keyboard advertises to the OS.
    pub device_name: String,

    /// How often the accept loop re-checks the shutdown flag.
    pub halt_poll_interval: Duration,

    /// How often each session pings its phone.
    pub ping_interval: Duration,

    /// A phone that has sent nothing (not even a Pong) for this long is
    /// treated as disconnected and its keys are released.
    pub liveness_timeout: Duration,
}

impl HostConfig {
    /// Checks that a live phone always answers a ping before it times out.
    ///
    /// # Errors
    ///
    /// [`InvalidLiveness`] if the ping interval is zero or the timeout is not
    /// longer than it.
    pub fn check_liveness(&self) -> Result<(), InvalidLiveness> {
        if self.ping_interval.is_zero() || self.liveness_timeout <= self.ping_interval {
            return Err(InvalidLiveness {
                interval: self.ping_interval,
                timeout: self.liveness_timeout,
            });
        }
        Ok(())
    }
}

impl Default for HostConfig {
    /// | Field              | Default              |
    /// |--------------------|----------------------|
    /// | bind_addr          | `0.0.0.0:8000`       |
    /// | layouts_path       | `layouts.json`       |
    /// | device             | platform default     |
    /// | device_name        | `padlink-keyboard`   |
    /// | halt_poll_interval | 200 ms               |
    /// | ping_interval      | 5 s                  |
    /// | liveness_timeout   | 15 s                 |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            layouts_path: PathBuf::from("layouts.json"),
            device: DeviceKind::platform_default(),
            device_name: "padlink-keyboard".to_string(),
            halt_poll_interval: Duration::from_millis(200),
            ping_interval: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(15),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_8000() {
        // Arrange / Act
        let cfg = HostConfig::default();
        // Assert
        assert_eq!(cfg.bind_addr.port(), 8000);
        assert!(cfg.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_layouts_path() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.layouts_path, PathBuf::from("layouts.json"));
    }

    #[test]
    fn test_default_halt_poll_interval_is_200ms() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.halt_poll_interval, Duration::from_millis(200));
    }

    #[test]
    fn test_default_liveness_outlasts_several_pings() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.ping_interval, Duration::from_secs(5));
        assert_eq!(cfg.liveness_timeout, Duration::from_secs(15));
        assert!(cfg.liveness_timeout > cfg.ping_interval * 2);
    }

    #[test]
    fn test_default_liveness_is_valid() {
        assert!(HostConfig::default().check_liveness().is_ok());
    }

    #[test]
    fn test_zero_ping_interval_is_rejected() {
        let cfg = HostConfig {
            ping_interval: Duration::ZERO,
            ..HostConfig::default()
        };
        assert!(cfg.check_liveness().is_err());
    }

    #[test]
    fn test_timeout_not_longer_than_ping_is_rejected() {
        let cfg = HostConfig {
            ping_interval: Duration::from_secs(10),
            liveness_timeout: Duration::from_secs(10),
            ..HostConfig::default()
        };
        assert_eq!(
            cfg.check_liveness(),
            Err(InvalidLiveness {
                interval: Duration::from_secs(10),
                timeout: Duration::from_secs(10),
            })
        );
    }

    #[test]
    fn test_device_kind_parses_case_insensitively() {
        assert_eq!("uinput".parse::<DeviceKind>(), Ok(DeviceKind::Uinput));
        assert_eq!("LOG".parse::<DeviceKind>(), Ok(DeviceKind::Log));
    }

    #[test]
    fn test_device_kind_rejects_unknown_names() {
        assert_eq!(
            "xtest".parse::<DeviceKind>(),
            Err(UnknownDeviceKind("xtest".to_string()))
        );
    }

    #[test]
    fn test_device_kind_display_round_trips() {
        for kind in [DeviceKind::Uinput, DeviceKind::Log] {
            assert_eq!(kind.to_string().parse::<DeviceKind>(), Ok(kind));
        }
    }
}
