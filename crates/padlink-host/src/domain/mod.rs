//! Domain layer for padlink-host.
//!
//! Pure types with no I/O: the host configuration, the JSON messages a phone
//! sends, and the parsed connection request.

pub mod config;
pub mod connect;
pub mod messages;

pub use config::{DeviceKind, HostConfig, InvalidLiveness, UnknownDeviceKind};
pub use connect::{ConnectError, ConnectRequest};
pub use messages::{ButtonAction, ButtonEvent};
