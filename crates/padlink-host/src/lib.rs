//! padlink-host library crate.
//!
//! The host accepts WebSocket connections from phones, resolves each button
//! press against the player's layout, and drives one virtual keyboard that all
//! players share.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Phone (JSON over WebSocket, /ws/{player}?layout={name})
//!         ↕
//! [padlink-host]
//!   ├── domain/           Pure types: HostConfig, ButtonEvent, ConnectRequest
//!   ├── application/      KeyMultiplexer, Session, SessionManager, KeyDevice
//!   └── infrastructure/
//!         ├── ws_server/     WebSocket accept loop (tokio-tungstenite)
//!         ├── layout_store/  JSON file and in-memory layout sources
//!         ├── key_device/    uinput, logging and recording keyboards
//!         └── config_file/   Optional TOML config file
//!         ↕
//! Virtual keyboard (/dev/uinput)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `padlink-core`; it talks to the
//!   outside world only through the [`application::KeyDevice`] and
//!   [`application::LayoutStore`] traits.
//! - `infrastructure` implements those traits and owns sockets and files.
//!
//! # For beginners: where is the shared state?
//!
//! Exactly one thing is shared between connections: the reference count of
//! every key, owned by [`application::KeyMultiplexer`].  Everything else (the
//! layout snapshot, the keys a player is holding) belongs to one session task.

/// Domain layer: configuration and wire types (no I/O).
pub mod domain;

/// Application layer: key multiplexing and session lifecycle.
pub mod application;

/// Infrastructure layer: WebSocket server, layout stores, key devices, config file.
pub mod infrastructure;
