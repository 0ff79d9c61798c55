//! Infrastructure layer for padlink-host.
//!
//! The infrastructure layer handles all I/O: accepting WebSocket connections
//! from phones, reading the layouts file, and writing to the virtual keyboard.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade
//! - Spawning per-session Tokio tasks and stopping them on halt
//! - Loading layouts from disk (or memory, in tests)
//! - Creating the uinput keyboard, or a logging stand-in
//! - Reading the optional TOML config file
//!
//! # What does NOT belong here?
//!
//! - Reference counting of keys and the session state machine (application)
//! - Keybind resolution (`padlink-core`)

pub mod config_file;
pub mod key_device;
pub mod layout_store;
pub mod ws_server;

pub use ws_server::{run_server, serve};
