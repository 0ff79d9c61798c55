//! # padlink-core
//!
//! Shared library for Padlink containing the layout model, the keybind
//! resolver, the editor's keybind-capture state machine, and the table that
//! turns key names into Linux input key codes.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or sockets.
//!
//! # Architecture overview (for beginners)
//!
//! Padlink turns phones into game controllers.  Each phone shows a panel of
//! buttons (a *layout*).  When a player touches a button, the phone sends the
//! button's id to the host, and the host presses the matching key on a single
//! virtual keyboard that every player shares.
//!
//! This crate (`padlink-core`) is the pure foundation:
//!
//! - **`domain`** – The [`Layout`] snapshot a session plays with, the
//!   [`resolve`] function that maps *(item, player)* to a key, and the
//!   [`KeybindCapture`] state machine the layout editor uses to record bindings.
//!
//! - **`keymap`** – Translates key identifiers as the browser names them
//!   (`"ArrowUp"`, `"a"`, `" "`, `"KeyA"`) into Linux `KEY_*` codes for the
//!   uinput device.

pub mod domain;
pub mod keymap;

pub use domain::capture::{CaptureError, CaptureOutcome, CaptureState, KeyDisposition, KeybindCapture};
pub use domain::layout::{
    default_layouts, InvalidPlayerToken, Item, KeyId, Layout, LayoutDocument, LayoutError,
    PlayerToken,
};
pub use domain::resolver::{resolve, ResolveError};
pub use keymap::{linux_key_code, PhysicalKey};
