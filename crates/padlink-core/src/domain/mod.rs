//! Domain layer: pure types and rules with no I/O.
//!
//! - **`layout`** – Layout snapshots, items, keybind tables, player tokens.
//! - **`resolver`** – Maps an item press to a key for a given player.
//! - **`capture`** – The editor's single-focus keybind/label capture machine.

pub mod capture;
pub mod layout;
pub mod resolver;
