//! Dry-run keyboard: logs key transitions instead of pressing anything.
//!
//! Useful on machines without `/dev/uinput` access and for checking a layout
//! from a phone without sending keys to the desktop.

use tracing::info;

use padlink_core::{linux_key_code, KeyId};

use crate::application::{DeviceError, KeyDevice};

#[derive(Debug, Default)]
pub struct LoggingKeyboard {
    name: String,
}

impl LoggingKeyboard {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl KeyDevice for LoggingKeyboard {
    fn set_key_state(&self, key: &KeyId, pressed: bool) -> Result<(), DeviceError> {
        let state = if pressed { "down" } else { "up" };
        match linux_key_code(key) {
            Some(code) => info!("[{}] key '{key}' (code {code}) {state}", self.name),
            None => info!("[{}] key '{key}' (unmapped) {state}", self.name),
        }
        Ok(())
    }
}
