//! Linux virtual keyboard via `/dev/uinput`.
//!
//! # What is uinput? (for beginners)
//!
//! uinput is a kernel module that lets a user-space process create an input
//! device.  Events written to it are delivered to the desktop exactly like a
//! USB keyboard's, so games cannot tell the difference.  Opening
//! `/dev/uinput` normally needs root or membership of the `input` group.
//!
//! Each transition is written as a `EV_KEY` event followed by a
//! `SYN_REPORT`, which tells readers that the batch is complete.
//!
//! # Key code translation
//!
//! Layout key ids use browser names (`"ArrowUp"`, `"a"`, `" "`).
//! [`linux_key_code`] turns them into `KEY_*` codes.  A name with no code is
//! logged and skipped: one badly bound button must not take the host down.
//! A failed write, on the other hand, means the keyboard is gone and is
//! reported as a [`DeviceError`].

use std::sync::{Mutex, PoisonError};

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use tracing::{info, warn};

use padlink_core::{linux_key_code, KeyId};

use crate::application::{DeviceError, KeyDevice};

/// Highest key code advertised by the virtual keyboard.
const MAX_ADVERTISED_CODE: u16 = 255;

pub struct UinputKeyboard {
    device: Mutex<VirtualDevice>,
}

impl UinputKeyboard {
    /// Creates the virtual keyboard and advertises key codes 1..=255.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Init`] if `/dev/uinput` cannot be opened or the
    /// device cannot be registered.
    pub fn new(name: &str) -> Result<Self, DeviceError> {
        let init = |e: std::io::Error| DeviceError::Init(format!("{name}: {e}"));

        let mut keys = AttributeSet::<Key>::new();
        for code in 1..=MAX_ADVERTISED_CODE {
            keys.insert(Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(init)?
            .name(name)
            .with_keys(&keys)
            .map_err(init)?
            .build()
            .map_err(init)?;

        info!("virtual keyboard '{name}' created");
        Ok(Self {
            device: Mutex::new(device),
        })
    }
}

impl KeyDevice for UinputKeyboard {
    fn set_key_state(&self, key: &KeyId, pressed: bool) -> Result<(), DeviceError> {
        let Some(code) = linux_key_code(key) else {
            warn!("no Linux key code for '{key}'; event skipped");
            return Ok(());
        };

        let events = [
            InputEvent::new(EventType::KEY, code, i32::from(pressed)),
            InputEvent::new(EventType::SYNCHRONIZATION, 0, 0),
        ];

        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emit(&events)
            .map_err(|e| DeviceError::Write {
                key: key.clone(),
                reason: e.to_string(),
            })
    }
}
