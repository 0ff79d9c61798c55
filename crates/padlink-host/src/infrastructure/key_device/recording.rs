//! Recording keyboard for unit and integration tests.
//!
//! The real keyboards need `/dev/uinput` (and usually root), actually press
//! keys on the test machine, and cannot be observed from test code.
//! [`RecordingKeyboard`] pushes every `(key, pressed)` transition into a
//! `Mutex<Vec<...>>` so assertions can inspect exactly what reached the
//! device and in what order.
//!
//! # Usage in tests
//!
//! ```ignore
//! let device = Arc::new(RecordingKeyboard::new());
//! let mux = KeyMultiplexer::new(device.clone());
//!
//! mux.press(&KeyId::from("ArrowUp")).unwrap();
//!
//! assert_eq!(device.events(), vec![(KeyId::from("ArrowUp"), true)]);
//! ```
//!
//! # Failure injection
//!
//! [`RecordingKeyboard::set_failing`] makes every later call return
//! [`DeviceError::Write`] without recording, which drives the fatal path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use padlink_core::KeyId;

use crate::application::{DeviceError, KeyDevice};

#[derive(Debug, Default)]
pub struct RecordingKeyboard {
    events: Mutex<Vec<(KeyId, bool)>>,
    should_fail: AtomicBool,
}

impl RecordingKeyboard {
    /// Creates a keyboard with no recorded events that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every following call fails.
    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of all recorded transitions, oldest first.
    pub fn events(&self) -> Vec<(KeyId, bool)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Keys whose last recorded transition is "down".
    pub fn pressed_keys(&self) -> Vec<KeyId> {
        let mut pressed: Vec<KeyId> = Vec::new();
        for (key, down) in self.events() {
            pressed.retain(|k| k != &key);
            if down {
                pressed.push(key);
            }
        }
        pressed.sort();
        pressed
    }
}

impl KeyDevice for RecordingKeyboard {
    fn set_key_state(&self, key: &KeyId, pressed: bool) -> Result<(), DeviceError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(DeviceError::Write {
                key: key.clone(),
                reason: "injected failure".to_string(),
            });
        }
        if let Ok(mut events) = self.events.lock() {
            events.push((key.clone(), pressed));
        }
        Ok(())
    }
}
