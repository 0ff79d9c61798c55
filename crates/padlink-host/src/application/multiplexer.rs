//! KeyMultiplexer: many players, one keyboard.
//!
//! Every session presses and releases keys on the same virtual keyboard.  If
//! player 1 and player 2 both hold a button bound to `Enter`, the keyboard must
//! keep `Enter` down until *both* let go.  The multiplexer does this with a
//! reference count per key:
//!
//! ```text
//! press(k):   count 0 → 1   device.down(k)
//!             count n → n+1 (no device call)
//! release(k): count 1 → 0   device.up(k)
//!             count n → n-1 (no device call)
//!             count 0       no-op (never negative)
//! ```
//!
//! # Locking (for beginners)
//!
//! Each key has its own slot (`Mutex<u32>`).  The count update *and* the
//! device call happen while that slot is locked, so two sessions racing on
//! the same key always produce `down, up, down, up` on the device, never
//! `down, down` or an `up` that overtakes its `down`.  Different keys have
//! different slots and never wait on each other.  The outer map lock is held
//! only long enough to find or create a slot.
//!
//! # Spellings
//!
//! Slots are keyed by [`PhysicalKey`], not by the key id string.  Player 1
//! bound to `"a"` and player 2 bound to `"A"` hold the same physical key, so
//! they share one count.  The device sees the spelling the key went down
//! with for both its "down" and its "up".
//!
//! Slots are never removed: the set of distinct keys is bounded by the
//! layouts in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, error, warn};

use padlink_core::{KeyId, PhysicalKey};

/// Error type for virtual keyboard operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("failed to create virtual keyboard: {0}")]
    Init(String),

    #[error("virtual keyboard write failed for '{key}': {reason}")]
    Write { key: KeyId, reason: String },

    #[error("device kind '{0}' is not supported on this platform")]
    Unsupported(String),
}

/// The virtual keyboard the host drives.
///
/// Infrastructure implementations write to `/dev/uinput` or only log; test
/// implementations record calls.
#[cfg_attr(test, mockall::automock)]
pub trait KeyDevice: Send + Sync {
    /// Sets the physical state of `key` (`true` = down).
    fn set_key_state(&self, key: &KeyId, pressed: bool) -> Result<(), DeviceError>;
}

/// Count and device state of one physical key.
#[derive(Debug, Default)]
struct KeyState {
    count: u32,
    /// Spelling the key went down with; the matching "up" reuses it.
    pressed_as: Option<KeyId>,
}

type Slot = Arc<Mutex<KeyState>>;

/// Reference-counted key state shared by all sessions.
pub struct KeyMultiplexer {
    device: Arc<dyn KeyDevice>,
    slots: Mutex<HashMap<PhysicalKey, Slot>>,
}

impl KeyMultiplexer {
    pub fn new(device: Arc<dyn KeyDevice>) -> Self {
        Self {
            device,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Adds one reference to `key`, pressing it on the device on 0 → 1.
    ///
    /// Returns the new count.
    ///
    /// # Errors
    ///
    /// Returns the device error from the 0 → 1 transition.  The count keeps
    /// its new value.
    pub fn press(&self, key: &KeyId) -> Result<u32, DeviceError> {
        let slot = self.slot(key);
        let mut state = lock(&slot);
        state.count = state.count.saturating_add(1);
        debug!("press '{key}' → {}", state.count);
        if state.count == 1 {
            state.pressed_as = Some(key.clone());
            self.device.set_key_state(key, true)?;
        }
        Ok(state.count)
    }

    /// Drops one reference to `key`, releasing it on the device on → 0.
    ///
    /// Releasing a key whose count is already 0 does nothing.  Returns the
    /// new count.
    ///
    /// # Errors
    ///
    /// Returns the device error from the → 0 transition.  The count stays 0.
    pub fn release(&self, key: &KeyId) -> Result<u32, DeviceError> {
        let Some(slot) = self.existing_slot(key) else {
            debug!("release '{key}' ignored: never pressed");
            return Ok(0);
        };
        let mut state = lock(&slot);
        if state.count == 0 {
            debug!("release '{key}' ignored: count already 0");
            return Ok(0);
        }
        state.count -= 1;
        debug!("release '{key}' → {}", state.count);
        if state.count == 0 {
            let lifted = state.pressed_as.take().unwrap_or_else(|| key.clone());
            self.device.set_key_state(&lifted, false)?;
        }
        Ok(state.count)
    }

    /// Issues exactly one [`release`](Self::release) per entry of `keys`.
    ///
    /// Duplicates are released once per occurrence.  Every key is attempted
    /// even if an earlier release fails.
    ///
    /// # Errors
    ///
    /// Returns the first device error encountered.
    pub fn force_release_all<'a, I>(&self, keys: I) -> Result<(), DeviceError>
    where
        I: IntoIterator<Item = &'a KeyId>,
    {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.release(key) {
                warn!("forced release of '{key}' failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Forces every held key to count 0 and lifts it on the device.
    ///
    /// Used on shutdown and after a fatal device error.  Best effort: every
    /// key is attempted.
    ///
    /// # Errors
    ///
    /// Returns the first device error encountered.
    pub fn release_everything(&self) -> Result<(), DeviceError> {
        let slots: Vec<Slot> = lock(&self.slots).values().map(Arc::clone).collect();

        let mut first_error = None;
        for slot in slots {
            let mut state = lock(&slot);
            if state.count == 0 {
                continue;
            }
            let count = std::mem::take(&mut state.count);
            let Some(key) = state.pressed_as.take() else {
                continue;
            };
            debug!("release everything: '{key}' {count} → 0");
            if let Err(e) = self.device.set_key_state(&key, false) {
                error!("failed to lift '{key}' during release-everything: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Current reference count of the physical key `key` names.
    pub fn count(&self, key: &KeyId) -> u32 {
        self.existing_slot(key).map_or(0, |slot| lock(&slot).count)
    }

    /// Held keys, one per physical key, spelled as first pressed; sorted.
    pub fn held_keys(&self) -> Vec<KeyId> {
        let slots = lock(&self.slots);
        let mut held: Vec<KeyId> = slots
            .values()
            .filter_map(|slot| {
                let state = lock(slot);
                let held = if state.count > 0 {
                    state.pressed_as.clone()
                } else {
                    None
                };
                held
            })
            .collect();
        held.sort();
        held
    }

    fn slot(&self, key: &KeyId) -> Slot {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(PhysicalKey::of(key)).or_default())
    }

    fn existing_slot(&self, key: &KeyId) -> Option<Slot> {
        lock(&self.slots).get(&PhysicalKey::of(key)).map(Arc::clone)
    }
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
///
/// A count is a plain integer that is always written in one step, so a
/// poisoned slot still holds a meaningful value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
