//! Keybind capture: the editor's "press a key to bind it" interaction.
//!
//! When the user clicks "set keybind for player 2" in the editor, the *next*
//! physical key press must not reach the page; it becomes the binding.  After
//! a binding the editor asks for a label the same way.  A label can also be
//! captured on its own.
//!
//! ```text
//!        begin_keybind(p)          key                 key
//! Idle ─────────────────► AwaitingKeybind(p) ──► AwaitingLabel ──► Idle
//!   │                                                  ▲
//!   └──────────────────── begin_label() ───────────────┘
//! ```
//!
//! Only one capture can be in flight at a time (there is one keyboard focus),
//! so the editor owns exactly one [`KeybindCapture`].  Starting a capture while
//! another is pending is rejected instead of silently discarding the first.

use thiserror::Error;

use crate::domain::layout::{KeyId, PlayerToken};

/// Where the capture machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    AwaitingKeybind(PlayerToken),
    AwaitingLabel,
}

/// A value consumed from an intercepted key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Keybind { token: PlayerToken, key: KeyId },
    Label(String),
}

/// What the editor must do with a raw key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDisposition {
    /// No capture pending; deliver the key to the page normally.
    Deliver,
    /// The key was swallowed and produced this value.
    Consumed(CaptureOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("a capture is already in progress ({0:?})")]
    Busy(CaptureState),
}

/// Single-focus capture state machine.
#[derive(Debug, Default)]
pub struct KeybindCapture {
    state: CaptureState,
}

impl KeybindCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// `Idle → AwaitingKeybind(token)`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Busy`] unless the machine is idle.
    pub fn begin_keybind(&mut self, token: PlayerToken) -> Result<(), CaptureError> {
        self.begin(CaptureState::AwaitingKeybind(token))
    }

    /// `Idle → AwaitingLabel`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Busy`] unless the machine is idle.
    pub fn begin_label(&mut self) -> Result<(), CaptureError> {
        self.begin(CaptureState::AwaitingLabel)
    }

    /// Abandons any pending capture (focus lost, dialog closed).
    pub fn cancel(&mut self) {
        self.state = CaptureState::Idle;
    }

    /// Feeds one raw key press through the machine.
    pub fn on_key(&mut self, key: &str) -> KeyDisposition {
        let (next, disposition) = match self.state {
            CaptureState::Idle => (CaptureState::Idle, KeyDisposition::Deliver),
            CaptureState::AwaitingKeybind(token) => (
                CaptureState::AwaitingLabel,
                KeyDisposition::Consumed(CaptureOutcome::Keybind {
                    token,
                    key: KeyId::from(key),
                }),
            ),
            CaptureState::AwaitingLabel => (
                CaptureState::Idle,
                KeyDisposition::Consumed(CaptureOutcome::Label(key.to_string())),
            ),
        };
        self.state = next;
        disposition
    }

    fn begin(&mut self, next: CaptureState) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::Busy(self.state));
        }
        self.state = next;
        Ok(())
    }
}
