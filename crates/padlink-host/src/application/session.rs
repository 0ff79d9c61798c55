//! Session: one connected phone.
//!
//! A session owns the player's identity, an immutable layout snapshot, and
//! the keys this player is currently holding.  It turns each inbound button
//! event into `press`/`release` calls on the shared [`KeyMultiplexer`].
//!
//! # Lifecycle
//!
//! ```text
//!              LayoutLoaded               Disconnect              Cleaned
//! Connecting ───────────────► Active ───────────────► Closing ───────────► Closed
//!     │                                                                      ▲
//!     └────────────────────────────── Rejected ──────────────────────────────┘
//! ```
//!
//! Only `Active` processes button events.  `Closing` force-releases every
//! held key exactly once; a session dropped without an explicit
//! [`close`](Session::close) still runs it from `Drop`.
//!
//! # Held keys (for beginners)
//!
//! Held keys are tracked per *item*, remembering the key resolved at press
//! time:
//!
//! - a second `down` for an item that is already held is ignored, so a
//!   phone that repeats `down` cannot leak a reference;
//! - two items bound to the same key hold two references, and each `up`
//!   releases its own;
//! - on teardown every remaining entry is released once.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use padlink_core::{resolve, KeyId, Layout, PlayerToken, ResolveError};

use crate::application::multiplexer::{DeviceError, KeyMultiplexer};
use crate::application::session_manager::{SessionInfo, SessionRegistry, StoreError};
use crate::domain::{ButtonAction, ButtonEvent, ConnectError, ConnectRequest};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a connection never became an active session.
#[derive(Debug, Error)]
pub enum RejectReason {
    #[error(transparent)]
    Request(#[from] ConnectError),

    #[error("layout '{layout}' could not be loaded: {source}")]
    LayoutUnavailable {
        layout: String,
        #[source]
        source: StoreError,
    },

    #[error("layout '{0}' has no items")]
    EmptyLayout(String),

    #[error("host is shutting down")]
    ShuttingDown,
}

/// Error taxonomy for session operations.
///
/// Only [`SessionError::DeviceFailure`] is fatal; the others are contained
/// in the session that produced them.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection rejected: {0}")]
    ConnectionRejected(#[from] RejectReason),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("unresolved keybind: {0}")]
    UnresolvedKeybind(#[from] ResolveError),

    #[error("device failure: {0}")]
    DeviceFailure(#[from] DeviceError),
}

impl SessionError {
    /// `true` if the whole host must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::DeviceFailure(_))
    }
}

// ── State machine ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Inputs that move a session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    LayoutLoaded,
    Rejected,
    Disconnect,
    Cleaned,
}

impl SessionState {
    /// Transition table; `None` means the input is not valid in this state.
    pub fn next(self, input: SessionTransition) -> Option<SessionState> {
        use SessionState::*;
        use SessionTransition::*;
        match (self, input) {
            (Connecting, LayoutLoaded) => Some(Active),
            (Connecting, Rejected) => Some(Closed),
            (Active, Disconnect) => Some(Closing),
            (Closing, Cleaned) => Some(Closed),
            _ => None,
        }
    }
}

/// What an accepted button event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The key gained a reference from this session.
    Pressed(KeyId),
    /// The key lost this session's reference.
    Released(KeyId),
    /// Nothing changed (repeated `down`, `up` for an item not held, or the
    /// session is not active).
    Ignored,
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct Session {
    id: Uuid,
    player: NonZeroU32,
    token: PlayerToken,
    layout_name: String,
    layout: Option<Layout>,
    held: HashMap<String, KeyId>,
    state: SessionState,
    mux: Arc<KeyMultiplexer>,
    registry: Arc<SessionRegistry>,
}

impl Session {
    /// Creates a session in `Connecting` for a validated request.
    pub fn connecting(
        request: ConnectRequest,
        mux: Arc<KeyMultiplexer>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            player: request.player,
            token: request.token(),
            layout_name: request.layout,
            layout: None,
            held: HashMap::new(),
            state: SessionState::Connecting,
            mux,
            registry,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn player(&self) -> NonZeroU32 {
        self.player
    }

    pub fn layout_name(&self) -> &str {
        &self.layout_name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Keys currently held by this session, one entry per held item, sorted.
    pub fn held_keys(&self) -> Vec<KeyId> {
        let mut keys: Vec<KeyId> = self.held.values().cloned().collect();
        keys.sort();
        keys
    }

    /// `Connecting → Active` with the loaded snapshot.
    ///
    /// # Errors
    ///
    /// An empty layout is rejected (`Connecting → Closed`).
    pub fn activate(&mut self, layout: Layout) -> Result<(), SessionError> {
        if layout.is_empty() {
            self.reject();
            return Err(RejectReason::EmptyLayout(self.layout_name.clone()).into());
        }
        let Some(next) = self.state.next(SessionTransition::LayoutLoaded) else {
            return Err(SessionError::ProtocolViolation(format!(
                "cannot activate a session in state {:?}",
                self.state
            )));
        };
        self.layout = Some(layout);
        self.state = next;
        let connected = self.registry.insert(
            self.id,
            SessionInfo {
                player: self.player,
                layout: self.layout_name.clone(),
            },
        );
        info!(
            "player {} joined with layout '{}' (session {}, {connected} connected)",
            self.player, self.layout_name, self.id
        );
        Ok(())
    }

    /// `Connecting → Closed` without ever becoming active.
    pub fn reject(&mut self) {
        if let Some(next) = self.state.next(SessionTransition::Rejected) {
            self.state = next;
        }
    }

    /// Parses one text frame and applies it.
    ///
    /// # Errors
    ///
    /// [`SessionError::ProtocolViolation`] for malformed JSON, plus
    /// everything [`handle_event`](Self::handle_event) returns.
    pub fn handle_text(&mut self, text: &str) -> Result<EventOutcome, SessionError> {
        let event: ButtonEvent = serde_json::from_str(text)
            .map_err(|e| SessionError::ProtocolViolation(format!("invalid button event: {e}")))?;
        self.handle_event(&event)
    }

    /// Applies one button event.
    ///
    /// # Errors
    ///
    /// - [`SessionError::UnresolvedKeybind`]: unknown item or no binding;
    ///   the event is dropped.
    /// - [`SessionError::DeviceFailure`]: the keyboard write failed.
    pub fn handle_event(&mut self, event: &ButtonEvent) -> Result<EventOutcome, SessionError> {
        let Some(layout) = self.layout.as_ref().filter(|_| self.state == SessionState::Active)
        else {
            debug!("session {}: event in state {:?} ignored", self.id, self.state);
            return Ok(EventOutcome::Ignored);
        };

        let key = resolve(layout, &event.item_id, self.token)?;

        match event.action {
            ButtonAction::Down => {
                if self.held.contains_key(&event.item_id) {
                    debug!("session {}: '{}' already held", self.id, event.item_id);
                    return Ok(EventOutcome::Ignored);
                }
                self.held.insert(event.item_id.clone(), key.clone());
                self.mux.press(&key)?;
                debug!("session {}: '{}' down → '{key}'", self.id, event.item_id);
                Ok(EventOutcome::Pressed(key))
            }
            ButtonAction::Up => {
                let Some(held_key) = self.held.remove(&event.item_id) else {
                    debug!("session {}: '{}' up without down", self.id, event.item_id);
                    return Ok(EventOutcome::Ignored);
                };
                self.mux.release(&held_key)?;
                debug!("session {}: '{}' up → '{held_key}'", self.id, event.item_id);
                Ok(EventOutcome::Released(held_key))
            }
        }
    }

    /// Tears the session down: releases every held key once and deregisters.
    ///
    /// Safe to call repeatedly; only the first call from `Active` does work.
    ///
    /// # Errors
    ///
    /// [`SessionError::DeviceFailure`] if a release write failed.  The
    /// session still ends in `Closed`.
    pub fn close(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connecting => {
                self.reject();
                return Ok(());
            }
            SessionState::Closing | SessionState::Closed => return Ok(()),
            SessionState::Active => {}
        }
        if let Some(next) = self.state.next(SessionTransition::Disconnect) {
            self.state = next;
        }

        let held: Vec<KeyId> = self.held.drain().map(|(_, key)| key).collect();
        let released = self.mux.force_release_all(&held);

        if let Some(next) = self.state.next(SessionTransition::Cleaned) {
            self.state = next;
        }
        let connected = self.registry.remove(self.id);
        info!(
            "player {} left (session {}, released {} key(s), {connected} connected)",
            self.player,
            self.id,
            held.len()
        );
        released.map_err(SessionError::from)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("session {}: cleanup on drop failed: {e}", self.id);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
