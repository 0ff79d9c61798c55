//! SessionManager: opens sessions, tracks who is connected, and stops
//! everything when the keyboard fails.
//!
//! # Opening a session
//!
//! ```text
//! ConnectRequest ─► Session(Connecting) ─► LayoutStore::get_layout(name)
//!                                              │ Ok(non-empty) → Active
//!                                              │ Err / empty   → Closed (rejected)
//! ```
//!
//! # Halting (for beginners)
//!
//! A failed write to the virtual keyboard means key state can no longer be
//! trusted, so it is fatal for the whole host.  Any session that sees a
//! [`SessionError::DeviceFailure`] calls [`SessionManager::escalate`], which
//! records the error and flips a `tokio::sync::watch` flag.  Every session
//! task waits on that flag next to its socket, so all of them wake up, tear
//! down, and the server loop exits with the recorded error.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use padlink_core::{Layout, LayoutError};

use crate::application::multiplexer::{DeviceError, KeyMultiplexer};
use crate::application::session::{RejectReason, Session, SessionError};
use crate::domain::ConnectRequest;

// ── Layout store port ─────────────────────────────────────────────────────────

/// Error type for layout lookups.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("layout '{0}' not found")]
    NotFound(String),

    #[error("failed to read layouts from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] LayoutError),
}

/// Source of layout snapshots.
///
/// Each call returns a fresh, independent [`Layout`]; sessions never share one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LayoutStore: Send + Sync {
    async fn get_layout(&self, name: &str) -> Result<Layout, StoreError>;
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// What the registry remembers about a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub player: NonZeroU32,
    pub layout: String,
}

/// Active sessions by id.  Several sessions may share a player number.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionInfo>>,
}

impl SessionRegistry {
    /// Adds a session; returns the new total.
    pub(crate) fn insert(&self, id: Uuid, info: SessionInfo) -> usize {
        let mut sessions = self.lock();
        sessions.insert(id, info);
        sessions.len()
    }

    /// Removes a session; returns the new total.
    pub(crate) fn remove(&self, id: Uuid) -> usize {
        let mut sessions = self.lock();
        sessions.remove(&id);
        sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Distinct player numbers currently connected, ascending.
    pub fn players(&self) -> Vec<NonZeroU32> {
        let mut players: Vec<NonZeroU32> = self.lock().values().map(|info| info.player).collect();
        players.sort();
        players.dedup();
        players
    }

    pub fn snapshot(&self) -> Vec<(Uuid, SessionInfo)> {
        self.lock()
            .iter()
            .map(|(id, info)| (*id, info.clone()))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionInfo>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Manager ───────────────────────────────────────────────────────────────────

pub struct SessionManager {
    store: Arc<dyn LayoutStore>,
    mux: Arc<KeyMultiplexer>,
    registry: Arc<SessionRegistry>,
    halt_tx: watch::Sender<bool>,
    fatal: Mutex<Option<DeviceError>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn LayoutStore>, mux: Arc<KeyMultiplexer>) -> Self {
        let (halt_tx, _) = watch::channel(false);
        Self {
            store,
            mux,
            registry: Arc::new(SessionRegistry::default()),
            halt_tx,
            fatal: Mutex::new(None),
        }
    }

    pub fn multiplexer(&self) -> &Arc<KeyMultiplexer> {
        &self.mux
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Runs `Connecting` for `request` and returns the active session.
    ///
    /// # Errors
    ///
    /// [`SessionError::ConnectionRejected`] if the host is halting, or the
    /// layout is unknown, unreadable or empty.
    pub async fn open(&self, request: ConnectRequest) -> Result<Session, SessionError> {
        let mut session =
            Session::connecting(request, Arc::clone(&self.mux), Arc::clone(&self.registry));

        if self.is_halted() {
            session.reject();
            return Err(RejectReason::ShuttingDown.into());
        }

        match self.store.get_layout(session.layout_name()).await {
            Ok(layout) => {
                session.activate(layout)?;
                Ok(session)
            }
            Err(source) => {
                session.reject();
                Err(RejectReason::LayoutUnavailable {
                    layout: session.layout_name().to_string(),
                    source,
                }
                .into())
            }
        }
    }

    /// Closes `session`, escalating a device failure during cleanup.
    pub fn end(&self, mut session: Session) {
        if let Err(e) = session.close() {
            self.escalate(&e);
        }
    }

    /// Halts the host if `error` is fatal.  Returns `true` in that case.
    pub fn escalate(&self, error: &SessionError) -> bool {
        match error {
            SessionError::DeviceFailure(device_error) => {
                self.report_fatal(device_error.clone());
                true
            }
            _ => false,
        }
    }

    /// Records a fatal device error (the first one wins) and halts.
    pub fn report_fatal(&self, error: DeviceError) {
        {
            let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
            if fatal.is_none() {
                error!("fatal device error, halting all sessions: {error}");
                *fatal = Some(error);
            }
        }
        self.halt();
    }

    pub fn fatal_error(&self) -> Option<DeviceError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tells every session task to tear down.
    pub fn halt(&self) {
        if !self.halt_tx.send_replace(true) {
            info!("halting {} session(s)", self.registry.len());
        }
    }

    pub fn is_halted(&self) -> bool {
        *self.halt_tx.borrow()
    }

    /// Receiver that changes to `true` once [`halt`](Self::halt) is called.
    pub fn subscribe_halt(&self) -> watch::Receiver<bool> {
        self.halt_tx.subscribe()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
