//! Application layer for padlink-host.
//!
//! - [`multiplexer`] – reference-counted key state over one [`KeyDevice`].
//! - [`session`] – one connected phone: lifecycle and held keys.
//! - [`session_manager`] – opening sessions through a [`LayoutStore`], the
//!   session registry, and the host-wide halt signal.
//!
//! Nothing here knows about sockets or files; those arrive through the
//! [`KeyDevice`] and [`LayoutStore`] traits.

pub mod multiplexer;
pub mod session;
pub mod session_manager;

pub use multiplexer::{DeviceError, KeyDevice, KeyMultiplexer};
pub use session::{
    EventOutcome, RejectReason, Session, SessionError, SessionState, SessionTransition,
};
pub use session_manager::{
    LayoutStore, SessionInfo, SessionManager, SessionRegistry, StoreError,
};
