//! Connection request parsing.
//!
//! A phone opens `ws://host:port/ws/{playerId}?layout={layoutName}`.  Both
//! parts are required: the player number selects the keybind-table column and
//! the layout name selects the snapshot the session plays with.
//!
//! The layout name is URL-decoded (`My%20Pad` → `My Pad`).

use std::num::NonZeroU32;

use thiserror::Error;
use url::Url;

use padlink_core::PlayerToken;

/// Why a connection request was refused before the handshake completed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("unsupported path '{0}' (expected /ws/{{playerId}})")]
    BadPath(String),

    #[error("invalid player id '{0}' (expected a positive integer)")]
    BadPlayer(String),

    #[error("missing 'layout' query parameter")]
    MissingLayout,
}

/// A validated connection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub player: NonZeroU32,
    pub layout: String,
}

impl ConnectRequest {
    /// Parses the request target of the WebSocket upgrade (path plus query).
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] describing the first problem found.
    pub fn parse(path_and_query: &str) -> Result<Self, ConnectError> {
        let bad_path = || ConnectError::BadPath(path_and_query.to_string());

        if !path_and_query.starts_with('/') {
            return Err(bad_path());
        }
        let url = Url::parse(&format!("ws://localhost{path_and_query}")).map_err(|_| bad_path())?;

        let mut segments = url.path_segments().ok_or_else(bad_path)?;
        if segments.next() != Some("ws") {
            return Err(bad_path());
        }
        let raw_player = segments.next().ok_or_else(bad_path)?;
        // Tolerate a single trailing slash.
        match (segments.next(), segments.next()) {
            (None, _) | (Some(""), None) => {}
            _ => return Err(bad_path()),
        }

        let player = raw_player
            .parse::<NonZeroU32>()
            .map_err(|_| ConnectError::BadPlayer(raw_player.to_string()))?;

        let layout = url
            .query_pairs()
            .find(|(key, _)| key == "layout")
            .map(|(_, value)| value.into_owned())
            .filter(|name| !name.is_empty())
            .ok_or(ConnectError::MissingLayout)?;

        Ok(Self { player, layout })
    }

    /// Keybind-table column this player reads from.
    pub fn token(&self) -> PlayerToken {
        PlayerToken::for_player(self.player)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
