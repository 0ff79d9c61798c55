//! Keybind resolution: which key does this button press for this player?
//!
//! [`resolve`] is a pure function over an immutable [`Layout`], so every
//! session task can call it concurrently without any locking.
//!
//! # Fallback policy
//!
//! 1. Unknown item id → [`ResolveError::NotFound`].
//! 2. Non-empty entry for the player's token → that key.
//! 3. Otherwise the non-empty `default` entry → that key.
//! 4. Otherwise → [`ResolveError::NoKeybind`].  Callers drop the event; the
//!    editor renders such buttons as "N/A".

use thiserror::Error;

use crate::domain::layout::{KeyId, Layout, PlayerToken};

/// Why an item press could not be turned into a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("item '{item}' does not exist in layout '{layout}'")]
    NotFound { layout: String, item: String },

    #[error("item '{item}' has no keybind for {token} and no default")]
    NoKeybind { item: String, token: PlayerToken },
}

/// Resolves `item_id` pressed by `token` to a key in `layout`.
///
/// # Errors
///
/// See the module-level fallback policy.
pub fn resolve(layout: &Layout, item_id: &str, token: PlayerToken) -> Result<KeyId, ResolveError> {
    let item = layout.item(item_id).ok_or_else(|| ResolveError::NotFound {
        layout: layout.name().to_string(),
        item: item_id.to_string(),
    })?;

    item.keybind(token)
        .or_else(|| item.keybind(PlayerToken::Default))
        .cloned()
        .ok_or_else(|| ResolveError::NoKeybind {
            item: item_id.to_string(),
            token,
        })
}
