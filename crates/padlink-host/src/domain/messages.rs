//! JSON message types for the phone-facing WebSocket protocol.
//!
//! Phones send one text frame per touch transition:
//!
//! ```json
//! {"itemId":"up_button","action":"down"}
//! {"itemId":"up_button","action":"up"}
//! ```
//!
//! The host never sends application messages back; the only server-to-phone
//! traffic is the WebSocket Close frame when a layout cannot be loaded.

use serde::{Deserialize, Serialize};

/// Touch transition on a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    Down,
    Up,
}

/// One inbound button event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonEvent {
    /// Item id within the session's layout.
    pub item_id: String,
    pub action: ButtonAction,
}

impl ButtonEvent {
    pub fn down(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            action: ButtonAction::Down,
        }
    }

    pub fn up(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            action: ButtonAction::Up,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
