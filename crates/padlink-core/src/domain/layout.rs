//! Layout snapshots: the button panel a player's phone renders.
//!
//! A [`Layout`] is a named set of [`Item`]s.  Each item is one on-screen
//! button and carries a *keybind table* that says which key the button presses
//! for each player.
//!
//! # Keybind tables (for beginners)
//!
//! The same layout is usually shared by several players.  Rather than making
//! one layout per player, every item stores a small map from *player token* to
//! key:
//!
//! ```json
//! { "default": "ArrowUp", "player2": "w", "player3": "i" }
//! ```
//!
//! Player 2 pressing this button presses `w`; player 1 has no override and
//! falls back to `default`, so they press `ArrowUp`.  The fallback rule itself
//! lives in [`crate::domain::resolver`].
//!
//! # Snapshot semantics
//!
//! The host fetches a fresh `Layout` for every session and never mutates it
//! afterwards.  Two players on the same named layout each hold their own copy,
//! so an edit made in the editor only reaches sessions opened after the save.
//!
//! # Document format
//!
//! Layouts arrive as JSON produced by the editor.  The editor names the item
//! identifier `i` (a grid-library convention); `id` is accepted as well.
//! Editor-only fields such as `x` and `y` are preserved untouched in
//! [`Item::extra`] so a document survives a load/save cycle.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::capture::CaptureOutcome;

/// Errors raised while building a [`Layout`] from a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Two items in one layout share an identifier.
    #[error("layout '{layout}' contains item '{item}' more than once")]
    DuplicateItem { layout: String, item: String },

    /// An item has an empty identifier and could never be addressed.
    #[error("layout '{layout}' contains an item with an empty id")]
    EmptyItemId { layout: String },
}

// ── KeyId ─────────────────────────────────────────────────────────────────────

/// Opaque name of a physical key on the virtual keyboard (e.g. `"ArrowUp"`).
///
/// Many items, across many players, may resolve to the same key.  Different
/// spellings (`"a"`, `"A"`, `"KeyA"`) can name one physical key; the host
/// counts presses per [`PhysicalKey`](crate::keymap::PhysicalKey), not per
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty key id means "no binding" in a keybind table.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for KeyId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ── PlayerToken ───────────────────────────────────────────────────────────────

/// Key into an item's keybind table.
///
/// The editor offers `default` and `player1`..`player4`, but any positive
/// player number is representable: a player without an entry simply falls back
/// to `default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerToken {
    Default,
    Player(NonZeroU32),
}

impl PlayerToken {
    /// The token a connected player's lookups start from.
    pub fn for_player(player: NonZeroU32) -> Self {
        PlayerToken::Player(player)
    }

    /// The string used as the keybind-table key.
    pub fn table_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PlayerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerToken::Default => f.write_str("default"),
            PlayerToken::Player(n) => write!(f, "player{n}"),
        }
    }
}

/// Error for a string that is neither `default` nor `player<N>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid player token '{0}'")]
pub struct InvalidPlayerToken(pub String);

impl FromStr for PlayerToken {
    type Err = InvalidPlayerToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "default" {
            return Ok(PlayerToken::Default);
        }
        s.strip_prefix("player")
            .and_then(|n| n.parse::<NonZeroU32>().ok())
            .map(PlayerToken::Player)
            .ok_or_else(|| InvalidPlayerToken(s.to_string()))
    }
}

// ── Item ──────────────────────────────────────────────────────────────────────

/// One button in a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Identifier unique within the layout.
    #[serde(rename = "i", alias = "id")]
    pub id: String,

    /// Label shown on the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Player token (`default`, `player1`, ...) → key id.
    #[serde(default)]
    pub keybinds: BTreeMap<String, KeyId>,

    /// Editor-owned fields (position, size, ...).  Never read by the host.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Item {
    /// Creates an item with a `default` binding only.
    pub fn new(id: impl Into<String>, default_key: impl Into<KeyId>) -> Self {
        let mut keybinds = BTreeMap::new();
        keybinds.insert(PlayerToken::Default.table_key(), default_key.into());
        Self {
            id: id.into(),
            icon: None,
            keybinds,
            extra: serde_json::Map::new(),
        }
    }

    /// Builder-style override for one player token.
    pub fn with_keybind(mut self, token: PlayerToken, key: impl Into<KeyId>) -> Self {
        self.set_keybind(token, key);
        self
    }

    /// Returns the non-empty binding stored for exactly `token`, without fallback.
    pub fn keybind(&self, token: PlayerToken) -> Option<&KeyId> {
        self.keybinds
            .get(&token.table_key())
            .filter(|key| !key.is_empty())
    }

    pub fn set_keybind(&mut self, token: PlayerToken, key: impl Into<KeyId>) {
        self.keybinds.insert(token.table_key(), key.into());
    }

    /// Stores the value captured by the editor's [`KeybindCapture`] machine.
    ///
    /// [`KeybindCapture`]: crate::domain::capture::KeybindCapture
    pub fn apply_capture(&mut self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::Keybind { token, key } => self.set_keybind(token, key),
            CaptureOutcome::Label(label) => self.icon = Some(label),
        }
    }
}

// ── Layout ────────────────────────────────────────────────────────────────────

/// The serialized body of one named layout: `{"items": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Immutable snapshot of a named layout, indexed by item id.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    name: String,
    items: HashMap<String, Item>,
}

impl Layout {
    /// Builds a layout, rejecting duplicate or empty item ids.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::DuplicateItem`] or [`LayoutError::EmptyItemId`].
    pub fn new(
        name: impl Into<String>,
        items: impl IntoIterator<Item = Item>,
    ) -> Result<Self, LayoutError> {
        let name = name.into();
        let mut by_id = HashMap::new();
        for item in items {
            if item.id.is_empty() {
                return Err(LayoutError::EmptyItemId { layout: name });
            }
            if by_id.contains_key(&item.id) {
                return Err(LayoutError::DuplicateItem {
                    layout: name,
                    item: item.id,
                });
            }
            by_id.insert(item.id.clone(), item);
        }
        Ok(Self { name, items: by_id })
    }

    /// Builds a layout from its JSON document body.
    ///
    /// # Errors
    ///
    /// Same as [`Layout::new`].
    pub fn from_document(name: impl Into<String>, doc: LayoutDocument) -> Result<Self, LayoutError> {
        Self::new(name, doc.items)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ── Built-in layouts ──────────────────────────────────────────────────────────

fn arrow_item(id: &str, x: i64, y: i64, icon: &str, keys: [&str; 4]) -> Item {
    let [default, p1, p2, p3] = keys;
    let mut item = Item::new(id, default)
        .with_keybind(player(1), p1)
        .with_keybind(player(2), p2)
        .with_keybind(player(3), p3);
    item.icon = Some(icon.to_string());
    item.extra.insert("x".to_string(), x.into());
    item.extra.insert("y".to_string(), y.into());
    item
}

fn player(n: u32) -> PlayerToken {
    NonZeroU32::new(n).map_or(PlayerToken::Default, PlayerToken::Player)
}

fn arrows_document() -> LayoutDocument {
    LayoutDocument {
        items: vec![
            arrow_item("up_button", 100, 0, "↑", ["ArrowUp", "ArrowUp", "w", "i"]),
            arrow_item("down_button", 100, 100, "↓", ["ArrowDown", "ArrowDown", "s", "k"]),
            arrow_item("left_button", 0, 100, "←", ["ArrowLeft", "ArrowLeft", "a", "j"]),
            arrow_item("right_button", 200, 100, "→", ["ArrowRight", "ArrowRight", "d", "l"]),
        ],
    }
}

/// Layouts served when no layouts file exists yet: `Arrows` and `default`,
/// both four arrow buttons with per-player overrides for players 1–3.
pub fn default_layouts() -> BTreeMap<String, LayoutDocument> {
    let mut layouts = BTreeMap::new();
    layouts.insert("Arrows".to_string(), arrows_document());
    layouts.insert("default".to_string(), arrows_document());
    layouts
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn p(n: u32) -> PlayerToken {
        PlayerToken::Player(NonZeroU32::new(n).unwrap())
    }

    #[test]
    fn test_player_token_display_matches_table_keys() {
        assert_eq!(PlayerToken::Default.to_string(), "default");
        assert_eq!(p(3).to_string(), "player3");
    }

    #[test]
    fn test_player_token_parses_default_and_players() {
        assert_eq!("default".parse::<PlayerToken>().unwrap(), PlayerToken::Default);
        assert_eq!("player4".parse::<PlayerToken>().unwrap(), p(4));
    }

    #[test]
    fn test_player_token_rejects_zero_and_garbage() {
        assert!("player0".parse::<PlayerToken>().is_err());
        assert!("playerX".parse::<PlayerToken>().is_err());
        assert!("Player1".parse::<PlayerToken>().is_err());
    }

    #[test]
    fn test_item_deserializes_editor_document_with_i_field() {
        // Arrange
        let json = r#"{"i":"up_button","x":100,"y":0,"icon":"↑",
                       "keybinds":{"default":"ArrowUp","player2":"w"}}"#;

        // Act
        let item: Item = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(item.id, "up_button");
        assert_eq!(item.icon.as_deref(), Some("↑"));
        assert_eq!(item.keybind(PlayerToken::Default), Some(&KeyId::from("ArrowUp")));
        assert_eq!(item.keybind(p(2)), Some(&KeyId::from("w")));
        assert_eq!(item.extra.get("x"), Some(&serde_json::json!(100)));
    }

    #[test]
    fn test_item_accepts_id_alias() {
        let item: Item = serde_json::from_str(r#"{"id":"b1","keybinds":{}}"#).unwrap();
        assert_eq!(item.id, "b1");
        assert!(item.keybinds.is_empty());
    }

    #[test]
    fn test_item_serialization_preserves_editor_fields() {
        // Arrange
        let json = r#"{"i":"a","x":3,"y":4,"w":2,"keybinds":{"default":"a"}}"#;
        let item: Item = serde_json::from_str(json).unwrap();

        // Act
        let value = serde_json::to_value(&item).unwrap();

        // Assert
        assert_eq!(value["i"], "a");
        assert_eq!(value["x"], 3);
        assert_eq!(value["w"], 2);
    }

    #[test]
    fn test_keybind_treats_empty_entry_as_absent() {
        let item = Item::new("b", "");
        assert_eq!(item.keybind(PlayerToken::Default), None);
    }

    #[test]
    fn test_layout_new_rejects_duplicate_ids() {
        // Arrange
        let items = vec![Item::new("a", "x"), Item::new("a", "y")];

        // Act
        let result = Layout::new("dup", items);

        // Assert
        assert_eq!(
            result,
            Err(LayoutError::DuplicateItem {
                layout: "dup".to_string(),
                item: "a".to_string()
            })
        );
    }

    #[test]
    fn test_layout_new_rejects_empty_id() {
        let result = Layout::new("blank", vec![Item::new("", "x")]);
        assert!(matches!(result, Err(LayoutError::EmptyItemId { .. })));
    }

    #[test]
    fn test_layout_indexes_items_by_id() {
        let layout = Layout::new("L", vec![Item::new("a", "x"), Item::new("b", "y")]).unwrap();
        assert_eq!(layout.name(), "L");
        assert_eq!(layout.len(), 2);
        assert!(layout.item("b").is_some());
        assert!(layout.item("c").is_none());
    }

    #[test]
    fn test_layout_document_without_items_is_empty() {
        let doc: LayoutDocument = serde_json::from_str("{}").unwrap();
        let layout = Layout::from_document("empty", doc).unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn test_default_layouts_contain_arrows_with_player_overrides() {
        // Arrange / Act
        let layouts = default_layouts();
        let arrows = Layout::from_document("Arrows", layouts["Arrows"].clone()).unwrap();

        // Assert
        assert!(layouts.contains_key("default"));
        assert_eq!(arrows.len(), 4);
        let up = arrows.item("up_button").unwrap();
        assert_eq!(up.keybind(PlayerToken::Default), Some(&KeyId::from("ArrowUp")));
        assert_eq!(up.keybind(p(2)), Some(&KeyId::from("w")));
        assert_eq!(up.keybind(p(3)), Some(&KeyId::from("i")));
        assert_eq!(up.keybind(p(4)), None);
    }
}
