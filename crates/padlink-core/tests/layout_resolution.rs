//! Integration tests for layout documents and keybind resolution.
//!
//! These tests go through the public API only, the way the host uses it:
//! parse the editor's layouts JSON, build a [`Layout`] snapshot, and resolve
//! button presses for several players.  The editor flow (capture a keybind,
//! save, reload) is exercised end to end as well.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use padlink_core::{
    default_layouts, linux_key_code, resolve, KeyDisposition, KeyId, KeybindCapture, Layout,
    LayoutDocument, PlayerToken, ResolveError,
};

fn player(n: u32) -> PlayerToken {
    PlayerToken::Player(NonZeroU32::new(n).unwrap())
}

const LAYOUTS_JSON: &str = r#"{
    "Arrows": { "items": [
        { "i": "up-btn", "x": 0, "y": 0, "keybinds": { "default": "ArrowUp" } },
        { "i": "jump", "x": 1, "y": 0, "icon": "A",
          "keybinds": { "default": "w", "player2": "i" } },
        { "i": "unbound", "x": 2, "y": 0, "keybinds": { "default": "" } }
    ] },
    "Empty": { "items": [] }
}"#;

fn load(name: &str) -> Layout {
    let mut docs: BTreeMap<String, LayoutDocument> = serde_json::from_str(LAYOUTS_JSON).unwrap();
    let doc = docs.remove(name).unwrap();
    Layout::from_document(name, doc).unwrap()
}

#[test]
fn test_resolution_over_parsed_document() {
    // Arrange
    let layout = load("Arrows");

    // Act / Assert
    assert_eq!(resolve(&layout, "up-btn", player(1)), Ok(KeyId::from("ArrowUp")));
    assert_eq!(resolve(&layout, "jump", player(1)), Ok(KeyId::from("w")));
    assert_eq!(resolve(&layout, "jump", player(2)), Ok(KeyId::from("i")));
    assert!(matches!(
        resolve(&layout, "unbound", player(1)),
        Err(ResolveError::NoKeybind { .. })
    ));
    assert!(matches!(
        resolve(&layout, "ghost", player(1)),
        Err(ResolveError::NotFound { .. })
    ));
}

#[test]
fn test_empty_layout_document_has_no_items() {
    assert!(load("Empty").is_empty());
}

#[test]
fn test_every_seed_binding_has_a_linux_key_code() {
    for (name, doc) in default_layouts() {
        let layout = Layout::from_document(name.clone(), doc).unwrap();
        for item in layout.items() {
            for key in item.keybinds.values() {
                assert!(
                    linux_key_code(key).is_some(),
                    "layout {name}, item {}: '{key}' has no key code",
                    item.id
                );
            }
        }
    }
}

#[test]
fn test_captured_keybind_survives_save_and_reload() {
    // Arrange
    let mut doc = default_layouts().remove("Arrows").unwrap();
    let mut capture = KeybindCapture::new();
    capture.begin_keybind(player(4)).unwrap();

    // Act: the editor intercepts two key presses (binding, then label).
    for raw_key in ["Space", "J"] {
        if let KeyDisposition::Consumed(outcome) = capture.on_key(raw_key) {
            doc.items[0].apply_capture(outcome);
        }
    }
    let saved = serde_json::to_string(&doc).unwrap();
    let reloaded: LayoutDocument = serde_json::from_str(&saved).unwrap();
    let layout = Layout::from_document("Arrows", reloaded).unwrap();

    // Assert
    let first_id = doc.items[0].id.clone();
    assert_eq!(resolve(&layout, &first_id, player(4)), Ok(KeyId::from("Space")));
    assert_eq!(layout.item(&first_id).unwrap().icon.as_deref(), Some("J"));
    assert!(layout.item(&first_id).unwrap().extra.contains_key("x"));
}
