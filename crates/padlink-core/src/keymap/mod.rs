//! Key-name translation for the virtual keyboard.
//!
//! Key ids in layouts are whatever the editor captured from the browser:
//! usually a `KeyboardEvent.key` value (`"ArrowUp"`, `"a"`, `" "`, `"Shift"`),
//! sometimes a `KeyboardEvent.code` value (`"KeyA"`, `"Digit1"`), and
//! occasionally a Linux-style name typed by hand (`"KEY_UP"`, `"esc"`).
//!
//! [`linux_key_code`] folds all three spellings onto the Linux input event
//! codes from `<linux/input-event-codes.h>` that the uinput device needs.
//!
//! The mapping is positional, not character-based: `"A"` and `"a"` are the
//! same physical key, and shifted symbols such as `"!"` have no mapping since
//! a single key id cannot express "hold Shift too".
//!
//! [`PhysicalKey`] is the identity the host counts presses by, so `"a"`,
//! `"A"` and `"KeyA"` held by different players are one key, not three.

pub mod linux_input;

use crate::domain::layout::KeyId;

/// Translates a key id to a Linux `KEY_*` code.
///
/// Returns `None` for names with no single-key equivalent.
pub fn linux_key_code(key: &KeyId) -> Option<u16> {
    let name = key.as_str();

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return linux_input::char_code(c);
    }

    let upper = name.to_ascii_uppercase();
    let upper = upper.strip_prefix("KEY_").unwrap_or(&upper);

    // DOM `code` spellings: KeyA..KeyZ, Digit0..Digit9.
    if let Some(rest) = upper.strip_prefix("KEY").filter(|r| r.len() == 1) {
        return rest.chars().next().and_then(linux_input::char_code);
    }
    if let Some(rest) = upper.strip_prefix("DIGIT").filter(|r| r.len() == 1) {
        return rest.chars().next().and_then(linux_input::char_code);
    }

    linux_input::named_code(upper)
}

/// The physical key a key id drives.
///
/// Ids with the same [`linux_key_code`] are the same key.  Ids with no code
/// are only equal to themselves (exact spelling).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhysicalKey {
    Code(u16),
    Unmapped(KeyId),
}

impl PhysicalKey {
    pub fn of(key: &KeyId) -> Self {
        match linux_key_code(key) {
            Some(code) => PhysicalKey::Code(code),
            None => PhysicalKey::Unmapped(key.clone()),
        }
    }
}
