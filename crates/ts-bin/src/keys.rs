//! Key routing between the edit target, the global bindings and the input line.

use core_events::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRoute {
    /// Save the edit target and hand the cursor back to the input line.
    EndEdit,
    /// Deliver to the edit target.
    Edit,
    EditNotes,
    /// Page the primary panel (`true` = forward).
    Page(bool),
    /// Scroll the secondary stack (`true` = toward its bottom).
    Stack(bool),
    /// Deliver to the input line.
    Input,
}

pub fn route(key: &KeyEvent, editing: bool) -> KeyRoute {
    match (key.code, key.mods.contains(KeyModifiers::ALT)) {
        (KeyCode::PageUp, _) => KeyRoute::Page(false),
        (KeyCode::PageDown, _) => KeyRoute::Page(true),
        (KeyCode::Up, true) => KeyRoute::Stack(false),
        (KeyCode::Down, true) => KeyRoute::Stack(true),
        (KeyCode::Esc, _) if editing => KeyRoute::EndEdit,
        (KeyCode::F(2), _) if !editing => KeyRoute::EditNotes,
        _ if editing => KeyRoute::Edit,
        _ => KeyRoute::Input,
    }
}
