//! Global key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// A key combination. `ctrl` accepts either Ctrl or the platform
/// command key (Super); `shift` and `alt` must match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub key: char,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

/// Ctrl/Cmd + K opens quick add
pub const QUICK_ADD: Shortcut = Shortcut {
    key: 'k',
    ctrl: true,
    shift: false,
    alt: false,
};

/// Where keyboard focus currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Nothing editable has focus
    Idle,
    /// A plain text field (input, textarea, editable region)
    TextInput,
    /// A text field inside an open dialog
    DialogInput,
}

impl Shortcut {
    /// Whether `event` is this key combination, ignoring focus.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        let KeyCode::Char(c) = event.code else {
            return false;
        };
        let mods = event.modifiers;
        // without a ctrl requirement the ctrl state is not checked
        let ctrl_ok = !self.ctrl || mods.intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER);
        let shift_ok = self.shift == mods.contains(KeyModifiers::SHIFT);
        let alt_ok = self.alt == mods.contains(KeyModifiers::ALT);
        ctrl_ok && shift_ok && alt_ok && c.to_lowercase().eq(self.key.to_lowercase())
    }
}

/// Match `event` against `shortcut`, except while the user is typing in a
/// text field that is not part of a dialog.
pub fn should_trigger(shortcut: &Shortcut, event: &KeyEvent, focus: Focus) -> bool {
    if focus == Focus::TextInput {
        return false;
    }
    shortcut.matches(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), mods)
    }

    #[test]
    fn ctrl_or_cmd_k() {
        assert!(QUICK_ADD.matches(&key('k', KeyModifiers::CONTROL)));
        assert!(QUICK_ADD.matches(&key('k', KeyModifiers::SUPER)));
        assert!(QUICK_ADD.matches(&key('K', KeyModifiers::CONTROL)));
        assert!(!QUICK_ADD.matches(&key('k', KeyModifiers::NONE)));
        assert!(!QUICK_ADD.matches(&key('j', KeyModifiers::CONTROL)));
    }

    #[test]
    fn extra_shift_or_alt_rejects() {
        assert!(!QUICK_ADD.matches(&key('k', KeyModifiers::CONTROL | KeyModifiers::SHIFT)));
        assert!(!QUICK_ADD.matches(&key('k', KeyModifiers::CONTROL | KeyModifiers::ALT)));
        let shifted = Shortcut {
            key: 'n',
            ctrl: true,
            shift: true,
            alt: false,
        };
        assert!(shifted.matches(&key('N', KeyModifiers::CONTROL | KeyModifiers::SHIFT)));
    }

    #[test]
    fn suppressed_in_plain_text_input() {
        let event = key('k', KeyModifiers::CONTROL);
        assert!(should_trigger(&QUICK_ADD, &event, Focus::Idle));
        assert!(should_trigger(&QUICK_ADD, &event, Focus::DialogInput));
        assert!(!should_trigger(&QUICK_ADD, &event, Focus::TextInput));
    }

    #[test]
    fn non_char_keys_never_match() {
        let event = KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL);
        assert!(!QUICK_ADD.matches(&event));
    }
}
