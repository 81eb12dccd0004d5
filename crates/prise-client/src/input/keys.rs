use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use prise_protocol::wire_types::KeyDesc;

/// Normalizes a crossterm key event into the wire `key_desc` shape (§6
/// "W3C KeyboardEvent-compatible `key` values"). The UI accelerator/
/// pass-through decision (§4.7) is made by the caller; this only describes
/// what was pressed.
pub fn key_to_desc(event: KeyEvent) -> KeyDesc {
    let (key, code) = key_name_and_code(event.code, event.modifiers);
    KeyDesc {
        key,
        code,
        shift_key: event.modifiers.contains(KeyModifiers::SHIFT),
        ctrl_key: event.modifiers.contains(KeyModifiers::CONTROL),
        alt_key: event.modifiers.contains(KeyModifiers::ALT),
        meta_key: event.modifiers.contains(KeyModifiers::SUPER),
    }
}

fn key_name_and_code(code: KeyCode, modifiers: KeyModifiers) -> (String, String) {
    match code {
        KeyCode::Char(c) => {
            let key = if modifiers.contains(KeyModifiers::SHIFT) { c.to_ascii_uppercase().to_string() } else { c.to_string() };
            let physical = if c.is_ascii_alphabetic() {
                format!("Key{}", c.to_ascii_uppercase())
            } else if c.is_ascii_digit() {
                format!("Digit{c}")
            } else {
                key.clone()
            };
            (key, physical)
        }
        KeyCode::Enter => ("Enter".into(), "Enter".into()),
        KeyCode::Backspace => ("Backspace".into(), "Backspace".into()),
        KeyCode::Tab => ("Tab".into(), "Tab".into()),
        KeyCode::BackTab => ("Tab".into(), "Tab".into()),
        KeyCode::Esc => ("Escape".into(), "Escape".into()),
        KeyCode::Delete => ("Delete".into(), "Delete".into()),
        KeyCode::Insert => ("Insert".into(), "Insert".into()),
        KeyCode::Home => ("Home".into(), "Home".into()),
        KeyCode::End => ("End".into(), "End".into()),
        KeyCode::PageUp => ("PageUp".into(), "PageUp".into()),
        KeyCode::PageDown => ("PageDown".into(), "PageDown".into()),
        KeyCode::Up => ("ArrowUp".into(), "ArrowUp".into()),
        KeyCode::Down => ("ArrowDown".into(), "ArrowDown".into()),
        KeyCode::Left => ("ArrowLeft".into(), "ArrowLeft".into()),
        KeyCode::Right => ("ArrowRight".into(), "ArrowRight".into()),
        KeyCode::F(n) => (format!("F{n}"), format!("F{n}")),
        KeyCode::Null => ("Unidentified".into(), "Unidentified".into()),
        _ => ("Unidentified".into(), "Unidentified".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_letter_maps_to_its_own_key_value() {
        let desc = key_to_desc(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::empty()));
        assert_eq!(desc.key, "a");
        assert_eq!(desc.code, "KeyA");
        assert!(!desc.shift_key && !desc.ctrl_key);
    }

    #[test]
    fn shifted_letter_is_uppercased_and_flagged() {
        let desc = key_to_desc(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::SHIFT));
        assert_eq!(desc.key, "A");
        assert!(desc.shift_key);
    }

    #[test]
    fn ctrl_modifier_is_reported_independent_of_key_value() {
        let desc = key_to_desc(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(desc.key, "c");
        assert!(desc.ctrl_key);
    }

    #[test]
    fn arrow_keys_map_to_w3c_names() {
        let desc = key_to_desc(KeyEvent::new(KeyCode::Up, KeyModifiers::empty()));
        assert_eq!(desc.key, "ArrowUp");
    }

    #[test]
    fn function_keys_map_to_fn_names() {
        let desc = key_to_desc(KeyEvent::new(KeyCode::F(5), KeyModifiers::empty()));
        assert_eq!(desc.key, "F5");
    }
}
