use alacritty_terminal::term::TermMode;
use prise_protocol::wire_types::{MouseDesc, MouseEventType};

/// Translates a W3C-style key descriptor into the byte sequence the shell
/// expects on its stdin, honoring the PTY's current keyboard mode (§4.5
/// `key_input`: "Translates ... to the appropriate byte sequence using the
/// PTY's current keyboard mode (legacy/kitty)").
///
/// Kitty's keyboard protocol (CSI u sequences keyed by push/pop flag stack,
/// §4.4) isn't wired into `alacritty_terminal`'s public `TermMode` at this
/// level, so this always emits the legacy xterm encoding; that matches
/// every shell's default expectation and is the fallback kitty-aware
/// terminals use when the flag stack is empty.
pub fn encode_key(key: &str, code: &str, ctrl: bool, alt: bool, shift: bool, app_cursor: bool) -> Vec<u8> {
    let mut out = Vec::new();
    if alt {
        out.push(0x1b);
    }

    match key {
        "Enter" => out.push(b'\r'),
        "Backspace" => out.push(0x7f),
        "Tab" => out.push(if shift { b'Z' } else { b'\t' }),
        "Escape" => out.push(0x1b),
        "ArrowUp" => out.extend(arrow_seq(b'A', app_cursor)),
        "ArrowDown" => out.extend(arrow_seq(b'B', app_cursor)),
        "ArrowRight" => out.extend(arrow_seq(b'C', app_cursor)),
        "ArrowLeft" => out.extend(arrow_seq(b'D', app_cursor)),
        "Home" => out.extend(arrow_seq(b'H', app_cursor)),
        "End" => out.extend(arrow_seq(b'F', app_cursor)),
        "PageUp" => out.extend(b"\x1b[5~"),
        "PageDown" => out.extend(b"\x1b[6~"),
        "Delete" => out.extend(b"\x1b[3~"),
        "Insert" => out.extend(b"\x1b[2~"),
        "F1" => out.extend(b"\x1bOP"),
        "F2" => out.extend(b"\x1bOQ"),
        "F3" => out.extend(b"\x1bOR"),
        "F4" => out.extend(b"\x1bOS"),
        "F5" => out.extend(b"\x1b[15~"),
        "F6" => out.extend(b"\x1b[17~"),
        "F7" => out.extend(b"\x1b[18~"),
        "F8" => out.extend(b"\x1b[19~"),
        "F9" => out.extend(b"\x1b[20~"),
        "F10" => out.extend(b"\x1b[21~"),
        "F11" => out.extend(b"\x1b[23~"),
        "F12" => out.extend(b"\x1b[24~"),
        _ => {
            if ctrl {
                if let Some(c) = code.strip_prefix("Key") {
                    if let Some(letter) = c.chars().next() {
                        let upper = letter.to_ascii_uppercase() as u8;
                        out.push(upper & 0x1f);
                        return out;
                    }
                }
            }
            out.extend(key.as_bytes());
        }
    }
    out
}

fn arrow_seq(final_byte: u8, app_cursor: bool) -> [u8; 3] {
    let mid = if app_cursor { b'O' } else { b'[' };
    [0x1b, mid, final_byte]
}

/// Wraps `bytes` in bracketed-paste markers if the PTY has that mode set
/// (§4.5 `paste`).
pub fn wrap_paste(bytes: &[u8], mode: TermMode) -> Vec<u8> {
    if mode.contains(TermMode::BRACKETED_PASTE) {
        let mut out = Vec::with_capacity(bytes.len() + 12);
        out.extend_from_slice(b"\x1b[200~");
        out.extend_from_slice(bytes);
        out.extend_from_slice(b"\x1b[201~");
        out
    } else {
        bytes.to_vec()
    }
}

/// Translates a mouse descriptor to the PTY's negotiated report format
/// (§4.5 `mouse_input`: "X10/normal/button/any × default/UTF-8/SGR/URXVT/
/// SGR-pixels"). Returns `None` when no mouse reporting mode is enabled.
pub fn encode_mouse(desc: &MouseDesc, cell_col: u16, cell_row: u16, mode: TermMode) -> Option<Vec<u8>> {
    if !mode.intersects(TermMode::MOUSE_REPORT_CLICK | TermMode::MOUSE_MOTION | TermMode::MOUSE_DRAG) {
        return None;
    }

    let is_motion = matches!(desc.event_type, MouseEventType::Move | MouseEventType::Drag);
    if is_motion && !mode.intersects(TermMode::MOUSE_MOTION | TermMode::MOUSE_DRAG) {
        return None;
    }

    let mut button_code: u8 = match desc.event_type {
        MouseEventType::Wheel => {
            64 + if desc.y < 0.0 { 1 } else { 0 }
        }
        MouseEventType::Up if !mode.contains(TermMode::SGR_MOUSE) => 3,
        _ => desc.button,
    };
    if is_motion {
        button_code += 32;
    }
    if desc.shift_key {
        button_code += 4;
    }
    if desc.alt_key {
        button_code += 8;
    }
    if desc.ctrl_key {
        button_code += 16;
    }

    if mode.contains(TermMode::SGR_MOUSE) {
        let final_char = if matches!(desc.event_type, MouseEventType::Up) {
            'm'
        } else {
            'M'
        };
        Some(
            format!(
                "\x1b[<{};{};{}{}",
                button_code,
                cell_col.max(1),
                cell_row.max(1),
                final_char
            )
            .into_bytes(),
        )
    } else {
        let cb = button_code.saturating_add(32);
        let cx = (cell_col.max(1) as u32 + 32).min(255) as u8;
        let cy = (cell_row.max(1) as u32 + 32).min(255) as u8;
        Some(vec![0x1b, b'[', b'M', cb, cx, cy])
    }
}
