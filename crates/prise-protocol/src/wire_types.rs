use serde::{Deserialize, Serialize};

/// A PTY's identifier: a monotonically allocated integer, never reused
/// within one daemon's lifetime (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PtyId(pub u64);

impl std::fmt::Display for PtyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A per-connection client identifier, scoped to one daemon connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

/// `spawn_pty` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnPtyParams {
    pub rows: u16,
    pub cols: u16,
    pub attach: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

/// `resize_pty` params, positional per §6's wire table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizePtyParams {
    pub pty_id: PtyId,
    pub rows: u16,
    pub cols: u16,
    pub width_px: u16,
    pub height_px: u16,
}

/// W3C `KeyboardEvent`-compatible key descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyDesc {
    pub key: String,
    pub code: String,
    #[serde(rename = "shiftKey")]
    pub shift_key: bool,
    #[serde(rename = "ctrlKey")]
    pub ctrl_key: bool,
    #[serde(rename = "altKey")]
    pub alt_key: bool,
    #[serde(rename = "metaKey")]
    pub meta_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseEventType {
    Down,
    Up,
    Drag,
    Move,
    Wheel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MouseDesc {
    pub x: f32,
    pub y: f32,
    pub button: u8,
    pub event_type: MouseEventType,
    #[serde(rename = "shiftKey")]
    pub shift_key: bool,
    #[serde(rename = "ctrlKey")]
    pub ctrl_key: bool,
    #[serde(rename = "altKey")]
    pub alt_key: bool,
}

/// Exit status reported in a `pty_exited` notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// A single cell run: a style table index plus the literal text span it
/// covers. `row` events carry a run-length-encoded sequence of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleRun {
    pub style_id: u32,
    pub text: String,
}

/// A full SGR combination, keyed by a frame-local style id (§4.4). Colors are
/// represented as either a named/indexed ANSI slot or explicit RGB, mirroring
/// the VT interpreter's own `Color` representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireColor {
    Named(u8),
    Indexed(u8),
    Rgb(u8, u8, u8),
}

/// Hash/Eq let the Screen Engine intern these into a per-frame style table
/// (§4.4) keyed by value rather than by a separately tracked identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct CellStyle {
    pub fg: Option<WireColor>,
    pub bg: Option<WireColor>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub inverse: bool,
    pub dim: bool,
    pub strikeout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorShape {
    Block,
    Underline,
    Bar,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CursorState {
    pub row: u32,
    pub col: u32,
    pub visible: bool,
    pub shape: CursorShape,
}

/// One event inside a `redraw` notification (§4.4). A notification is an
/// ordered `Vec<RedrawEvent>` always terminated by `Flush`; `style_id`s used
/// by `Row` are only valid for the `Style` event earlier in the SAME vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RedrawEvent {
    Style { table: Vec<(u32, CellStyle)> },
    Row { row: u32, runs: Vec<StyleRun> },
    Cursor { cursor: CursorState },
    Title { title: String },
    Cwd { cwd: String },
    MouseShape { shape: String },
    Flush,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pty_id_serializes_transparently() {
        let id = PtyId(7);
        let v = rmpv::ext::to_value(id).unwrap();
        assert_eq!(v, rmpv::Value::from(7u64));
    }

    #[test]
    fn redraw_event_round_trips_through_msgpack() {
        let events = vec![
            RedrawEvent::Row {
                row: 0,
                runs: vec![StyleRun {
                    style_id: 1,
                    text: "hi".into(),
                }],
            },
            RedrawEvent::Flush,
        ];
        let bytes = rmp_serde::to_vec_named(&events).unwrap();
        let back: Vec<RedrawEvent> = rmp_serde::from_slice(&bytes).unwrap();
        assert!(matches!(back.last(), Some(RedrawEvent::Flush)));
    }
}
