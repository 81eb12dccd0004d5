use std::collections::{BTreeMap, HashMap};

use prise_protocol::wire_types::{CellStyle, CursorState, RedrawEvent, StyleRun};

/// Mirrors one PTY's grid on the client side (§4.6). Applies `redraw`
/// notifications in order; `style_id`s are only meaningful for the
/// notification that defined them, so every `Style` event fully replaces
/// the previous table rather than merging into it (§D.3).
#[derive(Debug, Default)]
pub struct Surface {
    styles: HashMap<u32, CellStyle>,
    rows: BTreeMap<u32, Vec<StyleRun>>,
    cursor: Option<CursorState>,
    title: Option<String>,
    cwd: Option<String>,
    mouse_shape: Option<String>,
    dirty: bool,
    rows_count: u16,
    cols_count: u16,
}

impl Surface {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows_count: rows,
            cols_count: cols,
            ..Default::default()
        }
    }

    /// Applies one `redraw` notification's events in order (§4.6, §8
    /// "Coalescing preserves final state").
    pub fn apply(&mut self, events: &[RedrawEvent]) {
        for event in events {
            match event {
                RedrawEvent::Style { table } => {
                    self.styles = table.iter().copied().collect();
                }
                RedrawEvent::Row { row, runs } => {
                    if runs.iter().any(|r| !self.styles.contains_key(&r.style_id)) {
                        tracing::warn!(event = "client.surface.style_id_out_of_range", row = row);
                    }
                    self.rows.insert(*row, runs.clone());
                }
                RedrawEvent::Cursor { cursor } => self.cursor = Some(*cursor),
                RedrawEvent::Title { title } => self.title = Some(title.clone()),
                RedrawEvent::Cwd { cwd } => self.cwd = Some(cwd.clone()),
                RedrawEvent::MouseShape { shape } => self.mouse_shape = Some(shape.clone()),
                RedrawEvent::Flush => self.dirty = true,
            }
        }
    }

    /// Drops rows beyond the new bounds on a server-confirmed resize;
    /// content within the surviving rectangle is left untouched until the
    /// next redraw overwrites it.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.rows_count = rows;
        self.cols_count = cols;
        self.rows.retain(|row, _| *row < rows as u32);
        self.dirty = true;
    }

    pub fn rows(&self) -> u16 {
        self.rows_count
    }

    pub fn cols(&self) -> u16 {
        self.cols_count
    }

    pub fn style(&self, style_id: u32) -> Option<&CellStyle> {
        self.styles.get(&style_id)
    }

    pub fn row(&self, row: u32) -> Option<&[StyleRun]> {
        self.rows.get(&row).map(Vec::as_slice)
    }

    pub fn cursor(&self) -> Option<CursorState> {
        self.cursor
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    pub fn mouse_shape(&self) -> Option<&str> {
        self.mouse_shape.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prise_protocol::wire_types::CursorShape;

    fn style_table(id: u32) -> RedrawEvent {
        RedrawEvent::Style {
            table: vec![(id, CellStyle::default())],
        }
    }

    #[test]
    fn row_event_is_rejected_style_warns_but_still_stores_run() {
        let mut surface = Surface::new(24, 80);
        surface.apply(&[RedrawEvent::Row {
            row: 0,
            runs: vec![StyleRun { style_id: 9, text: "hi".into() }],
        }]);
        assert_eq!(surface.row(0).unwrap()[0].text, "hi");
    }

    #[test]
    fn style_table_is_fully_replaced_each_notification() {
        let mut surface = Surface::new(24, 80);
        surface.apply(&[style_table(1)]);
        assert!(surface.style(1).is_some());
        surface.apply(&[style_table(2)]);
        assert!(surface.style(1).is_none());
        assert!(surface.style(2).is_some());
    }

    #[test]
    fn flush_marks_dirty() {
        let mut surface = Surface::new(24, 80);
        assert!(!surface.is_dirty());
        surface.apply(&[RedrawEvent::Flush]);
        assert!(surface.is_dirty());
        surface.clear_dirty();
        assert!(!surface.is_dirty());
    }

    #[test]
    fn cursor_and_title_are_latest_wins_across_events() {
        let mut surface = Surface::new(24, 80);
        surface.apply(&[
            RedrawEvent::Cursor {
                cursor: CursorState { row: 0, col: 0, visible: true, shape: CursorShape::Block },
            },
            RedrawEvent::Title { title: "first".into() },
            RedrawEvent::Cursor {
                cursor: CursorState { row: 3, col: 4, visible: true, shape: CursorShape::Bar },
            },
            RedrawEvent::Title { title: "second".into() },
        ]);
        let cursor = surface.cursor().unwrap();
        assert_eq!((cursor.row, cursor.col), (3, 4));
        assert_eq!(surface.title(), Some("second"));
    }

    #[test]
    fn resize_drops_rows_outside_new_bounds() {
        let mut surface = Surface::new(24, 80);
        surface.apply(&[RedrawEvent::Row { row: 30, runs: vec![] }]);
        surface.resize(10, 80);
        assert!(surface.row(30).is_none());
    }
}
