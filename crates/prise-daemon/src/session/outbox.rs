use std::collections::BTreeMap;

use prise_protocol::wire_types::{CellStyle, CursorState, RedrawEvent, StyleRun};

use crate::screen::style_table::StyleTable;

/// Coalesces redraw notifications for one (client, pty) pair between writes
/// to that client's socket (§4.5: "If the client's per-PTY outbound queue
/// exceeds the high water mark... coalesce further redraws for that PTY
/// rather than disconnecting immediately").
///
/// Each incoming `Vec<RedrawEvent>` carries its own frame-local style ids
/// (§4.4); merging re-keys every run through the outbox's own persistent
/// [`StyleTable`] so ids stay stable across however many frames accumulate
/// before the outbox is drained.
#[derive(Debug, Default)]
pub struct RedrawOutbox {
    styles: StyleTable,
    rows: BTreeMap<u32, Vec<StyleRun>>,
    cursor: Option<CursorState>,
    title: Option<String>,
    cwd: Option<String>,
    mouse_shape: Option<String>,
}

impl RedrawOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one frame's events in. Later `Row` events for the same row
    /// replace earlier ones (the wire format's merge rule); `Cursor`/`Title`/
    /// `Cwd`/`MouseShape` are latest-wins.
    pub fn merge(&mut self, events: &[RedrawEvent]) {
        let mut frame_table: BTreeMap<u32, CellStyle> = BTreeMap::new();
        for event in events {
            if let RedrawEvent::Style { table } = event {
                for (id, style) in table {
                    frame_table.insert(*id, *style);
                }
            }
        }

        for event in events {
            match event {
                RedrawEvent::Style { .. } => {}
                RedrawEvent::Row { row, runs } => {
                    let remapped = runs
                        .iter()
                        .map(|run| {
                            let style = frame_table.get(&run.style_id).copied().unwrap_or_default();
                            StyleRun {
                                style_id: self.styles.intern(style),
                                text: run.text.clone(),
                            }
                        })
                        .collect();
                    self.rows.insert(*row, remapped);
                }
                RedrawEvent::Cursor { cursor } => self.cursor = Some(*cursor),
                RedrawEvent::Title { title } => self.title = Some(title.clone()),
                RedrawEvent::Cwd { cwd } => self.cwd = Some(cwd.clone()),
                RedrawEvent::MouseShape { shape } => self.mouse_shape = Some(shape.clone()),
                RedrawEvent::Flush => {}
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.rows.is_empty()
            || self.cursor.is_some()
            || self.title.is_some()
            || self.cwd.is_some()
            || self.mouse_shape.is_some()
    }

    /// Drains everything accumulated since the last `take` into one ordered
    /// notification terminated by `Flush`, and resets the inner style table
    /// so the next accumulation cycle starts from id 0 (§D.3).
    pub fn take(&mut self) -> Vec<RedrawEvent> {
        let mut events = Vec::new();
        let table = self.styles.take_frame_table();
        if !table.is_empty() {
            events.push(RedrawEvent::Style { table });
        }
        for (row, runs) in std::mem::take(&mut self.rows) {
            events.push(RedrawEvent::Row { row, runs });
        }
        if let Some(cursor) = self.cursor.take() {
            events.push(RedrawEvent::Cursor { cursor });
        }
        if let Some(title) = self.title.take() {
            events.push(RedrawEvent::Title { title });
        }
        if let Some(cwd) = self.cwd.take() {
            events.push(RedrawEvent::Cwd { cwd });
        }
        if let Some(shape) = self.mouse_shape.take() {
            events.push(RedrawEvent::MouseShape { shape });
        }
        events.push(RedrawEvent::Flush);
        self.styles.reset();
        events
    }
}
