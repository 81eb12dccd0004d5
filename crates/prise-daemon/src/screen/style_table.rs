use std::collections::HashMap;

use prise_protocol::wire_types::CellStyle;

/// Interns [`CellStyle`] values into small integer ids for one redraw
/// notification (§4.4, §D.3: style ids are ephemeral and reset
/// every frame — there is no cross-frame style table to grow or expire).
#[derive(Debug, Default)]
pub struct StyleTable {
    ids: HashMap<CellStyle, u32>,
    assigned_this_frame: Vec<(u32, CellStyle)>,
    next: u32,
}

impl StyleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `style`, assigning a fresh one (and recording it as
    /// newly observed this frame) if it hasn't been seen since the last
    /// [`StyleTable::take_frame_table`].
    pub fn intern(&mut self, style: CellStyle) -> u32 {
        if let Some(id) = self.ids.get(&style) {
            return *id;
        }
        let id = self.next;
        self.next += 1;
        self.ids.insert(style, id);
        self.assigned_this_frame.push((id, style));
        id
    }

    /// Drains the set of styles newly assigned since the last flush. Empty
    /// means the frame's `style` event is omitted entirely.
    pub fn take_frame_table(&mut self) -> Vec<(u32, CellStyle)> {
        std::mem::take(&mut self.assigned_this_frame)
    }

    pub fn has_pending(&self) -> bool {
        !self.assigned_this_frame.is_empty()
    }

    /// Resets the whole table, including previously assigned ids. Used when
    /// a new client attaches and needs a self-contained full redraw (§4.5
    /// `attach_pty`) that doesn't depend on ids assigned in earlier frames
    /// this PTY already flushed to other clients.
    pub fn reset(&mut self) {
        self.ids.clear();
        self.assigned_this_frame.clear();
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_style_reuses_id() {
        let mut table = StyleTable::new();
        let a = table.intern(CellStyle::default());
        let b = table.intern(CellStyle::default());
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_styles_get_distinct_ids() {
        let mut table = StyleTable::new();
        let plain = table.intern(CellStyle::default());
        let bold = table.intern(CellStyle {
            bold: true,
            ..Default::default()
        });
        assert_ne!(plain, bold);
    }

    #[test]
    fn take_frame_table_only_returns_new_entries() {
        let mut table = StyleTable::new();
        table.intern(CellStyle::default());
        let first = table.take_frame_table();
        assert_eq!(first.len(), 1);

        table.intern(CellStyle::default());
        let second = table.take_frame_table();
        assert!(second.is_empty(), "re-interning a known style assigns nothing new");
    }

    #[test]
    fn reset_forgets_previously_assigned_ids() {
        let mut table = StyleTable::new();
        let before = table.intern(CellStyle::default());
        table.take_frame_table();
        table.reset();
        let after = table.intern(CellStyle::default());
        assert_eq!(before, after, "ids restart from zero after reset");
        assert!(table.has_pending());
    }
}
