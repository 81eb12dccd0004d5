use alacritty_terminal::event::{Event as AlacEvent, EventListener};
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::term::cell::Flags as CellFlags;
use alacritty_terminal::term::{Config as TermConfig, Term, TermMode};
use alacritty_terminal::vte::ansi::Processor;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use prise_protocol::wire_types::{CellStyle, CursorShape, CursorState, RedrawEvent, StyleRun};

use super::colors;
use super::dirty::DirtyTracker;
use super::style_table::StyleTable;

/// Satisfies `alacritty_terminal`'s `Dimensions` trait. The engine has no
/// scrollback surface on the wire (§D doesn't extend §4.4 to
/// cover history scrolling), so `total_lines` equals `screen_lines`.
struct TermDimensions {
    cols: usize,
    screen_lines: usize,
}

impl Dimensions for TermDimensions {
    fn total_lines(&self) -> usize {
        self.screen_lines
    }
    fn screen_lines(&self) -> usize {
        self.screen_lines
    }
    fn columns(&self) -> usize {
        self.cols
    }
}

/// Forwards `alacritty_terminal` events to the engine via an unbounded
/// channel.
struct PriseListener {
    sender: UnboundedSender<AlacEvent>,
}

impl EventListener for PriseListener {
    fn send_event(&self, event: AlacEvent) {
        let _ = self.sender.unbounded_send(event);
    }
}

/// Wraps one PTY's VT interpreter (§4.4). Owns the `alacritty_terminal` state
/// machine, tracks per-row dirtiness by diffing the rendered grid between
/// flushes, interns styles observed this frame, and collects OSC-query
/// responses the session manager must write back to the PTY master.
pub struct ScreenEngine {
    term: Term<PriseListener>,
    processor: Processor,
    events: UnboundedReceiver<AlacEvent>,
    dirty: DirtyTracker,
    styles: StyleTable,
    prev_grid: Vec<Vec<(char, CellStyle)>>,
    pending_writes: Vec<Vec<u8>>,
    title: Option<String>,
    title_changed: bool,
    rows: u16,
    cols: u16,
}

impl ScreenEngine {
    pub fn new(rows: u16, cols: u16) -> Self {
        let (sender, events) = unbounded();
        let listener = PriseListener { sender };
        let dims = TermDimensions {
            cols: cols as usize,
            screen_lines: rows as usize,
        };
        let term = Term::new(TermConfig::default(), &dims, listener);
        Self {
            term,
            processor: Processor::new(),
            events,
            dirty: DirtyTracker::new(),
            styles: StyleTable::new(),
            prev_grid: vec![Vec::new(); rows as usize],
            pending_writes: Vec::new(),
            title: None,
            title_changed: false,
            rows,
            cols,
        }
    }

    /// Feeds a chunk of child output through the VT interpreter (§4.3's read
    /// loop calls this once per chunk read from the master).
    pub fn advance(&mut self, bytes: &[u8]) {
        self.processor.advance(&mut self.term, bytes);
        self.drain_events();
    }

    fn drain_events(&mut self) {
        while let Ok(Some(event)) = self.events.try_next() {
            match event {
                AlacEvent::Wakeup => {}
                AlacEvent::PtyWrite(text) => self.pending_writes.push(text.into_bytes()),
                AlacEvent::Title(title) => {
                    self.title = Some(title);
                    self.title_changed = true;
                }
                AlacEvent::ResetTitle => {
                    self.title = None;
                    self.title_changed = true;
                }
                _ => {}
            }
        }
    }

    /// Byte sequences queued for the master (OSC query responses) since the
    /// last call. The session manager writes these through the
    /// [`crate::pty::worker::PtyWorker`] that owns this PTY — the engine
    /// itself never touches a file descriptor (§4.4, §5's FD ownership
    /// invariant).
    pub fn take_pending_writes(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending_writes)
    }

    /// Applies a resize: reflows the grid and forces every row dirty on the
    /// next flush, since the new viewport may expose previously invisible
    /// content (§4.5 `resize_pty` "emits a full redraw on success").
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.rows = rows;
        self.cols = cols;
        self.term.resize(TermDimensions {
            cols: cols as usize,
            screen_lines: rows as usize,
        });
        self.prev_grid = vec![Vec::new(); rows as usize];
        self.dirty.mark_all();
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Exposes the VT interpreter's current mode flags so the session
    /// manager can translate key/mouse input without duplicating the
    /// interpreter's mode bookkeeping (§4.5 `key_input`/`mouse_input`).
    pub fn mode(&self) -> TermMode {
        *self.term.mode()
    }

    /// Forces the next flush to redraw every row, used by `attach_pty` (§4.5:
    /// "Immediately schedules a full redraw for this client").
    pub fn force_full_redraw(&mut self) {
        self.dirty.mark_all();
    }

    /// Builds the redraw notification for this frame: zero-or-one `style`
    /// event, one `row` event per dirty row, a `cursor` event, an optional
    /// `title` event, and a terminating `flush` (§4.4).
    pub fn flush(&mut self) -> Vec<RedrawEvent> {
        let rows_total = self.rows as usize;
        let (new_grid, cursor_point, alac_shape) = {
            let content = self.term.renderable_content();
            let cursor_point = content.cursor.point;
            let alac_shape = content.cursor.shape;
            let mut grid = vec![Vec::new(); rows_total];
            for indexed in content.display_iter {
                if indexed.cell.flags.contains(CellFlags::WIDE_CHAR_SPACER) {
                    continue;
                }
                let line = indexed.point.line.0;
                if line < 0 {
                    continue;
                }
                let row = line as usize;
                if row >= rows_total {
                    continue;
                }
                grid[row].push((indexed.cell.c, cell_style(&indexed.cell)));
            }
            (grid, cursor_point, alac_shape)
        };
        let cursor_visible = self.term.mode().contains(TermMode::SHOW_CURSOR);

        let force_all = self.dirty.is_dirty();
        let mut row_events = Vec::new();
        for row in 0..rows_total {
            let changed = force_all
                || self
                    .prev_grid
                    .get(row)
                    .map(|prev| prev != &new_grid[row])
                    .unwrap_or(true);
            if !changed {
                continue;
            }
            let runs = self.build_runs(&new_grid[row]);
            row_events.push(RedrawEvent::Row {
                row: row as u32,
                runs,
            });
        }
        self.prev_grid = new_grid;
        self.dirty.clear();

        let mut events = Vec::new();
        let style_table = self.styles.take_frame_table();
        if !style_table.is_empty() {
            events.push(RedrawEvent::Style { table: style_table });
        }
        events.extend(row_events);
        events.push(RedrawEvent::Cursor {
            cursor: CursorState {
                row: cursor_point.line.0.max(0) as u32,
                col: cursor_point.column.0 as u32,
                visible: cursor_visible,
                shape: cursor_shape(alac_shape),
            },
        });
        if self.title_changed {
            events.push(RedrawEvent::Title {
                title: self.title.clone().unwrap_or_default(),
            });
            self.title_changed = false;
        }
        events.push(RedrawEvent::Flush);
        self.styles.reset();
        events
    }

    fn build_runs(&mut self, row: &[(char, CellStyle)]) -> Vec<StyleRun> {
        let mut runs = Vec::new();
        let mut current_style: Option<CellStyle> = None;
        let mut text = String::new();
        for (ch, style) in row {
            if current_style != Some(*style) {
                if let Some(s) = current_style.take() {
                    runs.push(StyleRun {
                        style_id: self.styles.intern(s),
                        text: std::mem::take(&mut text),
                    });
                }
                current_style = Some(*style);
            }
            text.push(*ch);
        }
        if let Some(s) = current_style {
            runs.push(StyleRun {
                style_id: self.styles.intern(s),
                text,
            });
        }
        runs
    }
}

fn cell_style(cell: &alacritty_terminal::term::cell::Cell) -> CellStyle {
    CellStyle {
        fg: colors::resolve_color(&cell.fg),
        bg: colors::resolve_color(&cell.bg),
        bold: cell.flags.contains(CellFlags::BOLD),
        italic: cell.flags.contains(CellFlags::ITALIC),
        underline: cell.flags.intersects(
            CellFlags::UNDERLINE
                | CellFlags::DOUBLE_UNDERLINE
                | CellFlags::UNDERCURL
                | CellFlags::DOTTED_UNDERLINE
                | CellFlags::DASHED_UNDERLINE,
        ),
        inverse: cell.flags.contains(CellFlags::INVERSE),
        dim: cell.flags.contains(CellFlags::DIM),
        strikeout: cell.flags.contains(CellFlags::STRIKEOUT),
    }
}

fn cursor_shape(shape: alacritty_terminal::vte::ansi::CursorShape) -> CursorShape {
    use alacritty_terminal::vte::ansi::CursorShape as AlacShape;
    match shape {
        AlacShape::Block | AlacShape::HollowBlock => CursorShape::Block,
        AlacShape::Underline => CursorShape::Underline,
        AlacShape::Beam => CursorShape::Bar,
        AlacShape::Hidden => CursorShape::Block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printed_text_produces_a_row_event_and_cursor() {
        let mut engine = ScreenEngine::new(4, 10);
        engine.advance(b"hi");
        let events = engine.flush();
        assert!(matches!(events.last(), Some(RedrawEvent::Flush)));
        assert!(events.iter().any(|e| matches!(e, RedrawEvent::Row { row: 0, .. })));
        assert!(events.iter().any(|e| matches!(e, RedrawEvent::Cursor { .. })));
    }

    #[test]
    fn unchanged_frame_emits_no_row_events() {
        let mut engine = ScreenEngine::new(4, 10);
        engine.advance(b"hi");
        engine.flush();
        let events = engine.flush();
        assert!(!events.iter().any(|e| matches!(e, RedrawEvent::Row { .. })));
    }

    #[test]
    fn sgr_bold_is_assigned_a_style_and_referenced_by_the_row() {
        let mut engine = ScreenEngine::new(4, 10);
        engine.advance(b"\x1b[1mhi\x1b[0m");
        let events = engine.flush();
        let has_style = events.iter().any(|e| matches!(e, RedrawEvent::Style { .. }));
        assert!(has_style, "new SGR combination should assign a style id this frame");
    }

    #[test]
    fn resize_forces_a_full_redraw_next_flush() {
        let mut engine = ScreenEngine::new(4, 10);
        engine.advance(b"hi");
        engine.flush();
        engine.resize(6, 12);
        let events = engine.flush();
        let row_count = events
            .iter()
            .filter(|e| matches!(e, RedrawEvent::Row { .. }))
            .count();
        assert_eq!(row_count, 6);
    }

    #[test]
    fn force_full_redraw_redraws_every_row_even_if_unchanged() {
        let mut engine = ScreenEngine::new(3, 5);
        engine.advance(b"x");
        engine.flush();
        engine.force_full_redraw();
        let events = engine.flush();
        let row_count = events
            .iter()
            .filter(|e| matches!(e, RedrawEvent::Row { .. }))
            .count();
        assert_eq!(row_count, 3);
    }

    #[test]
    fn osc_title_sets_pending_title_event() {
        let mut engine = ScreenEngine::new(4, 10);
        engine.advance(b"\x1b]0;hello\x07");
        let events = engine.flush();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, RedrawEvent::Title { title } if title == "hello"))
        );
    }
}
