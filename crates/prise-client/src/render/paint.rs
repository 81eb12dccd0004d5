use std::io::Write;

use crossterm::cursor::{Hide, MoveTo, SetCursorStyle, Show};
use crossterm::queue;
use crossterm::style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use prise_protocol::wire_types::{CursorShape, PtyId};

use crate::errors::ClientError;
use crate::layout::{LayoutNode, NodeContent, TextAlign};
use crate::render::colors;
use crate::surface::SurfaceTable;

/// Dim factor applied to every cell of an unfocused surface (§9). Not user
/// configurable in the core; the external UI may expose a setting that maps
/// onto this constant through a future host hook.
const UNFOCUSED_DIM_FACTOR: f32 = 0.4;

/// Paints a laid-out tree to `out`, blitting each surface widget from its
/// mirrored grid and dimming any surface that isn't `focused` (§4.6).
pub fn paint(out: &mut impl Write, root: &LayoutNode, surfaces: &SurfaceTable, focused: Option<PtyId>) -> Result<(), ClientError> {
    queue!(out, Hide).map_err(io_err)?;
    paint_node(out, root, surfaces, focused)?;
    if let Some(pty_id) = focused {
        if let Some(surface) = surfaces.get(pty_id) {
            if let Some(cursor) = surface.cursor() {
                if cursor.visible {
                    if let Some(rect) = find_surface_rect(root, pty_id) {
                        let x = rect.x.saturating_add(cursor.col as u16);
                        let y = rect.y.saturating_add(cursor.row as u16);
                        queue!(out, MoveTo(x, y), cursor_style(cursor.shape), Show).map_err(io_err)?;
                        return out.flush().map_err(ClientError::Io);
                    }
                }
            }
        }
    }
    out.flush().map_err(ClientError::Io)
}

fn find_surface_rect(node: &LayoutNode, pty_id: PtyId) -> Option<crate::layout::Rect> {
    if let NodeContent::Surface { pty_id: id } = &node.content {
        if *id == pty_id {
            return Some(node.rect);
        }
    }
    node.children.iter().find_map(|c| find_surface_rect(c, pty_id))
}

fn io_err(e: std::io::Error) -> ClientError {
    ClientError::Io(e)
}

fn cursor_style(shape: CursorShape) -> SetCursorStyle {
    match shape {
        CursorShape::Block => SetCursorStyle::SteadyBlock,
        CursorShape::Underline => SetCursorStyle::SteadyUnderScore,
        CursorShape::Bar => SetCursorStyle::SteadyBar,
    }
}

fn paint_node(out: &mut impl Write, node: &LayoutNode, surfaces: &SurfaceTable, focused: Option<PtyId>) -> Result<(), ClientError> {
    match &node.content {
        NodeContent::Text { content, align, .. } => paint_text(out, node.rect, content, *align)?,
        NodeContent::List { items } => {
            for (i, item) in items.iter().enumerate() {
                let y = node.rect.y.saturating_add(i as u16);
                if y >= node.rect.y.saturating_add(node.rect.h) {
                    break;
                }
                queue!(out, MoveTo(node.rect.x, y), Print(truncate(item, node.rect.w))).map_err(io_err)?;
            }
        }
        NodeContent::Separator => {
            let line: String = std::iter::repeat('─').take(node.rect.w as usize).collect();
            queue!(out, MoveTo(node.rect.x, node.rect.y), Print(line)).map_err(io_err)?;
        }
        NodeContent::TextInput { value, .. } => {
            queue!(out, MoveTo(node.rect.x, node.rect.y), Print(truncate(value, node.rect.w))).map_err(io_err)?;
        }
        NodeContent::Surface { pty_id } => paint_surface(out, node.rect, surfaces, *pty_id, focused == Some(*pty_id))?,
        NodeContent::Container { bordered } => {
            if *bordered {
                paint_border(out, node.rect)?;
            }
        }
    }
    for child in &node.children {
        paint_node(out, child, surfaces, focused)?;
    }
    Ok(())
}

fn paint_text(out: &mut impl Write, rect: crate::layout::Rect, content: &str, align: TextAlign) -> Result<(), ClientError> {
    for (i, line) in content.lines().enumerate() {
        let y = rect.y.saturating_add(i as u16);
        if y >= rect.y.saturating_add(rect.h) {
            break;
        }
        let line = truncate(line, rect.w);
        let x = match align {
            TextAlign::Left => rect.x,
            TextAlign::Center => rect.x.saturating_add((rect.w.saturating_sub(unicode_width::UnicodeWidthStr::width(line.as_str()) as u16)) / 2),
            TextAlign::Right => rect.x.saturating_add(rect.w.saturating_sub(unicode_width::UnicodeWidthStr::width(line.as_str()) as u16)),
        };
        queue!(out, MoveTo(x, y), Print(line)).map_err(io_err)?;
    }
    Ok(())
}

fn truncate(text: &str, max_w: u16) -> String {
    use unicode_width::UnicodeWidthChar;
    let mut out = String::new();
    let mut width = 0u16;
    for ch in text.chars() {
        let cw = ch.width().unwrap_or(0) as u16;
        if width + cw > max_w {
            break;
        }
        out.push(ch);
        width += cw;
    }
    out
}

fn paint_border(out: &mut impl Write, rect: crate::layout::Rect) -> Result<(), ClientError> {
    if rect.w == 0 || rect.h == 0 {
        return Ok(());
    }
    let top: String = std::iter::once('┌').chain(std::iter::repeat('─').take(rect.w.saturating_sub(2) as usize)).chain(std::iter::once('┐')).collect();
    let bottom: String = std::iter::once('└').chain(std::iter::repeat('─').take(rect.w.saturating_sub(2) as usize)).chain(std::iter::once('┘')).collect();
    queue!(out, MoveTo(rect.x, rect.y), Print(top)).map_err(io_err)?;
    for dy in 1..rect.h.saturating_sub(1) {
        queue!(out, MoveTo(rect.x, rect.y + dy), Print('│'), MoveTo(rect.x + rect.w.saturating_sub(1), rect.y + dy), Print('│')).map_err(io_err)?;
    }
    if rect.h > 1 {
        queue!(out, MoveTo(rect.x, rect.y + rect.h - 1), Print(bottom)).map_err(io_err)?;
    }
    Ok(())
}

fn paint_surface(out: &mut impl Write, rect: crate::layout::Rect, surfaces: &SurfaceTable, pty_id: PtyId, focused: bool) -> Result<(), ClientError> {
    let Some(surface) = surfaces.get(pty_id) else {
        return Ok(());
    };
    for dy in 0..rect.h.min(surface.rows()) {
        let y = rect.y.saturating_add(dy);
        queue!(out, MoveTo(rect.x, y)).map_err(io_err)?;
        let Some(runs) = surface.row(dy as u32) else {
            continue;
        };
        let mut col = 0u16;
        for run in runs {
            if col >= rect.w {
                break;
            }
            let style = surface.style(run.style_id).copied().unwrap_or_default();
            if let Some(fg) = style.fg {
                let color = if focused { colors::to_crossterm(fg) } else { colors::dim(fg, UNFOCUSED_DIM_FACTOR) };
                queue!(out, SetForegroundColor(color)).map_err(io_err)?;
            }
            if let Some(bg) = style.bg {
                let color = if focused { colors::to_crossterm(bg) } else { colors::dim(bg, UNFOCUSED_DIM_FACTOR) };
                queue!(out, SetBackgroundColor(color)).map_err(io_err)?;
            }
            let text = truncate(&run.text, rect.w.saturating_sub(col));
            col = col.saturating_add(unicode_width::UnicodeWidthStr::width(text.as_str()) as u16);
            queue!(out, Print(text), ResetColor).map_err(io_err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Constraints, Widget, layout};
    use prise_protocol::wire_types::{CellStyle, CursorShape as WireCursorShape, CursorState, RedrawEvent, StyleRun};

    #[test]
    fn paint_text_writes_visible_bytes() {
        let node = layout(&Widget::text("hi"), Constraints::loose(10, 3), 0, 0);
        let mut buf = Vec::new();
        paint(&mut buf, &node, &SurfaceTable::new(), None).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("hi"));
    }

    #[test]
    fn paint_surface_blits_row_contents() {
        let mut surfaces = SurfaceTable::new();
        surfaces.insert(PtyId(1), 3, 10);
        surfaces.apply_redraw(
            PtyId(1),
            &[
                RedrawEvent::Style { table: vec![(0, CellStyle::default())] },
                RedrawEvent::Row { row: 0, runs: vec![StyleRun { style_id: 0, text: "hello".into() }] },
                RedrawEvent::Cursor { cursor: CursorState { row: 0, col: 5, visible: true, shape: WireCursorShape::Block } },
                RedrawEvent::Flush,
            ],
        );
        let node = layout(&Widget::surface(PtyId(1)), Constraints::tight(10, 3), 0, 0);
        let mut buf = Vec::new();
        paint(&mut buf, &node, &surfaces, Some(PtyId(1))).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("hello"));
    }

    #[test]
    fn paint_missing_surface_is_a_noop_not_an_error() {
        let node = layout(&Widget::surface(PtyId(99)), Constraints::tight(5, 5), 0, 0);
        let mut buf = Vec::new();
        assert!(paint(&mut buf, &node, &SurfaceTable::new(), None).is_ok());
    }
}
