pub mod keys;
pub mod mouse;

use crossterm::event::{KeyEvent, MouseEvent, MouseEventKind};
use prise_protocol::wire_types::{KeyDesc, MouseDesc, PtyId};

use crate::layout::{self, HitTarget, LayoutNode, Rect, SplitAxis, SplitHandle};

/// What the caller (the host binary standing in for the external UI's
/// effect runner, §9) should do with one routed input event.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterAction {
    /// Forward to the UI's `update` function; it decides accelerator vs.
    /// pass-through (§4.7, out of core scope beyond this normalization).
    Key(KeyDesc),
    /// A hit-tested surface should receive this mouse event as-is.
    Mouse { pty_id: PtyId, desc: MouseDesc },
    /// A split handle's parent ratio changed; the caller re-lays-out with
    /// `child_index`'s ratio set to `ratio` (clamped to `(0, 1)`).
    SplitRatio { parent_id: u64, child_index: usize, ratio: f32 },
    /// Pointer activity landed on neither a surface nor a handle.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct ActiveDrag {
    parent_id: u64,
    child_index: usize,
    axis: SplitAxis,
    parent_rect: Rect,
}

/// Routes normalized terminal input to the focused/hit-tested PTY, and owns
/// the one piece of input state that spans multiple events: an in-progress
/// split-handle drag (§4.7 "starts a drag — updates the parent row/column
/// ratio on `mouse.drag` until `mouse.up`").
#[derive(Debug, Default)]
pub struct InputRouter {
    drag: Option<ActiveDrag>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes a keyboard event; routing to the focused PTY (or treating
    /// it as a UI accelerator) is the caller's job.
    pub fn handle_key(&self, event: KeyEvent) -> RouterAction {
        RouterAction::Key(keys::key_to_desc(event))
    }

    /// Resolves a mouse event against the current layout tree: a `down` on
    /// a split handle starts a drag; a `down` on a surface (or any event
    /// once a drag is active) is routed accordingly.
    pub fn handle_mouse(&mut self, event: MouseEvent, root: &LayoutNode) -> RouterAction {
        if let Some(drag) = self.drag {
            return self.continue_drag(event, drag);
        }

        if matches!(event.kind, MouseEventKind::Down(_)) {
            let mut handles = Vec::new();
            layout::collect_split_handles(root, &mut handles);
            if let Some(handle) = layout::hit_test_split(&handles, event.column, event.row) {
                if let Some(parent_rect) = find_split_parent_rect(root, handle.parent_id) {
                    self.drag = Some(ActiveDrag { parent_id: handle.parent_id, child_index: handle.child_index, axis: handle.axis, parent_rect });
                    return RouterAction::SplitRatio { parent_id: handle.parent_id, child_index: handle.child_index, ratio: ratio_at(handle.axis, parent_rect, event.column, event.row) };
                }
            }
        }

        let mut regions = Vec::new();
        layout::collect_hit_regions(root, &mut regions);
        match layout::hit_test(&regions, event.column, event.row) {
            Some(HitTarget::Surface(pty_id)) => {
                let (x, y) = mouse::to_cell_coords(&event, 1, 1);
                RouterAction::Mouse { pty_id, desc: mouse::mouse_to_desc(&event, x, y) }
            }
            _ => RouterAction::Ignored,
        }
    }

    fn continue_drag(&mut self, event: MouseEvent, drag: ActiveDrag) -> RouterAction {
        match event.kind {
            MouseEventKind::Drag(_) => RouterAction::SplitRatio { parent_id: drag.parent_id, child_index: drag.child_index, ratio: ratio_at(drag.axis, drag.parent_rect, event.column, event.row) },
            MouseEventKind::Up(_) => {
                let ratio = ratio_at(drag.axis, drag.parent_rect, event.column, event.row);
                self.drag = None;
                RouterAction::SplitRatio { parent_id: drag.parent_id, child_index: drag.child_index, ratio }
            }
            _ => RouterAction::Ignored,
        }
    }
}

fn ratio_at(axis: SplitAxis, parent_rect: Rect, x: u16, y: u16) -> f32 {
    match axis {
        SplitAxis::Row => {
            let span = parent_rect.w.max(1) as f32;
            ((x.saturating_sub(parent_rect.x)) as f32 / span).clamp(0.0, 1.0)
        }
        SplitAxis::Column => {
            let span = parent_rect.h.max(1) as f32;
            ((y.saturating_sub(parent_rect.y)) as f32 / span).clamp(0.0, 1.0)
        }
    }
}

fn find_split_parent_rect(node: &LayoutNode, parent_id: u64) -> Option<Rect> {
    if node.split_handles.iter().any(|h: &SplitHandle| h.parent_id == parent_id) {
        return Some(node.rect);
    }
    node.children.iter().find_map(|c| find_split_parent_rect(c, parent_id))
}

/// Per-PTY allocated size, derived from the layout tree's surface nodes
/// (§4.7 "on `winsize`: ... sends resize notifications to the server for
/// every visible surface whose allocated cell dimensions changed").
pub fn surface_sizes(root: &LayoutNode) -> Vec<(PtyId, u16, u16)> {
    let mut out = Vec::new();
    collect_surface_sizes(root, &mut out);
    out
}

fn collect_surface_sizes(node: &LayoutNode, out: &mut Vec<(PtyId, u16, u16)>) {
    if let layout::NodeContent::Surface { pty_id } = &node.content {
        out.push((*pty_id, node.rect.h, node.rect.w));
    }
    for child in &node.children {
        collect_surface_sizes(child, out);
    }
}

/// Diffs two `surface_sizes` snapshots, returning the PTYs whose allocated
/// rows/cols actually changed.
pub fn resized_surfaces(before: &[(PtyId, u16, u16)], after: &[(PtyId, u16, u16)]) -> Vec<(PtyId, u16, u16)> {
    after
        .iter()
        .filter(|(id, rows, cols)| !before.iter().any(|(bid, brows, bcols)| bid == id && brows == rows && bcols == cols))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Align, Child, Constraints, Widget, layout};
    use crossterm::event::{KeyModifiers, MouseButton};

    fn two_pane_row() -> LayoutNode {
        let children = vec![Child::new(Widget::surface(PtyId(1))), Child::new(Widget::surface(PtyId(2)))];
        let w = Widget::Row { id: Some(1), children, cross_align: Align::Start };
        layout(&w, Constraints::tight(20, 10), 0, 0)
    }

    #[test]
    fn mouse_down_on_surface_routes_to_its_pty() {
        let root = two_pane_row();
        let mut router = InputRouter::new();
        let event = MouseEvent { kind: MouseEventKind::Down(MouseButton::Left), column: 2, row: 2, modifiers: KeyModifiers::empty() };
        match router.handle_mouse(event, &root) {
            RouterAction::Mouse { pty_id, .. } => assert_eq!(pty_id, PtyId(1)),
            other => panic!("expected Mouse action, got {other:?}"),
        }
    }

    #[test]
    fn drag_after_hitting_handle_updates_ratio_until_up() {
        let root = two_pane_row();
        let mut router = InputRouter::new();
        let down = MouseEvent { kind: MouseEventKind::Down(MouseButton::Left), column: 10, row: 5, modifiers: KeyModifiers::empty() };
        let started = router.handle_mouse(down, &root);
        assert!(matches!(started, RouterAction::SplitRatio { .. }));
        assert!(router.drag.is_some());

        let drag = MouseEvent { kind: MouseEventKind::Drag(MouseButton::Left), column: 15, row: 5, modifiers: KeyModifiers::empty() };
        match router.handle_mouse(drag, &root) {
            RouterAction::SplitRatio { ratio, .. } => assert!(ratio > 0.5),
            other => panic!("expected SplitRatio, got {other:?}"),
        }

        let up = MouseEvent { kind: MouseEventKind::Up(MouseButton::Left), column: 15, row: 5, modifiers: KeyModifiers::empty() };
        router.handle_mouse(up, &root);
        assert!(router.drag.is_none());
    }

    #[test]
    fn key_event_is_normalized_without_routing_decision() {
        let router = InputRouter::new();
        let action = router.handle_key(KeyEvent::new(crossterm::event::KeyCode::Enter, KeyModifiers::empty()));
        assert!(matches!(action, RouterAction::Key(desc) if desc.key == "Enter"));
    }

    #[test]
    fn resized_surfaces_reports_only_changed_ptys() {
        let before = vec![(PtyId(1), 24, 80), (PtyId(2), 24, 80)];
        let after = vec![(PtyId(1), 24, 80), (PtyId(2), 30, 80)];
        let changed = resized_surfaces(&before, &after);
        assert_eq!(changed, vec![(PtyId(2), 30, 80)]);
    }
}
