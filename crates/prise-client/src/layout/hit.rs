use prise_protocol::wire_types::PtyId;

use crate::layout::Rect;

/// Which axis a split handle drags along (§3 "Split handle").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    /// Children are arranged left-to-right; the handle is a vertical line
    /// the user drags horizontally.
    Row,
    /// Children are arranged top-to-bottom; the handle is a horizontal line
    /// the user drags vertically.
    Column,
}

/// What a hit region resolves to (§4.6 "Hit regions & split handles").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Surface(PtyId),
    Widget(u64),
}

/// One paint-order-tagged clickable rectangle.
#[derive(Debug, Clone, Copy)]
pub struct HitRegion {
    pub rect: Rect,
    pub target: HitTarget,
}

/// A draggable divider between two adjacent children of a `row`/`column`
/// carrying an `id` (§3 "Split handle"). `position` is the coordinate of the
/// divider itself (the column x, or the row y); `start`/`end` bound the
/// perpendicular extent the handle can be grabbed along.
#[derive(Debug, Clone, Copy)]
pub struct SplitHandle {
    pub parent_id: u64,
    pub child_index: usize,
    pub axis: SplitAxis,
    pub position: u16,
    pub start: u16,
    pub end: u16,
}

impl SplitHandle {
    pub fn hit(&self, x: u16, y: u16) -> bool {
        match self.axis {
            SplitAxis::Row => x == self.position && y >= self.start && y < self.end,
            SplitAxis::Column => y == self.position && x >= self.start && x < self.end,
        }
    }
}

/// Finds the topmost (last-painted) hit region under `(x, y)`, since later
/// entries in paint order sit visually above earlier ones (§4.6 "last-wins
/// in paint order").
pub fn hit_test(regions: &[HitRegion], x: u16, y: u16) -> Option<HitTarget> {
    regions.iter().rev().find(|r| r.rect.contains(x, y)).map(|r| r.target)
}

/// Finds the topmost split handle under `(x, y)`, preferring handles added
/// later (deeper/later-painted containers) on overlap.
pub fn hit_test_split(handles: &[SplitHandle], x: u16, y: u16) -> Option<SplitHandle> {
    handles.iter().rev().find(|h| h.hit(x, y)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Rect;

    #[test]
    fn hit_test_prefers_later_region_on_overlap() {
        let regions = vec![
            HitRegion { rect: Rect { x: 0, y: 0, w: 10, h: 10 }, target: HitTarget::Surface(PtyId(1)) },
            HitRegion { rect: Rect { x: 0, y: 0, w: 10, h: 10 }, target: HitTarget::Surface(PtyId(2)) },
        ];
        assert_eq!(hit_test(&regions, 3, 3), Some(HitTarget::Surface(PtyId(2))));
    }

    #[test]
    fn hit_test_returns_none_outside_every_region() {
        let regions = vec![HitRegion { rect: Rect { x: 0, y: 0, w: 4, h: 4 }, target: HitTarget::Surface(PtyId(1)) }];
        assert_eq!(hit_test(&regions, 9, 9), None);
    }

    #[test]
    fn row_handle_hits_along_vertical_line_only() {
        let handle = SplitHandle { parent_id: 1, child_index: 0, axis: SplitAxis::Row, position: 5, start: 0, end: 10 };
        assert!(handle.hit(5, 0));
        assert!(handle.hit(5, 9));
        assert!(!handle.hit(5, 10));
        assert!(!handle.hit(4, 5));
    }

    #[test]
    fn column_handle_hits_along_horizontal_line_only() {
        let handle = SplitHandle { parent_id: 1, child_index: 0, axis: SplitAxis::Column, position: 5, start: 0, end: 10 };
        assert!(handle.hit(0, 5));
        assert!(handle.hit(9, 5));
        assert!(!handle.hit(10, 5));
        assert!(!handle.hit(5, 4));
    }
}
