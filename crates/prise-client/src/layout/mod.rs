pub mod hit;
pub mod widget;

use prise_protocol::wire_types::PtyId;
use unicode_width::UnicodeWidthStr;

pub use hit::{HitRegion, HitTarget, SplitAxis, SplitHandle, hit_test, hit_test_split};
pub use widget::{Align, Anchor, Child, TextAlign, Widget, Wrap};

/// Cell-based layout constraints (§4.6 "a single top-down pass with
/// constraints `{min_w, max_w, min_h, max_h}`").
#[derive(Debug, Clone, Copy)]
pub struct Constraints {
    pub min_w: u16,
    pub max_w: u16,
    pub min_h: u16,
    pub max_h: u16,
}

impl Constraints {
    pub fn tight(w: u16, h: u16) -> Self {
        Self { min_w: w, max_w: w, min_h: h, max_h: h }
    }

    pub fn loose(max_w: u16, max_h: u16) -> Self {
        Self { min_w: 0, max_w, min_h: 0, max_h }
    }

    /// Clamps a desired size into these constraints, logging if the desired
    /// size overflowed (§7 "Layout produces a size larger than constraints
    /// → clamp, log").
    fn clamp(&self, w: u16, h: u16) -> Size {
        let cw = w.clamp(self.min_w, self.max_w.max(self.min_w));
        let ch = h.clamp(self.min_h, self.max_h.max(self.min_h));
        if cw != w || ch != h {
            tracing::debug!(event = "client.layout.size_clamped", wanted_w = w, wanted_h = h, got_w = cw, got_h = ch);
        }
        Size { w: cw, h: ch }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub w: u16,
    pub h: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.x.saturating_add(self.w) && y >= self.y && y < self.y.saturating_add(self.h)
    }
}

/// What a laid-out node paints. Containers (`box`/`padding`/`row`/`column`/
/// `stack`/`positioned`) carry no paint content of their own — their
/// children do the painting; the container only contributes its rect and,
/// for `box`, a border.
#[derive(Debug, Clone)]
pub enum NodeContent {
    Text { content: String, align: TextAlign, wrap: Wrap },
    List { items: Vec<String> },
    Separator,
    Surface { pty_id: PtyId },
    TextInput { value: String, cursor: usize },
    Container { bordered: bool },
}


#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub rect: Rect,
    pub content: NodeContent,
    pub children: Vec<LayoutNode>,
    /// Split handles sitting between this node's immediate children, present
    /// only when the source `row`/`column` widget carried an `id`.
    pub split_handles: Vec<SplitHandle>,
}

impl LayoutNode {
    fn leaf(rect: Rect, content: NodeContent) -> Self {
        Self { rect, content, children: vec![], split_handles: vec![] }
    }

    fn branch(rect: Rect, content: NodeContent, children: Vec<LayoutNode>) -> Self {
        Self { rect, content, children, split_handles: vec![] }
    }
}

fn is_intrinsic(widget: &Widget) -> bool {
    matches!(widget, Widget::Text { .. } | Widget::List { .. } | Widget::Separator | Widget::TextInput { .. })
}

fn wrap_lines(content: &str, wrap: Wrap, max_w: u16) -> Vec<String> {
    if max_w == 0 {
        return vec![String::new()];
    }
    match wrap {
        Wrap::None => vec![content.to_string()],
        Wrap::Char => {
            let mut lines = Vec::new();
            let mut current = String::new();
            let mut width = 0u16;
            for ch in content.chars() {
                let cw = UnicodeWidthStr::width(ch.to_string().as_str()) as u16;
                if width + cw.max(1) > max_w && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    width = 0;
                }
                current.push(ch);
                width += cw.max(1);
            }
            if !current.is_empty() || lines.is_empty() {
                lines.push(current);
            }
            lines
        }
        Wrap::Word => {
            let mut lines = Vec::new();
            let mut current = String::new();
            let mut width = 0u16;
            for word in content.split_whitespace() {
                let ww = UnicodeWidthStr::width(word) as u16;
                let sep = if current.is_empty() { 0 } else { 1 };
                if width + sep + ww > max_w && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    width = 0;
                }
                if !current.is_empty() {
                    current.push(' ');
                    width += 1;
                }
                current.push_str(word);
                width += ww;
            }
            if !current.is_empty() || lines.is_empty() {
                lines.push(current);
            }
            lines
        }
    }
}

/// Lays `widget` out against `constraints`, placing its absolute rect (and
/// every descendant's) with top-left origin `(x, y)`. Returns the widget's
/// final clamped size together with its positioned node tree (§4.6).
pub fn layout(widget: &Widget, constraints: Constraints, x: u16, y: u16) -> LayoutNode {
    match widget {
        Widget::Text { content, align, wrap } => {
            let lines = wrap_lines(content, *wrap, constraints.max_w.max(1));
            let natural_h = lines.len() as u16;
            let natural_w = lines.iter().map(|l| UnicodeWidthStr::width(l.as_str()) as u16).max().unwrap_or(0);
            let size = constraints.clamp(natural_w, natural_h);
            LayoutNode::leaf(Rect { x, y, w: size.w, h: size.h }, NodeContent::Text { content: lines.join("\n"), align: *align, wrap: *wrap })
        }
        Widget::List { items } => {
            let natural_h = items.len() as u16;
            let natural_w = items.iter().map(|i| UnicodeWidthStr::width(i.as_str()) as u16).max().unwrap_or(0);
            let size = constraints.clamp(natural_w, natural_h);
            LayoutNode::leaf(Rect { x, y, w: size.w, h: size.h }, NodeContent::List { items: items.clone() })
        }
        Widget::Separator => {
            let size = constraints.clamp(constraints.max_w, 1);
            LayoutNode::leaf(Rect { x, y, w: size.w, h: size.h }, NodeContent::Separator)
        }
        Widget::Surface { pty_id } => {
            let size = constraints.clamp(constraints.max_w, constraints.max_h);
            LayoutNode::leaf(Rect { x, y, w: size.w, h: size.h }, NodeContent::Surface { pty_id: *pty_id })
        }
        Widget::TextInput { value, cursor } => {
            let size = constraints.clamp(constraints.max_w, 1);
            LayoutNode::leaf(Rect { x, y, w: size.w, h: size.h }, NodeContent::TextInput { value: value.clone(), cursor: *cursor })
        }
        Widget::Box { child } => {
            let inner_w = constraints.max_w.saturating_sub(2);
            let inner_h = constraints.max_h.saturating_sub(2);
            let inner = Constraints::loose(inner_w, inner_h);
            let node = layout(child, inner, x.saturating_add(1), y.saturating_add(1));
            let size = constraints.clamp(node.rect.w.saturating_add(2), node.rect.h.saturating_add(2));
            LayoutNode::branch(Rect { x, y, w: size.w, h: size.h }, NodeContent::Container { bordered: true }, vec![node])
        }
        Widget::Padding { child, left, right, top, bottom } => {
            let inner_w = constraints.max_w.saturating_sub(left + right);
            let inner_h = constraints.max_h.saturating_sub(top + bottom);
            let inner = Constraints::loose(inner_w, inner_h);
            let node = layout(child, inner, x.saturating_add(*left), y.saturating_add(*top));
            let size = constraints.clamp(node.rect.w.saturating_add(left + right), node.rect.h.saturating_add(top + bottom));
            LayoutNode::branch(Rect { x, y, w: size.w, h: size.h }, NodeContent::Container { bordered: false }, vec![node])
        }
        Widget::Row { id, children, cross_align } => layout_row(*id, children, *cross_align, constraints, x, y),
        Widget::Column { id, children, cross_align } => layout_column(*id, children, *cross_align, constraints, x, y),
        Widget::Stack { children } => {
            let nodes: Vec<LayoutNode> = children.iter().map(|c| layout(c, constraints, x, y)).collect();
            let w = nodes.iter().map(|n| n.rect.w).max().unwrap_or(0).max(constraints.min_w);
            let h = nodes.iter().map(|n| n.rect.h).max().unwrap_or(0).max(constraints.min_h);
            LayoutNode::branch(Rect { x, y, w, h }, NodeContent::Container { bordered: false }, nodes)
        }
        Widget::Positioned { child, anchor } => {
            let probe = layout(child, Constraints::loose(constraints.max_w, constraints.max_h), 0, 0);
            let (cx, cy) = anchor_origin(*anchor, constraints, probe.rect.w, probe.rect.h);
            let node = layout(child, Constraints::tight(probe.rect.w, probe.rect.h), x.saturating_add(cx), y.saturating_add(cy));
            LayoutNode::branch(Rect { x, y, w: constraints.max_w, h: constraints.max_h }, NodeContent::Container { bordered: false }, vec![node])
        }
    }
}

fn anchor_origin(anchor: Anchor, constraints: Constraints, w: u16, h: u16) -> (u16, u16) {
    match anchor {
        Anchor::Absolute { x, y } => (x.max(0) as u16, y.max(0) as u16),
        Anchor::TopLeft => (0, 0),
        Anchor::TopCenter => ((constraints.max_w.saturating_sub(w)) / 2, 0),
        Anchor::TopRight => (constraints.max_w.saturating_sub(w), 0),
        Anchor::MiddleLeft => (0, (constraints.max_h.saturating_sub(h)) / 2),
        Anchor::MiddleCenter => ((constraints.max_w.saturating_sub(w)) / 2, (constraints.max_h.saturating_sub(h)) / 2),
        Anchor::MiddleRight => (constraints.max_w.saturating_sub(w), (constraints.max_h.saturating_sub(h)) / 2),
        Anchor::BottomLeft => (0, constraints.max_h.saturating_sub(h)),
        Anchor::BottomCenter => ((constraints.max_w.saturating_sub(w)) / 2, constraints.max_h.saturating_sub(h)),
        Anchor::BottomRight => (constraints.max_w.saturating_sub(w), constraints.max_h.saturating_sub(h)),
    }
}

/// Splits `available` cells among `count` equal shares, cells that don't
/// divide evenly go to the earliest shares first.
fn equal_shares(available: u16, count: usize) -> Vec<u16> {
    if count == 0 {
        return vec![];
    }
    let base = available / count as u16;
    let mut extra = available % count as u16;
    (0..count)
        .map(|_| {
            let mut share = base;
            if extra > 0 {
                share += 1;
                extra -= 1;
            }
            share
        })
        .collect()
}

fn main_sizes(children: &[Child], available_max: u16) -> Vec<u16> {
    let intrinsic_natural: Vec<u16> = children
        .iter()
        .map(|c| if c.ratio.is_none() && is_intrinsic(&c.widget) { Some(layout(&c.widget, Constraints::loose(available_max, u16::MAX), 0, 0).rect.w) } else { None })
        .map(|o| o.unwrap_or(0))
        .collect();
    let intrinsic_total: u16 = intrinsic_natural.iter().sum();
    let available = available_max.saturating_sub(intrinsic_total);

    let ratio_total: f32 = children.iter().filter_map(|c| c.ratio).sum();
    let mut ratio_used = 0u16;
    let ratio_main: Vec<u16> = children
        .iter()
        .map(|c| {
            c.ratio.map(|r| {
                let w = ((r / ratio_total.max(f32::EPSILON)) * available as f32).round().max(0.0) as u16;
                let w = w.min(available.saturating_sub(ratio_used));
                ratio_used = ratio_used.saturating_add(w);
                w
            })
        })
        .map(|o| o.unwrap_or(0))
        .collect();

    let equal_idxs: Vec<usize> = children.iter().enumerate().filter(|(_, c)| c.ratio.is_none() && !is_intrinsic(&c.widget)).map(|(i, _)| i).collect();
    let shares = equal_shares(available.saturating_sub(ratio_used), equal_idxs.len());

    let mut result = vec![0u16; children.len()];
    let mut share_iter = shares.into_iter();
    for (i, child) in children.iter().enumerate() {
        result[i] = if child.ratio.is_some() {
            ratio_main[i]
        } else if is_intrinsic(&child.widget) {
            intrinsic_natural[i]
        } else {
            share_iter.next().unwrap_or(0)
        };
    }
    result
}

fn layout_row(id: Option<u64>, children: &[Child], cross_align: Align, constraints: Constraints, x: u16, y: u16) -> LayoutNode {
    let widths = main_sizes(children, constraints.max_w);
    let mut offset = 0u16;
    let mut nodes = Vec::with_capacity(children.len());
    let mut cross_max = 0u16;
    let mut dividers = Vec::new();
    for (i, (child, w)) in children.iter().zip(widths.iter().copied()).enumerate() {
        let h = if cross_align == Align::Stretch { constraints.max_h } else { constraints.max_h };
        let node = layout(&child.widget, Constraints::loose(w, h), x.saturating_add(offset), y);
        cross_max = cross_max.max(node.rect.h);
        offset = offset.saturating_add(w);
        if i + 1 < children.len() {
            dividers.push((i, offset));
        }
        nodes.push(node);
    }
    align_cross(&mut nodes, cross_align, constraints.max_h, false);
    let rect = Rect { x, y, w: offset.min(constraints.max_w), h: cross_max.min(constraints.max_h) };
    let mut node = LayoutNode::branch(rect, NodeContent::Container { bordered: false }, nodes);
    if let Some(parent_id) = id {
        node.split_handles = dividers
            .into_iter()
            .map(|(child_index, position)| SplitHandle {
                parent_id,
                child_index,
                axis: SplitAxis::Row,
                position: x.saturating_add(position),
                start: y,
                end: y.saturating_add(rect.h),
            })
            .collect();
    }
    node
}

fn layout_column(id: Option<u64>, children: &[Child], cross_align: Align, constraints: Constraints, x: u16, y: u16) -> LayoutNode {
    let heights = main_sizes(
        &children.iter().map(|c| Child { widget: c.widget.clone(), ratio: c.ratio }).collect::<Vec<_>>(),
        constraints.max_h,
    );
    let mut offset = 0u16;
    let mut nodes = Vec::with_capacity(children.len());
    let mut cross_max = 0u16;
    let mut dividers = Vec::new();
    for (i, (child, h)) in children.iter().zip(heights.iter().copied()).enumerate() {
        let node = layout(&child.widget, Constraints::loose(constraints.max_w, h), x, y.saturating_add(offset));
        cross_max = cross_max.max(node.rect.w);
        offset = offset.saturating_add(h);
        if i + 1 < children.len() {
            dividers.push((i, offset));
        }
        nodes.push(node);
    }
    align_cross(&mut nodes, cross_align, constraints.max_w, true);
    let rect = Rect { x, y, w: cross_max.min(constraints.max_w), h: offset.min(constraints.max_h) };
    let mut node = LayoutNode::branch(rect, NodeContent::Container { bordered: false }, nodes);
    if let Some(parent_id) = id {
        node.split_handles = dividers
            .into_iter()
            .map(|(child_index, position)| SplitHandle {
                parent_id,
                child_index,
                axis: SplitAxis::Column,
                position: y.saturating_add(position),
                start: x,
                end: x.saturating_add(rect.w),
            })
            .collect();
    }
    node
}

/// Shifts each child's cross-axis position per `cross_align`, since the
/// first pass lays every child out flush against the container's start.
fn align_cross(nodes: &mut [LayoutNode], cross_align: Align, cross_max: u16, vertical_container: bool) {
    if cross_align == Align::Start || cross_align == Align::Stretch {
        return;
    }
    for node in nodes.iter_mut() {
        let cross = if vertical_container { node.rect.w } else { node.rect.h };
        let pad = match cross_align {
            Align::Center => cross_max.saturating_sub(cross) / 2,
            Align::End => cross_max.saturating_sub(cross),
            Align::Start | Align::Stretch => 0,
        };
        shift(node, if vertical_container { pad } else { 0 }, if vertical_container { 0 } else { pad });
    }
}

fn shift(node: &mut LayoutNode, dx: u16, dy: u16) {
    node.rect.x = node.rect.x.saturating_add(dx);
    node.rect.y = node.rect.y.saturating_add(dy);
    for child in node.children.iter_mut() {
        shift(child, dx, dy);
    }
}

/// Walks a laid-out tree collecting absolute hit regions, last-wins in
/// paint order (§4.6 "Hit regions & split handles").
pub fn collect_hit_regions(node: &LayoutNode, out: &mut Vec<HitRegion>) {
    if let NodeContent::Surface { pty_id } = &node.content {
        out.push(HitRegion { rect: node.rect, target: HitTarget::Surface(*pty_id) });
    }
    for child in &node.children {
        collect_hit_regions(child, out);
    }
}

/// Walks a laid-out tree collecting every `row`/`column`'s split handles,
/// in the same paint order as [`collect_hit_regions`].
pub fn collect_split_handles(node: &LayoutNode, out: &mut Vec<SplitHandle>) {
    out.extend_from_slice(&node.split_handles);
    for child in &node.children {
        collect_split_handles(child, out);
    }
}
