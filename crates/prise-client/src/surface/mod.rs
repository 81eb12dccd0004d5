pub mod grid;

use std::collections::HashMap;

use prise_protocol::wire_types::{PtyId, RedrawEvent};

pub use grid::Surface;

/// Owns every attached PTY's [`Surface`] mirror, keyed by PTY id (§4.6
/// "Owns `Surfaces: map<pty_id, Surface>`").
#[derive(Debug, Default)]
pub struct SurfaceTable {
    surfaces: HashMap<u64, Surface>,
}

impl SurfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pty_id: PtyId, rows: u16, cols: u16) {
        self.surfaces.insert(pty_id.0, Surface::new(rows, cols));
    }

    pub fn remove(&mut self, pty_id: PtyId) {
        self.surfaces.remove(&pty_id.0);
    }

    pub fn get(&self, pty_id: PtyId) -> Option<&Surface> {
        self.surfaces.get(&pty_id.0)
    }

    pub fn get_mut(&mut self, pty_id: PtyId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&pty_id.0)
    }

    /// Applies a `redraw` notification to its Surface, creating one with a
    /// default size if this is the first event seen for `pty_id` (e.g. a
    /// race between `attach_pty`'s response and the first redraw).
    pub fn apply_redraw(&mut self, pty_id: PtyId, events: &[RedrawEvent]) {
        self.surfaces.entry(pty_id.0).or_insert_with(|| Surface::new(24, 80)).apply(events);
    }

    pub fn contains(&self, pty_id: PtyId) -> bool {
        self.surfaces.contains_key(&pty_id.0)
    }
}
