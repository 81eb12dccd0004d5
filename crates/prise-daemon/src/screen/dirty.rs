/// Tracks whether the grid changed since the last flush (§4.4: "mode
/// changes that affect rendering (palette, default fg/bg) set a global
/// dirty flag"). The Screen Engine diffs the full grid against its previous
/// frame in `flush()`, so the only distinction this needs to make is
/// "redraw everything" vs. "nothing forced this frame".
#[derive(Debug, Default)]
pub struct DirtyTracker {
    global: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.global
    }

    pub fn clear(&mut self) {
        self.global = false;
    }

    /// Forces every row to be considered dirty on the next flush, e.g. for
    /// `attach_pty`'s full redraw (§4.5) or after a resize.
    pub fn mark_all(&mut self) {
        self.global = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clean() {
        assert!(!DirtyTracker::new().is_dirty());
    }

    #[test]
    fn mark_all_sets_dirty_until_cleared() {
        let mut dirty = DirtyTracker::new();
        dirty.mark_all();
        assert!(dirty.is_dirty());
        dirty.clear();
        assert!(!dirty.is_dirty());
    }
}
