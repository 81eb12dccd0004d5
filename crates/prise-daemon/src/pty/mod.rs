pub mod worker;

use std::sync::atomic::{AtomicU64, Ordering};

use prise_protocol::wire_types::PtyId;

/// Allocates [`PtyId`]s monotonically; never reuses one within the daemon's
/// lifetime (§3).
#[derive(Debug, Default)]
pub struct PtyIdAllocator {
    next: AtomicU64,
}

impl PtyIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> PtyId {
        PtyId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_never_zero() {
        let alloc = PtyIdAllocator::new();
        let a = alloc.next_id();
        let b = alloc.next_id();
        assert!(a.0 >= 1);
        assert!(b.0 > a.0);
    }
}
