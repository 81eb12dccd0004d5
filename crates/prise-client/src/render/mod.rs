pub mod clock;
pub mod colors;
pub mod paint;

use std::io::Write;
use std::time::{Duration, Instant};

pub use clock::{FrameClock, FrameDecision};
use prise_protocol::wire_types::PtyId;

use crate::errors::ClientError;
use crate::layout::LayoutNode;
use crate::surface::SurfaceTable;

/// §4.6 "8 ms ≈ 120 Hz cap", matching the daemon's own `frame_interval_ms`
/// default so neither side of the pipe is the bottleneck.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(8);

/// Owns the paint-rate limiter; the widget tree, surfaces, and focus state
/// are supplied fresh on every call since they are rebuilt per frame by the
/// external UI (§9 "arena-allocate the tree per frame").
pub struct Renderer {
    clock: FrameClock,
}

impl Renderer {
    pub fn new(interval: Duration) -> Self {
        Self { clock: FrameClock::new(interval) }
    }

    /// Call on every `redraw`-triggered flush. Returns `true` if the caller
    /// should paint now; `false` means a timer is already armed and this
    /// flush was coalesced into it (§4.6).
    pub fn on_flush(&mut self, now: Instant) -> bool {
        self.clock.on_flush(now) == FrameDecision::PaintNow
    }

    pub fn on_timer(&mut self, now: Instant) {
        self.clock.on_timer(now);
    }

    pub fn armed_until(&self) -> Option<Instant> {
        self.clock.armed_until()
    }

    /// Paints `root` to `out`, blitting each surface from `surfaces` and
    /// dimming everything except `focused`.
    pub fn paint(&self, out: &mut impl Write, root: &LayoutNode, surfaces: &SurfaceTable, focused: Option<PtyId>) -> Result<(), ClientError> {
        paint::paint(out, root, surfaces, focused)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}
