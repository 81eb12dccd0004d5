use std::time::{Duration, Instant};

/// What the caller should do after a flush arrives (§4.6 "enforces a minimum
/// frame interval... If the interval hasn't elapsed, a single timer is armed
/// for the remainder; additional flush events within the window are
/// coalesced into that timer").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// No timer is pending; paint immediately and start a new interval.
    PaintNow,
    /// A timer is already armed for `at`; this flush was coalesced into it.
    Coalesced,
}

/// Caps the client's paint rate independent of how often `flush` events
/// arrive, so a chatty PTY cannot drive unbounded terminal writes (§4.6).
#[derive(Debug)]
pub struct FrameClock {
    interval: Duration,
    last_paint: Option<Instant>,
    timer_armed_until: Option<Instant>,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_paint: None, timer_armed_until: None }
    }

    /// Called on every `flush`-triggered render attempt. Returns whether the
    /// caller should paint now, and advances internal bookkeeping either way.
    pub fn on_flush(&mut self, now: Instant) -> FrameDecision {
        if let Some(armed_until) = self.timer_armed_until {
            if now < armed_until {
                return FrameDecision::Coalesced;
            }
        }
        match self.last_paint {
            Some(last) if now.duration_since(last) < self.interval => {
                self.timer_armed_until = Some(last + self.interval);
                FrameDecision::Coalesced
            }
            _ => {
                self.last_paint = Some(now);
                self.timer_armed_until = None;
                FrameDecision::PaintNow
            }
        }
    }

    /// The instant the armed timer should fire, if one is pending. The
    /// caller arms a real timer for this and re-invokes [`Self::on_timer`]
    /// when it elapses.
    pub fn armed_until(&self) -> Option<Instant> {
        self.timer_armed_until
    }

    /// Called when the armed timer fires; always paints and starts a fresh
    /// interval, mirroring the coalescer draining its backlog in one frame.
    pub fn on_timer(&mut self, now: Instant) {
        self.last_paint = Some(now);
        self.timer_armed_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_flush_paints_immediately() {
        let mut clock = FrameClock::new(Duration::from_millis(8));
        assert_eq!(clock.on_flush(Instant::now()), FrameDecision::PaintNow);
    }

    #[test]
    fn flush_within_interval_is_coalesced() {
        let mut clock = FrameClock::new(Duration::from_millis(8));
        let t0 = Instant::now();
        assert_eq!(clock.on_flush(t0), FrameDecision::PaintNow);
        assert_eq!(clock.on_flush(t0 + Duration::from_millis(2)), FrameDecision::Coalesced);
        assert!(clock.armed_until().is_some());
    }

    #[test]
    fn repeated_flushes_within_window_reuse_same_timer() {
        let mut clock = FrameClock::new(Duration::from_millis(8));
        let t0 = Instant::now();
        clock.on_flush(t0);
        clock.on_flush(t0 + Duration::from_millis(1));
        let armed_first = clock.armed_until();
        clock.on_flush(t0 + Duration::from_millis(3));
        assert_eq!(clock.armed_until(), armed_first);
    }

    #[test]
    fn flush_after_interval_elapses_paints_immediately() {
        let mut clock = FrameClock::new(Duration::from_millis(8));
        let t0 = Instant::now();
        clock.on_flush(t0);
        let decision = clock.on_flush(t0 + Duration::from_millis(9));
        assert_eq!(decision, FrameDecision::PaintNow);
    }

    #[test]
    fn timer_fire_resets_interval() {
        let mut clock = FrameClock::new(Duration::from_millis(8));
        let t0 = Instant::now();
        clock.on_flush(t0);
        clock.on_flush(t0 + Duration::from_millis(2));
        clock.on_timer(t0 + Duration::from_millis(8));
        assert!(clock.armed_until().is_none());
        assert_eq!(clock.on_flush(t0 + Duration::from_millis(8)), FrameDecision::Coalesced);
    }
}
