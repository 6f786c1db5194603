/// Maps the audio clock to a position inside the current track.
///
/// While playing, `elapsed = now - start_time`. While paused or stopped the
/// remembered position lives in `paused_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionTracker {
    start_time: f64,
    paused_at: f64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a source started at `offset` seconds into its track
    pub fn start(&mut self, now: f64, offset: f64) {
        self.start_time = now - offset;
    }

    /// Restart the position at zero, used when a crossfade hands over
    pub fn rebase(&mut self, now: f64) {
        self.start_time = now;
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Seconds into the track at `now`, never negative
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.start_time).max(0.0)
    }

    /// Remember the position at `now` and return it
    pub fn pause(&mut self, now: f64) -> f64 {
        self.paused_at = self.elapsed(now);
        self.paused_at
    }

    pub fn paused_at(&self) -> f64 {
        self.paused_at
    }

    pub fn set_paused_at(&mut self, position: f64) {
        self.paused_at = position.max(0.0);
    }

    /// Return the remembered position and reset it to zero
    pub fn take_paused(&mut self) -> f64 {
        std::mem::take(&mut self.paused_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_from_offset() {
        let mut tracker = PositionTracker::new();
        tracker.start(10.0, 3.0);
        assert_eq!(tracker.start_time(), 7.0);
        assert!((tracker.elapsed(12.5) - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_never_negative() {
        let mut tracker = PositionTracker::new();
        tracker.start(5.0, 0.0);
        assert_eq!(tracker.elapsed(4.0), 0.0);
    }

    #[test]
    fn test_pause_and_take() {
        let mut tracker = PositionTracker::new();
        tracker.start(2.0, 1.0);
        assert!((tracker.pause(4.0) - 3.0).abs() < 1e-9);
        assert!((tracker.paused_at() - 3.0).abs() < 1e-9);
        assert!((tracker.take_paused() - 3.0).abs() < 1e-9);
        assert_eq!(tracker.paused_at(), 0.0);
    }

    #[test]
    fn test_rebase_restarts_position() {
        let mut tracker = PositionTracker::new();
        tracker.start(0.0, 0.0);
        tracker.rebase(5.0);
        assert!((tracker.elapsed(6.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_paused_clamps() {
        let mut tracker = PositionTracker::new();
        tracker.set_paused_at(-2.0);
        assert_eq!(tracker.paused_at(), 0.0);
        tracker.set_paused_at(42.0);
        assert_eq!(tracker.paused_at(), 42.0);
    }
}
