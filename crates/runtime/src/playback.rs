//! Path playback state.

/// Default playback speed in visual units per second.
pub const PATH_SPEED: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    pub playing: bool,
    pub elapsed_s: f64,
    /// Visual units per second.
    pub speed: f64,
    /// Start automatically once every visible tile has loaded.
    pub autoplay_pending: bool,
}

impl Playback {
    pub fn new() -> Self {
        Self {
            playing: false,
            elapsed_s: 0.0,
            speed: PATH_SPEED,
            autoplay_pending: false,
        }
    }

    pub fn start(&mut self) {
        self.playing = true;
        self.autoplay_pending = false;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Normalized progress along a path of `total_length` visual units.
    pub fn progress(&self, total_length: f64) -> f64 {
        if total_length <= 0.0 {
            return 0.0;
        }
        (self.elapsed_s * self.speed / total_length).clamp(0.0, 1.0)
    }

    /// Advance by `dt_s` seconds; pauses on reaching the end. Returns the new
    /// progress.
    pub fn advance(&mut self, dt_s: f64, total_length: f64) -> f64 {
        if self.playing {
            self.elapsed_s += dt_s.max(0.0);
        }
        let p = self.progress(total_length);
        if p >= 1.0 {
            self.playing = false;
        }
        p
    }

    /// Jump the timeline to a keyframe's arc distance.
    pub fn seek_to_distance(&mut self, distance: f64) {
        self.elapsed_s = if self.speed > 0.0 {
            distance.max(0.0) / self.speed
        } else {
            0.0
        };
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Playback;

    #[test]
    fn advances_and_pauses_at_the_end() {
        let mut pb = Playback::new();
        pb.speed = 2.0;
        pb.start();
        assert!((pb.advance(1.0, 10.0) - 0.2).abs() < 1e-12);
        assert!(pb.playing);
        let p = pb.advance(100.0, 10.0);
        assert_eq!(p, 1.0);
        assert!(!pb.playing);
    }

    #[test]
    fn degenerate_path_pins_progress_to_zero() {
        let mut pb = Playback::new();
        pb.start();
        assert_eq!(pb.advance(5.0, 0.0), 0.0);
    }

    #[test]
    fn seek_lands_on_the_stop() {
        let mut pb = Playback::new();
        pb.speed = 2.0;
        pb.seek_to_distance(7.0);
        assert!((pb.elapsed_s - 3.5).abs() < 1e-12);
        assert!((pb.progress(14.0) - 0.5).abs() < 1e-12);
    }
}
