pub const DEFAULT_THRESHOLD_PX: f64 = 200.0;

/// Viewport geometry in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollPosition {
    pub fn distance_to_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }
}

/// Edge-triggered "near bottom" detector.
///
/// Fires once when the distance to the bottom drops below the threshold and
/// stays quiet until the viewport moves back out of range.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    threshold: f64,
    near: bool,
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_PX)
    }
}

impl ScrollTrigger {
    pub fn new(threshold: f64) -> Self {
        ScrollTrigger { threshold, near: false }
    }

    pub fn observe(&mut self, pos: ScrollPosition) -> bool {
        let near = pos.distance_to_bottom() < self.threshold;
        let fired = near && !self.near;
        self.near = near;
        fired
    }

    /// Re-arm without a scroll event, e.g. after the content was replaced.
    pub fn rearm(&mut self) {
        self.near = false;
    }
}
