use std::time::Instant;

use crate::config::TouchpadConfig;
use crate::tracking::{
    compute_touchpad_auto_drag_delta, touchpad_drag_delta, TouchpadAutoDragDelta, TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS,
};

/// Mouse drag over the window acting as the glasses' touchpad.
///
/// Movement produces look-offset deltas; holding near an edge keeps producing deltas at the
/// configured auto-drag interval until the button is released.
#[derive(Debug, Clone)]
pub struct TouchpadGesture {
    config: TouchpadConfig,
    width: f32,
    height: f32,
    last: Option<(f32, f32)>,
    normalized: (f32, f32),
    last_auto_drag: Option<Instant>,
}

impl TouchpadGesture {
    pub fn new(config: TouchpadConfig, width: u32, height: u32) -> Self {
        Self {
            config,
            width: width as f32,
            height: height as f32,
            last: None,
            normalized: (0.0, 0.0),
            last_auto_drag: None,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width as f32;
        self.height = height as f32;
    }

    pub fn is_active(&self) -> bool {
        self.last.is_some()
    }

    pub fn begin(&mut self, x: f32, y: f32, now: Instant) {
        self.last = Some((x, y));
        self.normalized = self.normalize(x, y);
        self.last_auto_drag = Some(now);
    }

    /// Yaw/pitch delta in radians for a pointer move while dragging.
    pub fn moved(&mut self, x: f32, y: f32) -> Option<(f32, f32)> {
        let (last_x, last_y) = self.last.replace((x, y))?;
        self.normalized = self.normalize(x, y);
        let (yaw, pitch) = touchpad_drag_delta(x - last_x, y - last_y, self.width / 2.0, self.height / 2.0)?;
        let scale = self.config.full_travel_rad / TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS;
        Some((yaw * scale, pitch * scale))
    }

    /// Returns true if a drag was in progress; the caller commits the bias then.
    pub fn end(&mut self) -> bool {
        self.last_auto_drag = None;
        self.last.take().is_some()
    }

    /// Edge auto-drag step when one is due at `now`.
    pub fn auto_drag(&mut self, now: Instant) -> Option<TouchpadAutoDragDelta> {
        let last = self.last_auto_drag?;
        if now.duration_since(last) < self.config.auto_drag_interval {
            return None;
        }
        self.last_auto_drag = Some(now);
        let delta = compute_touchpad_auto_drag_delta(
            self.normalized.0,
            self.normalized.1,
            self.config.auto_drag_interval.as_millis() as u64,
            self.config.edge_threshold,
            self.config.auto_drag_speed_rad_per_s,
        );
        (!delta.is_zero()).then_some(delta)
    }

    fn normalize(&self, x: f32, y: f32) -> (f32, f32) {
        let half_w = (self.width / 2.0).max(1.0);
        let half_h = (self.height / 2.0).max(1.0);
        (
            ((x - half_w) / half_w).clamp(-1.0, 1.0),
            ((y - half_h) / half_h).clamp(-1.0, 1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn gesture() -> TouchpadGesture {
        TouchpadGesture::new(TouchpadConfig::default(), 200, 100)
    }

    #[test]
    fn test_drag_maps_half_width_to_full_travel() {
        let mut g = gesture();
        assert!(g.moved(10.0, 10.0).is_none());

        g.begin(100.0, 50.0, Instant::now());
        let (yaw, pitch) = g.moved(200.0, 0.0).unwrap();
        assert_relative_eq!(yaw, TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS);
        // Dragging up looks up.
        assert_relative_eq!(pitch, TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS);
        assert!(g.end());
        assert!(!g.end());
    }

    #[test]
    fn test_auto_drag_only_near_edge_and_when_due() {
        let start = Instant::now();
        let mut g = gesture();
        g.begin(100.0, 50.0, start);
        assert!(g.auto_drag(start + Duration::from_millis(20)).is_none());

        g.moved(199.0, 50.0);
        assert!(g.auto_drag(start + Duration::from_millis(25)).is_none());
        let delta = g.auto_drag(start + Duration::from_millis(40)).unwrap();
        assert!(delta.yaw_delta_rad > 0.0);
        assert_eq!(delta.pitch_delta_rad, 0.0);

        g.end();
        assert!(g.auto_drag(start + Duration::from_millis(100)).is_none());
    }
}
