/// Radians of look offset produced by dragging across the full touchpad half-width.
pub const TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS: f32 = 0.30;

const MAX_EDGE_THRESHOLD: f32 = 0.999;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchpadAutoDragDelta {
    pub yaw_delta_rad: f32,
    pub pitch_delta_rad: f32,
}

impl TouchpadAutoDragDelta {
    pub fn is_zero(&self) -> bool {
        self.yaw_delta_rad == 0.0 && self.pitch_delta_rad == 0.0
    }
}

/// Per-tick look velocity while a drag is held near the touchpad edge.
///
/// `normalized_x`/`normalized_y` are the touch position in [-1, 1] relative to the pad center,
/// with +y pointing down. Pitch is inverted so holding near the bottom edge looks down.
pub fn compute_touchpad_auto_drag_delta(
    normalized_x: f32,
    normalized_y: f32,
    interval_ms: u64,
    edge_threshold: f32,
    radians_per_second: f32,
) -> TouchpadAutoDragDelta {
    let yaw_strength = edge_auto_drag_strength(normalized_x, edge_threshold);
    let pitch_strength = edge_auto_drag_strength(normalized_y, edge_threshold);
    if yaw_strength == 0.0 && pitch_strength == 0.0 {
        return TouchpadAutoDragDelta::default();
    }
    let step_seconds = interval_ms as f32 / 1000.0;
    TouchpadAutoDragDelta {
        yaw_delta_rad: yaw_strength * radians_per_second * step_seconds,
        pitch_delta_rad: -pitch_strength * radians_per_second * step_seconds,
    }
}

/// 0 inside the threshold, ramping linearly to +/-1 at the pad edge.
pub fn edge_auto_drag_strength(normalized_axis: f32, edge_threshold: f32) -> f32 {
    let threshold = edge_threshold.clamp(0.0, MAX_EDGE_THRESHOLD);
    let magnitude = normalized_axis.abs();
    if magnitude <= threshold {
        return 0.0;
    }
    let scaled = ((magnitude - threshold) / (1.0 - threshold)).clamp(0.0, 1.0);
    if normalized_axis >= 0.0 {
        scaled
    } else {
        -scaled
    }
}

/// Converts a drag in pixels into a yaw/pitch bias delta. `None` when the pad has no travel.
pub fn touchpad_drag_delta(
    delta_x: f32,
    delta_y: f32,
    max_offset_x: f32,
    max_offset_y: f32,
) -> Option<(f32, f32)> {
    if max_offset_x <= 0.0 || max_offset_y <= 0.0 {
        return None;
    }
    let yaw = (delta_x / max_offset_x) * TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS;
    let pitch = -(delta_y / max_offset_y) * TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS;
    Some((yaw, pitch))
}
