use std::time::Duration;

use crate::render::{ProjectionFovConfig, RenderMode};
use crate::tracking::{MAX_IMU_SENSITIVITY, MIN_IMU_SENSITIVITY, TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS};

pub const DEFAULT_IMU_SENSITIVITY: f32 = 0.9;
pub const SEEK_STEP_MS: i64 = 15_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchpadConfig {
    /// Yaw/pitch reached by dragging across the whole touchpad.
    pub full_travel_rad: f32,
    pub auto_drag_interval: Duration,
    /// Normalized distance from center where edge auto-drag starts.
    pub edge_threshold: f32,
    pub auto_drag_speed_rad_per_s: f32,
}

impl Default for TouchpadConfig {
    fn default() -> Self {
        Self {
            full_travel_rad: TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS,
            auto_drag_interval: Duration::from_millis(16),
            edge_threshold: 0.9,
            auto_drag_speed_rad_per_s: 0.24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingTiming {
    pub reconnect_watchdog: Duration,
    pub paused_frame_retry: Duration,
    pub paused_frame_timeout: Duration,
}

impl Default for RoutingTiming {
    fn default() -> Self {
        Self {
            reconnect_watchdog: Duration::from_millis(500),
            paused_frame_retry: Duration::from_millis(250),
            paused_frame_timeout: Duration::from_millis(2_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerConfig {
    pub imu_sensitivity: f32,
    pub touchpad: TouchpadConfig,
    pub routing: RoutingTiming,
    pub seek_step_ms: i64,
    pub render: RenderMode,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            imu_sensitivity: DEFAULT_IMU_SENSITIVITY,
            touchpad: TouchpadConfig::default(),
            routing: RoutingTiming::default(),
            seek_step_ms: SEEK_STEP_MS,
            render: RenderMode::default(),
        }
    }
}

impl PlayerConfig {
    /// Brings user-supplied values into their supported ranges. Never fails.
    pub fn normalized(mut self) -> Self {
        self.imu_sensitivity = if self.imu_sensitivity.is_finite() {
            self.imu_sensitivity.clamp(MIN_IMU_SENSITIVITY, MAX_IMU_SENSITIVITY)
        } else {
            DEFAULT_IMU_SENSITIVITY
        };
        self.render.fov_deg = ProjectionFovConfig::normalize_degrees(self.render.fov_deg);
        if !self.render.convergence_deg.is_finite() {
            self.render.convergence_deg = 0.0;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ProjectionMode;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.imu_sensitivity, 0.9);
        assert_eq!(config.routing.reconnect_watchdog, Duration::from_millis(500));
        assert_eq!(config.routing.paused_frame_retry, Duration::from_millis(250));
        assert_eq!(config.routing.paused_frame_timeout, Duration::from_millis(2_000));
        assert_eq!(config.touchpad.auto_drag_interval, Duration::from_millis(16));
        assert_eq!(config.seek_step_ms, 15_000);
        assert_eq!(config.render.projection, ProjectionMode::Vr180);
        assert_eq!(config.render.fov_deg, ProjectionFovConfig::DEFAULT_DEGREES);
        assert!(!config.render.swap_eyes);
    }

    #[test]
    fn test_normalized_clamps_inputs() {
        let mut config = PlayerConfig::default();
        config.imu_sensitivity = 4.0;
        config.render.fov_deg = 200.0;
        config.render.convergence_deg = f32::NAN;
        let config = config.normalized();
        assert_eq!(config.imu_sensitivity, MAX_IMU_SENSITIVITY);
        assert_eq!(config.render.fov_deg, ProjectionFovConfig::MAX_DEGREES);
        assert_eq!(config.render.convergence_deg, 0.0);

        let mut config = PlayerConfig::default();
        config.imu_sensitivity = f32::NAN;
        config.render.fov_deg = f32::INFINITY;
        let config = config.normalized();
        assert_eq!(config.imu_sensitivity, DEFAULT_IMU_SENSITIVITY);
        assert_eq!(config.render.fov_deg, ProjectionFovConfig::DEFAULT_DEGREES);
    }
}
