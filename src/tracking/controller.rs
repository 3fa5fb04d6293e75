use super::pose::{PoseState, TouchpadBias};

pub const MIN_IMU_SENSITIVITY: f32 = 0.1;
pub const MAX_IMU_SENSITIVITY: f32 = 0.9;

/// Fuses the tracking pose (scaled by sensitivity) with the manual touchpad bias.
///
/// The applied pose is always `base + committed + gesture` on yaw/pitch, where `base` is the
/// live scaled pose while IMU tracking is enabled and the pose frozen at disable time otherwise.
/// Tracking samples keep updating the scaled pose while disabled, so re-enabling resumes from the
/// newest sample.
#[derive(Debug, Clone)]
pub struct RuntimePoseController {
    sensitivity: f32,
    min_sensitivity: f32,
    max_sensitivity: f32,
    imu_tracking_enabled: bool,
    latest_tracking_pose: PoseState,
    latest_scaled_pose: PoseState,
    frozen_pose: PoseState,
    committed_bias: TouchpadBias,
    gesture_bias: TouchpadBias,
    applied_pose: PoseState,
}

impl RuntimePoseController {
    pub fn new(initial_sensitivity: f32) -> Self {
        Self::with_range(initial_sensitivity, MIN_IMU_SENSITIVITY, MAX_IMU_SENSITIVITY)
    }

    pub fn with_range(initial_sensitivity: f32, min_sensitivity: f32, max_sensitivity: f32) -> Self {
        let sensitivity = clamp_sensitivity(initial_sensitivity, min_sensitivity, max_sensitivity);
        let latest_tracking_pose = PoseState::default();
        let latest_scaled_pose = scale_pose(&latest_tracking_pose, sensitivity);
        let mut controller = Self {
            sensitivity,
            min_sensitivity,
            max_sensitivity,
            imu_tracking_enabled: true,
            latest_tracking_pose,
            latest_scaled_pose,
            frozen_pose: latest_scaled_pose,
            committed_bias: TouchpadBias::default(),
            gesture_bias: TouchpadBias::default(),
            applied_pose: latest_scaled_pose,
        };
        controller.applied_pose = controller.compose();
        controller
    }

    pub fn imu_sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn is_imu_tracking_enabled(&self) -> bool {
        self.imu_tracking_enabled
    }

    pub fn current_pose(&self) -> PoseState {
        self.applied_pose
    }

    pub fn on_tracking_pose_updated(&mut self, pose: PoseState) -> PoseState {
        self.latest_tracking_pose = pose;
        self.latest_scaled_pose = scale_pose(&pose, self.sensitivity);
        if self.imu_tracking_enabled {
            self.applied_pose = self.compose();
        }
        self.applied_pose
    }

    pub fn set_imu_sensitivity(&mut self, value: f32) -> PoseState {
        self.sensitivity = clamp_sensitivity(value, self.min_sensitivity, self.max_sensitivity);
        self.latest_scaled_pose = scale_pose(&self.latest_tracking_pose, self.sensitivity);
        if self.imu_tracking_enabled {
            self.applied_pose = self.compose();
        }
        self.applied_pose
    }

    pub fn set_imu_tracking_enabled(&mut self, enabled: bool) -> PoseState {
        if self.imu_tracking_enabled == enabled {
            return self.applied_pose;
        }
        if !enabled {
            self.frozen_pose = self.latest_scaled_pose;
        }
        self.imu_tracking_enabled = enabled;
        self.applied_pose = self.compose();
        self.applied_pose
    }

    /// Adds to the live gesture bias only; the committed bias is untouched.
    pub fn apply_touchpad_bias_delta(&mut self, yaw_delta_rad: f32, pitch_delta_rad: f32) -> PoseState {
        self.gesture_bias = (self.gesture_bias + TouchpadBias::new(yaw_delta_rad, pitch_delta_rad)).normalized();
        self.applied_pose = self.compose();
        self.applied_pose
    }

    pub fn commit_touchpad_bias(&mut self) -> PoseState {
        self.committed_bias = self.combined_bias();
        self.gesture_bias = TouchpadBias::default();
        self.applied_pose = self.compose();
        self.applied_pose
    }

    pub fn reset_touchpad_bias(&mut self) -> PoseState {
        self.committed_bias = TouchpadBias::default();
        self.gesture_bias = TouchpadBias::default();
        self.applied_pose = self.compose();
        self.applied_pose
    }

    fn combined_bias(&self) -> TouchpadBias {
        (self.committed_bias + self.gesture_bias).normalized()
    }

    fn compose(&self) -> PoseState {
        let base = if self.imu_tracking_enabled {
            self.latest_scaled_pose
        } else {
            self.frozen_pose
        };
        let bias = self.combined_bias();
        base.with_angles(base.yaw + bias.yaw_rad, base.pitch + bias.pitch_rad, base.roll)
    }
}

fn clamp_sensitivity(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        max
    }
}

fn scale_pose(pose: &PoseState, sensitivity: f32) -> PoseState {
    pose.with_angles(pose.yaw * sensitivity, pose.pitch * sensitivity, pose.roll * sensitivity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::tracking::pose::pose_quaternion;

    const EPSILON: f32 = 1e-4;

    fn pose(yaw: f32, pitch: f32, roll: f32) -> PoseState {
        PoseState::from_euler(yaw, pitch, roll, true)
    }

    #[test]
    fn test_scales_pose_with_sensitivity() {
        let mut controller = RuntimePoseController::new(0.5);
        let updated = controller.on_tracking_pose_updated(pose(1.2, -0.6, 0.4));

        assert_relative_eq!(updated.yaw, 0.6, epsilon = EPSILON);
        assert_relative_eq!(updated.pitch, -0.3, epsilon = EPSILON);
        assert_relative_eq!(updated.roll, 0.2, epsilon = EPSILON);
        assert!(updated.tracking_available);
    }

    #[test]
    fn test_sensitivity_is_clamped() {
        let mut controller = RuntimePoseController::new(5.0);
        assert_relative_eq!(controller.imu_sensitivity(), MAX_IMU_SENSITIVITY);

        controller.set_imu_sensitivity(0.0);
        assert_relative_eq!(controller.imu_sensitivity(), MIN_IMU_SENSITIVITY);

        controller.set_imu_sensitivity(f32::NAN);
        assert_relative_eq!(controller.imu_sensitivity(), MAX_IMU_SENSITIVITY);
    }

    #[test]
    fn test_set_sensitivity_rescales_latest_raw_pose() {
        let mut controller = RuntimePoseController::new(0.5);
        controller.on_tracking_pose_updated(pose(1.0, 0.4, 0.2));
        let rescaled = controller.set_imu_sensitivity(0.2);

        assert_relative_eq!(rescaled.yaw, 0.2, epsilon = EPSILON);
        assert_relative_eq!(rescaled.pitch, 0.08, epsilon = EPSILON);
        assert_relative_eq!(rescaled.roll, 0.04, epsilon = EPSILON);
    }

    #[test]
    fn test_holds_applied_pose_while_imu_disabled() {
        let mut controller = RuntimePoseController::new(0.5);
        controller.on_tracking_pose_updated(pose(1.0, 0.2, 0.0));
        controller.apply_touchpad_bias_delta(0.1, -0.05);
        let frozen = controller.set_imu_tracking_enabled(false);

        let after_update = controller.on_tracking_pose_updated(pose(4.0, 2.0, 0.3));

        assert_relative_eq!(after_update.yaw, frozen.yaw, epsilon = EPSILON);
        assert_relative_eq!(after_update.pitch, frozen.pitch, epsilon = EPSILON);
        assert_relative_eq!(after_update.roll, frozen.roll, epsilon = EPSILON);
    }

    #[test]
    fn test_reenable_resumes_from_latest_sample() {
        let mut controller = RuntimePoseController::new(0.5);
        controller.on_tracking_pose_updated(pose(0.4, 0.2, 0.0));
        controller.set_imu_tracking_enabled(false);
        controller.on_tracking_pose_updated(pose(1.6, -0.8, 0.2));

        let resumed = controller.set_imu_tracking_enabled(true);

        assert_relative_eq!(resumed.yaw, 0.8, epsilon = EPSILON);
        assert_relative_eq!(resumed.pitch, -0.4, epsilon = EPSILON);
        assert_relative_eq!(resumed.roll, 0.1, epsilon = EPSILON);
    }

    #[test]
    fn test_toggle_to_same_state_is_noop() {
        let mut controller = RuntimePoseController::new(0.5);
        let before = controller.on_tracking_pose_updated(pose(0.4, 0.0, 0.0));
        let after = controller.set_imu_tracking_enabled(true);
        assert_eq!(before, after);
        assert!(controller.is_imu_tracking_enabled());
    }

    #[test]
    fn test_commit_over_frozen_base_is_durable() {
        let mut controller = RuntimePoseController::new(0.5);
        controller.on_tracking_pose_updated(pose(2.0, 0.0, 0.0));
        controller.set_imu_tracking_enabled(false);

        let biased = controller.apply_touchpad_bias_delta(0.1, -0.1);
        let committed = controller.commit_touchpad_bias();
        let centered = controller.apply_touchpad_bias_delta(0.0, 0.0);

        assert_relative_eq!(biased.yaw, 1.1, epsilon = EPSILON);
        assert_relative_eq!(biased.pitch, -0.1, epsilon = EPSILON);
        assert_relative_eq!(committed.yaw, 1.1, epsilon = EPSILON);
        assert_relative_eq!(committed.pitch, -0.1, epsilon = EPSILON);
        assert_relative_eq!(centered.yaw, 1.1, epsilon = EPSILON);
        assert_relative_eq!(centered.pitch, -0.1, epsilon = EPSILON);
    }

    #[test]
    fn test_live_gesture_layers_on_committed_bias() {
        let mut controller = RuntimePoseController::new(0.5);
        controller.on_tracking_pose_updated(pose(2.0, 0.0, 0.0));
        controller.set_imu_tracking_enabled(false);
        controller.apply_touchpad_bias_delta(0.1, 0.0);
        controller.commit_touchpad_bias();

        let live = controller.apply_touchpad_bias_delta(0.08, 0.0);
        let committed = controller.commit_touchpad_bias();
        let centered = controller.apply_touchpad_bias_delta(0.0, 0.0);

        assert_relative_eq!(live.yaw, 1.18, epsilon = EPSILON);
        assert_relative_eq!(committed.yaw, 1.18, epsilon = EPSILON);
        assert_relative_eq!(centered.yaw, 1.18, epsilon = EPSILON);
        assert_relative_eq!(centered.pitch, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_touchpad_delta_accumulates_without_clamp() {
        let mut controller = RuntimePoseController::new(0.5);
        controller.on_tracking_pose_updated(pose(0.0, 0.0, 0.0));

        controller.apply_touchpad_bias_delta(0.2, -0.1);
        controller.apply_touchpad_bias_delta(0.25, -0.22);
        let committed = controller.commit_touchpad_bias();

        assert_relative_eq!(committed.yaw, 0.45, epsilon = EPSILON);
        assert_relative_eq!(committed.pitch, -0.32, epsilon = EPSILON);

        // Large drags wrap through PI instead of stopping at a fixed maximum.
        for _ in 0..10 {
            controller.apply_touchpad_bias_delta(0.3, 0.0);
        }
        let wrapped = controller.commit_touchpad_bias();
        assert_relative_eq!(wrapped.yaw, 3.45 - 2.0 * std::f32::consts::PI, epsilon = EPSILON);
    }

    #[test]
    fn test_reset_clears_committed_and_gesture_bias() {
        let mut controller = RuntimePoseController::new(0.5);
        controller.on_tracking_pose_updated(pose(2.0, 0.0, 0.0));
        controller.apply_touchpad_bias_delta(0.1, 0.0);
        controller.commit_touchpad_bias();
        controller.apply_touchpad_bias_delta(0.08, -0.05);

        let reset = controller.reset_touchpad_bias();

        assert_relative_eq!(reset.yaw, 1.0, epsilon = EPSILON);
        assert_relative_eq!(reset.pitch, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_quaternion_tracks_combined_angles() {
        let mut controller = RuntimePoseController::new(0.5);
        controller.on_tracking_pose_updated(pose(1.0, 0.4, 0.6));
        let applied = controller.apply_touchpad_bias_delta(0.2, 0.1);

        let expected = pose_quaternion(applied.yaw, applied.pitch, applied.roll);
        assert_relative_eq!(applied.quaternion.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(applied.quaternion.y, expected.y, epsilon = 1e-6);
        assert_relative_eq!(applied.quaternion.z, expected.z, epsilon = 1e-6);
        assert_relative_eq!(applied.quaternion.w, expected.w, epsilon = 1e-6);
        assert_relative_eq!(applied.roll, 0.3, epsilon = EPSILON);
    }
}
