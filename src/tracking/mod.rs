pub mod controller;
pub mod pose;
pub mod session;
pub mod touchpad;

pub use controller::{RuntimePoseController, MAX_IMU_SENSITIVITY, MIN_IMU_SENSITIVITY};
pub use pose::{normalize_radians, pose_quaternion, PoseState, TouchpadBias};
pub use session::{
    apply_tracking_pose, BiasState, CalibrationAction, ConnectionInfo, RawPoseSample, TrackingClient,
    TrackingError, TrackingSessionManager, TrackingSessionState, TrackingSummary,
};
pub use touchpad::{
    compute_touchpad_auto_drag_delta, edge_auto_drag_strength, touchpad_drag_delta, TouchpadAutoDragDelta,
    TOUCHPAD_DRAG_FULL_TRAVEL_RADIANS,
};
