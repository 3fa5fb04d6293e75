use glam::Quat;
use std::f32::consts::PI;

const TWO_PI: f32 = PI * 2.0;

/// Immutable head orientation snapshot. Angles are radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseState {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub quaternion: Quat,
    /// True when the pose came from live tracking rather than a manual/frozen fallback.
    pub tracking_available: bool,
}

impl Default for PoseState {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            quaternion: Quat::IDENTITY,
            tracking_available: false,
        }
    }
}

impl PoseState {
    /// Builds a pose from euler angles, deriving the quaternion.
    pub fn from_euler(yaw: f32, pitch: f32, roll: f32, tracking_available: bool) -> Self {
        Self {
            yaw,
            pitch,
            roll,
            quaternion: pose_quaternion(yaw, pitch, roll),
            tracking_available,
        }
    }

    /// Same pose with new angles; the quaternion is rebuilt to match.
    pub fn with_angles(&self, yaw: f32, pitch: f32, roll: f32) -> Self {
        Self::from_euler(yaw, pitch, roll, self.tracking_available)
    }
}

/// Manual look offset from the touchpad, each axis in (-PI, PI].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchpadBias {
    pub yaw_rad: f32,
    pub pitch_rad: f32,
}

impl TouchpadBias {
    pub fn new(yaw_rad: f32, pitch_rad: f32) -> Self {
        Self { yaw_rad, pitch_rad }
    }

    pub fn normalized(self) -> Self {
        Self {
            yaw_rad: normalize_radians(self.yaw_rad),
            pitch_rad: normalize_radians(self.pitch_rad),
        }
    }
}

impl std::ops::Add for TouchpadBias {
    type Output = TouchpadBias;

    fn add(self, rhs: TouchpadBias) -> TouchpadBias {
        TouchpadBias {
            yaw_rad: self.yaw_rad + rhs.yaw_rad,
            pitch_rad: self.pitch_rad + rhs.pitch_rad,
        }
    }
}

/// Yaw -> pitch -> roll half-angle composition (Z forward, Y up).
pub fn pose_quaternion(yaw: f32, pitch: f32, roll: f32) -> Quat {
    let (sy, cy) = (yaw * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sr, cr) = (roll * 0.5).sin_cos();

    let qw = cr * cp * cy + sr * sp * sy;
    let qx = sr * cp * cy - cr * sp * sy;
    let qy = cr * sp * cy + sr * cp * sy;
    let qz = cr * cp * sy - sr * sp * cy;
    Quat::from_xyzw(qx, qy, qz, qw)
}

/// Reduces an angle modulo 2*PI into (-PI, PI]. Never clamps.
pub fn normalize_radians(value: f32) -> f32 {
    let mut normalized = value % TWO_PI;
    if normalized > PI {
        normalized -= TWO_PI;
    } else if normalized <= -PI {
        normalized += TWO_PI;
    }
    normalized
}
