use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use glam::{Vec2, Vec3};

use crate::tracking::PoseState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    #[default]
    Vr180,
    Vr360,
    /// Plain half-frame passthrough, unaffected by head pose.
    Flat,
}

impl ProjectionMode {
    /// Value of the `projection` field the shader switches on.
    pub fn shader_value(self) -> u32 {
        match self {
            ProjectionMode::Vr180 => 0,
            ProjectionMode::Vr360 => 1,
            ProjectionMode::Flat => 2,
        }
    }

    pub fn next(self) -> Self {
        match self {
            ProjectionMode::Vr180 => ProjectionMode::Vr360,
            ProjectionMode::Vr360 => ProjectionMode::Flat,
            ProjectionMode::Flat => ProjectionMode::Vr180,
        }
    }
}

impl fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProjectionMode::Vr180 => "vr180",
            ProjectionMode::Vr360 => "vr360",
            ProjectionMode::Flat => "flat",
        };
        f.write_str(name)
    }
}

impl FromStr for ProjectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vr180" | "180" => Ok(ProjectionMode::Vr180),
            "vr360" | "360" => Ok(ProjectionMode::Vr360),
            "flat" | "2d" => Ok(ProjectionMode::Flat),
            other => Err(anyhow!("unknown projection mode: {}", other)),
        }
    }
}

pub struct ProjectionFovConfig;

impl ProjectionFovConfig {
    pub const DEFAULT_DEGREES: f32 = 95.0;
    pub const MIN_DEGREES: f32 = 60.0;
    pub const MAX_DEGREES: f32 = 145.0;
    pub const STEP_DEGREES: f32 = 1.0;

    pub fn clamp_degrees(value: f32) -> f32 {
        value.clamp(Self::MIN_DEGREES, Self::MAX_DEGREES)
    }

    /// Non-finite input falls back to the default; anything else is clamped.
    pub fn normalize_degrees(value: f32) -> f32 {
        if !value.is_finite() {
            return Self::DEFAULT_DEGREES;
        }
        Self::clamp_degrees(value)
    }
}

/// Settings read once per frame by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderMode {
    pub projection: ProjectionMode,
    pub swap_eyes: bool,
    /// Total angle between the eyes' view directions; each eye gets half.
    pub convergence_deg: f32,
    /// Vertical field of view of one eye.
    pub fov_deg: f32,
}

impl Default for RenderMode {
    fn default() -> Self {
        Self {
            projection: ProjectionMode::Vr180,
            swap_eyes: false,
            convergence_deg: 0.0,
            fov_deg: ProjectionFovConfig::DEFAULT_DEGREES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    fn convergence_sign(self) -> f32 {
        match self {
            Eye::Left => 1.0,
            Eye::Right => -1.0,
        }
    }

    /// Horizontal offset of this eye's half in the side-by-side source.
    pub fn texture_offset(self, swap_eyes: bool) -> f32 {
        match (self, swap_eyes) {
            (Eye::Left, false) | (Eye::Right, true) => 0.0,
            (Eye::Left, true) | (Eye::Right, false) => 0.5,
        }
    }
}

/// Per-eye shader parameters. Layout matches `EyeParams` in `vr_sbs.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EyeUniform {
    pub tex_scale_x: f32,
    pub tex_offset_x: f32,
    pub tan_half_fov_x: f32,
    pub tan_half_fov_y: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub projection: u32,
    pub _padding: u32,
}

impl EyeUniform {
    /// `aspect` is the eye viewport's width over height.
    pub fn new(eye: Eye, pose: &PoseState, mode: &RenderMode, aspect: f32) -> Self {
        let fov = ProjectionFovConfig::normalize_degrees(mode.fov_deg).to_radians();
        let tan_half_fov_y = (fov * 0.5).tan();
        let convergence = if mode.convergence_deg.is_finite() {
            mode.convergence_deg.to_radians()
        } else {
            0.0
        };
        Self {
            tex_scale_x: 0.5,
            tex_offset_x: eye.texture_offset(mode.swap_eyes),
            tan_half_fov_x: tan_half_fov_y * aspect.max(f32::EPSILON),
            tan_half_fov_y,
            yaw: pose.yaw + eye.convergence_sign() * convergence * 0.5,
            pitch: pose.pitch,
            projection: mode.projection.shader_value(),
            _padding: 0,
        }
    }
}

/// View ray through a point of the eye viewport. `ndc` is in [-1, 1] with +y up.
pub fn eye_ray(ndc: Vec2, tan_half_fov_x: f32, tan_half_fov_y: f32) -> Vec3 {
    Vec3::new(ndc.x * tan_half_fov_x, ndc.y * tan_half_fov_y, 1.0).normalize()
}

/// Applies head pitch (positive looks up), then yaw (positive looks right).
pub fn rotate_ray(ray: Vec3, pitch: f32, yaw: f32) -> Vec3 {
    let (sp, cp) = pitch.sin_cos();
    let pitched = Vec3::new(ray.x, ray.y * cp + ray.z * sp, -ray.y * sp + ray.z * cp);
    let (sy, cy) = yaw.sin_cos();
    Vec3::new(pitched.x * cy + pitched.z * sy, pitched.y, -pitched.x * sy + pitched.z * cy)
}

/// Maps a view ray to equirectangular UV within one eye's half. `None` misses the image.
pub fn project_ray(ray: Vec3, projection: ProjectionMode) -> Option<Vec2> {
    let yaw = ray.x.atan2(ray.z);
    let pitch = ray.y.clamp(-1.0, 1.0).asin();
    let v = 0.5 - pitch / PI;
    match projection {
        ProjectionMode::Vr180 => {
            if yaw.abs() > FRAC_PI_2 {
                return None;
            }
            Some(Vec2::new(yaw / PI + 0.5, v))
        }
        ProjectionMode::Vr360 => Some(Vec2::new((yaw / TAU + 0.5).rem_euclid(1.0), v)),
        ProjectionMode::Flat => None,
    }
}

fn projection_from_shader_value(value: u32) -> ProjectionMode {
    match value {
        0 => ProjectionMode::Vr180,
        1 => ProjectionMode::Vr360,
        _ => ProjectionMode::Flat,
    }
}

/// CPU rendition of the fragment shader: source-texture UV for a fragment at `frag_uv`
/// (viewport-relative, +v down), or `None` for black.
pub fn sample_uv(params: &EyeUniform, frag_uv: Vec2) -> Option<Vec2> {
    let local = match projection_from_shader_value(params.projection) {
        ProjectionMode::Flat => frag_uv,
        projection => {
            let ndc = Vec2::new(frag_uv.x * 2.0 - 1.0, 1.0 - frag_uv.y * 2.0);
            let ray = eye_ray(ndc, params.tan_half_fov_x, params.tan_half_fov_y);
            project_ray(rotate_ray(ray, params.pitch, params.yaw), projection)?
        }
    };
    if !(0.0..=1.0).contains(&local.x) || !(0.0..=1.0).contains(&local.y) {
        return None;
    }
    let clamped = local.clamp(Vec2::ZERO, Vec2::ONE);
    Some(Vec2::new(clamped.x * params.tex_scale_x + params.tex_offset_x, clamped.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CENTER: Vec2 = Vec2::new(0.5, 0.5);

    fn params(eye: Eye, yaw: f32, pitch: f32, mode: RenderMode) -> EyeUniform {
        EyeUniform::new(eye, &PoseState::from_euler(yaw, pitch, 0.0, true), &mode, 1.0)
    }

    #[test]
    fn test_fov_normalization() {
        assert_eq!(ProjectionFovConfig::normalize_degrees(f32::NAN), 95.0);
        assert_eq!(ProjectionFovConfig::normalize_degrees(f32::NEG_INFINITY), 95.0);
        assert_eq!(ProjectionFovConfig::normalize_degrees(10.0), 60.0);
        assert_eq!(ProjectionFovConfig::normalize_degrees(170.0), 145.0);
        assert_eq!(ProjectionFovConfig::normalize_degrees(100.0), 100.0);
    }

    #[test]
    fn test_projection_mode_parse_and_cycle() {
        assert_eq!("VR360".parse::<ProjectionMode>().unwrap(), ProjectionMode::Vr360);
        assert_eq!("flat".parse::<ProjectionMode>().unwrap(), ProjectionMode::Flat);
        assert!("cube".parse::<ProjectionMode>().is_err());
        assert_eq!(ProjectionMode::Flat.next(), ProjectionMode::Vr180);
        assert_eq!(ProjectionMode::Vr180.to_string(), "vr180");
    }

    #[test]
    fn test_center_ray_hits_center_of_each_half() {
        let mode = RenderMode::default();
        let left = sample_uv(&params(Eye::Left, 0.0, 0.0, mode), CENTER).unwrap();
        let right = sample_uv(&params(Eye::Right, 0.0, 0.0, mode), CENTER).unwrap();
        assert_relative_eq!(left.x, 0.25, epsilon = 1e-5);
        assert_relative_eq!(left.y, 0.5, epsilon = 1e-5);
        assert_relative_eq!(right.x, 0.75, epsilon = 1e-5);
    }

    #[test]
    fn test_swap_eyes_swaps_halves() {
        let mode = RenderMode {
            swap_eyes: true,
            ..RenderMode::default()
        };
        let left = sample_uv(&params(Eye::Left, 0.0, 0.0, mode), CENTER).unwrap();
        assert_relative_eq!(left.x, 0.75, epsilon = 1e-5);
    }

    #[test]
    fn test_head_yaw_moves_sample_right() {
        let mode = RenderMode::default();
        let yaw = 0.5;
        let uv = sample_uv(&params(Eye::Left, yaw, 0.0, mode), CENTER).unwrap();
        assert_relative_eq!(uv.x, (yaw / PI + 0.5) * 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_head_pitch_moves_sample_up() {
        let mode = RenderMode::default();
        let pitch = 0.3;
        let uv = sample_uv(&params(Eye::Left, 0.0, pitch, mode), CENTER).unwrap();
        assert_relative_eq!(uv.y, 0.5 - pitch / PI, epsilon = 1e-5);
    }

    #[test]
    fn test_vr180_outside_cone_is_black() {
        let mode = RenderMode::default();
        assert!(sample_uv(&params(Eye::Left, 2.0, 0.0, mode), CENTER).is_none());
    }

    #[test]
    fn test_vr360_wraps_behind_viewer() {
        let mode = RenderMode {
            projection: ProjectionMode::Vr360,
            ..RenderMode::default()
        };
        let uv = sample_uv(&params(Eye::Left, PI - 0.01, 0.0, mode), CENTER).unwrap();
        assert!(uv.x > 0.49 && uv.x <= 0.5);
        let uv = sample_uv(&params(Eye::Left, -PI + 0.01, 0.0, mode), CENTER).unwrap();
        assert!(uv.x < 0.01);
    }

    #[test]
    fn test_flat_ignores_pose_and_convergence() {
        let mode = RenderMode {
            projection: ProjectionMode::Flat,
            convergence_deg: 10.0,
            ..RenderMode::default()
        };
        let frag = Vec2::new(0.2, 0.7);
        let still = sample_uv(&params(Eye::Right, 0.0, 0.0, mode), frag).unwrap();
        let moved = sample_uv(&params(Eye::Right, 1.0, 0.4, mode), frag).unwrap();
        assert_relative_eq!(still.x, 0.6, epsilon = 1e-6);
        assert_relative_eq!(still.y, 0.7, epsilon = 1e-6);
        assert_eq!(still, moved);
    }

    #[test]
    fn test_convergence_splits_between_eyes() {
        let mode = RenderMode {
            convergence_deg: 4.0,
            ..RenderMode::default()
        };
        let pose = PoseState::default();
        let left = EyeUniform::new(Eye::Left, &pose, &mode, 1.0);
        let right = EyeUniform::new(Eye::Right, &pose, &mode, 1.0);
        assert_relative_eq!(left.yaw, 2.0f32.to_radians(), epsilon = 1e-6);
        assert_relative_eq!(right.yaw, -2.0f32.to_radians(), epsilon = 1e-6);
    }

    #[test]
    fn test_horizontal_fov_scales_with_aspect() {
        let mode = RenderMode {
            fov_deg: 90.0,
            ..RenderMode::default()
        };
        let eye = EyeUniform::new(Eye::Left, &PoseState::default(), &mode, 0.5);
        assert_relative_eq!(eye.tan_half_fov_y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(eye.tan_half_fov_x, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_viewport_edge_matches_half_fov() {
        let mode = RenderMode {
            fov_deg: 90.0,
            ..RenderMode::default()
        };
        let eye = params(Eye::Left, 0.0, 0.0, mode);
        let top = sample_uv(&eye, Vec2::new(0.5, 0.0)).unwrap();
        // 45 degrees up is a quarter of the vertical range above center.
        assert_relative_eq!(top.y, 0.25, epsilon = 1e-5);
    }

    #[test]
    fn test_uniform_layout_is_16_byte_multiple() {
        assert_eq!(std::mem::size_of::<EyeUniform>() % 16, 0);
    }
}
