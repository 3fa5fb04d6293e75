pub mod frame;
pub mod projection;
pub mod renderer;

pub use frame::{FrameInputs, FrameReader, FrameSnapshot};
pub use projection::{
    eye_ray, project_ray, rotate_ray, sample_uv, Eye, EyeUniform, ProjectionFovConfig, ProjectionMode, RenderMode,
};
pub use renderer::VrSbsRenderer;
