pub mod config;
pub mod diag;
pub mod display;
pub mod player;
pub mod render;
pub mod routing;
pub mod tracking;
pub mod viewer;

pub use config::PlayerConfig;
pub use render::{ProjectionMode, RenderMode};
pub use viewer::State;
