use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use vr2xr::{PlayerConfig, ProjectionMode, State};
use vr2xr::player::SourceDescriptor;
use vr2xr::render::ProjectionFovConfig;
use winit::{
    event::*,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Side-by-side image to show
    image: PathBuf,

    /// Projection of the source: vr180, vr360 or flat
    #[arg(long, default_value = "vr180")]
    projection: ProjectionMode,

    /// Vertical field of view per eye in degrees
    #[arg(long, default_value_t = ProjectionFovConfig::DEFAULT_DEGREES)]
    fov: f32,

    /// Angle between the eyes' view directions in degrees
    #[arg(long, default_value_t = 0.0)]
    convergence: f32,

    /// Show the left half to the right eye and vice versa
    #[arg(long)]
    swap_eyes: bool,

    /// IMU sensitivity, 0.1 to 0.9
    #[arg(long, default_value_t = vr2xr::config::DEFAULT_IMU_SENSITIVITY)]
    sensitivity: f32,
}

impl Args {
    fn player_config(&self) -> PlayerConfig {
        let mut config = PlayerConfig {
            imu_sensitivity: self.sensitivity,
            ..PlayerConfig::default()
        };
        config.render.projection = self.projection;
        config.render.fov_deg = self.fov;
        config.render.convergence_deg = self.convergence;
        config.render.swap_eyes = self.swap_eyes;
        config
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let source = SourceDescriptor::from_path(&args.image)
        .with_context(|| format!("invalid image path {}", args.image.display()))?;

    let event_loop = winit::event_loop::EventLoop::new().context("failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title("vr2xr")
        .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 360.0))
        .build(&event_loop)
        .context("failed to create window")?;

    let mut state = State::new(window, source, args.player_config())?;

    event_loop.run(move |event, window_target| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window().id() => match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match key_code {
                KeyCode::Escape => {
                    state.shutdown();
                    window_target.exit();
                }
                KeyCode::KeyR => state.reset_touchpad_bias(),
                KeyCode::KeyI => state.toggle_imu_tracking(),
                KeyCode::Space => state.toggle_play_pause(),
                KeyCode::ArrowLeft => state.seek_by(-state.seek_step_ms()),
                KeyCode::ArrowRight => state.seek_by(state.seek_step_ms()),
                KeyCode::KeyP => state.cycle_projection(),
                KeyCode::KeyE => state.swap_eyes(),
                KeyCode::BracketLeft => state.adjust_fov(-1.0),
                KeyCode::BracketRight => state.adjust_fov(1.0),
                _ => {}
            },
            WindowEvent::CursorMoved { position, .. } => {
                state.cursor_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => match button_state {
                ElementState::Pressed => state.pointer_pressed(),
                ElementState::Released => state.pointer_released(),
            },
            WindowEvent::CloseRequested => {
                state.shutdown();
                window_target.exit();
            }
            WindowEvent::Resized(new_size) => state.resize(new_size),
            WindowEvent::Occluded(occluded) => state.set_occluded(occluded),
            WindowEvent::RedrawRequested => match state.render() {
                Ok(()) => {}
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("out of GPU memory");
                    state.shutdown();
                    window_target.exit();
                }
                Err(e) => log::warn!("render error: {}", e),
            },
            _ => {}
        },
        Event::AboutToWait => {
            state.update();
            state.window().request_redraw();
        }
        _ => {}
    })?;
    Ok(())
}
