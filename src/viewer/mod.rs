use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use log::{info, warn};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::config::PlayerConfig;
use crate::diag::diagnostics_enabled;
use crate::display::DisplayEvent;
use crate::player::{
    clamp_seek_target, lock_coordinator, EngineEvent, PlaybackCoordinator, SharedCoordinator, SourceDescriptor,
    StillFrame, StillFrameEngine, SurfaceHandle,
};
use crate::render::{FrameInputs, FrameReader, ProjectionFovConfig, VrSbsRenderer};
use crate::routing::{PlayerRouting, PresentationToken, RouteController};
use crate::tracking::{PoseState, RuntimePoseController};

pub mod gesture;
pub mod window;

pub use gesture::TouchpadGesture;
pub use window::{window_display, WindowDisplays, WindowPresentation, WindowPresentationFactory, WINDOW_DISPLAY_ID};

type ViewerRouting = PlayerRouting<WindowDisplays, WindowPresentationFactory>;

/// Desktop player: the window is the external display, a still SBS image is the media.
pub struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    renderer: VrSbsRenderer,
    player_config: PlayerConfig,
    coordinator: SharedCoordinator,
    routing: ViewerRouting,
    displays: WindowDisplays,
    presentation_ready: mpsc::UnboundedReceiver<PresentationToken>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    frames: watch::Receiver<Option<StillFrame>>,
    window_surface: Option<SurfaceHandle>,
    next_surface_id: u64,
    uploaded: Option<Arc<RgbaImage>>,
    pose: RuntimePoseController,
    gesture: TouchpadGesture,
    cursor: (f32, f32),
    inputs: FrameInputs,
    reader: FrameReader,
    title: String,
    diagnostics: bool,
    // Dropped last so routing tasks are aborted while it still runs.
    runtime: Runtime,
}

impl State {
    pub fn new(window: Window, source: SourceDescriptor, player_config: PlayerConfig) -> Result<Self> {
        let window = Arc::new(window);
        let size = window.inner_size();
        let player_config = player_config.normalized();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::from_build_config(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create window surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no GPU adapter can present to this window"))?;
        let info = adapter.get_info();
        info!("using adapter {} ({:?}, driver {})", info.name, info.backend, info.driver);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Primary Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("window surface reports no formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!("surface {:?} {}x{}", surface_format, config.width, config.height);

        let renderer = VrSbsRenderer::new(Arc::new(device), Arc::new(queue), surface_format);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("vr2xr-routing")
            .enable_all()
            .build()
            .context("failed to start routing runtime")?;

        let (engine, engine_events, frames) = StillFrameEngine::new();
        let mut coordinator = PlaybackCoordinator::new();
        coordinator.attach_engine(Box::new(engine));
        coordinator.attach_source(source, true);
        let coordinator = coordinator.shared();

        let displays = WindowDisplays::default();
        displays.set(window_display(size, refresh_rate_hz(&window)));
        let (factory, presentation_ready) = WindowPresentationFactory::new(displays.clone());
        let controller = RouteController::new(coordinator.clone(), displays.clone(), factory);
        let mut routing = PlayerRouting::new(controller, player_config.routing);
        {
            let _rt = runtime.enter();
            routing.start();
        }

        let pose = RuntimePoseController::new(player_config.imu_sensitivity);
        let inputs = FrameInputs::new(pose.current_pose(), player_config.render);
        let reader = inputs.reader();

        Ok(Self {
            gesture: TouchpadGesture::new(player_config.touchpad, size.width, size.height),
            window,
            surface,
            config,
            renderer,
            player_config,
            coordinator,
            routing,
            displays,
            presentation_ready,
            engine_events,
            frames,
            window_surface: None,
            next_surface_id: 0,
            uploaded: None,
            pose,
            cursor: (0.0, 0.0),
            inputs,
            reader,
            title: String::new(),
            diagnostics: diagnostics_enabled(),
            runtime,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(self.renderer.device(), &self.config);
            self.gesture.resize(new_size.width, new_size.height);
        }
        self.display_changed(new_size);
    }

    /// A hidden window is treated as a disconnected display.
    pub fn set_occluded(&mut self, occluded: bool) {
        let size = if occluded {
            PhysicalSize::new(0, 0)
        } else {
            self.window.inner_size()
        };
        self.display_changed(size);
    }

    fn display_changed(&mut self, size: PhysicalSize<u32>) {
        let previous = self.displays.current();
        let display = window_display(size, refresh_rate_hz(&self.window));
        let event = match (&previous, &display) {
            (None, Some(_)) => DisplayEvent::Added(WINDOW_DISPLAY_ID),
            (Some(_), None) => DisplayEvent::Removed(WINDOW_DISPLAY_ID),
            _ => DisplayEvent::Changed(WINDOW_DISPLAY_ID),
        };
        if !self.displays.set(display) {
            return;
        }
        let _rt = self.runtime.enter();
        self.routing.on_display_event(event);
    }

    /// Per-frame bookkeeping: surface callbacks, engine events, new frames and touchpad auto-drag.
    pub fn update(&mut self) {
        while let Ok(token) = self.presentation_ready.try_recv() {
            self.next_surface_id += 1;
            let surface = SurfaceHandle(self.next_surface_id);
            self.window_surface = Some(surface);
            let _rt = self.runtime.enter();
            self.routing.on_external_surface_ready(token, surface);
        }

        {
            let mut coordinator = lock_coordinator(&self.coordinator);
            while let Ok(event) = self.engine_events.try_recv() {
                coordinator.handle_engine_event(event);
            }
            coordinator.refresh_progress();
        }

        if self.frames.has_changed().unwrap_or(false) {
            let frame = self.frames.borrow_and_update().clone();
            match frame {
                Some(frame) if Some(frame.surface) == self.window_surface => {
                    if !self.uploaded.as_ref().is_some_and(|image| Arc::ptr_eq(image, &frame.image)) {
                        self.renderer.upload_frame(&frame.image);
                        self.uploaded = Some(frame.image);
                    }
                }
                Some(_) => {}
                None => {
                    self.renderer.clear_frame();
                    self.uploaded = None;
                }
            }
        }

        if let Some(delta) = self.gesture.auto_drag(Instant::now()) {
            let pose = self.pose.apply_touchpad_bias_delta(delta.yaw_delta_rad, delta.pitch_delta_rad);
            self.publish_pose(pose);
        }

        self.update_title();
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let snapshot = self.reader.snapshot();
        match self.renderer.render(&self.surface, &self.config, &snapshot) {
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(self.renderer.device(), &self.config);
                Ok(())
            }
            other => other,
        }
    }

    pub fn cursor_moved(&mut self, x: f32, y: f32) {
        self.cursor = (x, y);
        if let Some((yaw, pitch)) = self.gesture.moved(x, y) {
            let pose = self.pose.apply_touchpad_bias_delta(yaw, pitch);
            self.publish_pose(pose);
        }
    }

    pub fn pointer_pressed(&mut self) {
        self.gesture.begin(self.cursor.0, self.cursor.1, Instant::now());
    }

    pub fn pointer_released(&mut self) {
        if self.gesture.end() {
            let pose = self.pose.commit_touchpad_bias();
            self.publish_pose(pose);
        }
    }

    pub fn reset_touchpad_bias(&mut self) {
        let pose = self.pose.reset_touchpad_bias();
        self.publish_pose(pose);
    }

    pub fn toggle_imu_tracking(&mut self) {
        let enabled = !self.pose.is_imu_tracking_enabled();
        let pose = self.pose.set_imu_tracking_enabled(enabled);
        info!("IMU tracking {}", if enabled { "on" } else { "off" });
        self.publish_pose(pose);
    }

    pub fn toggle_play_pause(&mut self) {
        let mut coordinator = lock_coordinator(&self.coordinator);
        if coordinator.state().expected_play_when_ready {
            coordinator.pause();
        } else {
            coordinator.play();
        }
    }

    pub fn seek_by(&mut self, delta_ms: i64) {
        let mut coordinator = lock_coordinator(&self.coordinator);
        coordinator.refresh_progress();
        let state = coordinator.state();
        let duration = (state.duration_ms > 0).then_some(state.duration_ms);
        coordinator.seek_to(clamp_seek_target(state.position_ms, delta_ms, duration));
    }

    pub fn seek_step_ms(&self) -> i64 {
        self.player_config.seek_step_ms
    }

    pub fn cycle_projection(&mut self) {
        let mode = self.inputs.update_mode(|m| m.projection = m.projection.next());
        info!("projection {}", mode.projection);
    }

    pub fn swap_eyes(&mut self) {
        let mode = self.inputs.update_mode(|m| m.swap_eyes = !m.swap_eyes);
        info!("swap eyes {}", mode.swap_eyes);
    }

    pub fn adjust_fov(&mut self, steps: f32) {
        let mode = self.inputs.update_mode(|m| {
            m.fov_deg = ProjectionFovConfig::clamp_degrees(m.fov_deg + steps * ProjectionFovConfig::STEP_DEGREES);
        });
        info!("fov {:.0}", mode.fov_deg);
    }

    /// Stops routing and pauses as if the app went to the background.
    pub fn shutdown(&mut self) {
        {
            let _rt = self.runtime.enter();
            self.routing.stop();
        }
        lock_coordinator(&self.coordinator).pause_for_app_background();
    }

    fn publish_pose(&self, pose: PoseState) {
        self.inputs.publish_pose(pose);
    }

    fn update_title(&mut self) {
        let route = self.routing.controller().route_state();
        let session = lock_coordinator(&self.coordinator).state();
        let name = session
            .source
            .as_ref()
            .and_then(|s| s.display_name.clone())
            .unwrap_or_default();
        let mut title = format!(
            "vr2xr - {} - {} - {} - {}/{}s {}",
            name,
            route,
            self.inputs.mode().projection,
            session.position_ms / 1000,
            session.duration_ms / 1000,
            if session.play_when_ready { "playing" } else { "paused" },
        );
        if let Some(error) = &session.player_error {
            title.push_str(&format!(" - {}", error));
        }
        if self.diagnostics {
            title.push_str(&format!(
                " | pause={:?} expected={} refresh={} ({:?}) first_frames={} awaiting={}",
                session.pause_reason,
                session.expected_play_when_ready,
                session.paused_frame_refresh_count,
                session.last_paused_frame_refresh_result,
                session.rendered_first_frame_count,
                session.awaiting_first_frame_after_surface_bind,
            ));
        }
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }
}

fn refresh_rate_hz(window: &Window) -> Option<f32> {
    let millihertz = window.current_monitor()?.refresh_rate_millihertz()?;
    if millihertz == 0 {
        warn!("monitor reports no refresh rate");
        return None;
    }
    Some(millihertz as f32 / 1000.0)
}
