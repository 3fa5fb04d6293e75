use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};
use tokio::sync::watch;

use super::engine::{EngineError, EngineEvent, EngineLifecycle, PlayerEngine, SurfaceHandle};
use super::paused_frame::{
    build_paused_frame_refresh_plan, should_expect_paused_frame_visible, PausedFrameInputs, PausedFrameRefreshResult,
};
use super::source::SourceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseReason {
    #[default]
    None,
    UserIntent,
    Interruption,
    AppBackground,
}

/// Published snapshot of the playback session. Replaced wholesale after every operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSessionState {
    pub source: Option<SourceDescriptor>,
    pub has_bound_surface: bool,
    /// What the user wants; survives interruptions.
    pub expected_play_when_ready: bool,
    /// What the engine is actually doing.
    pub play_when_ready: bool,
    pub pause_reason: PauseReason,
    pub lifecycle: EngineLifecycle,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub player_error: Option<EngineError>,
    pub paused_frame_visible_expected: bool,
    pub paused_frame_refresh_count: u64,
    pub last_paused_frame_refresh_result: PausedFrameRefreshResult,
    pub awaiting_first_frame_after_surface_bind: bool,
    pub rendered_first_frame_count: u64,
}

pub type SharedCoordinator = Arc<Mutex<PlaybackCoordinator>>;

/// Every operation republishes before returning, so a poisoned lock still guards a consistent coordinator.
pub fn lock_coordinator(shared: &SharedCoordinator) -> MutexGuard<'_, PlaybackCoordinator> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-scoped owner of the single playback engine.
///
/// Foreground components come and go; they route every playback and surface mutation through
/// here so the expected-vs-actual play intent stays consistent across surface rebinding.
pub struct PlaybackCoordinator {
    state_tx: watch::Sender<PlaybackSessionState>,
    engine: Option<Box<dyn PlayerEngine>>,
    active_source: Option<SourceDescriptor>,
    active_surface: Option<SurfaceHandle>,
    expected_play_when_ready: bool,
    pause_reason: PauseReason,
    interruption_pause_in_flight: bool,
    paused_frame_refresh_count: u64,
    last_paused_frame_refresh_result: PausedFrameRefreshResult,
    awaiting_first_frame_after_surface_bind: bool,
    rendered_first_frame_count: u64,
}

impl Default for PlaybackCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self {
            state_tx: watch::channel(PlaybackSessionState::default()).0,
            engine: None,
            active_source: None,
            active_surface: None,
            expected_play_when_ready: false,
            pause_reason: PauseReason::None,
            interruption_pause_in_flight: false,
            paused_frame_refresh_count: 0,
            last_paused_frame_refresh_result: PausedFrameRefreshResult::None,
            awaiting_first_frame_after_surface_bind: false,
            rendered_first_frame_count: 0,
        }
    }

    pub fn shared(self) -> SharedCoordinator {
        Arc::new(Mutex::new(self))
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSessionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> PlaybackSessionState {
        self.state_tx.borrow().clone()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Hands the engine to the coordinator, restoring source, position, surface and play intent.
    /// Any previously attached engine is returned.
    pub fn attach_engine(&mut self, mut engine: Box<dyn PlayerEngine>) -> Option<Box<dyn PlayerEngine>> {
        let expected_before_attach = self.expected_play_when_ready;
        let restore_position_ms = self.state_tx.borrow().position_ms;
        let should_resume =
            expected_before_attach && self.active_surface.is_some() && self.active_source.is_some();

        if let Some(source) = &self.active_source {
            engine.load_source(source, false, true);
            if restore_position_ms > 0 {
                engine.seek_to(restore_position_ms);
            }
        }
        self.expected_play_when_ready = expected_before_attach;
        if let Some(surface) = self.active_surface {
            self.awaiting_first_frame_after_surface_bind = true;
            engine.bind_video_surface(surface);
        }
        if should_resume {
            engine.play();
        }
        let previous = self.engine.replace(engine);
        info!("playback engine attached (resume={})", should_resume);
        self.publish_state();
        previous
    }

    pub fn detach_engine(&mut self) -> Option<Box<dyn PlayerEngine>> {
        let engine = self.engine.take();
        self.publish_state();
        engine
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::PlayWhenReadyChanged(play_when_ready) => {
                if self.interruption_pause_in_flight && !play_when_ready {
                    self.interruption_pause_in_flight = false;
                    self.pause_reason = PauseReason::Interruption;
                } else {
                    self.expected_play_when_ready = play_when_ready;
                    self.pause_reason = if play_when_ready {
                        PauseReason::None
                    } else {
                        PauseReason::UserIntent
                    };
                }
            }
            EngineEvent::RenderedFirstFrame => {
                self.awaiting_first_frame_after_surface_bind = false;
                self.rendered_first_frame_count += 1;
            }
            EngineEvent::PlaybackStateChanged(_) | EngineEvent::PositionDiscontinuity => {}
        }
        self.publish_state();
    }

    /// Loads `source` unless it is already the active one and no reset is forced.
    pub fn attach_source(&mut self, source: SourceDescriptor, force_reset: bool) {
        let source_changed =
            self.active_source.as_ref().map(|s| s.normalized.as_str()) != Some(source.normalized.as_str());
        if !source_changed && !force_reset {
            self.publish_state();
            return;
        }
        info!("attach source {} (force_reset={})", source.normalized, force_reset);
        self.expected_play_when_ready = true;
        self.pause_reason = PauseReason::None;
        if let Some(engine) = self.engine.as_mut() {
            engine.load_source(&source, false, true);
            if let Some(surface) = self.active_surface {
                self.awaiting_first_frame_after_surface_bind = true;
                engine.bind_video_surface(surface);
            }
        }
        self.active_source = Some(source);
        self.publish_state();
    }

    pub fn bind_surface(&mut self, surface: SurfaceHandle) {
        if self.active_surface == Some(surface) {
            self.publish_state();
            return;
        }
        if let (Some(previous), Some(engine)) = (self.active_surface, self.engine.as_mut()) {
            engine.clear_video_surface(Some(previous));
        }
        self.active_surface = Some(surface);
        self.awaiting_first_frame_after_surface_bind = true;
        if let Some(engine) = self.engine.as_mut() {
            engine.bind_video_surface(surface);
        }
        debug!("session bound {}", surface);
        self.publish_state();
    }

    /// Clears `surface` only if it is the bound one.
    pub fn clear_surface(&mut self, surface: SurfaceHandle) {
        if self.active_surface != Some(surface) {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.clear_video_surface(Some(surface));
        }
        self.active_surface = None;
        self.awaiting_first_frame_after_surface_bind = false;
        debug!("session cleared {}", surface);
        self.publish_state();
    }

    pub fn clear_any_surface(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.clear_video_surface(None);
        }
        self.active_surface = None;
        self.awaiting_first_frame_after_surface_bind = false;
        self.publish_state();
    }

    pub fn play(&mut self) {
        self.expected_play_when_ready = true;
        self.pause_reason = PauseReason::None;
        if let Some(engine) = self.engine.as_mut() {
            engine.play();
        }
        self.publish_state();
    }

    pub fn pause(&mut self) {
        self.expected_play_when_ready = false;
        self.pause_reason = PauseReason::UserIntent;
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
        }
        self.publish_state();
    }

    /// Pauses because the output went away. Leaves the user's play intent untouched.
    pub fn pause_for_interruption(&mut self) {
        let Some(engine) = self.engine.as_mut().filter(|e| e.play_when_ready()) else {
            self.publish_state();
            return;
        };
        self.interruption_pause_in_flight = true;
        self.pause_reason = PauseReason::Interruption;
        engine.pause();
        self.publish_state();
    }

    pub fn pause_for_app_background(&mut self) {
        self.expected_play_when_ready = false;
        self.pause_reason = PauseReason::AppBackground;
        self.interruption_pause_in_flight = false;
        if let Some(engine) = self.engine.as_mut().filter(|e| e.play_when_ready()) {
            engine.pause();
        }
        self.publish_state();
    }

    pub fn resume_if_expected(&mut self) {
        if self.expected_play_when_ready {
            if let Some(engine) = self.engine.as_mut() {
                engine.play();
            }
        }
        self.publish_state();
    }

    /// Forces a redraw of the paused frame onto a freshly bound surface without resuming.
    pub fn show_paused_frame_if_expected(&mut self) {
        let expected = self.expected_play_when_ready;
        let has_bound_surface = self.active_surface.is_some();
        let has_source = self.active_source.is_some();
        let Some(engine) = self.engine.as_mut() else {
            self.last_paused_frame_refresh_result = PausedFrameRefreshResult::SkippedNoPlayer;
            self.publish_state();
            return;
        };

        let plan = build_paused_frame_refresh_plan(&PausedFrameInputs {
            expected_play_when_ready: expected,
            has_bound_surface,
            has_source,
            has_player_error: engine.error().is_some(),
            lifecycle: engine.lifecycle(),
            position_ms: engine.position_ms(),
            duration_ms: engine.duration_ms().unwrap_or(0),
        });
        self.last_paused_frame_refresh_result = plan.result;
        if plan.should_refresh {
            self.paused_frame_refresh_count += 1;
            engine.seek_to(plan.refresh_position_ms);
            if let Some(restore) = plan.restore_position_ms {
                engine.seek_to(restore);
            }
            engine.pause();
            debug!("paused frame refresh {:?} #{}", plan.result, self.paused_frame_refresh_count);
        }
        self.publish_state();
    }

    pub fn seek_to(&mut self, position_ms: u64) {
        if let Some(engine) = self.engine.as_mut() {
            engine.seek_to(position_ms);
        }
        self.publish_state();
    }

    /// Republishes with the engine's current position. Engines do not report progress on their own.
    pub fn refresh_progress(&mut self) {
        self.publish_state();
    }

    fn publish_state(&self) {
        let engine = self.engine.as_deref();
        let lifecycle = engine.map(|e| e.lifecycle()).unwrap_or_default();
        let player_error = engine.and_then(|e| e.error());
        // Without an engine the last published timeline is kept so a reattach can restore it.
        let (position_ms, duration_ms) = match engine {
            Some(e) => (e.position_ms(), e.duration_ms().unwrap_or(0)),
            None => {
                let last = self.state_tx.borrow();
                (last.position_ms, last.duration_ms)
            }
        };

        let paused_frame_visible_expected = should_expect_paused_frame_visible(&PausedFrameInputs {
            expected_play_when_ready: self.expected_play_when_ready,
            has_bound_surface: self.active_surface.is_some(),
            has_source: self.active_source.is_some(),
            has_player_error: player_error.is_some(),
            lifecycle,
            position_ms,
            duration_ms,
        });

        self.state_tx.send_replace(PlaybackSessionState {
            source: self.active_source.clone(),
            has_bound_surface: self.active_surface.is_some(),
            expected_play_when_ready: self.expected_play_when_ready,
            play_when_ready: engine.map(|e| e.play_when_ready()).unwrap_or(false),
            pause_reason: self.pause_reason,
            lifecycle,
            position_ms,
            duration_ms,
            player_error,
            paused_frame_visible_expected,
            paused_frame_refresh_count: self.paused_frame_refresh_count,
            last_paused_frame_refresh_result: self.last_paused_frame_refresh_result,
            awaiting_first_frame_after_surface_bind: self.awaiting_first_frame_after_surface_bind,
            rendered_first_frame_count: self.rendered_first_frame_count,
        });
    }
}

/// Target for a relative seek, clamped to [0, duration] when the duration is known.
pub fn clamp_seek_target(position_ms: u64, delta_ms: i64, duration_ms: Option<u64>) -> u64 {
    let target = (position_ms as i64).saturating_add(delta_ms).max(0) as u64;
    match duration_ms {
        Some(duration) if duration > 0 => target.min(duration),
        _ => target,
    }
}
