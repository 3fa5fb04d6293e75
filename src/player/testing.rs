use std::sync::{Arc, Mutex, MutexGuard};

use super::engine::{EngineError, EngineLifecycle, PlayerEngine, SurfaceHandle};
use super::source::SourceDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Load { uri: String, auto_play: bool, force_reset: bool },
    Bind(SurfaceHandle),
    Clear(Option<SurfaceHandle>),
    Play,
    Pause,
    Seek(u64),
}

#[derive(Debug, Default)]
pub struct FakeEngineState {
    pub calls: Vec<EngineCall>,
    pub play_when_ready: bool,
    pub lifecycle: EngineLifecycle,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub error: Option<EngineError>,
}

/// Engine double that records every call. Clones share state so tests can inspect an engine
/// after handing it to the coordinator.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeEngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with a loaded, paused 10 s clip.
    pub fn ready(position_ms: u64) -> Self {
        let engine = Self::new();
        {
            let mut state = engine.lock();
            state.lifecycle = EngineLifecycle::Ready;
            state.position_ms = position_ms;
            state.duration_ms = Some(10_000);
        }
        engine
    }

    pub fn boxed(&self) -> Box<dyn PlayerEngine> {
        Box::new(self.clone())
    }

    pub fn lock(&self) -> MutexGuard<'_, FakeEngineState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut self.lock().calls)
    }

    pub fn bind_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::Bind(_)))
            .count()
    }
}

impl PlayerEngine for FakeEngine {
    fn load_source(&mut self, source: &SourceDescriptor, auto_play: bool, force_reset: bool) {
        let mut state = self.lock();
        state.calls.push(EngineCall::Load {
            uri: source.normalized.clone(),
            auto_play,
            force_reset,
        });
        state.lifecycle = EngineLifecycle::Buffering;
        state.play_when_ready = auto_play;
    }

    fn bind_video_surface(&mut self, surface: SurfaceHandle) {
        self.lock().calls.push(EngineCall::Bind(surface));
    }

    fn clear_video_surface(&mut self, surface: Option<SurfaceHandle>) {
        self.lock().calls.push(EngineCall::Clear(surface));
    }

    fn play(&mut self) {
        let mut state = self.lock();
        state.calls.push(EngineCall::Play);
        state.play_when_ready = true;
    }

    fn pause(&mut self) {
        let mut state = self.lock();
        state.calls.push(EngineCall::Pause);
        state.play_when_ready = false;
    }

    fn seek_to(&mut self, position_ms: u64) {
        let mut state = self.lock();
        state.calls.push(EngineCall::Seek(position_ms));
        state.position_ms = position_ms;
    }

    fn play_when_ready(&self) -> bool {
        self.lock().play_when_ready
    }

    fn lifecycle(&self) -> EngineLifecycle {
        self.lock().lifecycle
    }

    fn position_ms(&self) -> u64 {
        self.lock().position_ms
    }

    fn duration_ms(&self) -> Option<u64> {
        self.lock().duration_ms
    }

    fn error(&self) -> Option<EngineError> {
        self.lock().error.clone()
    }
}

pub fn source(uri: &str) -> SourceDescriptor {
    SourceDescriptor::from_uri(uri).unwrap()
}
