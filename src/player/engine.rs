use std::fmt;

use thiserror::Error;

use super::source::SourceDescriptor;

/// Opaque identity of a video output surface. Two handles are the same surface iff equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineLifecycle {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("playback error {code}: {name}")]
pub struct EngineError {
    pub code: i32,
    pub name: String,
}

/// Notifications an engine delivers to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    PlayWhenReadyChanged(bool),
    PlaybackStateChanged(EngineLifecycle),
    PositionDiscontinuity,
    RenderedFirstFrame,
}

/// The decoder/renderer pipeline. Only the playback coordinator drives it.
pub trait PlayerEngine: Send {
    fn load_source(&mut self, source: &SourceDescriptor, auto_play: bool, force_reset: bool);
    fn bind_video_surface(&mut self, surface: SurfaceHandle);
    /// `None` clears whatever surface is attached.
    fn clear_video_surface(&mut self, surface: Option<SurfaceHandle>);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, position_ms: u64);

    fn play_when_ready(&self) -> bool;
    fn lifecycle(&self) -> EngineLifecycle;
    fn position_ms(&self) -> u64;
    /// `None` while the duration is unknown.
    fn duration_ms(&self) -> Option<u64>;
    fn error(&self) -> Option<EngineError>;
}
