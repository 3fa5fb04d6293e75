pub mod coordinator;
pub mod engine;
pub mod paused_frame;
pub mod source;
pub mod still;
#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{
    clamp_seek_target, lock_coordinator, PauseReason, PlaybackCoordinator, PlaybackSessionState, SharedCoordinator,
};
pub use engine::{EngineError, EngineEvent, EngineLifecycle, PlayerEngine, SurfaceHandle};
pub use paused_frame::{
    build_paused_frame_refresh_plan, should_expect_paused_frame_visible, PausedFrameInputs, PausedFrameRefreshPlan,
    PausedFrameRefreshResult,
};
pub use source::{should_force_source_reset, SourceDescriptor, SourceType};
pub use still::{decode_still_source, StillFrame, StillFrameEngine, STILL_DURATION_MS};
