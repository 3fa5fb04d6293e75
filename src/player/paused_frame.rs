use super::engine::EngineLifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PausedFrameRefreshResult {
    #[default]
    None,
    SkippedNoPlayer,
    SkippedExpectedPlaying,
    SkippedNoSurface,
    SkippedPlayerError,
    SkippedIdle,
    RefreshedSamePosition,
    RefreshedNudge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausedFrameRefreshPlan {
    pub should_refresh: bool,
    pub refresh_position_ms: u64,
    pub restore_position_ms: Option<u64>,
    pub result: PausedFrameRefreshResult,
}

impl PausedFrameRefreshPlan {
    fn skipped(result: PausedFrameRefreshResult) -> Self {
        Self {
            should_refresh: false,
            refresh_position_ms: 0,
            restore_position_ms: None,
            result,
        }
    }
}

/// Inputs read from the coordinator and engine when deciding on a paused-frame refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausedFrameInputs {
    pub expected_play_when_ready: bool,
    pub has_bound_surface: bool,
    pub has_source: bool,
    pub has_player_error: bool,
    pub lifecycle: EngineLifecycle,
    pub position_ms: u64,
    pub duration_ms: u64,
}

/// True when a static frame should be on screen: paused on purpose with a live bound surface.
pub fn should_expect_paused_frame_visible(inputs: &PausedFrameInputs) -> bool {
    !inputs.expected_play_when_ready
        && inputs.has_bound_surface
        && inputs.has_source
        && !inputs.has_player_error
        && inputs.lifecycle != EngineLifecycle::Idle
}

/// Plans a 1 ms seek nudge that makes the engine redraw onto a freshly bound surface.
/// Check order matters: expected-playing, surface, error, idle.
pub fn build_paused_frame_refresh_plan(inputs: &PausedFrameInputs) -> PausedFrameRefreshPlan {
    if inputs.expected_play_when_ready {
        return PausedFrameRefreshPlan::skipped(PausedFrameRefreshResult::SkippedExpectedPlaying);
    }
    if !inputs.has_bound_surface {
        return PausedFrameRefreshPlan::skipped(PausedFrameRefreshResult::SkippedNoSurface);
    }
    if inputs.has_player_error {
        return PausedFrameRefreshPlan::skipped(PausedFrameRefreshResult::SkippedPlayerError);
    }
    if inputs.lifecycle == EngineLifecycle::Idle {
        return PausedFrameRefreshPlan::skipped(PausedFrameRefreshResult::SkippedIdle);
    }

    let position = inputs.position_ms;
    let duration = inputs.duration_ms;
    let nudge = if duration <= 1 {
        position
    } else if position + 1 < duration {
        position + 1
    } else if position > 0 {
        position - 1
    } else {
        position
    };

    if nudge == position {
        return PausedFrameRefreshPlan {
            should_refresh: true,
            refresh_position_ms: position,
            restore_position_ms: None,
            result: PausedFrameRefreshResult::RefreshedSamePosition,
        };
    }
    PausedFrameRefreshPlan {
        should_refresh: true,
        refresh_position_ms: nudge,
        restore_position_ms: Some(position),
        result: PausedFrameRefreshResult::RefreshedNudge,
    }
}
