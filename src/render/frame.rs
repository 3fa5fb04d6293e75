use tokio::sync::watch;

use super::projection::RenderMode;
use crate::tracking::PoseState;

/// What one frame is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSnapshot {
    pub pose: PoseState,
    pub mode: RenderMode,
}

/// Write side of the latest pose and render mode. Only the newest value is kept; the render
/// loop never waits for an update.
pub struct FrameInputs {
    pose: watch::Sender<PoseState>,
    mode: watch::Sender<RenderMode>,
}

impl FrameInputs {
    pub fn new(pose: PoseState, mode: RenderMode) -> Self {
        Self {
            pose: watch::channel(pose).0,
            mode: watch::channel(mode).0,
        }
    }

    pub fn publish_pose(&self, pose: PoseState) {
        self.pose.send_replace(pose);
    }

    pub fn publish_mode(&self, mode: RenderMode) {
        self.mode.send_replace(mode);
    }

    /// Applies `update` to the current mode and publishes the result.
    pub fn update_mode(&self, update: impl FnOnce(&mut RenderMode)) -> RenderMode {
        self.mode.send_modify(update);
        *self.mode.borrow()
    }

    pub fn mode(&self) -> RenderMode {
        *self.mode.borrow()
    }

    pub fn reader(&self) -> FrameReader {
        FrameReader {
            pose: self.pose.subscribe(),
            mode: self.mode.subscribe(),
        }
    }
}

#[derive(Clone)]
pub struct FrameReader {
    pose: watch::Receiver<PoseState>,
    mode: watch::Receiver<RenderMode>,
}

impl FrameReader {
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            pose: *self.pose.borrow(),
            mode: *self.mode.borrow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ProjectionMode;

    #[test]
    fn test_reader_sees_latest_values_only() {
        let inputs = FrameInputs::new(PoseState::default(), RenderMode::default());
        let reader = inputs.reader();

        inputs.publish_pose(PoseState::from_euler(0.1, 0.0, 0.0, true));
        inputs.publish_pose(PoseState::from_euler(0.2, 0.0, 0.0, true));
        let mode = inputs.update_mode(|m| m.projection = ProjectionMode::Vr360);

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.pose.yaw, 0.2);
        assert_eq!(snapshot.mode, mode);
        assert_eq!(snapshot.mode.projection, ProjectionMode::Vr360);
    }
}
