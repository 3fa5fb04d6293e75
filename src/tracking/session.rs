use std::future::Future;

use log::{debug, warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::controller::RuntimePoseController;
use super::pose::PoseState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    #[error("tracking client error: {0}")]
    Client(String),
    #[error("recenter requires a streaming tracking session")]
    NotStreaming,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackingSessionState {
    #[default]
    Idle,
    Stopped,
    Connecting,
    Calibrating { sample_count: u32, target: u32 },
    Streaming,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BiasState {
    #[default]
    Inactive,
    Active,
    Error { message: String },
}

/// Orientation sample as reported by the glasses, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoseSample {
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub roll_deg: f32,
    pub calibrated: bool,
}

impl RawPoseSample {
    pub fn to_pose_state(&self) -> PoseState {
        PoseState::from_euler(
            self.yaw_deg.to_radians(),
            self.pitch_deg.to_radians(),
            self.roll_deg.to_radians(),
            self.calibrated,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub description: String,
}

/// Glasses tracking SDK surface. Streams are latest-value cells; actions may fail or take
/// arbitrarily long and are never retried by this crate.
pub trait TrackingClient: Send + Sync + 'static {
    fn session_state(&self) -> watch::Receiver<TrackingSessionState>;
    fn bias_state(&self) -> watch::Receiver<BiasState>;
    fn pose_samples(&self) -> watch::Receiver<Option<RawPoseSample>>;

    fn start(&self) -> impl Future<Output = Result<ConnectionInfo, TrackingError>> + Send;
    fn stop(&self) -> impl Future<Output = Result<(), TrackingError>> + Send;
    fn zero_view(&self) -> impl Future<Output = Result<(), TrackingError>> + Send;
    fn recalibrate(&self) -> impl Future<Output = Result<(), TrackingError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationAction {
    /// A connect or calibration pass is already running; nothing was sent.
    AlreadyRunning,
    Started(ConnectionInfo),
    Recalibrated,
}

/// Short tracking status used by the player UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingSummary {
    Manual,
    Connecting,
    Calibrating { sample_count: u32, target: u32 },
    Streaming,
    Error,
}

impl TrackingSummary {
    pub fn from_states(session: &TrackingSessionState, bias: &BiasState) -> Self {
        let summary = match session {
            TrackingSessionState::Idle | TrackingSessionState::Stopped => TrackingSummary::Manual,
            TrackingSessionState::Connecting => TrackingSummary::Connecting,
            TrackingSessionState::Calibrating { sample_count, target } => TrackingSummary::Calibrating {
                sample_count: *sample_count,
                target: *target,
            },
            TrackingSessionState::Streaming => TrackingSummary::Streaming,
            TrackingSessionState::Error { .. } => TrackingSummary::Error,
        };
        if matches!(bias, BiasState::Error { .. }) && summary != TrackingSummary::Streaming {
            return TrackingSummary::Error;
        }
        summary
    }
}

/// Wraps a tracking client and republishes its orientation as radian poses.
pub struct TrackingSessionManager<C: TrackingClient> {
    client: C,
    pose_rx: watch::Receiver<Option<PoseState>>,
    pose_task: JoinHandle<()>,
}

impl<C: TrackingClient> TrackingSessionManager<C> {
    /// Must be called inside a tokio runtime; the pose conversion runs as a task.
    pub fn new(client: C) -> Self {
        let mut samples = client.pose_samples();
        let (pose_tx, pose_rx) = watch::channel(None);
        let pose_task = tokio::spawn(async move {
            loop {
                let converted = samples.borrow_and_update().as_ref().map(RawPoseSample::to_pose_state);
                pose_tx.send_replace(converted);
                if samples.changed().await.is_err() {
                    debug!("tracking pose stream closed");
                    break;
                }
            }
        });
        Self {
            client,
            pose_rx,
            pose_task,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn session_state(&self) -> watch::Receiver<TrackingSessionState> {
        self.client.session_state()
    }

    pub fn bias_state(&self) -> watch::Receiver<BiasState> {
        self.client.bias_state()
    }

    pub fn pose(&self) -> watch::Receiver<Option<PoseState>> {
        self.pose_rx.clone()
    }

    pub fn summary(&self) -> TrackingSummary {
        let session = self.client.session_state().borrow().clone();
        let bias = self.client.bias_state().borrow().clone();
        TrackingSummary::from_states(&session, &bias)
    }

    /// Starts tracking, or recalibrates when already streaming.
    pub async fn calibrate(&self) -> Result<CalibrationAction, TrackingError> {
        let state = self.client.session_state().borrow().clone();
        let result = match state {
            TrackingSessionState::Connecting | TrackingSessionState::Calibrating { .. } => {
                Ok(CalibrationAction::AlreadyRunning)
            }
            TrackingSessionState::Streaming => self.client.recalibrate().await.map(|_| CalibrationAction::Recalibrated),
            _ => self.client.start().await.map(CalibrationAction::Started),
        };
        if let Err(e) = &result {
            warn!("calibration failed: {}", e);
        }
        result
    }

    pub async fn zero_view(&self) -> Result<(), TrackingError> {
        let result = self.client.zero_view().await;
        if let Err(e) = &result {
            warn!("zero view failed: {}", e);
        }
        result
    }

    pub async fn stop(&self) -> Result<(), TrackingError> {
        self.client.stop().await
    }

    /// Clears the manual look offset and zeroes the tracked view. Only valid while streaming.
    pub async fn recenter(&self, controller: &mut RuntimePoseController) -> Result<PoseState, TrackingError> {
        if *self.client.session_state().borrow() != TrackingSessionState::Streaming {
            return Err(TrackingError::NotStreaming);
        }
        let pose = controller.reset_touchpad_bias();
        self.zero_view().await?;
        Ok(pose)
    }
}

impl<C: TrackingClient> Drop for TrackingSessionManager<C> {
    fn drop(&mut self) {
        self.pose_task.abort();
    }
}

/// Applies a tracking pose to the controller unless it is missing or not yet usable.
pub fn apply_tracking_pose(controller: &mut RuntimePoseController, pose: Option<PoseState>) -> Option<PoseState> {
    match pose {
        Some(pose) if pose.tracking_available => Some(controller.on_tracking_pose_updated(pose)),
        _ => None,
    }
}
