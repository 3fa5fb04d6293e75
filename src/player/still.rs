use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use log::{debug, warn};
use tokio::sync::{mpsc, watch};

use super::engine::{EngineError, EngineEvent, EngineLifecycle, PlayerEngine, SurfaceHandle};
use super::source::{SourceDescriptor, SourceType};

/// Nominal timeline length of a still image.
pub const STILL_DURATION_MS: u64 = 60_000;

const DECODE_ERROR_CODE: i32 = 4001;

/// A decoded frame handed to the surface it was rendered for.
#[derive(Debug, Clone)]
pub struct StillFrame {
    pub surface: SurfaceHandle,
    pub image: Arc<RgbaImage>,
    pub position_ms: u64,
}

/// Engine that "plays" a single side-by-side image on a fixed timeline.
///
/// Rendering means publishing the frame to the bound surface's frame cell; the first publish
/// after a bind is reported as [`EngineEvent::RenderedFirstFrame`].
pub struct StillFrameEngine {
    events: mpsc::UnboundedSender<EngineEvent>,
    frames: watch::Sender<Option<StillFrame>>,
    image: Option<Arc<RgbaImage>>,
    surface: Option<SurfaceHandle>,
    first_frame_pending: bool,
    play_when_ready: bool,
    lifecycle: EngineLifecycle,
    base_position_ms: u64,
    playing_since: Option<Instant>,
    error: Option<EngineError>,
}

impl StillFrameEngine {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>, watch::Receiver<Option<StillFrame>>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (frames, frames_rx) = watch::channel(None);
        let engine = Self {
            events,
            frames,
            image: None,
            surface: None,
            first_frame_pending: false,
            play_when_ready: false,
            lifecycle: EngineLifecycle::Idle,
            base_position_ms: 0,
            playing_since: None,
            error: None,
        };
        (engine, events_rx, frames_rx)
    }

    fn emit(&self, event: EngineEvent) {
        // The receiver goes away with the viewer; nothing left to notify then.
        let _ = self.events.send(event);
    }

    fn set_lifecycle(&mut self, lifecycle: EngineLifecycle) {
        if self.lifecycle != lifecycle {
            self.lifecycle = lifecycle;
            self.emit(EngineEvent::PlaybackStateChanged(lifecycle));
        }
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        if self.play_when_ready == play_when_ready {
            return;
        }
        self.base_position_ms = self.position_ms();
        self.play_when_ready = play_when_ready;
        self.playing_since = play_when_ready.then(Instant::now);
        self.emit(EngineEvent::PlayWhenReadyChanged(play_when_ready));
    }

    /// Stores `Ended` once the timeline is at its end, and `Ready` again once it moved back.
    fn sync_end_of_timeline(&mut self) {
        let at_end = self.position_ms() >= STILL_DURATION_MS;
        match self.lifecycle {
            EngineLifecycle::Ready if at_end => self.set_lifecycle(EngineLifecycle::Ended),
            EngineLifecycle::Ended if !at_end => self.set_lifecycle(EngineLifecycle::Ready),
            _ => {}
        }
    }

    fn render(&mut self) {
        let (Some(surface), Some(image)) = (self.surface, self.image.clone()) else {
            return;
        };
        let position_ms = self.position_ms();
        self.frames.send_replace(Some(StillFrame {
            surface,
            image,
            position_ms,
        }));
        if self.first_frame_pending {
            self.first_frame_pending = false;
            self.emit(EngineEvent::RenderedFirstFrame);
        }
    }
}

/// Decodes the image behind a local source URI.
pub fn decode_still_source(source: &SourceDescriptor) -> Result<RgbaImage> {
    if source.kind != SourceType::LocalUri {
        return Err(anyhow!("still frames need a local source, got {}", source.normalized));
    }
    let path = source
        .normalized
        .strip_prefix("file://")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("not a file URI: {}", source.normalized))?;
    let img = image::open(&path).with_context(|| format!("failed to decode {}", path.display()))?;
    Ok(img.to_rgba8())
}

impl PlayerEngine for StillFrameEngine {
    fn load_source(&mut self, source: &SourceDescriptor, auto_play: bool, force_reset: bool) {
        if !force_reset && self.image.is_some() {
            return;
        }
        self.base_position_ms = 0;
        self.playing_since = None;
        self.play_when_ready = false;
        self.set_lifecycle(EngineLifecycle::Buffering);
        match decode_still_source(source) {
            Ok(image) => {
                debug!("decoded still {}x{} from {}", image.width(), image.height(), source.normalized);
                self.image = Some(Arc::new(image));
                self.error = None;
                self.set_lifecycle(EngineLifecycle::Ready);
                self.first_frame_pending = self.surface.is_some();
                self.render();
            }
            Err(e) => {
                warn!("still source failed: {:#}", e);
                self.image = None;
                self.error = Some(EngineError {
                    code: DECODE_ERROR_CODE,
                    name: "ERROR_CODE_DECODING_FAILED".to_string(),
                });
                self.set_lifecycle(EngineLifecycle::Idle);
            }
        }
        if auto_play {
            self.set_play_when_ready(true);
        }
    }

    fn bind_video_surface(&mut self, surface: SurfaceHandle) {
        self.surface = Some(surface);
        self.first_frame_pending = true;
        self.render();
    }

    fn clear_video_surface(&mut self, surface: Option<SurfaceHandle>) {
        if surface.is_none() || surface == self.surface {
            self.surface = None;
            self.first_frame_pending = false;
            self.frames.send_replace(None);
        }
    }

    fn play(&mut self) {
        if self.lifecycle() == EngineLifecycle::Ended {
            self.base_position_ms = 0;
            self.playing_since = self.play_when_ready.then(Instant::now);
            self.set_lifecycle(EngineLifecycle::Ready);
            self.emit(EngineEvent::PositionDiscontinuity);
            self.render();
        }
        self.set_play_when_ready(true);
    }

    fn pause(&mut self) {
        self.set_play_when_ready(false);
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.base_position_ms = position_ms.min(STILL_DURATION_MS);
        if self.play_when_ready {
            self.playing_since = Some(Instant::now());
        }
        self.emit(EngineEvent::PositionDiscontinuity);
        self.sync_end_of_timeline();
        self.render();
    }

    fn play_when_ready(&self) -> bool {
        self.play_when_ready
    }

    fn lifecycle(&self) -> EngineLifecycle {
        if self.lifecycle == EngineLifecycle::Ready && self.position_ms() >= STILL_DURATION_MS {
            return EngineLifecycle::Ended;
        }
        self.lifecycle
    }

    fn position_ms(&self) -> u64 {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (self.base_position_ms + elapsed).min(STILL_DURATION_MS)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.image.as_ref().map(|_| STILL_DURATION_MS)
    }

    fn error(&self) -> Option<EngineError> {
        self.error.clone()
    }
}
