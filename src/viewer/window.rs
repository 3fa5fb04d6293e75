use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use log::debug;
use tokio::sync::mpsc;
use winit::dpi::PhysicalSize;

use crate::display::{DisplayEnumerator, DisplayId, DisplayInfo, DisplayPowerState};
use crate::routing::{ExternalPresentation, PresentationFactory, PresentationToken};

/// The viewer window stands in for the external display.
pub const WINDOW_DISPLAY_ID: DisplayId = 1;

const FALLBACK_REFRESH_HZ: f32 = 60.0;

/// `None` while the window has no drawable area, i.e. the display is gone.
pub fn window_display(size: PhysicalSize<u32>, refresh_rate_hz: Option<f32>) -> Option<DisplayInfo> {
    if size.width == 0 || size.height == 0 {
        return None;
    }
    Some(DisplayInfo {
        id: WINDOW_DISPLAY_ID,
        mode_id: 0,
        width: size.width,
        height: size.height,
        refresh_rate_hz: refresh_rate_hz.unwrap_or(FALLBACK_REFRESH_HZ),
        power: DisplayPowerState::On,
    })
}

/// Enumerates the viewer window as the only presentation display.
#[derive(Debug, Clone, Default)]
pub struct WindowDisplays {
    current: Arc<Mutex<Option<DisplayInfo>>>,
}

impl WindowDisplays {
    fn lock(&self) -> MutexGuard<'_, Option<DisplayInfo>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> Option<DisplayInfo> {
        self.lock().clone()
    }

    /// Replaces the window display; returns whether anything changed.
    pub fn set(&self, display: Option<DisplayInfo>) -> bool {
        let mut current = self.lock();
        if *current == display {
            return false;
        }
        *current = display;
        true
    }
}

impl DisplayEnumerator for WindowDisplays {
    fn presentation_displays(&self) -> Vec<DisplayInfo> {
        self.current().into_iter().collect()
    }
}

/// Presentation drawn into the viewer window.
pub struct WindowPresentation {
    display_id: DisplayId,
    displays: WindowDisplays,
    dismissed: bool,
}

impl ExternalPresentation for WindowPresentation {
    fn display_id(&self) -> DisplayId {
        self.display_id
    }

    fn is_showing(&self) -> bool {
        !self.dismissed && self.displays.current().is_some_and(|d| d.id == self.display_id)
    }

    fn dismiss(&mut self) {
        self.dismissed = true;
    }
}

/// Creates window presentations. The window surface is reported ready by the viewer loop, which
/// receives the token of each new presentation on the returned channel.
pub struct WindowPresentationFactory {
    displays: WindowDisplays,
    ready_tx: mpsc::UnboundedSender<PresentationToken>,
}

impl WindowPresentationFactory {
    pub fn new(displays: WindowDisplays) -> (Self, mpsc::UnboundedReceiver<PresentationToken>) {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        (Self { displays, ready_tx }, ready_rx)
    }
}

impl PresentationFactory for WindowPresentationFactory {
    type Presentation = WindowPresentation;

    fn create(&mut self, display: &DisplayInfo, token: PresentationToken) -> Result<WindowPresentation> {
        if !self.displays.current().is_some_and(|d| d.id == display.id) {
            return Err(anyhow!("display {} is not the viewer window", display.id));
        }
        self.ready_tx
            .send(token)
            .map_err(|_| anyhow!("viewer loop is gone"))?;
        debug!("window presentation #{} on {}x{}", token, display.width, display.height);
        Ok(WindowPresentation {
            display_id: display.id,
            displays: self.displays.clone(),
            dismissed: false,
        })
    }
}
