use log::debug;
use tokio::sync::watch;

use super::route::DisplayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPowerState {
    On,
    Off,
    Dozing,
}

/// A presentation-capable display as reported by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub mode_id: i32,
    pub width: u32,
    pub height: u32,
    pub refresh_rate_hz: f32,
    pub power: DisplayPowerState,
}

impl DisplayInfo {
    pub fn physical_mode(&self) -> PhysicalDisplayMode {
        PhysicalDisplayMode {
            display_id: self.id,
            mode_id: self.mode_id,
            width: self.width,
            height: self.height,
            refresh_rate_hz: self.refresh_rate_hz,
        }
    }

    /// Identity of the display mode; a change means the presentation must be recreated.
    pub fn signature(&self) -> DisplayModeSignature {
        DisplayModeSignature {
            display_id: self.id,
            mode_id: self.mode_id,
            width: self.width,
            height: self.height,
        }
    }

    fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalDisplayMode {
    pub display_id: DisplayId,
    pub mode_id: i32,
    pub width: u32,
    pub height: u32,
    pub refresh_rate_hz: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayModeSignature {
    pub display_id: DisplayId,
    pub mode_id: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Added(DisplayId),
    Removed(DisplayId),
    Changed(DisplayId),
}

pub trait DisplayEnumerator: Send {
    fn presentation_displays(&self) -> Vec<DisplayInfo>;
}

/// Picks the largest powered presentation display, ties broken by refresh rate.
pub fn select_presentation_display(displays: &[DisplayInfo]) -> Option<&DisplayInfo> {
    displays
        .iter()
        .filter(|d| d.power != DisplayPowerState::Off)
        .max_by(|a, b| {
            a.pixel_count()
                .cmp(&b.pixel_count())
                .then(a.refresh_rate_hz.total_cmp(&b.refresh_rate_hz))
        })
}

/// Watches display add/remove/change events and publishes the current best external mode.
pub struct ExternalDisplayController<E: DisplayEnumerator> {
    enumerator: E,
    started: bool,
    mode_tx: watch::Sender<Option<PhysicalDisplayMode>>,
}

impl<E: DisplayEnumerator> ExternalDisplayController<E> {
    pub fn new(enumerator: E) -> Self {
        Self {
            enumerator,
            started: false,
            mode_tx: watch::channel(None).0,
        }
    }

    pub fn modes(&self) -> watch::Receiver<Option<PhysicalDisplayMode>> {
        self.mode_tx.subscribe()
    }

    pub fn enumerator_mut(&mut self) -> &mut E {
        &mut self.enumerator
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.publish();
    }

    pub fn stop(&mut self) {
        self.started = false;
    }

    /// Returns true when the event was accepted (controller started).
    pub fn on_display_event(&mut self, event: DisplayEvent) -> bool {
        if !self.started {
            return false;
        }
        debug!("display event {:?}", event);
        self.publish();
        true
    }

    pub fn current_presentation_display(&self) -> Option<DisplayInfo> {
        let displays = self.enumerator.presentation_displays();
        select_presentation_display(&displays).cloned()
    }

    pub fn current_physical_mode(&self) -> Option<PhysicalDisplayMode> {
        self.current_presentation_display().map(|d| d.physical_mode())
    }

    fn publish(&self) {
        self.mode_tx.send_replace(self.current_physical_mode());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticDisplays(Vec<DisplayInfo>);

    impl DisplayEnumerator for StaticDisplays {
        fn presentation_displays(&self) -> Vec<DisplayInfo> {
            self.0.clone()
        }
    }

    fn display(id: DisplayId, width: u32, height: u32, hz: f32, power: DisplayPowerState) -> DisplayInfo {
        DisplayInfo {
            id,
            mode_id: 1,
            width,
            height,
            refresh_rate_hz: hz,
            power,
        }
    }

    #[test]
    fn test_prefers_resolution_then_refresh_rate() {
        let displays = vec![
            display(1, 1920, 1080, 120.0, DisplayPowerState::On),
            display(2, 3840, 1080, 60.0, DisplayPowerState::On),
            display(3, 3840, 1080, 72.0, DisplayPowerState::On),
        ];
        assert_eq!(select_presentation_display(&displays).map(|d| d.id), Some(3));
    }

    #[test]
    fn test_ignores_displays_that_are_off() {
        let displays = vec![
            display(1, 3840, 2160, 60.0, DisplayPowerState::Off),
            display(2, 1920, 1080, 60.0, DisplayPowerState::Dozing),
        ];
        assert_eq!(select_presentation_display(&displays).map(|d| d.id), Some(2));
        assert!(select_presentation_display(&[]).is_none());
    }

    #[test]
    fn test_publishes_only_when_started() {
        let mut controller = ExternalDisplayController::new(StaticDisplays(vec![display(
            4,
            1920,
            1080,
            60.0,
            DisplayPowerState::On,
        )]));
        let modes = controller.modes();

        assert!(!controller.on_display_event(DisplayEvent::Added(4)));
        assert!(modes.borrow().is_none());

        controller.start();
        assert_eq!(modes.borrow().map(|m| m.display_id), Some(4));

        controller.enumerator_mut().0.clear();
        assert!(controller.on_display_event(DisplayEvent::Removed(4)));
        assert!(modes.borrow().is_none());

        controller.stop();
        assert!(!controller.on_display_event(DisplayEvent::Changed(4)));
    }
}
