use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::controller::{ExternalPresentation, PresentationFactory, PresentationToken};
use crate::display::{DisplayEnumerator, DisplayId, DisplayInfo, DisplayPowerState};

pub fn display(id: DisplayId, width: u32, height: u32, refresh_rate_hz: f32) -> DisplayInfo {
    DisplayInfo {
        id,
        mode_id: 1,
        width,
        height,
        refresh_rate_hz,
        power: DisplayPowerState::On,
    }
}

/// Display list shared between a test and the controller under test.
#[derive(Debug, Clone, Default)]
pub struct FakeDisplays {
    displays: Arc<Mutex<Vec<DisplayInfo>>>,
}

impl FakeDisplays {
    pub fn set(&self, displays: Vec<DisplayInfo>) {
        *self.displays.lock().unwrap() = displays;
    }

    fn contains(&self, id: DisplayId) -> bool {
        self.displays.lock().unwrap().iter().any(|d| d.id == id)
    }
}

impl DisplayEnumerator for FakeDisplays {
    fn presentation_displays(&self) -> Vec<DisplayInfo> {
        self.displays.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
struct FactoryState {
    created: usize,
    dismissed: usize,
    tokens: Vec<PresentationToken>,
    fail_next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FakeFactory {
    displays: FakeDisplays,
    state: Arc<Mutex<FactoryState>>,
}

impl FakeFactory {
    pub fn new(displays: &FakeDisplays) -> Self {
        Self {
            displays: displays.clone(),
            state: Arc::default(),
        }
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn dismissed(&self) -> usize {
        self.state.lock().unwrap().dismissed
    }

    pub fn last_token(&self) -> Option<PresentationToken> {
        self.state.lock().unwrap().tokens.last().copied()
    }

    pub fn fail_next(&self, message: &str) {
        self.state.lock().unwrap().fail_next = Some(message.to_string());
    }
}

/// Stops showing once dismissed or once its display disappears, like a platform presentation.
#[derive(Debug)]
pub struct FakePresentation {
    display_id: DisplayId,
    displays: FakeDisplays,
    factory: Arc<Mutex<FactoryState>>,
    dismissed: bool,
}

impl ExternalPresentation for FakePresentation {
    fn display_id(&self) -> DisplayId {
        self.display_id
    }

    fn is_showing(&self) -> bool {
        !self.dismissed && self.displays.contains(self.display_id)
    }

    fn dismiss(&mut self) {
        if !self.dismissed {
            self.dismissed = true;
            self.factory.lock().unwrap().dismissed += 1;
        }
    }
}

impl PresentationFactory for FakeFactory {
    type Presentation = FakePresentation;

    fn create(&mut self, display: &DisplayInfo, token: PresentationToken) -> Result<FakePresentation> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_next.take() {
            return Err(anyhow!("{}", message));
        }
        state.created += 1;
        state.tokens.push(token);
        Ok(FakePresentation {
            display_id: display.id,
            displays: self.displays.clone(),
            factory: self.state.clone(),
            dismissed: false,
        })
    }
}
