use anyhow::Result;
use log::{debug, error, info};
use tokio::sync::watch;

use super::binding::PlayerRouteBinding;
use crate::diag::ROUTING_LOG_TARGET;
use crate::display::{
    ActiveRoute, DisplayEnumerator, DisplayEvent, DisplayId, DisplayInfo, DisplayModeSignature, DisplayRouteDecision,
    DisplayRouteSnapshot, DisplayRouteState, DisplayRouteStateMachine, ExternalDisplayController, RouteTarget,
};
use crate::player::{lock_coordinator, SharedCoordinator, SurfaceHandle};

/// Identifies one presentation instance. Callbacks carrying an older token are stale.
pub type PresentationToken = u64;

/// Content shown on an external display; owns the video surface it reports back.
pub trait ExternalPresentation: Send {
    fn display_id(&self) -> DisplayId;
    fn is_showing(&self) -> bool;
    fn dismiss(&mut self);
}

pub trait PresentationFactory: Send {
    type Presentation: ExternalPresentation;

    /// Surface readiness is reported later through
    /// [`RouteController::on_external_surface_ready`] with the same `token`.
    fn create(&mut self, display: &DisplayInfo, token: PresentationToken) -> Result<Self::Presentation>;
}

/// Sequential owner of display routing for one foreground session.
pub struct RouteController<E: DisplayEnumerator, F: PresentationFactory> {
    binding: PlayerRouteBinding,
    displays: ExternalDisplayController<E>,
    factory: F,
    state_machine: DisplayRouteStateMachine,
    presentation: Option<F::Presentation>,
    presentation_signature: Option<DisplayModeSignature>,
    presentation_token: PresentationToken,
    presentation_error: Option<String>,
    external_surface: Option<SurfaceHandle>,
    route_state_tx: watch::Sender<DisplayRouteState>,
}

impl<E: DisplayEnumerator, F: PresentationFactory> RouteController<E, F> {
    pub fn new(coordinator: SharedCoordinator, enumerator: E, factory: F) -> Self {
        Self {
            binding: PlayerRouteBinding::new(coordinator),
            displays: ExternalDisplayController::new(enumerator),
            factory,
            state_machine: DisplayRouteStateMachine::new(),
            presentation: None,
            presentation_signature: None,
            presentation_token: 0,
            presentation_error: None,
            external_surface: None,
            route_state_tx: watch::channel(DisplayRouteState::NoOutput).0,
        }
    }

    pub fn binding(&self) -> &PlayerRouteBinding {
        &self.binding
    }

    pub fn coordinator(&self) -> &SharedCoordinator {
        self.binding.coordinator()
    }

    pub fn displays(&self) -> &ExternalDisplayController<E> {
        &self.displays
    }

    pub fn displays_mut(&mut self) -> &mut ExternalDisplayController<E> {
        &mut self.displays
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn route_state(&self) -> DisplayRouteState {
        *self.route_state_tx.borrow()
    }

    pub fn route_states(&self) -> watch::Receiver<DisplayRouteState> {
        self.route_state_tx.subscribe()
    }

    pub fn presentation(&self) -> Option<&F::Presentation> {
        self.presentation.as_ref()
    }

    pub fn presentation_token(&self) -> PresentationToken {
        self.presentation_token
    }

    pub fn external_surface(&self) -> Option<SurfaceHandle> {
        self.external_surface
    }

    /// Message of the last failed presentation start, cleared by the next successful one.
    pub fn presentation_error(&self) -> Option<&str> {
        self.presentation_error.as_deref()
    }

    pub fn can_process(&self, trigger: &str) -> bool {
        self.binding.can_process(trigger)
    }

    pub fn on_start(&mut self) {
        self.binding.on_start();
        self.displays.start();
        self.sync_external_presentation();
        self.update_routing("start");
    }

    pub fn on_stop(&mut self) {
        self.binding.on_teardown_begin();
        self.displays.stop();
        debug!(target: ROUTING_LOG_TARGET, "stop teardown -> clear/dismiss");
        self.binding.clear_active_surface(true);
        self.dismiss_presentation();
    }

    pub fn on_display_event(&mut self, event: DisplayEvent) {
        if !self.displays.on_display_event(event) || !self.can_process("display-mode-changed") {
            return;
        }
        self.sync_external_presentation();
        self.update_routing("display-mode-changed");
    }

    /// One reconnect watchdog tick: re-sync unless the external route is already live.
    /// Returns true when routing was recomputed.
    pub fn watchdog_tick(&mut self) -> bool {
        if !self.can_process("reconnect-watchdog-loop") || self.route_state().is_external_active() {
            return false;
        }
        self.sync_external_presentation();
        self.update_routing("reconnect-watchdog").is_some()
    }

    /// Recreates the external presentation when the best display or its mode changed.
    pub fn sync_external_presentation(&mut self) {
        if !self.can_process("sync-external-presentation") {
            return;
        }
        let Some(display) = self.displays.current_presentation_display() else {
            if !self.presentation.as_ref().is_some_and(|p| p.is_showing()) {
                self.dismiss_presentation();
            }
            self.update_routing("no-external-display");
            return;
        };

        let signature = display.signature();
        let unchanged = self.presentation.as_ref().is_some_and(|p| p.display_id() == display.id)
            && self.presentation_signature == Some(signature)
            && self.external_surface.is_some();
        if unchanged {
            return;
        }

        self.dismiss_presentation();
        self.presentation_token += 1;
        let token = self.presentation_token;
        match self.factory.create(&display, token) {
            Ok(presentation) => {
                info!(
                    "external presentation on display {} ({}x{} @ {:.0} Hz)",
                    display.id, display.width, display.height, display.refresh_rate_hz
                );
                self.presentation = Some(presentation);
                self.presentation_signature = Some(signature);
                self.presentation_error = None;
            }
            Err(e) => {
                error!("failed to start external presentation: {:#}", e);
                self.presentation_error = Some(format!("{:#}", e));
                self.presentation = None;
                self.external_surface = None;
                self.presentation_signature = None;
                self.update_routing("external-presentation-failure");
            }
        }
    }

    pub fn dismiss_presentation(&mut self) {
        self.presentation_token += 1;
        if let Some(mut presentation) = self.presentation.take() {
            presentation.dismiss();
        }
        self.external_surface = None;
        self.presentation_signature = None;
    }

    pub fn on_external_surface_ready(&mut self, token: PresentationToken, surface: SurfaceHandle) {
        if token != self.presentation_token || !self.can_process("external-surface-ready") {
            return;
        }
        self.external_surface = Some(surface);
        self.update_routing("external-surface-ready");
    }

    pub fn on_external_surface_destroyed(&mut self, token: PresentationToken) {
        if token != self.presentation_token || !self.can_process("external-surface-destroyed") {
            return;
        }
        let destroyed = self.external_surface.take();
        self.binding.on_surface_destroyed(destroyed, true);
        self.update_routing("external-surface-destroyed");
    }

    /// Decides the route from fresh facts and applies its side effects.
    /// Returns `None` when routing is not currently allowed to act.
    pub fn update_routing(&mut self, trigger: &str) -> Option<DisplayRouteDecision> {
        if !self.can_process(&format!("update-routing:{}", trigger)) {
            return None;
        }
        let snapshot = DisplayRouteSnapshot {
            external_display_id: self
                .displays
                .current_presentation_display()
                .map(|d| d.id)
                .or_else(|| self.presentation.as_ref().map(|p| p.display_id())),
            external_surface_ready: self.external_surface.is_some(),
            active_route: self.binding.active_route(),
            active_surface_bound: self.binding.active_surface().is_some(),
        };
        let decision = self.state_machine.decide(&snapshot);
        debug!(
            target: ROUTING_LOG_TARGET,
            "update_routing trigger={} target={:?} state={} active_route={:?} active_surface={} external_surface={}",
            trigger,
            decision.target,
            decision.state,
            snapshot.active_route,
            snapshot.active_surface_bound,
            snapshot.external_surface_ready
        );
        self.route_state_tx.send_replace(decision.state);

        let rebound = match decision.target {
            RouteTarget::External => self.binding.bind_surface(self.external_surface, ActiveRoute::External),
            RouteTarget::HoldCurrent => false,
            RouteTarget::None => {
                lock_coordinator(self.binding.coordinator()).pause_for_interruption();
                self.binding.clear_active_surface(false);
                false
            }
        };
        if decision.state.is_external_active() {
            let mut coordinator = lock_coordinator(self.binding.coordinator());
            if rebound {
                coordinator.show_paused_frame_if_expected();
            }
            coordinator.resume_if_expected();
        }
        Some(decision)
    }

    /// True while a paused frame should be on the external display but none has rendered since the bind.
    pub fn should_ensure_paused_frame(&self) -> bool {
        if !self.route_state().is_external_active()
            || self.binding.active_route() != ActiveRoute::External
            || self.binding.active_surface().is_none()
        {
            return false;
        }
        let session = lock_coordinator(self.binding.coordinator()).state();
        session.paused_frame_visible_expected && session.awaiting_first_frame_after_surface_bind
    }
}
