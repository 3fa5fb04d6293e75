use std::sync::MutexGuard;

use log::debug;

use crate::diag::ROUTING_LOG_TARGET;
use crate::display::ActiveRoute;
use crate::player::{lock_coordinator, PlaybackCoordinator, SharedCoordinator, SurfaceHandle};

/// Tracks which surface the playback session is bound to on behalf of one foreground owner,
/// and suppresses routing side effects while that owner is tearing down.
pub struct PlayerRouteBinding {
    coordinator: SharedCoordinator,
    active_route: ActiveRoute,
    active_surface: Option<SurfaceHandle>,
    routing_active: bool,
    teardown_in_progress: bool,
}

impl PlayerRouteBinding {
    pub fn new(coordinator: SharedCoordinator) -> Self {
        Self {
            coordinator,
            active_route: ActiveRoute::None,
            active_surface: None,
            routing_active: false,
            teardown_in_progress: false,
        }
    }

    pub fn coordinator(&self) -> &SharedCoordinator {
        &self.coordinator
    }

    pub fn active_route(&self) -> ActiveRoute {
        self.active_route
    }

    pub fn active_surface(&self) -> Option<SurfaceHandle> {
        self.active_surface
    }

    pub fn on_start(&mut self) {
        self.routing_active = true;
        self.teardown_in_progress = false;
    }

    pub fn on_teardown_begin(&mut self) {
        self.routing_active = false;
        self.teardown_in_progress = true;
    }

    pub fn can_process(&self, trigger: &str) -> bool {
        let enabled = self.routing_active && !self.teardown_in_progress;
        if !enabled {
            debug!(
                target: ROUTING_LOG_TARGET,
                "skip trigger={} routing_active={} teardown={}",
                trigger, self.routing_active, self.teardown_in_progress
            );
        }
        enabled
    }

    /// Returns true only when a fresh bind reached the playback session.
    pub fn bind_surface(&mut self, surface: Option<SurfaceHandle>, route: ActiveRoute) -> bool {
        if self.teardown_in_progress {
            debug!(target: ROUTING_LOG_TARGET, "skip bind route={:?} teardown=true", route);
            return false;
        }
        let Some(surface) = surface else {
            self.clear_active_surface(false);
            return false;
        };
        if self.active_surface == Some(surface) && self.active_route == route {
            return false;
        }

        let mut coordinator = self.session();
        if let Some(previous) = self.active_surface.filter(|previous| *previous != surface) {
            debug!(target: ROUTING_LOG_TARGET, "clear previous {} before bind", previous);
            coordinator.clear_surface(previous);
        }
        debug!(target: ROUTING_LOG_TARGET, "bind {} route={:?}", surface, route);
        coordinator.bind_surface(surface);
        drop(coordinator);

        self.active_surface = Some(surface);
        self.active_route = route;
        true
    }

    pub fn clear_active_surface(&mut self, force: bool) {
        if self.teardown_in_progress && !force {
            debug!(target: ROUTING_LOG_TARGET, "skip clear surface teardown=true force=false");
            return;
        }
        if let Some(previous) = self.active_surface {
            debug!(target: ROUTING_LOG_TARGET, "clear active {}", previous);
            self.session().clear_surface(previous);
        }
        self.active_surface = None;
        self.active_route = ActiveRoute::None;
    }

    /// Forgets `surface` if it is the active one. The session is only told when
    /// `clear_session_surface` is set, i.e. routing is still live.
    pub fn on_surface_destroyed(&mut self, surface: Option<SurfaceHandle>, clear_session_surface: bool) {
        let Some(surface) = surface.filter(|s| self.active_surface == Some(*s)) else {
            return;
        };
        if clear_session_surface {
            self.session().clear_surface(surface);
        } else {
            debug!(target: ROUTING_LOG_TARGET, "{} destroyed while routing disabled", surface);
        }
        self.active_surface = None;
        self.active_route = ActiveRoute::None;
    }

    fn session(&self) -> MutexGuard<'_, PlaybackCoordinator> {
        lock_coordinator(&self.coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::{EngineCall, FakeEngine};

    fn binding_with(engine: &FakeEngine) -> PlayerRouteBinding {
        let mut coordinator = PlaybackCoordinator::new();
        coordinator.attach_engine(engine.boxed());
        let mut binding = PlayerRouteBinding::new(coordinator.shared());
        binding.on_start();
        binding
    }

    #[test]
    fn test_bind_is_idempotent() {
        let engine = FakeEngine::new();
        let mut binding = binding_with(&engine);

        assert!(binding.bind_surface(Some(SurfaceHandle(1)), ActiveRoute::External));
        assert!(!binding.bind_surface(Some(SurfaceHandle(1)), ActiveRoute::External));

        assert_eq!(engine.bind_count(), 1);
        assert_eq!(binding.active_route(), ActiveRoute::External);
        assert_eq!(binding.active_surface(), Some(SurfaceHandle(1)));
    }

    #[test]
    fn test_rebind_clears_previous_surface_first() {
        let engine = FakeEngine::new();
        let mut binding = binding_with(&engine);
        binding.bind_surface(Some(SurfaceHandle(1)), ActiveRoute::External);
        engine.take_calls();

        assert!(binding.bind_surface(Some(SurfaceHandle(2)), ActiveRoute::External));
        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Clear(Some(SurfaceHandle(1))),
                EngineCall::Bind(SurfaceHandle(2)),
            ]
        );
    }

    #[test]
    fn test_bind_none_clears() {
        let engine = FakeEngine::new();
        let mut binding = binding_with(&engine);
        binding.bind_surface(Some(SurfaceHandle(1)), ActiveRoute::External);

        assert!(!binding.bind_surface(None, ActiveRoute::External));
        assert_eq!(binding.active_surface(), None);
        assert_eq!(binding.active_route(), ActiveRoute::None);
        assert!(!binding.coordinator().lock().unwrap().state().has_bound_surface);
    }

    #[test]
    fn test_teardown_blocks_bind_and_unforced_clear() {
        let engine = FakeEngine::new();
        let mut binding = binding_with(&engine);
        binding.bind_surface(Some(SurfaceHandle(1)), ActiveRoute::External);
        binding.on_teardown_begin();
        engine.take_calls();

        assert!(!binding.can_process("test"));
        assert!(!binding.bind_surface(Some(SurfaceHandle(2)), ActiveRoute::External));
        binding.clear_active_surface(false);
        assert!(engine.calls().is_empty());
        assert_eq!(binding.active_surface(), Some(SurfaceHandle(1)));

        binding.clear_active_surface(true);
        assert_eq!(engine.calls(), vec![EngineCall::Clear(Some(SurfaceHandle(1)))]);
        assert_eq!(binding.active_route(), ActiveRoute::None);
    }

    #[test]
    fn test_surface_destroyed_only_matches_active() {
        let engine = FakeEngine::new();
        let mut binding = binding_with(&engine);
        binding.bind_surface(Some(SurfaceHandle(1)), ActiveRoute::External);
        engine.take_calls();

        binding.on_surface_destroyed(Some(SurfaceHandle(5)), true);
        assert_eq!(binding.active_surface(), Some(SurfaceHandle(1)));

        binding.on_surface_destroyed(Some(SurfaceHandle(1)), false);
        assert!(engine.calls().is_empty());
        assert_eq!(binding.active_surface(), None);
        assert_eq!(binding.active_route(), ActiveRoute::None);
    }

    #[test]
    fn test_surface_destroyed_clears_session_when_live() {
        let engine = FakeEngine::new();
        let mut binding = binding_with(&engine);
        binding.bind_surface(Some(SurfaceHandle(1)), ActiveRoute::External);
        engine.take_calls();

        binding.on_surface_destroyed(Some(SurfaceHandle(1)), true);
        assert_eq!(engine.calls(), vec![EngineCall::Clear(Some(SurfaceHandle(1)))]);
    }
}
