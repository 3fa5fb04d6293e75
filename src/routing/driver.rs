use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::controller::{PresentationFactory, PresentationToken, RouteController};
use crate::config::RoutingTiming;
use crate::diag::ROUTING_LOG_TARGET;
use crate::display::{DisplayEnumerator, DisplayEvent};
use crate::player::{lock_coordinator, SurfaceHandle};

struct Shared<E: DisplayEnumerator, F: PresentationFactory> {
    controller: Mutex<RouteController<E, F>>,
    continuity: Mutex<Option<JoinHandle<()>>>,
    timing: RoutingTiming,
}

impl<E: DisplayEnumerator, F: PresentationFactory> Shared<E, F> {
    fn controller(&self) -> MutexGuard<'_, RouteController<E, F>> {
        self.controller.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn continuity(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.continuity.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs a [`RouteController`] with its periodic work on the tokio runtime: the reconnect
/// watchdog while started, and the bounded paused-frame continuity loop on demand.
///
/// All methods that spawn must be called from within a tokio runtime context.
pub struct PlayerRouting<E: DisplayEnumerator + 'static, F: PresentationFactory + 'static> {
    shared: Arc<Shared<E, F>>,
    watchdog: Option<JoinHandle<()>>,
}

impl<E: DisplayEnumerator + 'static, F: PresentationFactory + 'static> PlayerRouting<E, F> {
    pub fn new(controller: RouteController<E, F>, timing: RoutingTiming) -> Self {
        Self {
            shared: Arc::new(Shared {
                controller: Mutex::new(controller),
                continuity: Mutex::new(None),
                timing,
            }),
            watchdog: None,
        }
    }

    /// Short-lived access to the controller. Do not hold across an await.
    pub fn controller(&self) -> MutexGuard<'_, RouteController<E, F>> {
        self.shared.controller()
    }

    pub fn is_watchdog_running(&self) -> bool {
        self.watchdog.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_continuity_running(&self) -> bool {
        self.shared.continuity().as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn start(&mut self) {
        self.shared.controller().on_start();
        ensure_paused_frame_visibility(&self.shared);
        self.start_watchdog();
    }

    pub fn stop(&mut self) {
        self.abort_tasks();
        self.shared.controller().on_stop();
    }

    pub fn update_routing(&self, trigger: &str) {
        self.shared.controller().update_routing(trigger);
        ensure_paused_frame_visibility(&self.shared);
    }

    pub fn on_display_event(&self, event: DisplayEvent) {
        self.shared.controller().on_display_event(event);
        ensure_paused_frame_visibility(&self.shared);
    }

    pub fn on_external_surface_ready(&self, token: PresentationToken, surface: SurfaceHandle) {
        self.shared.controller().on_external_surface_ready(token, surface);
        ensure_paused_frame_visibility(&self.shared);
    }

    pub fn on_external_surface_destroyed(&self, token: PresentationToken) {
        self.shared.controller().on_external_surface_destroyed(token);
        ensure_paused_frame_visibility(&self.shared);
    }

    fn abort_tasks(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        if let Some(continuity) = self.shared.continuity().take() {
            continuity.abort();
        }
    }

    fn start_watchdog(&mut self) {
        if let Some(previous) = self.watchdog.take() {
            previous.abort();
        }
        let shared = Arc::clone(&self.shared);
        self.watchdog = Some(tokio::spawn(async move {
            let period = shared.timing.reconnect_watchdog;
            let mut ticks = time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let routed = shared.controller().watchdog_tick();
                if routed {
                    ensure_paused_frame_visibility(&shared);
                }
            }
        }));
    }
}

impl<E: DisplayEnumerator + 'static, F: PresentationFactory + 'static> Drop for PlayerRouting<E, F> {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Starts the continuity loop when a paused frame is expected but has not rendered since the
/// bind, and cancels it when that no longer holds. Never runs two loops at once.
fn ensure_paused_frame_visibility<E, F>(shared: &Arc<Shared<E, F>>)
where
    E: DisplayEnumerator + 'static,
    F: PresentationFactory + 'static,
{
    let should_ensure = {
        let controller = shared.controller();
        controller.can_process("paused-frame-ensure") && controller.should_ensure_paused_frame()
    };
    let mut slot = shared.continuity();
    if !should_ensure {
        if let Some(task) = slot.take() {
            task.abort();
        }
        return;
    }
    if slot.as_ref().is_some_and(|task| !task.is_finished()) {
        return;
    }

    debug!(target: ROUTING_LOG_TARGET, "paused-frame continuity loop started");
    let task_shared = Arc::clone(shared);
    *slot = Some(tokio::spawn(async move {
        let deadline = Instant::now() + task_shared.timing.paused_frame_timeout;
        while Instant::now() < deadline {
            {
                let controller = task_shared.controller();
                if !controller.should_ensure_paused_frame() {
                    break;
                }
                lock_coordinator(controller.coordinator()).show_paused_frame_if_expected();
            }
            time::sleep(task_shared.timing.paused_frame_retry).await;
        }
        debug!(target: ROUTING_LOG_TARGET, "paused-frame continuity loop finished");
    }));
}
