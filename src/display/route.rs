use std::fmt;

pub type DisplayId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveRoute {
    #[default]
    None,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    None,
    HoldCurrent,
    External,
}

/// There is no internal-display state: video is never routed to the phone screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayRouteState {
    #[default]
    NoOutput,
    ExternalPending(DisplayId),
    ExternalActive(DisplayId),
}

impl DisplayRouteState {
    pub fn is_external_active(&self) -> bool {
        matches!(self, DisplayRouteState::ExternalActive(_))
    }
}

impl fmt::Display for DisplayRouteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayRouteState::NoOutput => write!(f, "no-output"),
            DisplayRouteState::ExternalPending(id) => write!(f, "external-pending(display={})", id),
            DisplayRouteState::ExternalActive(id) => write!(f, "external-active(display={})", id),
        }
    }
}

/// Facts the route decision is made from. Build a fresh one per trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRouteSnapshot {
    pub external_display_id: Option<DisplayId>,
    pub external_surface_ready: bool,
    pub active_route: ActiveRoute,
    pub active_surface_bound: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRouteDecision {
    pub state: DisplayRouteState,
    pub target: RouteTarget,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayRouteStateMachine;

impl DisplayRouteStateMachine {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, snapshot: &DisplayRouteSnapshot) -> DisplayRouteDecision {
        let Some(display_id) = snapshot.external_display_id else {
            return DisplayRouteDecision {
                state: DisplayRouteState::NoOutput,
                target: RouteTarget::None,
            };
        };

        if snapshot.external_surface_ready {
            return DisplayRouteDecision {
                state: DisplayRouteState::ExternalActive(display_id),
                target: RouteTarget::External,
            };
        }

        // Keep a working external binding while the presentation briefly reports not-ready.
        let hold_current = snapshot.active_route == ActiveRoute::External && snapshot.active_surface_bound;
        DisplayRouteDecision {
            state: DisplayRouteState::ExternalPending(display_id),
            target: if hold_current {
                RouteTarget::HoldCurrent
            } else {
                RouteTarget::None
            },
        }
    }
}
