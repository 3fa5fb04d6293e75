pub mod external;
pub mod route;

pub use external::{
    select_presentation_display, DisplayEnumerator, DisplayEvent, DisplayInfo, DisplayModeSignature,
    DisplayPowerState, ExternalDisplayController, PhysicalDisplayMode,
};
pub use route::{
    ActiveRoute, DisplayId, DisplayRouteDecision, DisplayRouteSnapshot, DisplayRouteState, DisplayRouteStateMachine,
    RouteTarget,
};
