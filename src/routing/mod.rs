pub mod binding;
pub mod controller;
pub mod driver;
#[cfg(test)]
pub(crate) mod testing;

pub use binding::PlayerRouteBinding;
pub use controller::{ExternalPresentation, PresentationFactory, PresentationToken, RouteController};
pub use driver::PlayerRouting;
