//! Device license lifecycle

mod controller;
pub mod display;
pub mod state;

pub use controller::LicenseController;
pub use display::display_state;
pub use state::{LicenseAction, LicenseEvent, LicenseView, LicenseViewState};
