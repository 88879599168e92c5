//! Analyze-and-download workflow

mod controller;
pub mod save;
pub mod state;

pub use controller::AnalysisController;
pub use state::{AnalysisEvent, AnalysisSession, AnalysisState, LONG_VIDEO_THRESHOLD_SECS};
