//! Analysis workflow states, events and the per-analysis session
//!
//! ```text
//! Idle → ConfirmingDuration? → CheckingService → Analyzing
//!      → { ResultsReady | LicenseRequired | Failed }
//! ResultsReady → Saving → { Saved | SaveFailed } → ResultsReady
//! ```

use std::path::PathBuf;

use bchk_common::api::AnalysisResult;
use bchk_common::events::AnalysisPhase;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Videos longer than this need explicit confirmation (strictly greater)
pub const LONG_VIDEO_THRESHOLD_SECS: f64 = 300.0;

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState {
    Idle,
    ConfirmingDuration { duration_seconds: f64 },
    CheckingService,
    Analyzing,
    ResultsReady { result: AnalysisResult },
    LicenseRequired { detail: String },
    Failed { message: String },
    Saving,
    Saved { path: PathBuf, filename: String },
    SaveFailed { message: String },
}

impl AnalysisState {
    pub fn phase(&self) -> AnalysisPhase {
        match self {
            AnalysisState::Idle => AnalysisPhase::Idle,
            AnalysisState::ConfirmingDuration { .. } => AnalysisPhase::ConfirmingDuration,
            AnalysisState::CheckingService => AnalysisPhase::CheckingService,
            AnalysisState::Analyzing => AnalysisPhase::Analyzing,
            AnalysisState::ResultsReady { .. } => AnalysisPhase::ResultsReady,
            AnalysisState::LicenseRequired { .. } => AnalysisPhase::LicenseRequired,
            AnalysisState::Failed { .. } => AnalysisPhase::Failed,
            AnalysisState::Saving => AnalysisPhase::Saving,
            AnalysisState::Saved { .. } => AnalysisPhase::Saved,
            AnalysisState::SaveFailed { .. } => AnalysisPhase::SaveFailed,
        }
    }

    /// States in which a duplicate activation is ignored
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            AnalysisState::ConfirmingDuration { .. }
                | AnalysisState::CheckingService
                | AnalysisState::Analyzing
                | AnalysisState::Saving
        )
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalysisState::ResultsReady { result } => Some(result),
            _ => None,
        }
    }
}

/// Inputs to [`super::AnalysisController::dispatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    /// User pressed the analyze control
    Activate {
        /// Raw page/user input; resolved before any call
        video_url: Option<String>,
        duration_seconds: Option<f64>,
        /// Displayed title, used later for the file name
        title: Option<String>,
    },
    /// User pressed save on the result view
    Save {
        /// Overrides the title captured at activation
        title: Option<String>,
    },
    /// User closed the result view
    CloseResult,
    /// Abandon the in-flight analyze or save call
    Cancel,
}

/// One user-initiated analysis
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    pub session_id: Uuid,
    pub video_url: String,
    pub duration_seconds: Option<f64>,
    pub requires_confirmation: bool,
    pub title: Option<String>,
    pub result: Option<AnalysisResult>,
    pub started_at: DateTime<Utc>,
}

impl AnalysisSession {
    pub fn new(video_url: String, duration_seconds: Option<f64>, title: Option<String>) -> Self {
        let requires_confirmation = duration_seconds
            .map(|secs| secs.is_finite() && secs > LONG_VIDEO_THRESHOLD_SECS)
            .unwrap_or(false);

        Self {
            session_id: Uuid::new_v4(),
            video_url,
            duration_seconds,
            requires_confirmation,
            title,
            result: None,
            started_at: Utc::now(),
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}
