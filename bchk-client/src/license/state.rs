//! License panel states and events

use bchk_common::api::{LicenseDisplay, LicenseStatus};
use bchk_common::events::{Control, LicensePhase, Notice};

#[derive(Debug, Clone, PartialEq)]
pub enum LicenseViewState {
    Loading,
    ServiceUnavailable { message: String },
    StatusKnown {
        status: LicenseStatus,
        display: LicenseDisplay,
    },
}

impl LicenseViewState {
    pub fn phase(&self) -> LicensePhase {
        match self {
            LicenseViewState::Loading => LicensePhase::Loading,
            LicenseViewState::ServiceUnavailable { .. } => LicensePhase::ServiceUnavailable,
            LicenseViewState::StatusKnown { .. } => LicensePhase::StatusKnown,
        }
    }

    pub fn display(&self) -> Option<LicenseDisplay> {
        match self {
            LicenseViewState::StatusKnown { display, .. } => Some(*display),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<&LicenseStatus> {
        match self {
            LicenseViewState::StatusKnown { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// What [`super::LicenseController::dispatch`] returns: the view plus the
/// outcome line of this action, if any
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseView {
    pub state: LicenseViewState,
    pub notice: Option<Notice>,
}

impl LicenseView {
    pub fn new(state: LicenseViewState, notice: Option<Notice>) -> Self {
        Self { state, notice }
    }
}

/// License actions that can be cancelled independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LicenseAction {
    Load,
    Activate,
    Refresh,
    Deactivate,
}

impl LicenseAction {
    pub fn control(self) -> Control {
        match self {
            LicenseAction::Load => Control::LicenseStatus,
            LicenseAction::Activate => Control::LicenseActivate,
            LicenseAction::Refresh => Control::LicenseRefresh,
            LicenseAction::Deactivate => Control::LicenseDeactivate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseEvent {
    Load,
    Activate { key: String },
    Refresh,
    Deactivate,
    Cancel(LicenseAction),
}
