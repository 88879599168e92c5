//! License Workflow Controller
//!
//! Every mutation is a round trip followed by a fresh `GET /license/status`.
//! The status is never patched locally. Each action has its own lock and its
//! own timeout; deactivate also holds the refresh and activate locks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bchk_common::api::{mask_key, LicenseDisplay, LicenseStatus};
use bchk_common::events::{ClientEvent, Control, EventBus, Notice};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::display::display_state;
use super::state::{LicenseAction, LicenseEvent, LicenseView, LicenseViewState};
use crate::error::{GatewayError, WorkflowError, GENERIC_FAILURE, SERVICE_NOT_RUNNING};
use crate::gateway::ServiceGateway;
use crate::modal::{ModalContent, ModalRegistry};
use crate::session::action_lock::ActionLock;

const EMPTY_KEY: &str = "Please enter a license key.";
const NO_KEY_TO_REFRESH: &str = "There is no license key on this device to refresh.";
const ACTIVATED: &str = "License activated successfully.";
const ACTIVATE_FAILED: &str = "Activation failed. Please try again.";
const REFRESHED: &str = "License refreshed.";
const REFRESH_FAILED: &str = "Failed to refresh license. Please try again.";
const DEACTIVATED: &str = "License deactivated successfully.";
const DEACTIVATE_FAILED: &str = "Failed to deactivate license. Please try again.";

#[derive(Debug)]
pub struct LicenseController {
    gateway: ServiceGateway,
    modals: Arc<ModalRegistry>,
    events: EventBus,
    settle_delay: Duration,
    view: Mutex<LicenseViewState>,
    status_lock: ActionLock,
    activate_lock: ActionLock,
    refresh_lock: ActionLock,
    deactivate_lock: ActionLock,
}

impl LicenseController {
    pub fn new(
        gateway: ServiceGateway,
        modals: Arc<ModalRegistry>,
        events: EventBus,
        settle_delay: Duration,
    ) -> Self {
        Self {
            gateway,
            modals,
            settle_delay,
            view: Mutex::new(LicenseViewState::Loading),
            status_lock: ActionLock::new(Control::LicenseStatus, events.clone()),
            activate_lock: ActionLock::new(Control::LicenseActivate, events.clone()),
            refresh_lock: ActionLock::new(Control::LicenseRefresh, events.clone()),
            deactivate_lock: ActionLock::new(Control::LicenseDeactivate, events.clone()),
            events,
        }
    }

    pub fn state(&self) -> LicenseViewState {
        self.view.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Feed one event through the state machine
    pub async fn dispatch(&self, event: LicenseEvent) -> LicenseView {
        let notice = match event {
            LicenseEvent::Load => self.load().await,
            LicenseEvent::Activate { key } => self.activate(&key).await,
            LicenseEvent::Refresh => self.refresh().await,
            LicenseEvent::Deactivate => self.deactivate().await,
            LicenseEvent::Cancel(action) => {
                let cancelled = self.lock_for(action).cancel();
                debug!(action = ?action, cancelled, "License cancel requested");
                None
            }
        };

        if let Some(notice) = &notice {
            self.events.notice(notice.clone());
        }
        LicenseView::new(self.state(), notice)
    }

    fn lock_for(&self, action: LicenseAction) -> &ActionLock {
        match action {
            LicenseAction::Load => &self.status_lock,
            LicenseAction::Activate => &self.activate_lock,
            LicenseAction::Refresh => &self.refresh_lock,
            LicenseAction::Deactivate => &self.deactivate_lock,
        }
    }

    // ========================================
    // Actions
    // ========================================

    async fn load(&self) -> Option<Notice> {
        let guard = self.status_lock.try_acquire()?;
        let prior = self.state();
        self.set_view(LicenseViewState::Loading);

        if let Some(next) = self.fetch_view(guard.token()).await {
            self.set_view(next);
        } else {
            self.set_view(prior);
        }
        None
    }

    async fn activate(&self, key: &str) -> Option<Notice> {
        let guard = self.activate_lock.try_acquire()?;

        let key = key.trim();
        if key.is_empty() {
            return Some(Notice::error(
                WorkflowError::LocalValidation(EMPTY_KEY.to_string()).user_message(),
            ));
        }

        info!(license_key = %mask_key(key), "Activating license");
        let response = match self.gateway.activate_license(key, guard.token()).await {
            Ok(response) => response,
            Err(err) => return self.action_failed(err, ACTIVATE_FAILED),
        };
        let message = response
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| ACTIVATED.to_string());

        // Give the service a moment to persist before re-reading. The key is
        // already active server-side, so a cancel only cuts the wait short.
        let settled = tokio::select! {
            _ = guard.token().cancelled() => false,
            _ = tokio::time::sleep(self.settle_delay) => true,
        };
        if !settled {
            debug!("Settle delay cancelled, re-reading status now");
        }
        self.reload(&CancellationToken::new()).await;

        Some(Notice::success(message))
    }

    async fn refresh(&self) -> Option<Notice> {
        let guard = self.refresh_lock.try_acquire()?;

        if let Some(status) = self.state().status() {
            if !status.has_key() {
                return Some(Notice::error(
                    WorkflowError::LocalValidation(NO_KEY_TO_REFRESH.to_string()).user_message(),
                ));
            }
        }

        if let Err(err) = self.gateway.refresh_license(guard.token()).await {
            return self.action_failed(err, REFRESH_FAILED);
        }

        // Always re-read, and warn if the outcome is not usable
        let view = self.reload(guard.token()).await;
        let notice = match view {
            Some(LicenseViewState::StatusKnown { status, display }) => {
                refresh_outcome_notice(&status, display)
            }
            Some(LicenseViewState::ServiceUnavailable { message }) => Notice::warning(format!(
                "License refreshed, but its status could not be loaded: {}",
                message
            )),
            _ => Notice::success(REFRESHED),
        };
        Some(notice)
    }

    async fn deactivate(&self) -> Option<Notice> {
        let guard = self.deactivate_lock.try_acquire()?;
        let _refresh = self.refresh_lock.try_acquire()?;
        let _activate = self.activate_lock.try_acquire()?;

        let content = ModalContent::new(
            "Remove license",
            "Remove the license from this device? You can activate it again later.",
        );
        let confirmed = tokio::select! {
            _ = guard.token().cancelled() => false,
            confirmed = self.modals.confirm(content) => confirmed,
        };
        if !confirmed {
            info!("License removal not confirmed");
            return None;
        }

        if let Err(err) = self.gateway.deactivate_license(guard.token()).await {
            return self.action_failed(err, DEACTIVATE_FAILED);
        }

        self.reload(guard.token()).await;
        Some(Notice::success(DEACTIVATED))
    }

    // ========================================
    // Helpers
    // ========================================

    /// Re-fetch and render; `None` if cancelled (view left unchanged)
    async fn reload(&self, cancel: &CancellationToken) -> Option<LicenseViewState> {
        let next = self.fetch_view(cancel).await?;
        self.set_view(next.clone());
        Some(next)
    }

    /// One status fetch mapped to a view; `None` if cancelled
    async fn fetch_view(&self, cancel: &CancellationToken) -> Option<LicenseViewState> {
        match self.gateway.license_status(cancel).await {
            Ok(status) => {
                let shown = display_state(&status, Utc::now());
                debug!(
                    display = %shown,
                    license_key = ?status.license_key,
                    "License status fetched"
                );
                Some(LicenseViewState::StatusKnown {
                    status,
                    display: shown,
                })
            }
            Err(GatewayError::Cancelled { .. }) => None,
            Err(err) => {
                warn!(error = %err, "License status fetch failed");
                let message = match WorkflowError::from_gateway(err) {
                    WorkflowError::Unreachable | WorkflowError::Timeout(_) => {
                        SERVICE_NOT_RUNNING.to_string()
                    }
                    other => other.user_message(),
                };
                Some(LicenseViewState::ServiceUnavailable { message })
            }
        }
    }

    /// Keep the prior view and report, except that an unreachable service
    /// moves the panel to `ServiceUnavailable`
    fn action_failed(&self, err: GatewayError, fallback: &str) -> Option<Notice> {
        let err = WorkflowError::from_gateway(err);
        warn!(error = %err, "License action failed");

        match err {
            WorkflowError::Cancelled => None,
            WorkflowError::Unreachable => {
                self.set_view(LicenseViewState::ServiceUnavailable {
                    message: SERVICE_NOT_RUNNING.to_string(),
                });
                Some(Notice::error(SERVICE_NOT_RUNNING))
            }
            WorkflowError::Rejected { detail, .. } if detail != GENERIC_FAILURE => {
                Some(Notice::error(detail))
            }
            WorkflowError::Rejected { .. } | WorkflowError::InvalidResponse(_) => {
                Some(Notice::error(fallback))
            }
            other => Some(Notice::error(other.user_message())),
        }
    }

    fn set_view(&self, next: LicenseViewState) {
        let mut view = self.view.lock().unwrap_or_else(|e| e.into_inner());
        if *view == next {
            return;
        }

        info!(
            old_phase = ?view.phase(),
            new_phase = ?next.phase(),
            display = ?next.display(),
            "License state changed"
        );
        self.events.emit_lossy(ClientEvent::LicenseStateChanged {
            phase: next.phase(),
            display: next.display(),
            timestamp: Utc::now(),
        });
        *view = next;
    }
}

fn refresh_outcome_notice(status: &LicenseStatus, display: LicenseDisplay) -> Notice {
    let reason = status
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .map(|m| format!(" {}", m))
        .unwrap_or_default();

    if status.blocked {
        Notice::warning(format!("License refreshed, but it is blocked.{}", reason))
    } else if !status.active {
        Notice::warning(format!(
            "License refreshed, but it is not active ({}).{}",
            display.label().to_lowercase(),
            reason
        ))
    } else {
        Notice::success(REFRESHED)
    }
}
