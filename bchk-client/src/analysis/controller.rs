//! Analysis Workflow Controller
//!
//! Drives one analysis at a time through the state machine in
//! [`super::state`]. Service health is checked before every analyze call;
//! a 403 from `/analyze` always routes to the license-required modal.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bchk_common::api::AnalysisResult;
use bchk_common::events::{AnalysisPhase, ClientEvent, Control, EventBus, Notice};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::save::save_unique;
use super::state::{AnalysisEvent, AnalysisSession, AnalysisState};
use crate::error::{WorkflowError, SERVICE_CLOSED, SERVICE_NOT_RUNNING};
use crate::filename::filename_for_result;
use crate::gateway::ServiceGateway;
use crate::media::resolve_video_url;
use crate::modal::{ModalContent, ModalKind, ModalRegistry};
use crate::session::action_lock::{ActionGuard, ActionLock};

const NO_VIDEO_FOUND: &str = "Could not find a video to analyze. Open a YouTube video and try again.";

#[derive(Debug)]
struct Inner {
    state: AnalysisState,
    session: Option<AnalysisSession>,
}

#[derive(Debug)]
pub struct AnalysisController {
    gateway: ServiceGateway,
    modals: Arc<ModalRegistry>,
    events: EventBus,
    save_directory: PathBuf,
    inner: Mutex<Inner>,
    analyze_lock: ActionLock,
    save_lock: ActionLock,
}

impl AnalysisController {
    pub fn new(
        gateway: ServiceGateway,
        modals: Arc<ModalRegistry>,
        events: EventBus,
        save_directory: PathBuf,
    ) -> Self {
        Self {
            gateway,
            modals,
            analyze_lock: ActionLock::new(Control::Analyze, events.clone()),
            save_lock: ActionLock::new(Control::Save, events.clone()),
            events,
            save_directory,
            inner: Mutex::new(Inner {
                state: AnalysisState::Idle,
                session: None,
            }),
        }
    }

    /// Current state; `Idle` or `ResultsReady` once no action is in flight
    pub fn state(&self) -> AnalysisState {
        self.lock_inner().state.clone()
    }

    /// Snapshot of the current analysis session
    pub fn session(&self) -> Option<AnalysisSession> {
        self.lock_inner().session.clone()
    }

    pub fn save_directory(&self) -> &PathBuf {
        &self.save_directory
    }

    /// Feed one event through the state machine
    ///
    /// Returns the outcome this event reached (e.g. `Failed`, `Saved`,
    /// `LicenseRequired`). Ignored events return the current state.
    pub async fn dispatch(&self, event: AnalysisEvent) -> AnalysisState {
        match event {
            AnalysisEvent::Activate {
                video_url,
                duration_seconds,
                title,
            } => self.activate(video_url, duration_seconds, title).await,
            AnalysisEvent::Save { title } => self.save(title).await,
            AnalysisEvent::CloseResult => self.close_result(),
            AnalysisEvent::Cancel => {
                let cancelled = self.analyze_lock.cancel() | self.save_lock.cancel();
                debug!(cancelled, "Analysis cancel requested");
                self.state()
            }
        }
    }

    // ========================================
    // Analyze
    // ========================================

    async fn activate(
        &self,
        video_url: Option<String>,
        duration_seconds: Option<f64>,
        title: Option<String>,
    ) -> AnalysisState {
        let Some(guard) = self.analyze_lock.try_acquire() else {
            return self.state();
        };

        let session = {
            let mut inner = self.lock_inner();
            if inner.state.is_busy() {
                drop(inner);
                self.ignored(Control::Analyze, "another action is in progress");
                return self.state();
            }

            let Some(resolved) = video_url.as_deref().and_then(resolve_video_url) else {
                warn!(input = ?video_url, "No resolvable video URL");
                let failed = AnalysisState::Failed {
                    message: NO_VIDEO_FOUND.to_string(),
                };
                inner.session = None;
                self.transition(&mut inner, failed.clone());
                drop(inner);
                self.events.notice(Notice::error(NO_VIDEO_FOUND));
                self.settle_idle();
                return failed;
            };

            // A new activation discards any previous result
            let session = AnalysisSession::new(resolved, duration_seconds, title);
            inner.session = Some(session.clone());
            let next = if session.requires_confirmation {
                AnalysisState::ConfirmingDuration {
                    duration_seconds: duration_seconds.unwrap_or_default(),
                }
            } else {
                AnalysisState::CheckingService
            };
            self.transition(&mut inner, next);
            session
        };

        info!(
            session_id = %session.session_id,
            video_url = %session.video_url,
            duration_seconds = ?session.duration_seconds,
            "Analysis requested"
        );
        let requires_confirmation = session.requires_confirmation;

        if requires_confirmation && !self.confirm_long_video(&guard, duration_seconds).await {
            info!("Long video analysis declined");
            return self.settle_idle();
        }

        self.check_service_then_analyze(&guard).await
    }

    async fn confirm_long_video(&self, guard: &ActionGuard, duration_seconds: Option<f64>) -> bool {
        let minutes = (duration_seconds.unwrap_or_default() / 60.0).ceil() as u64;
        let content = ModalContent::new(
            "Long video",
            format!(
                "This video is about {} minutes long. Analyzing it may take a while. Continue?",
                minutes
            ),
        );

        tokio::select! {
            _ = guard.token().cancelled() => false,
            confirmed = self.modals.confirm(content) => confirmed,
        }
    }

    async fn check_service_then_analyze(&self, guard: &ActionGuard) -> AnalysisState {
        self.set_state(AnalysisState::CheckingService);

        if let Err(err) = self.gateway.health(guard.token()).await {
            let err = WorkflowError::from_gateway(err);
            if matches!(err, WorkflowError::Cancelled) {
                return self.settle_idle();
            }
            warn!(error = %err, "Service health check failed");
            self.modals
                .notify(
                    ModalKind::ServiceMissing,
                    ModalContent::new("BeatChecker service not running", SERVICE_NOT_RUNNING),
                )
                .await;
            return self.settle_idle();
        }

        self.set_state(AnalysisState::Analyzing);
        let video_url = match self.session() {
            Some(session) => session.video_url,
            None => return self.settle_idle(),
        };

        match self.gateway.analyze(&video_url, guard.token()).await {
            Ok(result) => self.results_ready(result),
            Err(err) => self.analyze_failed(WorkflowError::from_analyze(err)).await,
        }
    }

    fn results_ready(&self, result: AnalysisResult) -> AnalysisState {
        let mut inner = self.lock_inner();
        if let Some(session) = inner.session.as_mut() {
            session.result = Some(result.clone());
            info!(
                session_id = %session.session_id,
                bpm = result.bpm,
                key = %result.key,
                elapsed_ms = session.elapsed_ms(),
                "Analysis finished"
            );
        }
        let ready = AnalysisState::ResultsReady { result };
        self.transition(&mut inner, ready.clone());
        ready
    }

    async fn analyze_failed(&self, err: WorkflowError) -> AnalysisState {
        match err {
            WorkflowError::Cancelled => self.settle_idle(),
            WorkflowError::LicensingRequired { detail } => {
                let outcome = AnalysisState::LicenseRequired {
                    detail: detail.clone(),
                };
                self.set_state(outcome.clone());
                self.modals
                    .notify(
                        ModalKind::LicenseRequired,
                        ModalContent::new("License required", detail),
                    )
                    .await;
                self.settle_idle();
                outcome
            }
            other => {
                let message = other.user_message();
                warn!(error = %other, "Analysis failed");
                let outcome = AnalysisState::Failed {
                    message: message.clone(),
                };
                self.set_state(outcome.clone());
                self.events.notice(Notice::error(message));
                self.settle_idle();
                outcome
            }
        }
    }

    // ========================================
    // Save
    // ========================================

    async fn save(&self, title: Option<String>) -> AnalysisState {
        let Some(guard) = self.save_lock.try_acquire() else {
            return self.state();
        };

        let (result, title) = {
            let mut inner = self.lock_inner();
            let Some(result) = inner.state.result().cloned() else {
                drop(inner);
                self.ignored(Control::Save, "no result to save");
                return self.state();
            };
            let title = title
                .or_else(|| inner.session.as_ref().and_then(|s| s.title.clone()))
                .unwrap_or_default();
            self.transition(&mut inner, AnalysisState::Saving);
            (result, title)
        };

        let filename = filename_for_result(&title, &result);
        debug!(filename = %filename, file_path = %result.file_path, "Saving analyzed track");

        let outcome = match self.gateway.download(&result.file_path, guard.token()).await {
            Ok(content) => match save_unique(&self.save_directory, &filename, &content).await {
                Ok(path) => Ok(path),
                Err(e) => Err(WorkflowError::Io(e)),
            },
            Err(err) => Err(WorkflowError::from_gateway(err)),
        };

        let reached = match outcome {
            Ok(path) => {
                self.events
                    .notice(Notice::success(format!("Saved {}", path.display())));
                AnalysisState::Saved { path, filename }
            }
            Err(WorkflowError::Cancelled) => {
                self.set_state(AnalysisState::ResultsReady {
                    result: result.clone(),
                });
                return AnalysisState::ResultsReady { result };
            }
            Err(err) => {
                warn!(error = %err, "Save failed");
                let message = match err {
                    WorkflowError::Unreachable => SERVICE_CLOSED.to_string(),
                    other => other.user_message(),
                };
                self.events.notice(Notice::error(message.clone()));
                AnalysisState::SaveFailed { message }
            }
        };

        self.set_state(reached.clone());
        self.set_state(AnalysisState::ResultsReady { result });
        drop(guard);
        reached
    }

    fn close_result(&self) -> AnalysisState {
        let mut inner = self.lock_inner();
        match inner.state.phase() {
            AnalysisPhase::ResultsReady => {
                inner.session = None;
                self.transition(&mut inner, AnalysisState::Idle);
                AnalysisState::Idle
            }
            AnalysisPhase::Saving => {
                drop(inner);
                self.ignored(Control::Save, "save in progress");
                AnalysisState::Saving
            }
            _ => inner.state.clone(),
        }
    }

    // ========================================
    // State plumbing
    // ========================================

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, new_state: AnalysisState) {
        let mut inner = self.lock_inner();
        self.transition(&mut inner, new_state);
    }

    /// Drop the session and rest in `Idle`
    fn settle_idle(&self) -> AnalysisState {
        let mut inner = self.lock_inner();
        inner.session = None;
        self.transition(&mut inner, AnalysisState::Idle);
        AnalysisState::Idle
    }

    fn transition(&self, inner: &mut Inner, new_state: AnalysisState) {
        let old_phase = inner.state.phase();
        let new_phase = new_state.phase();
        if old_phase == new_phase && inner.state == new_state {
            return;
        }

        let session_id = inner.session.as_ref().map(|s| s.session_id);
        info!(
            session_id = ?session_id,
            old_phase = ?old_phase,
            new_phase = ?new_phase,
            "Analysis state changed"
        );

        let had_result = has_result_view(&inner.state);
        inner.state = new_state;
        let has_result = has_result_view(&inner.state);

        self.events.emit_lossy(ClientEvent::AnalysisStateChanged {
            session_id,
            old_phase,
            new_phase,
            timestamp: Utc::now(),
        });

        if had_result != has_result {
            self.events.emit_lossy(ClientEvent::ControlChanged {
                control: Control::Save,
                enabled: has_result,
                timestamp: Utc::now(),
            });
        }
    }

    fn ignored(&self, control: Control, reason: &str) {
        debug!(control = %control, reason, "Ignoring activation");
        self.events.emit_lossy(ClientEvent::ActionIgnored {
            control,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// States in which the result view (and its save control) is shown
fn has_result_view(state: &AnalysisState) -> bool {
    matches!(
        state,
        AnalysisState::ResultsReady { .. }
            | AnalysisState::Saving
            | AnalysisState::Saved { .. }
            | AnalysisState::SaveFailed { .. }
    )
}
