//! Modal/Session Registry
//!
//! Controllers never render anything. They hand a [`ModalRequest`] to the
//! front end over a channel and await its reply. The registry:
//! - creates one [`ModalController`] per [`ModalKind`] on first use
//! - lets each controller have at most one pending `show()`; a racing second
//!   `show()` returns `None` without presenting anything
//! - resolves every pending `show()` with the default dismissal on teardown

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The three modal kinds the workflows use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalKind {
    /// Yes/no question, resolves to [`ModalReply::Confirmed`]
    Confirmation,
    /// "Background service is not running"
    ServiceMissing,
    /// "A license is required to analyze"
    LicenseRequired,
}

impl ModalKind {
    /// Reply used when the modal is dismissed without an answer
    pub fn default_reply(self) -> ModalReply {
        match self {
            ModalKind::Confirmation => ModalReply::Confirmed(false),
            ModalKind::ServiceMissing | ModalKind::LicenseRequired => ModalReply::Acknowledged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalContent {
    pub title: String,
    pub body: String,
}

impl ModalContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalReply {
    Confirmed(bool),
    Acknowledged,
}

/// One modal waiting to be presented by the front end
#[derive(Debug)]
pub struct ModalRequest {
    pub kind: ModalKind,
    pub content: ModalContent,
    reply: oneshot::Sender<ModalReply>,
}

impl ModalRequest {
    pub fn respond(self, reply: ModalReply) {
        // Receiver gone means the show() was abandoned
        let _ = self.reply.send(reply);
    }

    pub fn confirm(self, accepted: bool) {
        self.respond(ModalReply::Confirmed(accepted));
    }

    pub fn acknowledge(self) {
        self.respond(ModalReply::Acknowledged);
    }

    /// True once the waiting `show()` was dropped (its action was cancelled)
    ///
    /// Presenters should skip abandoned requests instead of prompting.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    /// Close without answering; the caller sees the default dismissal
    pub fn dismiss(self) {
        drop(self);
    }
}

/// Presentation controller for one modal kind
#[derive(Debug)]
pub struct ModalController {
    kind: ModalKind,
    pending: AtomicBool,
    requests: mpsc::Sender<ModalRequest>,
    closed: CancellationToken,
}

/// Clears the pending flag on every exit path
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ModalController {
    fn new(
        kind: ModalKind,
        requests: mpsc::Sender<ModalRequest>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            kind,
            pending: AtomicBool::new(false),
            requests,
            closed,
        }
    }

    pub fn kind(&self) -> ModalKind {
        self.kind
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Present the modal and wait for the user
    ///
    /// Returns `None` if this controller already has a pending `show()`.
    /// A closed front end or a torn-down session yields the default dismissal.
    pub async fn show(&self, content: ModalContent) -> Option<ModalReply> {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(kind = ?self.kind, "Modal already pending, ignoring show");
            return None;
        }
        let _guard = PendingGuard(&self.pending);

        if self.closed.is_cancelled() {
            return Some(self.kind.default_reply());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ModalRequest {
            kind: self.kind,
            content,
            reply: reply_tx,
        };

        if self.requests.send(request).await.is_err() {
            debug!(kind = ?self.kind, "No modal presenter, using default dismissal");
            return Some(self.kind.default_reply());
        }

        let reply = tokio::select! {
            _ = self.closed.cancelled() => None,
            reply = reply_rx => reply.ok(),
        };
        Some(reply.unwrap_or_else(|| self.kind.default_reply()))
    }
}

/// Session-owned registry of modal controllers, keyed by kind
#[derive(Debug)]
pub struct ModalRegistry {
    requests: mpsc::Sender<ModalRequest>,
    controllers: Mutex<HashMap<ModalKind, Arc<ModalController>>>,
    closed: CancellationToken,
}

impl ModalRegistry {
    /// Create a registry and the receiver the front end presents from
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ModalRequest>) {
        let (requests, presenter) = mpsc::channel(capacity.max(1));
        let registry = Self {
            requests,
            controllers: Mutex::new(HashMap::new()),
            closed: CancellationToken::new(),
        };
        (registry, presenter)
    }

    /// Controller for `kind`, created on first request
    pub fn controller(&self, kind: ModalKind) -> Arc<ModalController> {
        let mut controllers = self.controllers.lock().unwrap_or_else(|e| e.into_inner());
        controllers
            .entry(kind)
            .or_insert_with(|| {
                debug!(kind = ?kind, "Creating modal controller");
                Arc::new(ModalController::new(
                    kind,
                    self.requests.clone(),
                    self.closed.clone(),
                ))
            })
            .clone()
    }

    /// Ask a yes/no question; anything but an explicit yes is `false`
    pub async fn confirm(&self, content: ModalContent) -> bool {
        matches!(
            self.controller(ModalKind::Confirmation).show(content).await,
            Some(ModalReply::Confirmed(true))
        )
    }

    /// Show an informational modal and wait until it is acknowledged
    pub async fn notify(&self, kind: ModalKind, content: ModalContent) {
        let _ = self.controller(kind).show(content).await;
    }

    /// Kinds whose controller has been created
    pub fn instantiated(&self) -> Vec<ModalKind> {
        let controllers = self.controllers.lock().unwrap_or_else(|e| e.into_inner());
        controllers.keys().copied().collect()
    }

    /// Resolve pending modals with their default and drop all controllers
    pub fn teardown(&self) {
        self.closed.cancel();
        let mut controllers = self.controllers.lock().unwrap_or_else(|e| e.into_inner());
        controllers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_controllers_created_lazily_and_reused() {
        let (registry, _presenter) = ModalRegistry::new(4);
        assert!(registry.instantiated().is_empty());

        let first = registry.controller(ModalKind::ServiceMissing);
        let second = registry.controller(ModalKind::ServiceMissing);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.instantiated(), vec![ModalKind::ServiceMissing]);
    }

    #[tokio::test]
    async fn test_confirm_round_trip() {
        let (registry, mut presenter) = ModalRegistry::new(4);
        tokio::spawn(async move {
            while let Some(request) = presenter.recv().await {
                assert_eq!(request.kind, ModalKind::Confirmation);
                request.confirm(true);
            }
        });

        assert!(registry.confirm(ModalContent::new("Long video", "Continue?")).await);
    }

    #[tokio::test]
    async fn test_second_show_while_pending_is_noop() {
        let (registry, mut presenter) = ModalRegistry::new(4);
        let controller = registry.controller(ModalKind::LicenseRequired);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .show(ModalContent::new("License required", "Activate first"))
                    .await
            })
        };

        let request = presenter.recv().await.unwrap();
        assert!(!request.is_abandoned());
        assert!(controller.is_pending());
        assert_eq!(
            controller.show(ModalContent::new("again", "again")).await,
            None
        );

        request.acknowledge();
        assert_eq!(first.await.unwrap(), Some(ModalReply::Acknowledged));
        assert!(!controller.is_pending());

        // Only one request ever reached the presenter
        assert!(tokio::time::timeout(Duration::from_millis(20), presenter.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_dropped_show_marks_request_abandoned() {
        let (registry, mut presenter) = ModalRegistry::new(4);
        let controller = registry.controller(ModalKind::Confirmation);

        let shown = tokio::time::timeout(
            Duration::from_millis(20),
            controller.show(ModalContent::new("Long video", "Continue?")),
        )
        .await;
        assert!(shown.is_err());
        assert!(!controller.is_pending());

        let request = presenter.recv().await.unwrap();
        assert!(request.is_abandoned());
    }

    #[tokio::test]
    async fn test_dismissed_confirmation_is_false() {
        let (registry, mut presenter) = ModalRegistry::new(4);
        tokio::spawn(async move {
            while let Some(request) = presenter.recv().await {
                request.dismiss();
            }
        });
        assert!(!registry.confirm(ModalContent::new("Remove", "Sure?")).await);
    }

    #[tokio::test]
    async fn test_missing_presenter_uses_default() {
        let (registry, presenter) = ModalRegistry::new(4);
        drop(presenter);
        assert!(!registry.confirm(ModalContent::new("t", "b")).await);
        assert_eq!(
            registry
                .controller(ModalKind::ServiceMissing)
                .show(ModalContent::new("t", "b"))
                .await,
            Some(ModalReply::Acknowledged)
        );
    }

    #[tokio::test]
    async fn test_teardown_resolves_pending_show() {
        let (registry, mut presenter) = ModalRegistry::new(4);
        let registry = Arc::new(registry);

        let waiting = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.confirm(ModalContent::new("t", "b")).await })
        };
        let _request = presenter.recv().await.unwrap();

        registry.teardown();
        assert!(!waiting.await.unwrap());
        assert!(registry.instantiated().is_empty());
        assert!(registry.is_closed());
    }
}
