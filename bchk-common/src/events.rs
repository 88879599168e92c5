//! Client event types and EventBus
//!
//! Controllers broadcast every state transition, control enable/disable and
//! user-facing notice here. Front ends render from the bus; tests observe it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::LicenseDisplay;

/// Coarse phase of the analysis workflow (payload-free mirror of the
/// controller state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    Idle,
    ConfirmingDuration,
    CheckingService,
    Analyzing,
    ResultsReady,
    LicenseRequired,
    Failed,
    Saving,
    Saved,
    SaveFailed,
}

/// Phase of the license panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicensePhase {
    Loading,
    ServiceUnavailable,
    StatusKnown,
}

/// User-triggerable controls, each guarded by its own action lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Analyze,
    Save,
    LicenseStatus,
    LicenseActivate,
    LicenseRefresh,
    LicenseDeactivate,
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Control::Analyze => "analyze",
            Control::Save => "save",
            Control::LicenseStatus => "license-status",
            Control::LicenseActivate => "license-activate",
            Control::LicenseRefresh => "license-refresh",
            Control::LicenseDeactivate => "license-deactivate",
        };
        f.write_str(name)
    }
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One user-facing outcome line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// BeatChecker client events
///
/// Serializable so a front end can forward them verbatim (e.g., as JSON lines).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Analysis workflow moved between phases
    AnalysisStateChanged {
        /// Session the transition belongs to (None outside a session)
        session_id: Option<Uuid>,
        old_phase: AnalysisPhase,
        new_phase: AnalysisPhase,
        timestamp: DateTime<Utc>,
    },

    /// License panel moved between phases
    LicenseStateChanged {
        phase: LicensePhase,
        /// Rendered display state once the status is known
        display: Option<LicenseDisplay>,
        timestamp: DateTime<Utc>,
    },

    /// A control was disabled (action pending) or re-enabled (action settled)
    ControlChanged {
        control: Control,
        enabled: bool,
        timestamp: DateTime<Utc>,
    },

    /// A duplicate activation was dropped because the action is in flight
    ActionIgnored {
        control: Control,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// User-facing outcome line
    Notice {
        notice: Notice,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`ClientEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use bchk_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    /// Emit a notice with the current timestamp
    pub fn notice(&self, notice: Notice) {
        self.emit_lossy(ClientEvent::Notice {
            notice,
            timestamp: Utc::now(),
        });
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
