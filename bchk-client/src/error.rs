//! Error types for bchk-client
//!
//! Two layers:
//! - [`GatewayError`]: what happened on the wire, decided by the gateway
//! - [`WorkflowError`]: what the user is told, decided at the controller boundary

use std::time::Duration;
use thiserror::Error;

use crate::gateway::Endpoint;

/// Message shown when the background service cannot be reached
pub const SERVICE_NOT_RUNNING: &str =
    "BeatChecker service is not running. Start the BeatChecker service and try again.";

/// Message shown when the service disappears between analysis and save
pub const SERVICE_CLOSED: &str =
    "The BeatChecker service was closed. Restart it and analyze the track again to save.";

/// Fallback when a rejection carries no usable detail
pub const GENERIC_FAILURE: &str = "The BeatChecker service reported an error. Please try again.";

/// Shown with a 403 from `/analyze` that carries no usable detail
pub const LICENSE_REQUIRED: &str =
    "A BeatChecker license is required to analyze tracks. Activate a license and try again.";

/// Result type for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Classified outcome of a failed service call
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure: refused, DNS, aborted, body read failed
    #[error("{endpoint} unreachable: {reason}")]
    Unreachable { endpoint: Endpoint, reason: String },

    /// The per-call timeout elapsed; the request future was dropped
    #[error("{endpoint} timed out after {}ms", after.as_millis())]
    Timeout { endpoint: Endpoint, after: Duration },

    /// HTTP status >= 400
    #[error("{endpoint} rejected with {status}: {detail}")]
    Rejected {
        endpoint: Endpoint,
        status: u16,
        detail: String,
    },

    /// 2xx body that is not the expected JSON
    #[error("{endpoint} returned an invalid response: {reason}")]
    InvalidResponse { endpoint: Endpoint, reason: String },

    /// The caller cancelled while waiting
    #[error("{endpoint} cancelled")]
    Cancelled { endpoint: Endpoint },
}

impl GatewayError {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            GatewayError::Unreachable { endpoint, .. }
            | GatewayError::Timeout { endpoint, .. }
            | GatewayError::Rejected { endpoint, .. }
            | GatewayError::InvalidResponse { endpoint, .. }
            | GatewayError::Cancelled { endpoint } => *endpoint,
        }
    }

    /// HTTP status of a rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures that mean "the service is not there"
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            GatewayError::Unreachable { .. } | GatewayError::Timeout { .. }
        )
    }
}

/// Result type for controller operations
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

/// User-facing failure taxonomy
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Service unreachable")]
    Unreachable,

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Server rejection, detail shown verbatim
    #[error("Rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// 403 from `/analyze`
    #[error("Licensing required: {detail}")]
    LicensingRequired { detail: String },

    /// Caught before any network call
    #[error("Invalid input: {0}")]
    LocalValidation(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Map a gateway failure from any endpoint except `/analyze`
    pub fn from_gateway(err: GatewayError) -> Self {
        match err {
            GatewayError::Unreachable { .. } => WorkflowError::Unreachable,
            GatewayError::Timeout { after, .. } => WorkflowError::Timeout(after),
            GatewayError::Rejected { status, detail, .. } => {
                WorkflowError::Rejected { status, detail }
            }
            GatewayError::InvalidResponse { reason, .. } => WorkflowError::InvalidResponse(reason),
            GatewayError::Cancelled { .. } => WorkflowError::Cancelled,
        }
    }

    /// Map a gateway failure from `/analyze`; 403 means licensing
    pub fn from_analyze(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected {
                status: 403,
                detail,
                ..
            } => {
                let detail = if detail == GENERIC_FAILURE {
                    LICENSE_REQUIRED.to_string()
                } else {
                    detail
                };
                WorkflowError::LicensingRequired { detail }
            }
            other => Self::from_gateway(other),
        }
    }

    /// Text for the user; rejections pass the server detail through
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Unreachable => SERVICE_NOT_RUNNING.to_string(),
            WorkflowError::Timeout(_) => {
                "The BeatChecker service took too long to respond. Please try again.".to_string()
            }
            WorkflowError::Rejected { detail, .. } => detail.clone(),
            WorkflowError::LicensingRequired { detail } => detail.clone(),
            WorkflowError::LocalValidation(message) => message.clone(),
            WorkflowError::Cancelled => "Cancelled.".to_string(),
            WorkflowError::InvalidResponse(_) => {
                "The BeatChecker service sent an unexpected response. Please try again.".to_string()
            }
            WorkflowError::Io(err) => format!("Could not write the file: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_403_is_licensing() {
        let err = WorkflowError::from_analyze(GatewayError::Rejected {
            endpoint: Endpoint::Analyze,
            status: 403,
            detail: "License expired.".to_string(),
        });
        assert!(matches!(err, WorkflowError::LicensingRequired { .. }));
        assert_eq!(err.user_message(), "License expired.");
    }

    #[test]
    fn test_analyze_403_without_detail_is_licensing() {
        let err = WorkflowError::from_analyze(GatewayError::Rejected {
            endpoint: Endpoint::Analyze,
            status: 403,
            detail: GENERIC_FAILURE.to_string(),
        });
        assert!(matches!(err, WorkflowError::LicensingRequired { .. }));
        assert_eq!(err.user_message(), LICENSE_REQUIRED);
    }

    #[test]
    fn test_other_403_stays_rejected() {
        let err = WorkflowError::from_gateway(GatewayError::Rejected {
            endpoint: Endpoint::Download,
            status: 403,
            detail: "nope".to_string(),
        });
        assert!(matches!(err, WorkflowError::Rejected { status: 403, .. }));
    }

    #[test]
    fn test_transport_failures_use_fixed_messages() {
        let unreachable = WorkflowError::from_analyze(GatewayError::Unreachable {
            endpoint: Endpoint::Analyze,
            reason: "connection refused".to_string(),
        });
        assert_eq!(unreachable.user_message(), SERVICE_NOT_RUNNING);

        let timeout = WorkflowError::from_gateway(GatewayError::Timeout {
            endpoint: Endpoint::LicenseStatus,
            after: Duration::from_secs(5),
        });
        assert!(timeout.user_message().contains("try again"));
        assert!(!timeout.user_message().contains("5000"));
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::Timeout {
            endpoint: Endpoint::Health,
            after: Duration::from_millis(2000),
        };
        assert_eq!(err.to_string(), "GET /health timed out after 2000ms");
        assert!(err.is_unavailable());
        assert_eq!(err.status(), None);
    }
}
