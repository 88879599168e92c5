//! Analysis and health request/response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ========================================
// Health
// ========================================

/// `GET /health` response
///
/// Only liveness matters to the workflows; the licensing fields are logged
/// for diagnostics.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HealthResponse {
    /// Service status (e.g., "ok")
    #[serde(default)]
    pub status: String,

    /// Whether the service considers itself licensed
    #[serde(default)]
    pub license_active: Option<bool>,

    /// Additional status or licensing message
    #[serde(default)]
    pub message: Option<String>,
}

// ========================================
// Analysis
// ========================================

/// `POST /analyze` request body
///
/// # Examples
///
/// ```
/// use bchk_common::api::AnalyzeRequest;
///
/// let request = AnalyzeRequest::new("https://www.youtube.com/watch?v=abc123");
/// assert_eq!(request.url, "https://www.youtube.com/watch?v=abc123");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzeRequest {
    /// Media URL to download and analyze
    pub url: String,
}

impl AnalyzeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// `POST /analyze` success body
///
/// Immutable once received. `file_path` is the service-side path that
/// `GET /download?file=` accepts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisResult {
    /// Detected tempo in beats per minute
    pub bpm: f64,

    /// Detected musical key (e.g., "C# Minor"); may be empty
    #[serde(default)]
    pub key: String,

    /// Service-side path of the downloaded audio file
    pub file_path: String,

    /// Source URL echoed back by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Service-side file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl AnalysisResult {
    /// Tempo if it is usable for display and naming (finite, positive)
    pub fn bpm_value(&self) -> Option<f64> {
        (self.bpm.is_finite() && self.bpm > 0.0).then_some(self.bpm)
    }

    /// Key if it is non-blank
    pub fn key_value(&self) -> Option<&str> {
        let key = self.key.trim();
        (!key.is_empty()).then_some(key)
    }
}

// ========================================
// Error Response Types
// ========================================

/// Error body returned with any 4xx/5xx response
///
/// `detail` is usually a string. Request validation failures carry a list of
/// `{ loc, msg, type }` objects instead.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Human-readable detail, if the body carries one
    ///
    /// # Examples
    ///
    /// ```
    /// use bchk_common::api::ErrorBody;
    ///
    /// let body: ErrorBody = serde_json::from_str(r#"{"detail":"License expired."}"#).unwrap();
    /// assert_eq!(body.message().as_deref(), Some("License expired."));
    /// ```
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Value::Array(items) => items
                .iter()
                .find_map(|item| item.get("msg").and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        }
    }

    /// Decode `detail` from a raw response body
    pub fn detail_from_bytes(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_result_accepts_integer_bpm() {
        let json = r#"{
            "url": "https://youtu.be/abc",
            "bpm": 140,
            "key": "C# Minor",
            "file_path": "/home/u/BeatChecker/downloads/Cold Nights.mp3",
            "filename": "Cold Nights.mp3"
        }"#;

        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.bpm, 140.0);
        assert_eq!(result.key_value(), Some("C# Minor"));
        assert_eq!(result.filename.as_deref(), Some("Cold Nights.mp3"));
    }

    #[test]
    fn test_analysis_result_minimal_body() {
        let result: AnalysisResult =
            serde_json::from_str(r#"{"bpm": 0, "file_path": "/tmp/a.mp3"}"#).unwrap();
        assert_eq!(result.bpm_value(), None);
        assert_eq!(result.key_value(), None);
        assert!(result.url.is_none());
    }

    #[test]
    fn test_error_body_validation_list() {
        let body = br#"{"detail":[{"loc":["body","url"],"msg":"Please provide a valid YouTube URL.","type":"value_error"}]}"#;
        assert_eq!(
            ErrorBody::detail_from_bytes(body).as_deref(),
            Some("Please provide a valid YouTube URL.")
        );
    }

    #[test]
    fn test_error_body_absent_or_garbage() {
        assert_eq!(ErrorBody::detail_from_bytes(b""), None);
        assert_eq!(ErrorBody::detail_from_bytes(b"<html>502</html>"), None);
        assert_eq!(ErrorBody::detail_from_bytes(br#"{"detail":"   "}"#), None);
        assert_eq!(ErrorBody::detail_from_bytes(br#"{"detail":42}"#), None);
    }

    #[test]
    fn test_health_response_tolerates_missing_fields() {
        let health: HealthResponse = serde_json::from_str("{}").unwrap();
        assert!(health.license_active.is_none());

        let health: HealthResponse = serde_json::from_str(
            r#"{"status":"ok","license_active":false,"message":"BeatChecker is not activated."}"#,
        )
        .unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.license_active, Some(false));
    }
}
