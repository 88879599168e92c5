//! License status and activation types

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// `GET /license/status` response
///
/// Sourced entirely from the background service. The client never patches
/// it in place; every mutation is a round trip followed by a fresh fetch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LicenseStatus {
    #[serde(default)]
    pub product_id: Option<i64>,

    /// Whether the service considers the license usable
    #[serde(default)]
    pub active: bool,

    /// Masked license key (e.g., "***ABCD"), `None` when no key is stored
    #[serde(default)]
    pub license_key: Option<String>,

    /// ISO-8601 expiry timestamp; naive values are UTC
    #[serde(default)]
    pub expires_at: Option<String>,

    #[serde(default)]
    pub customer_name: Option<String>,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub max_machines: Option<i64>,

    #[serde(default)]
    pub allowed_machines: Option<i64>,

    #[serde(default)]
    pub activated_machines: Option<i64>,

    #[serde(default)]
    pub activated_at: Option<String>,

    #[serde(default)]
    pub last_validated_at: Option<String>,

    #[serde(default)]
    pub blocked: bool,

    /// Inactive reason or other status message
    #[serde(default)]
    pub message: Option<String>,
}

impl LicenseStatus {
    /// Whether a non-blank license key is stored on the device
    pub fn has_key(&self) -> bool {
        self.license_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }

    /// Parsed expiry, `None` when absent or unparseable
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at.as_deref().and_then(parse_expiry)
    }
}

/// The five mutually exclusive ways a known license status is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseDisplay {
    Active,
    Blocked,
    Expired,
    Inactive,
    NoLicense,
}

impl LicenseDisplay {
    /// Only the no-license state exposes the activation form
    pub fn shows_activation_form(self) -> bool {
        matches!(self, LicenseDisplay::NoLicense)
    }

    /// States with a stored key expose refresh/remove instead
    pub fn shows_key_actions(self) -> bool {
        !self.shows_activation_form()
    }

    pub fn label(self) -> &'static str {
        match self {
            LicenseDisplay::Active => "Active",
            LicenseDisplay::Blocked => "Blocked",
            LicenseDisplay::Expired => "Expired",
            LicenseDisplay::Inactive => "Inactive",
            LicenseDisplay::NoLicense => "No license",
        }
    }
}

impl std::fmt::Display for LicenseDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `POST /license/activate` request body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivateRequest {
    pub license_key: String,
}

/// `POST /license/activate` success body
///
/// Only `message` is used, for the success notice. Display state always comes
/// from a fresh status fetch.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActivateResponse {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub status: Option<LicenseStatus>,
}

/// Parse an expiry timestamp as sent by the service
///
/// Accepts RFC 3339 (with offset), naive ISO-8601 date-times (treated as UTC)
/// and bare dates (midnight UTC).
///
/// # Examples
///
/// ```
/// use bchk_common::api::parse_expiry;
///
/// assert!(parse_expiry("2030-01-31T12:00:00").is_some());
/// assert!(parse_expiry("2030-01-31T12:00:00+02:00").is_some());
/// assert!(parse_expiry("2030-01-31").is_some());
/// assert!(parse_expiry("next tuesday").is_none());
/// ```
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Mask a license key for logs, keeping only the last four characters
///
/// # Examples
///
/// ```
/// use bchk_common::api::mask_key;
///
/// assert_eq!(mask_key("ABCD-EFGH-IJKL-MNOP"), "***MNOP");
/// assert_eq!(mask_key("AB-C"), "ABC");
/// ```
pub fn mask_key(key: &str) -> String {
    let stripped: Vec<char> = key.chars().filter(|c| *c != '-' && *c != ' ').collect();
    if stripped.len() <= 4 {
        return stripped.into_iter().collect();
    }
    let tail: String = stripped[stripped.len() - 4..].iter().collect();
    format!("***{}", tail)
}
