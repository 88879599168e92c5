//! License display state
//!
//! Computed client-side from a fresh status on every render. The server's
//! `active` flag wins outright; everything else depends on a stored key.

use bchk_common::api::{LicenseDisplay, LicenseStatus};
use chrono::{DateTime, Utc};

/// Map a fetched status to one of the five display states
///
/// Precedence:
/// 1. `active` → Active
/// 2. no key → NoLicense
/// 3. key and `blocked` → Blocked
/// 4. key and `expires_at` strictly before `now` → Expired
/// 5. key → Inactive
pub fn display_state(status: &LicenseStatus, now: DateTime<Utc>) -> LicenseDisplay {
    if status.active {
        return LicenseDisplay::Active;
    }
    if !status.has_key() {
        return LicenseDisplay::NoLicense;
    }
    if status.blocked {
        return LicenseDisplay::Blocked;
    }

    // Unparseable expiry counts as not expired
    match status.expires_at_utc() {
        Some(expires_at) if expires_at < now => LicenseDisplay::Expired,
        _ => LicenseDisplay::Inactive,
    }
}
