//! Wire types for the BeatChecker background service
//!
//! The background service exposes a small HTTP contract on a loopback address:
//!
//! | Method/Path                | Request body            | Success                      |
//! |----------------------------|-------------------------|------------------------------|
//! | `GET /health`              | -                       | [`HealthResponse`]           |
//! | `POST /analyze`            | [`AnalyzeRequest`]      | [`AnalysisResult`]           |
//! | `GET /download?file=<p>`   | -                       | binary content               |
//! | `GET /license/status`      | -                       | [`LicenseStatus`]            |
//! | `POST /license/activate`   | [`ActivateRequest`]     | [`ActivateResponse`]         |
//! | `POST /license/refresh`    | -                       | JSON (ignored)               |
//! | `POST /license/deactivate` | -                       | JSON (ignored)               |
//!
//! Every failure carries an [`ErrorBody`] with a `detail` field.
//!
//! This module contains ONLY plain serde types and pure helpers; the HTTP
//! client lives in `bchk-client`.

pub mod license;
pub mod types;

pub use license::{
    mask_key, parse_expiry, ActivateRequest, ActivateResponse, LicenseDisplay, LicenseStatus,
};
pub use types::{AnalysisResult, AnalyzeRequest, ErrorBody, HealthResponse};
