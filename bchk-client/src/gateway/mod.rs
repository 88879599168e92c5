//! Service Gateway
//!
//! Thin HTTP client for the background service. Every call carries an
//! explicit timeout and a cancellation token; both drop the in-flight
//! request future, so a late response can never be observed.
//!
//! Failures are classified here and nowhere else:
//! - transport problems → [`GatewayError::Unreachable`]
//! - timeout elapsed → [`GatewayError::Timeout`]
//! - status >= 400 → [`GatewayError::Rejected`] with the body's `detail`
//!
//! The gateway keeps no state between calls.

mod endpoint;

pub use endpoint::Endpoint;

use bchk_common::api::{
    mask_key, ActivateRequest, ActivateResponse, AnalysisResult, AnalyzeRequest, ErrorBody,
    HealthResponse, LicenseStatus,
};
use bchk_common::config::{ClientConfig, TimeoutConfig};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;

use crate::error::{GatewayError, GatewayResult, GENERIC_FAILURE};

const USER_AGENT: &str = concat!("bchk/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the background service
#[derive(Debug, Clone)]
pub struct ServiceGateway {
    http_client: Client,
    base_url: Url,
    timeouts: TimeoutConfig,
}

impl ServiceGateway {
    /// Create a gateway for `base_url` (e.g. `http://127.0.0.1:8765`)
    pub fn new(base_url: &str, timeouts: TimeoutConfig) -> bchk_common::Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            bchk_common::Error::InvalidInput(format!(
                "Invalid service address {:?}: {}",
                base_url, e
            ))
        })?;

        // No idle connections: a restarted service is seen on the next call
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| {
                bchk_common::Error::Internal(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            base_url,
            timeouts,
        })
    }

    pub fn from_config(config: &ClientConfig) -> bchk_common::Result<Self> {
        Self::new(&config.base_url(), config.timeouts.clone())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Issue one JSON call
    ///
    /// Returns the decoded body, or `Value::Null` for an empty 2xx body.
    pub async fn call(
        &self,
        endpoint: Endpoint,
        body: Option<&Value>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> GatewayResult<Value> {
        let mut request = self.request(endpoint)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let bytes = self.exchange(endpoint, request, timeout, cancel).await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            error!(endpoint = %endpoint, error = %e, "Response body is not JSON");
            GatewayError::InvalidResponse {
                endpoint,
                reason: e.to_string(),
            }
        })
    }

    /// Issue one call whose 2xx body is binary content
    pub async fn fetch_bytes(
        &self,
        endpoint: Endpoint,
        query: &[(&str, &str)],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> GatewayResult<Vec<u8>> {
        let request = self.request(endpoint)?.query(query);
        self.exchange(endpoint, request, timeout, cancel).await
    }

    // ========================================
    // Typed endpoint wrappers
    // ========================================

    /// `GET /health`; any 2xx counts as alive
    pub async fn health(&self, cancel: &CancellationToken) -> GatewayResult<HealthResponse> {
        let body = self
            .fetch_bytes(Endpoint::Health, &[], self.timeouts.health(), cancel)
            .await?;

        // The body is informational only; plain-text or empty bodies still mean alive
        let health = serde_json::from_slice::<HealthResponse>(&body).unwrap_or_default();
        debug!(
            status = %health.status,
            license_active = ?health.license_active,
            "Service health check succeeded"
        );
        Ok(health)
    }

    /// `POST /analyze`
    pub async fn analyze(
        &self,
        video_url: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<AnalysisResult> {
        let body = serde_json::to_value(AnalyzeRequest::new(video_url)).map_err(|e| {
            GatewayError::InvalidResponse {
                endpoint: Endpoint::Analyze,
                reason: e.to_string(),
            }
        })?;
        let value = self
            .call(Endpoint::Analyze, Some(&body), self.timeouts.analyze(), cancel)
            .await?;
        decode(Endpoint::Analyze, value)
    }

    /// `GET /download?file=<path>`
    pub async fn download(
        &self,
        file_path: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<Vec<u8>> {
        self.fetch_bytes(
            Endpoint::Download,
            &[("file", file_path)],
            self.timeouts.download(),
            cancel,
        )
        .await
    }

    /// `GET /license/status`
    pub async fn license_status(&self, cancel: &CancellationToken) -> GatewayResult<LicenseStatus> {
        let value = self
            .call(
                Endpoint::LicenseStatus,
                None,
                self.timeouts.license_status(),
                cancel,
            )
            .await?;
        decode(Endpoint::LicenseStatus, value)
    }

    /// `POST /license/activate`
    pub async fn activate_license(
        &self,
        license_key: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<ActivateResponse> {
        debug!(license_key = %mask_key(license_key), "Activating license");
        let body = serde_json::to_value(ActivateRequest {
            license_key: license_key.to_string(),
        })
        .map_err(|e| GatewayError::InvalidResponse {
            endpoint: Endpoint::LicenseActivate,
            reason: e.to_string(),
        })?;

        let value = self
            .call(
                Endpoint::LicenseActivate,
                Some(&body),
                self.timeouts.license_activate(),
                cancel,
            )
            .await?;
        if value.is_null() {
            return Ok(ActivateResponse::default());
        }
        decode(Endpoint::LicenseActivate, value)
    }

    /// `POST /license/refresh`; the body is not used
    pub async fn refresh_license(&self, cancel: &CancellationToken) -> GatewayResult<Value> {
        self.call(
            Endpoint::LicenseRefresh,
            None,
            self.timeouts.license_refresh(),
            cancel,
        )
        .await
    }

    /// `POST /license/deactivate`; the body is not used
    pub async fn deactivate_license(&self, cancel: &CancellationToken) -> GatewayResult<Value> {
        self.call(
            Endpoint::LicenseDeactivate,
            None,
            self.timeouts.license_deactivate(),
            cancel,
        )
        .await
    }

    // ========================================
    // Plumbing
    // ========================================

    fn request(&self, endpoint: Endpoint) -> GatewayResult<RequestBuilder> {
        let url = self
            .base_url
            .join(endpoint.path())
            .map_err(|e| GatewayError::Unreachable {
                endpoint,
                reason: format!("Invalid URL: {}", e),
            })?;
        Ok(self.http_client.request(endpoint.method(), url))
    }

    /// Send, read the whole body, classify the status
    ///
    /// Send and body read both run under the timeout and the cancel token.
    async fn exchange(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> GatewayResult<Vec<u8>> {
        let started = Instant::now();
        debug!(endpoint = %endpoint, timeout_ms = timeout.as_millis() as u64, "Calling service");

        let work = async {
            let response = request
                .send()
                .await
                .map_err(|e| transport_failure(endpoint, &e))?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| transport_failure(endpoint, &e))?;
            Ok::<_, GatewayError>((status, body.to_vec()))
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(endpoint = %endpoint, "Call cancelled");
                return Err(GatewayError::Cancelled { endpoint });
            }
            outcome = tokio::time::timeout(timeout, work) => outcome,
        };

        let (status, body) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    endpoint = %endpoint,
                    timeout_ms = timeout.as_millis() as u64,
                    "Call timed out"
                );
                return Err(GatewayError::Timeout {
                    endpoint,
                    after: timeout,
                });
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.as_u16() >= 400 {
            let detail = ErrorBody::detail_from_bytes(&body)
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            warn!(
                endpoint = %endpoint,
                status = status.as_u16(),
                elapsed_ms,
                detail = %detail,
                "Service rejected call"
            );
            return Err(GatewayError::Rejected {
                endpoint,
                status: status.as_u16(),
                detail,
            });
        }

        debug!(
            endpoint = %endpoint,
            status = status.as_u16(),
            elapsed_ms,
            bytes = body.len(),
            "Call succeeded"
        );
        Ok(body)
    }
}

fn transport_failure(endpoint: Endpoint, err: &reqwest::Error) -> GatewayError {
    warn!(endpoint = %endpoint, error = %err, "Service unreachable");
    GatewayError::Unreachable {
        endpoint,
        reason: err.to_string(),
    }
}

fn decode<T: DeserializeOwned>(endpoint: Endpoint, value: Value) -> GatewayResult<T> {
    serde_json::from_value(value).map_err(|e| {
        error!(endpoint = %endpoint, error = %e, "Unexpected response shape");
        GatewayError::InvalidResponse {
            endpoint,
            reason: e.to_string(),
        }
    })
}
