//! Endpoints of the background service

use reqwest::Method;

/// One route of the background service contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    Analyze,
    Download,
    LicenseStatus,
    LicenseActivate,
    LicenseRefresh,
    LicenseDeactivate,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Health => "/health",
            Endpoint::Analyze => "/analyze",
            Endpoint::Download => "/download",
            Endpoint::LicenseStatus => "/license/status",
            Endpoint::LicenseActivate => "/license/activate",
            Endpoint::LicenseRefresh => "/license/refresh",
            Endpoint::LicenseDeactivate => "/license/deactivate",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Endpoint::Health | Endpoint::Download | Endpoint::LicenseStatus => Method::GET,
            Endpoint::Analyze
            | Endpoint::LicenseActivate
            | Endpoint::LicenseRefresh
            | Endpoint::LicenseDeactivate => Method::POST,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}
