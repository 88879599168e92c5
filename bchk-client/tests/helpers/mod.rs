//! Shared test helpers for bchk-client integration tests

#![allow(dead_code)]

pub mod mock_service;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bchk_client::gateway::ServiceGateway;
use bchk_client::modal::{ModalKind, ModalRequest};
use bchk_client::{Session, SessionOptions};
use bchk_common::config::TimeoutConfig;
use bchk_common::events::ClientEvent;
use tokio::sync::{broadcast, mpsc};

/// Timeouts short enough to keep failing tests fast
pub fn fast_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        health_ms: 1_000,
        analyze_ms: 3_000,
        download_ms: 3_000,
        license_status_ms: 1_000,
        license_activate_ms: 3_000,
        license_refresh_ms: 3_000,
        license_deactivate_ms: 3_000,
    }
}

pub fn session_with(
    base_url: &str,
    save_directory: &Path,
    timeouts: TimeoutConfig,
    settle: Duration,
) -> (Session, mpsc::Receiver<ModalRequest>) {
    let gateway = ServiceGateway::new(base_url, timeouts).unwrap();
    Session::new(
        gateway,
        SessionOptions {
            save_directory: save_directory.to_path_buf(),
            license_settle_delay: settle,
        },
    )
}

pub fn session_for(base_url: &str, save_directory: &Path) -> (Session, mpsc::Receiver<ModalRequest>) {
    session_with(base_url, save_directory, fast_timeouts(), Duration::from_millis(10))
}

/// Modals seen by an auto-answering presenter
#[derive(Clone, Default)]
pub struct ModalLog {
    seen: Arc<Mutex<Vec<(ModalKind, String)>>>,
}

impl ModalLog {
    pub fn kinds(&self) -> Vec<ModalKind> {
        self.seen.lock().unwrap().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(_, body)| body.clone()).collect()
    }
}

/// Answer every confirmation with `confirm`, acknowledge everything else
pub fn auto_answer(mut requests: mpsc::Receiver<ModalRequest>, confirm: bool) -> ModalLog {
    let log = ModalLog::default();
    let seen = log.seen.clone();
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            seen.lock()
                .unwrap()
                .push((request.kind, request.content.body.clone()));
            match request.kind {
                ModalKind::Confirmation => request.confirm(confirm),
                _ => request.acknowledge(),
            }
        }
    });
    log
}

/// Drain every event already on the bus
pub fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
