//! Top-level session context
//!
//! Owns the event bus, the modal registry and both workflow controllers.
//! Nothing is shared between sessions; closing a session tears down its
//! modal controllers and resolves anything still pending.

pub mod action_lock;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bchk_common::config::ClientConfig;
use bchk_common::events::EventBus;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::analysis::AnalysisController;
use crate::gateway::ServiceGateway;
use crate::license::LicenseController;
use crate::modal::{ModalRegistry, ModalRequest};

const EVENT_CAPACITY: usize = 256;
const MODAL_QUEUE: usize = 4;

/// Settings a session needs beyond the gateway
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub save_directory: PathBuf,
    pub license_settle_delay: Duration,
}

impl From<&ClientConfig> for SessionOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            save_directory: config.save_directory.clone(),
            license_settle_delay: config.license_settle_delay,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    events: EventBus,
    modals: Arc<ModalRegistry>,
    gateway: ServiceGateway,
    analysis: Arc<AnalysisController>,
    license: Arc<LicenseController>,
}

impl Session {
    /// Build a session from resolved configuration
    ///
    /// The returned receiver yields every modal the workflows want shown.
    pub fn from_config(
        config: &ClientConfig,
    ) -> bchk_common::Result<(Self, mpsc::Receiver<ModalRequest>)> {
        let gateway = ServiceGateway::from_config(config)?;
        Ok(Self::new(gateway, SessionOptions::from(config)))
    }

    pub fn new(
        gateway: ServiceGateway,
        options: SessionOptions,
    ) -> (Self, mpsc::Receiver<ModalRequest>) {
        let events = EventBus::new(EVENT_CAPACITY);
        let (modals, presenter) = ModalRegistry::new(MODAL_QUEUE);
        let modals = Arc::new(modals);

        let analysis = Arc::new(AnalysisController::new(
            gateway.clone(),
            modals.clone(),
            events.clone(),
            options.save_directory,
        ));
        let license = Arc::new(LicenseController::new(
            gateway.clone(),
            modals.clone(),
            events.clone(),
            options.license_settle_delay,
        ));

        let session = Self {
            id: Uuid::new_v4(),
            events,
            modals,
            gateway,
            analysis,
            license,
        };
        info!(
            session_id = %session.id,
            service = %session.gateway.base_url(),
            "Session opened"
        );
        (session, presenter)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn modals(&self) -> &Arc<ModalRegistry> {
        &self.modals
    }

    pub fn gateway(&self) -> &ServiceGateway {
        &self.gateway
    }

    pub fn analysis(&self) -> &Arc<AnalysisController> {
        &self.analysis
    }

    pub fn license(&self) -> &Arc<LicenseController> {
        &self.license
    }

    /// Tear down modal controllers; pending modals resolve to their default
    pub fn close(&self) {
        if !self.modals.is_closed() {
            info!(session_id = %self.id, "Session closed");
            self.modals.teardown();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
