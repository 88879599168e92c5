//! # BeatChecker companion client
//!
//! Orchestrates two workflows against the local BeatChecker service:
//! - analyze a video, show tempo/key, save the track ([`analysis`])
//! - activate, refresh and remove the device license ([`license`])
//!
//! All service traffic goes through [`gateway::ServiceGateway`]. Modals are
//! requested through [`modal::ModalRegistry`] and presented by the front end.

pub mod analysis;
pub mod error;
pub mod filename;
pub mod gateway;
pub mod license;
pub mod media;
pub mod modal;
pub mod session;

pub use crate::error::{GatewayError, WorkflowError};
pub use crate::session::{Session, SessionOptions};
