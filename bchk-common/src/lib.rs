//! # BeatChecker Common Library
//!
//! Shared code for the BeatChecker companion client including:
//! - Wire types for the background service HTTP contract
//! - Configuration loading (CLI > environment > TOML > defaults)
//! - Client event types and the EventBus
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
