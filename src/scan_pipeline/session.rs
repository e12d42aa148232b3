//! Capture session module
//!
//! This module provides the session state machine that drives a scanner
//! through open, settings negotiation, capture and close.

pub mod config;
mod manager;
pub mod phase;


pub use config::{DEFAULT_CHUNK_SIZE, SessionConfig, SessionConfigBuilder};
pub use manager::{Interrupter, Pump, Session};
pub use phase::{Operation, Phase};
