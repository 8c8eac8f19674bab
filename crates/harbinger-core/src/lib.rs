//! harbinger-core: Shared types and error handling for the Harbinger host monitor.
//!
//! This crate provides the foundational types used across all Harbinger components:
//! - Port profiles and their scan methods, as produced by configuration loading
//! - Presence records, the durable "seen on port P" facts
//! - Per-port scan outcomes that feed report generation
//! - Common error types

pub mod error;
pub mod types;

pub use error::HarbingerError;
pub use types::{
    DetectedHost, PortOutcome, PortProfile, PresenceRecord, ScanMethod, ScanOutcome,
};
