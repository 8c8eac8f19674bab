//! harbinger-store: durable per-port host presence.
//!
//! This crate is the single mutation point for presence state. Every
//! configured port owns one SQLite table of `(ip_address, first_seen,
//! last_seen)` rows; rows are only ever inserted or touched, never expired.

pub mod client;
pub mod mutations;
pub mod queries;

pub use client::{PresenceStore, StoreError};
