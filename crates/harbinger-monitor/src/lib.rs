//! harbinger-monitor: watches configured ports for hosts that were not there before.
//!
//! Each pass runs the configured discovery command per port, diffs the
//! discovered addresses against the presence store, enriches new hosts,
//! and delivers one report per (label, email) group.

pub mod config;
pub mod coordinator;
pub mod enrich;
pub mod error;
pub mod notify;
pub mod parse;
pub mod report;
pub mod scanner;
pub mod scheduler;
pub mod shell;
