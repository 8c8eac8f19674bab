//! Per-port scan coordination and change detection.
//!
//! For each port profile, in declaration order:
//! scan → diff against the presence store → enrich new hosts.
//! Ports are independent: a failure on one is recorded as that port's
//! outcome and the pass moves on. Failed scans never touch presence state.

use std::sync::Arc;
use std::time::Duration;

use harbinger_core::{DetectedHost, PortOutcome, PortProfile, ScanOutcome};
use harbinger_store::PresenceStore;

use crate::config::MonitorConfig;
use crate::enrich::Enricher;
use crate::error::ScanError;
use crate::scanner::ScanExecutor;

/// Runs one pass over the port profiles against a shared presence store.
pub struct Coordinator {
    store: Arc<PresenceStore>,
    scanner: ScanExecutor,
    enricher: Enricher,
}

impl Coordinator {
    pub fn new(config: &MonitorConfig, store: Arc<PresenceStore>) -> Self {
        Self::with_parts(
            store,
            ScanExecutor::new(Duration::from_secs(config.scan.timeout_secs)),
            Enricher::new(Duration::from_secs(config.scan.post_command_timeout_secs)),
        )
    }

    pub fn with_parts(store: Arc<PresenceStore>, scanner: ScanExecutor, enricher: Enricher) -> Self {
        Self {
            store,
            scanner,
            enricher,
        }
    }

    pub fn scanner(&self) -> &ScanExecutor {
        &self.scanner
    }

    /// Process every profile once, sequentially.
    pub async fn run(&self, profiles: &[PortProfile]) -> Vec<PortOutcome> {
        let mut outcomes = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let outcome = self.scan_port(profile).await;
            tracing::info!(port = profile.port, outcome = %outcome, "Port processed");
            outcomes.push(PortOutcome {
                profile: profile.clone(),
                outcome,
            });
        }
        outcomes
    }

    /// Scan one port and compute its new-host delta.
    pub async fn scan_port(&self, profile: &PortProfile) -> ScanOutcome {
        let port = profile.port;

        let Some(method) = &profile.scan_method else {
            tracing::warn!(port, "No scan method defined for port");
            return ScanOutcome::failed(ScanError::NoScanMethod.to_string());
        };

        let hosts = match self.scanner.execute(method, port).await {
            Ok(hosts) => hosts,
            Err(e) => {
                tracing::error!(port, error = %e, "Scan failed for port");
                return ScanOutcome::failed(e.to_string());
            }
        };

        let new_ips = match self.store.upsert(port, &hosts) {
            Ok(new_ips) => new_ips,
            Err(e) => {
                tracing::error!(port, error = %e, "Presence update failed for port");
                return ScanOutcome::failed(format!("Presence store error: {e}"));
            }
        };

        tracing::info!(
            port,
            observed = hosts.len(),
            new = new_ips.len(),
            "Port diffed against presence state"
        );

        let mut new_hosts = Vec::with_capacity(new_ips.len());
        for ip in new_ips {
            let mut host = DetectedHost::new(ip);
            if let Some(template) = &profile.post_command {
                host.enrichment = Some(self.enricher.invoke(template, &host.ip, port).await);
            }
            new_hosts.push(host);
        }

        ScanOutcome::completed(new_hosts)
    }
}
