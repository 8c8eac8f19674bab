//! Core domain types for the Harbinger host monitor.
//!
//! A run walks the configured [`PortProfile`]s, turns each into a
//! [`ScanOutcome`], and hands the resulting [`PortOutcome`]s to report
//! generation. [`PresenceRecord`] is the only type that outlives a run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HarbingerError;

/// Placeholder substituted with the port number in scan templates.
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Placeholder substituted with the detected host in enrichment templates.
pub const HOST_PLACEHOLDER: &str = "{host}";

// ── Port Profiles ─────────────────────────────────────────────────

/// How a port is scanned. Chosen once per profile at load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "template", rename_all = "snake_case")]
pub enum ScanMethod {
    /// Arbitrary shell command; any dotted-quad in its output counts as a host.
    Command(String),
    /// Discovery-tool invocation; only "scan report for" lines are parsed.
    Nmap(String),
}

impl ScanMethod {
    /// The unrendered template as written in configuration.
    pub fn template(&self) -> &str {
        match self {
            Self::Command(t) | Self::Nmap(t) => t,
        }
    }

    /// Substitute `{port}` into the template.
    pub fn render(&self, port: u16) -> String {
        self.template().replace(PORT_PLACEHOLDER, &port.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Nmap(_) => "nmap",
        }
    }
}

/// A configured unit of monitoring: one port, one scan method, one
/// reporting destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortProfile {
    pub port: u16,
    /// `None` is a configuration defect that surfaces as a scan failure.
    pub scan_method: Option<ScanMethod>,
    pub label: Option<String>,
    /// Cosmetic annotation shown in report headers.
    pub port_label: Option<String>,
    /// Destination address; `None` means file-only reporting.
    pub email: Option<String>,
    /// Enrichment template with `{host}` / `{port}` placeholders.
    pub post_command: Option<String>,
}

impl PortProfile {
    /// Build a profile with only a port and scan method set.
    pub fn new(port: u16, scan_method: Option<ScanMethod>) -> Self {
        Self {
            port,
            scan_method,
            label: None,
            port_label: None,
            email: None,
            post_command: None,
        }
    }

    /// Check a raw port number from configuration and narrow it.
    pub fn check_port(raw: i64) -> Result<u16, HarbingerError> {
        match u16::try_from(raw) {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(HarbingerError::InvalidProfile {
                port: raw.clamp(0, u32::MAX as i64) as u32,
                reason: "port must be between 1 and 65535".to_string(),
            }),
        }
    }

    /// The report grouping label, defaulting to `Port_<port>`.
    pub fn group_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("Port_{}", self.port),
        }
    }

    /// Report header line for this port, e.g. `Port 6379 (Redis):`.
    pub fn header(&self) -> String {
        match &self.port_label {
            Some(annotation) => format!("Port {} ({annotation}):", self.port),
            None => format!("Port {}:", self.port),
        }
    }
}

// ── Presence ──────────────────────────────────────────────────────

/// The durable fact "this IP was seen exposing this port".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceRecord {
    pub port: u16,
    pub ip_address: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

// ── Scan Outcomes ─────────────────────────────────────────────────

/// A newly discovered host and, when configured, its enrichment output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectedHost {
    pub ip: String,
    pub enrichment: Option<String>,
}

impl DetectedHost {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            enrichment: None,
        }
    }
}

/// Result of processing one port profile in one run.
///
/// A failed scan never carries hosts: host deltas are only computed
/// for scans that completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed { new_hosts: Vec<DetectedHost> },
    Failed { error: String },
}

impl ScanOutcome {
    pub fn completed(new_hosts: Vec<DetectedHost>) -> Self {
        Self::Completed { new_hosts }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn new_hosts(&self) -> &[DetectedHost] {
        match self {
            Self::Completed { new_hosts } => new_hosts,
            Self::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { new_hosts } => write!(f, "{} new host(s)", new_hosts.len()),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// A port profile paired with the outcome of its scan in the current run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortOutcome {
    pub profile: PortProfile,
    pub outcome: ScanOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_every_port_placeholder() {
        let method = ScanMethod::Nmap("nmap -p {port} 10.0.0.0/24 --open # {port}".to_string());
        assert_eq!(method.render(443), "nmap -p 443 10.0.0.0/24 --open # 443");
        assert_eq!(method.kind(), "nmap");
    }

    #[test]
    fn render_without_placeholder_is_unchanged() {
        let method = ScanMethod::Command("cat hosts.txt".to_string());
        assert_eq!(method.render(22), "cat hosts.txt");
    }

    #[test]
    fn group_label_defaults_to_port() {
        let mut profile = PortProfile::new(6379, None);
        assert_eq!(profile.group_label(), "Port_6379");

        profile.label = Some("Databases".to_string());
        assert_eq!(profile.group_label(), "Databases");
    }

    #[test]
    fn header_includes_port_label() {
        let mut profile = PortProfile::new(9200, None);
        assert_eq!(profile.header(), "Port 9200:");

        profile.port_label = Some("Elasticsearch".to_string());
        assert_eq!(profile.header(), "Port 9200 (Elasticsearch):");
    }

    #[test]
    fn check_port_rejects_out_of_range() {
        assert_eq!(PortProfile::check_port(80).unwrap(), 80);
        assert!(PortProfile::check_port(0).is_err());
        assert!(PortProfile::check_port(70_000).is_err());
        assert!(PortProfile::check_port(-1).is_err());
    }

    #[test]
    fn failed_outcome_has_no_hosts() {
        let outcome = ScanOutcome::failed("exit 2");
        assert!(outcome.is_failure());
        assert!(outcome.new_hosts().is_empty());
        assert_eq!(outcome.error(), Some("exit 2"));
    }

    #[test]
    fn outcome_display_summarizes() {
        let completed = ScanOutcome::completed(vec![
            DetectedHost::new("10.0.0.1"),
            DetectedHost::new("10.0.0.2"),
        ]);
        assert_eq!(completed.to_string(), "2 new host(s)");
        assert_eq!(ScanOutcome::failed("exit 2").to_string(), "failed: exit 2");
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = ScanOutcome::completed(vec![DetectedHost::new("10.0.0.5")]);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["new_hosts"][0]["ip"], "10.0.0.5");
    }
}
