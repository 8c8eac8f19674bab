//! Report grouping and composition.
//!
//! Port outcomes are merged by `(label, email)` into [`ReportGroup`]s,
//! then each group becomes one plain-text [`Report`] with a subject line
//! chosen from its host and failure counts.

use std::fmt::Write as _;

use chrono::{DateTime, Local};

use harbinger_core::PortOutcome;

/// All port outcomes that share a label and destination.
#[derive(Debug, Clone)]
pub struct ReportGroup {
    pub label: String,
    pub email: Option<String>,
    /// In port-profile declaration order.
    pub ports: Vec<PortOutcome>,
}

impl ReportGroup {
    pub fn total_new_hosts(&self) -> usize {
        self.ports
            .iter()
            .map(|p| p.outcome.new_hosts().len())
            .sum()
    }

    pub fn total_errors(&self) -> usize {
        self.ports.iter().filter(|p| p.outcome.is_failure()).count()
    }
}

/// Merge outcomes into groups keyed by `(label or Port_<port>, email)`.
///
/// Groups appear in the order their first member was declared.
pub fn group_outcomes(outcomes: Vec<PortOutcome>) -> Vec<ReportGroup> {
    let mut groups: Vec<ReportGroup> = Vec::new();

    for outcome in outcomes {
        let label = outcome.profile.group_label();
        let email = outcome.profile.email.clone();

        match groups
            .iter_mut()
            .find(|g| g.label == label && g.email == email)
        {
            Some(group) => group.ports.push(outcome),
            None => groups.push(ReportGroup {
                label,
                email,
                ports: vec![outcome],
            }),
        }
    }

    groups
}

/// Subject status for the given counts; exactly one form applies.
pub fn subject_status(new_hosts: usize, errors: usize) -> String {
    match (new_hosts, errors) {
        (0, 0) => "No new hosts detected".to_string(),
        (0, _) => "Scan failures detected".to_string(),
        (n, m) if m > 0 => format!("{n} new hosts detected, {m} scan failures"),
        (1, _) => "1 new host detected".to_string(),
        (n, _) => format!("{n} new hosts detected"),
    }
}

/// A composed report ready for delivery.
#[derive(Debug, Clone)]
pub struct Report {
    pub label: String,
    pub subject: String,
    pub body: String,
    pub new_hosts: usize,
    pub errors: usize,
    pub generated_at: DateTime<Local>,
}

impl Report {
    pub fn compose(group: &ReportGroup, generated_at: DateTime<Local>) -> Self {
        let new_hosts = group.total_new_hosts();
        let errors = group.total_errors();
        let subject = format!(
            "Harbinger Report for {}: {}",
            group.label,
            subject_status(new_hosts, errors)
        );

        let mut details = String::new();
        for port in &group.ports {
            let _ = writeln!(details, "\n{}", port.profile.header());

            if let Some(error) = port.outcome.error() {
                let _ = writeln!(details, "[SCAN FAILED: {error}]");
                continue;
            }

            let hosts = port.outcome.new_hosts();
            if hosts.is_empty() {
                details.push_str("No new hosts detected.\n");
                continue;
            }

            for host in hosts {
                let _ = writeln!(details, "{}", host.ip);
                if let Some(enrichment) = &host.enrichment {
                    if !enrichment.is_empty() {
                        let _ = writeln!(details, "{enrichment}");
                    }
                    details.push('\n');
                }
            }
        }

        let body = format!(
            "Harbinger Network Monitoring Report\n\
             Generated: {}\n\
             \n\
             New hosts detected: {new_hosts}\n\
             Scan failures: {errors}\n\
             \n\
             Details:\n\
             {details}\n\
             \n\
             This report was generated by Harbinger monitoring tool.\n",
            generated_at.format("%Y-%m-%d %H:%M:%S"),
        );

        Self {
            label: group.label.clone(),
            subject,
            body,
            new_hosts,
            errors,
            generated_at,
        }
    }

    /// File name for this report: sanitized label plus run timestamp.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.txt",
            self.label.replace(' ', "_"),
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Content written to the report file.
    pub fn file_contents(&self, saved_at: DateTime<Local>) -> String {
        format!(
            "HARBINGER NETWORK MONITORING REPORT\n\
             =====================================\n\
             Generated: {}\n\
             Label: {}\n\
             Subject: {}\n\
             \n\
             {}\n\
             \n\
             Report saved: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S"),
            self.label,
            self.subject,
            self.body,
            saved_at.to_rfc3339(),
        )
    }
}
