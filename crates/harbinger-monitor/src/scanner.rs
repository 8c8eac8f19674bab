//! Discovery command executor.
//!
//! Renders a port's [`ScanMethod`] into a shell command, runs it under the
//! scan timeout, and parses the output into IPv4 addresses.
//!
//! A timeout is deliberately reported as an empty host set rather than an
//! error, so a slow scan does not turn into a failure report. This makes a
//! hung command indistinguishable from "nothing found"; the warning log is
//! the only trace of it.

use std::time::Duration;

use harbinger_core::ScanMethod;

use crate::error::ScanError;
use crate::parse;
use crate::shell::{run_shell, ShellOutcome};

/// Default limit for one discovery command.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs discovery commands for port profiles.
#[derive(Debug, Clone)]
pub struct ScanExecutor {
    timeout: Duration,
}

impl Default for ScanExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_TIMEOUT)
    }
}

impl ScanExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Check whether the discovery tool is installed.
    ///
    /// Returns its version banner, or `None` when it cannot be run; shell
    /// command profiles still work without it.
    pub async fn verify_nmap(&self) -> Option<String> {
        match run_shell("nmap --version", Duration::from_secs(10), None).await {
            Ok(ShellOutcome::Finished(output)) if output.success() => output
                .stdout
                .lines()
                .next()
                .map(|line| line.trim().to_string()),
            _ => None,
        }
    }

    /// Run the scan for `port` and return the discovered addresses.
    ///
    /// Non-zero exit is a hard failure and the output is not parsed.
    pub async fn execute(&self, method: &ScanMethod, port: u16) -> Result<Vec<String>, ScanError> {
        let command = method.render(port);

        tracing::info!(port, method = method.kind(), command = %command, "Starting scan");

        let outcome = run_shell(&command, self.timeout, None)
            .await
            .map_err(|source| ScanError::Spawn {
                command: command.clone(),
                source,
            })?;

        let output = match outcome {
            ShellOutcome::Finished(output) => output,
            ShellOutcome::TimedOut => {
                tracing::warn!(
                    port,
                    command = %command,
                    timeout_secs = self.timeout.as_secs(),
                    "Scan timed out, treating as no hosts found"
                );
                return Ok(Vec::new());
            }
        };

        if !output.success() {
            return Err(ScanError::Failed {
                code: output.code.unwrap_or(-1),
                command,
                stderr: output.stderr,
            });
        }

        let hosts = match method {
            ScanMethod::Command(_) => parse::extract_addresses(&output.stdout),
            ScanMethod::Nmap(_) => parse::extract_nmap_hosts(&output.stdout),
        };

        tracing::info!(
            port,
            hosts = hosts.len(),
            duration_ms = output.duration.as_millis() as u64,
            "Scan complete"
        );

        Ok(hosts)
    }
}
