//! Per-host enrichment commands.
//!
//! Runs a port's `post_command` once for each newly discovered host. The
//! output goes verbatim into the report, so every failure mode is turned
//! into a bracketed marker instead of an error.

use std::time::Duration;

use harbinger_core::types::{HOST_PLACEHOLDER, PORT_PLACEHOLDER};

use crate::shell::{run_shell, ShellOutcome};

/// Default limit for one enrichment command.
pub const DEFAULT_ENRICH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Enricher {
    timeout: Duration,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(DEFAULT_ENRICH_TIMEOUT)
    }
}

impl Enricher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `template` against `host` and return what belongs in the report.
    pub async fn invoke(&self, template: &str, host: &str, port: u16) -> String {
        let command = render_post_command(template, host, port);

        match run_shell(&command, self.timeout, None).await {
            Ok(ShellOutcome::Finished(output)) if output.success() => {
                tracing::debug!(host, port, "Post command complete");
                output.stdout.trim().to_string()
            }
            Ok(ShellOutcome::Finished(output)) => {
                tracing::warn!(
                    host,
                    port,
                    code = ?output.code,
                    stderr = %output.stderr.trim(),
                    "Post command failed"
                );
                format!("[Command failed: {}]", output.stderr.trim())
            }
            Ok(ShellOutcome::TimedOut) => {
                tracing::warn!(
                    host,
                    port,
                    timeout_secs = self.timeout.as_secs(),
                    "Post command timed out"
                );
                "[Command timed out]".to_string()
            }
            Err(e) => {
                tracing::error!(host, port, error = %e, "Error executing post command");
                format!("[Command error: {e}]")
            }
        }
    }
}

/// Substitute `{host}` and `{port}` into an enrichment template.
pub fn render_post_command(template: &str, host: &str, port: u16) -> String {
    template
        .replace(HOST_PLACEHOLDER, host)
        .replace(PORT_PLACEHOLDER, &port.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_post_command() {
        assert_eq!(
            render_post_command("probe --target {host}:{port} -v", "10.0.0.9", 27017),
            "probe --target 10.0.0.9:27017 -v"
        );
        assert_eq!(render_post_command("whoami", "10.0.0.9", 1), "whoami");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_output_is_trimmed() {
        let enricher = Enricher::default();
        let out = enricher
            .invoke("printf '\\n  banner for {host}:{port}  \\n\\n'", "10.0.0.3", 21)
            .await;
        assert_eq!(out, "banner for 10.0.0.3:21");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_is_bracketed_marker() {
        let enricher = Enricher::default();
        let out = enricher
            .invoke("echo partial; echo 'connection refused' >&2; exit 1", "10.0.0.3", 21)
            .await;
        assert_eq!(out, "[Command failed: connection refused]");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_marker() {
        let enricher = Enricher::new(Duration::from_millis(200));
        let out = enricher.invoke("sleep 5", "10.0.0.3", 21).await;
        assert_eq!(out, "[Command timed out]");
    }
}
