//! Report delivery: email and on-disk report files.
//!
//! Every sink failure is logged and swallowed by [`Dispatcher::dispatch`];
//! one group's broken mailbox must not stop the next group's report.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::{EmailConfig, MonitorConfig, ReportsConfig};
use crate::error::{MonitorError, Result};
use crate::report::{Report, ReportGroup};
use crate::shell::{run_shell, shell_quote, ShellOutcome};

const MAIL_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a report ended up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub emailed: bool,
    pub file: Option<PathBuf>,
}

/// Delivers composed reports to a group's mailbox and the reports directory.
pub struct Dispatcher {
    email: EmailConfig,
    reports: ReportsConfig,
}

impl Dispatcher {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            email: config.email.clone(),
            reports: config.reports.clone(),
        }
    }

    /// Deliver `report` to every configured sink for `group`.
    pub async fn dispatch(&self, group: &ReportGroup, report: &Report) -> Delivery {
        let mut delivery = Delivery::default();

        if let Some(to) = &group.email {
            match self.send_email(to, report).await {
                Ok(()) => delivery.emailed = true,
                Err(e) => tracing::error!(to = %to, error = %e, "Failed to send email"),
            }
        }

        match self.save_report(report) {
            Ok(path) => delivery.file = path,
            Err(e) => {
                tracing::error!(label = %report.label, error = %e, "Failed to save report to file")
            }
        }

        let destination = if delivery.emailed {
            group.email.as_deref().unwrap_or_default()
        } else {
            "report only"
        };
        tracing::info!(
            label = %report.label,
            destination,
            new_hosts = report.new_hosts,
            scan_failures = report.errors,
            "Report generated"
        );

        delivery
    }

    /// Send the report to one address with the configured transport.
    pub async fn send_email(&self, to: &str, report: &Report) -> Result<()> {
        if self.email.use_local_mail {
            self.send_local_mail(to, report).await
        } else {
            self.send_smtp(to, report).await
        }
    }

    /// Write the report file, if file reports are enabled.
    pub fn save_report(&self, report: &Report) -> Result<Option<PathBuf>> {
        if !self.reports.save_to_file {
            return Ok(None);
        }

        fs::create_dir_all(&self.reports.directory)?;
        let path = self.reports.directory.join(report.file_name());
        fs::write(&path, report.file_contents(Local::now()))?;

        tracing::info!(path = %path.display(), "Report saved to file");
        Ok(Some(path))
    }

    async fn send_local_mail(&self, to: &str, report: &Report) -> Result<()> {
        let command = format!(
            "{} -s {} {}",
            self.email.mail_command,
            shell_quote(&report.subject),
            shell_quote(to)
        );

        match run_shell(&command, MAIL_COMMAND_TIMEOUT, Some(&report.body)).await? {
            ShellOutcome::Finished(output) if output.success() => {
                tracing::info!(to, mail_command = %self.email.mail_command, "Sent local mail");
                Ok(())
            }
            ShellOutcome::Finished(output) => Err(MonitorError::Mail(format!(
                "'{}' exited with {:?}: {}",
                self.email.mail_command,
                output.code,
                output.stderr.trim()
            ))),
            ShellOutcome::TimedOut => Err(MonitorError::Mail(format!(
                "'{}' timed out",
                self.email.mail_command
            ))),
        }
    }

    async fn send_smtp(&self, to: &str, report: &Report) -> Result<()> {
        let message = self.build_message(to, report)?;
        let server = self
            .email
            .smtp_server
            .as_deref()
            .ok_or_else(|| MonitorError::Mail("email.smtp_server is not set".to_string()))?;

        let mut builder = if self.email.use_tls {
            SmtpTransport::starttls_relay(server).map_err(|e| MonitorError::Mail(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(server)
        };
        builder = builder.port(self.email.smtp_port);
        if let (Some(user), Some(pass)) = (&self.email.username, &self.email.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        let transport = builder.build();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MonitorError::Mail(e.to_string()))?
            .map_err(|e| MonitorError::Mail(e.to_string()))?;

        tracing::info!(to, server, "Sent SMTP mail");
        Ok(())
    }

    fn build_message(&self, to: &str, report: &Report) -> Result<Message> {
        let from = self
            .email
            .from_address
            .as_deref()
            .ok_or_else(|| MonitorError::Mail("email.from_address is not set".to_string()))?;

        Message::builder()
            .from(parse_mailbox(from)?)
            .to(parse_mailbox(to)?)
            .subject(report.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(report.body.clone())
            .map_err(|e| MonitorError::Mail(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| MonitorError::Mail(format!("invalid address {address}: {e}")))
}
