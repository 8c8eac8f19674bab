//! Configuration for the harbinger monitor.
//!
//! Loaded once at startup from a YAML (or TOML/JSON) file plus
//! `HARBINGER__` environment variables, then passed by reference to every
//! component. The raw `ports` list is converted into typed
//! [`PortProfile`]s here so the rest of the crate never sees raw entries.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::Deserialize;

use harbinger_core::{HarbingerError, PortProfile, ScanMethod};

use crate::error::Result;

/// Fully loaded monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Path of the presence database.
    pub database: PathBuf,
    pub logging: LoggingConfig,
    pub scan: ScanConfig,
    pub email: EmailConfig,
    pub reports: ReportsConfig,
    pub standalone: StandaloneConfig,
    /// Port profiles in declaration order.
    pub ports: Vec<PortProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional file that receives a copy of every log line.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Hard limit for one discovery command.
    #[serde(default = "default_scan_timeout")]
    pub timeout_secs: u64,

    /// Hard limit for one enrichment command.
    #[serde(default = "default_post_command_timeout")]
    pub post_command_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Deliver through a local mail command instead of SMTP.
    #[serde(default)]
    pub use_local_mail: bool,

    #[serde(default = "default_mail_command")]
    pub mail_command: String,

    #[serde(default)]
    pub smtp_server: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_true")]
    pub use_tls: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    #[serde(default)]
    pub save_to_file: bool,

    #[serde(default = "default_reports_dir")]
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandaloneConfig {
    /// Daily trigger, `HH:MM` in local time.
    #[serde(default = "default_report_time")]
    pub report_time: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl StandaloneConfig {
    pub fn parsed_report_time(&self) -> std::result::Result<NaiveTime, HarbingerError> {
        parse_report_time(&self.report_time)
    }
}

/// One entry of the `ports` list as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct PortEntry {
    pub port: i64,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub nmap_scan: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub port_label: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub post_command: Option<String>,
}

impl PortEntry {
    /// Convert into a typed profile.
    ///
    /// The discovery-tool form wins when both forms are present. A missing
    /// method is kept as `None` so the scan reports it as a failure.
    pub fn into_profile(self) -> std::result::Result<PortProfile, HarbingerError> {
        let port = PortProfile::check_port(self.port)?;

        let scan_method = match (non_empty(self.nmap_scan), non_empty(self.command)) {
            (Some(args), _) => Some(ScanMethod::Nmap(args)),
            (None, Some(cmd)) => Some(ScanMethod::Command(cmd)),
            (None, None) => None,
        };

        Ok(PortProfile {
            port,
            scan_method,
            label: non_empty(self.label),
            port_label: non_empty(self.port_label),
            email: non_empty(self.email),
            post_command: non_empty(self.post_command),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_database")]
    database: PathBuf,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    scan: ScanConfig,
    #[serde(default)]
    email: EmailConfig,
    #[serde(default)]
    reports: ReportsConfig,
    #[serde(default)]
    standalone: StandaloneConfig,
    #[serde(default)]
    ports: Vec<PortEntry>,
}

impl MonitorConfig {
    /// Load and validate configuration from `path` and the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("HARBINGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let raw: RawConfig = cfg.try_deserialize()?;
        raw.validate()
    }

    /// Distinct configured ports, in declaration order.
    pub fn port_numbers(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = Vec::with_capacity(self.ports.len());
        for profile in &self.ports {
            if !ports.contains(&profile.port) {
                ports.push(profile.port);
            }
        }
        ports
    }
}

impl RawConfig {
    fn validate(self) -> Result<MonitorConfig> {
        self.standalone.parsed_report_time()?;

        let ports = self
            .ports
            .into_iter()
            .map(PortEntry::into_profile)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(MonitorConfig {
            database: self.database,
            logging: self.logging,
            scan: self.scan,
            email: self.email,
            reports: self.reports,
            standalone: self.standalone,
            ports,
        })
    }
}

/// Parse a `HH:MM` (or `HH:MM:SS`) time of day.
pub fn parse_report_time(raw: &str) -> std::result::Result<NaiveTime, HarbingerError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| HarbingerError::Config(format!("invalid report_time {raw:?}: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_database() -> PathBuf {
    PathBuf::from("harbinger.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scan_timeout() -> u64 {
    300
}

fn default_post_command_timeout() -> u64 {
    60
}

fn default_mail_command() -> String {
    "mail".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_report_time() -> String {
    "08:00".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scan_timeout(),
            post_command_timeout_secs: default_post_command_timeout(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            use_local_mail: false,
            mail_command: default_mail_command(),
            smtp_server: None,
            smtp_port: default_smtp_port(),
            use_tls: true,
            username: None,
            password: None,
            from_address: None,
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            save_to_file: false,
            directory: default_reports_dir(),
        }
    }
}

impl Default for StandaloneConfig {
    fn default() -> Self {
        Self {
            report_time: default_report_time(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            logging: LoggingConfig::default(),
            scan: ScanConfig::default(),
            email: EmailConfig::default(),
            reports: ReportsConfig::default(),
            standalone: StandaloneConfig::default(),
            ports: Vec::new(),
        }
    }
}
