//! Run modes: one batch pass, or a daily trigger loop.
//!
//! Both modes go through [`Monitor::run_pass`]. The continuous loop runs a
//! pass inline, so a pass can never start while another is in flight.

use std::future::Future;
use std::sync::Arc;

use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use harbinger_store::PresenceStore;

use crate::config::MonitorConfig;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::notify::Dispatcher;
use crate::report::{group_outcomes, Report};

/// Counters for one completed pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub ports: usize,
    pub new_hosts: usize,
    pub scan_failures: usize,
    pub reports: usize,
}

/// Ties configuration, coordinator, and report delivery together.
pub struct Monitor {
    config: MonitorConfig,
    coordinator: Coordinator,
    dispatcher: Dispatcher,
}

impl Monitor {
    pub fn new(config: MonitorConfig, store: Arc<PresenceStore>) -> Self {
        let coordinator = Coordinator::new(&config, store);
        let dispatcher = Dispatcher::new(&config);
        Self {
            config,
            coordinator,
            dispatcher,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Scan every configured port once and deliver one report per group.
    pub async fn run_pass(&self) -> PassSummary {
        let run_id = Uuid::new_v4();
        self.pass()
            .instrument(tracing::info_span!("pass", run_id = %run_id))
            .await
    }

    async fn pass(&self) -> PassSummary {
        tracing::info!(ports = self.config.ports.len(), "Scan pass started");

        let outcomes = self.coordinator.run(&self.config.ports).await;
        let groups = group_outcomes(outcomes);

        let mut summary = PassSummary {
            ports: self.config.ports.len(),
            ..Default::default()
        };
        for group in &groups {
            let report = Report::compose(group, Local::now());
            summary.new_hosts += report.new_hosts;
            summary.scan_failures += report.errors;
            self.dispatcher.dispatch(group, &report).await;
            summary.reports += 1;
        }

        tracing::info!(
            new_hosts = summary.new_hosts,
            scan_failures = summary.scan_failures,
            reports = summary.reports,
            "Scan pass complete"
        );
        summary
    }

    /// Batch mode: one pass, then return.
    pub async fn run_batch(&self) -> PassSummary {
        tracing::info!("Running in cron mode");
        let summary = self.run_pass().await;
        tracing::info!("Cron mode scan completed");
        summary
    }

    /// Continuous mode until Ctrl-C.
    pub async fn run_continuous(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for interrupt");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Continuous mode until `shutdown` resolves.
    ///
    /// Shutdown is only observed between polls; an in-flight pass always
    /// runs to completion first.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let at = self.config.standalone.parsed_report_time()?;
        let mut trigger = DailyTrigger::new(at, Local::now().naive_local());
        tracing::info!(
            report_time = %at.format("%H:%M"),
            next_run = %trigger.next_due(),
            "Running in standalone mode, reports scheduled daily"
        );

        let mut ticker = interval(Duration::from_secs(
            self.config.standalone.poll_interval_secs.max(1),
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Standalone mode interrupted by user");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if trigger.is_due(Local::now().naive_local()) {
                        self.run_pass().await;
                        trigger.advance(Local::now().naive_local());
                        tracing::info!(next_run = %trigger.next_due(), "Next scan scheduled");
                    }
                }
            }
        }
    }
}

/// A once-a-day trigger at a fixed local time of day.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    at: NaiveTime,
    next_due: NaiveDateTime,
}

impl DailyTrigger {
    pub fn new(at: NaiveTime, now: NaiveDateTime) -> Self {
        Self {
            at,
            next_due: next_occurrence(at, now),
        }
    }

    pub fn next_due(&self) -> NaiveDateTime {
        self.next_due
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.next_due
    }

    /// Move to the first occurrence strictly after `now`.
    pub fn advance(&mut self, now: NaiveDateTime) {
        self.next_due = next_occurrence(self.at, now);
    }
}

fn next_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDateTime::MAX)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn on(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_trigger_later_today() {
        let trigger = DailyTrigger::new(at(8, 0), on(19, 7, 30));
        assert_eq!(trigger.next_due(), on(19, 8, 0));
        assert!(!trigger.is_due(on(19, 7, 59)));
        assert!(trigger.is_due(on(19, 8, 0)));
        assert!(trigger.is_due(on(19, 8, 1)));
    }

    #[test]
    fn test_trigger_already_passed_rolls_to_tomorrow() {
        let trigger = DailyTrigger::new(at(8, 0), on(19, 9, 0));
        assert_eq!(trigger.next_due(), on(20, 8, 0));

        let exact = DailyTrigger::new(at(8, 0), on(19, 8, 0));
        assert_eq!(exact.next_due(), on(20, 8, 0));
    }

    #[test]
    fn test_advance_after_slow_pass() {
        let mut trigger = DailyTrigger::new(at(8, 0), on(19, 7, 0));
        // Pass fired at 08:00 and ran for 90 minutes.
        trigger.advance(on(19, 9, 30));
        assert_eq!(trigger.next_due(), on(20, 8, 0));
        assert!(!trigger.is_due(on(19, 23, 59)));
    }

    #[test]
    fn test_trigger_crosses_month_end() {
        let trigger = DailyTrigger::new(at(0, 15), on(31, 23, 0));
        assert_eq!(
            trigger.next_due(),
            NaiveDate::from_ymd_opt(2026, 11, 1)
                .unwrap()
                .and_hms_opt(0, 15, 0)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let store = Arc::new(PresenceStore::open_in_memory().unwrap());
        let monitor = Monitor::new(MonitorConfig::default(), store);
        monitor.run_until(async {}).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_until_rejects_bad_report_time() {
        let store = Arc::new(PresenceStore::open_in_memory().unwrap());
        let mut config = MonitorConfig::default();
        config.standalone.report_time = "noon".to_string();
        let monitor = Monitor::new(config, store);
        assert!(monitor.run_until(async {}).await.is_err());
    }
}
