//! Daily scheduler — one immediate run, then one run per cron tick.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local};
use cron::Schedule;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::pipeline::orchestrator::Pipeline;

/// Default tick: every day at 08:00 local time.
pub const DEFAULT_SCHEDULE: &str = "0 0 8 * * *";

/// Parse a 6/7-field cron expression (seconds first).
pub fn parse_schedule(expr: &str) -> Result<Schedule, ConfigError> {
    Schedule::from_str(expr).map_err(|e| ConfigError::InvalidValue {
        key: "MAIL_DIGEST_SCHEDULE".to_string(),
        message: format!("invalid cron '{expr}': {e}"),
    })
}

/// Drives a `Pipeline` on a cron schedule in local time.
pub struct DigestScheduler {
    schedule: Schedule,
}

impl DigestScheduler {
    pub fn new(schedule: Schedule) -> Self {
        Self { schedule }
    }

    /// First tick strictly after `after`.
    pub fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(&after).next()
    }

    /// Run immediately, then at each tick until `shutdown` resolves.
    ///
    /// Runs are sequential: the next tick is computed only after the previous
    /// run returns, so runs never overlap. A shutdown signal received during a
    /// run takes effect once that run finishes. Returns the number of runs.
    pub async fn run<F>(&self, pipeline: &mut Pipeline, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!("Running initial digest");
        pipeline.run().await;
        let mut runs = 1;

        loop {
            let now = Local::now();
            let Some(next) = self.next_after(now) else {
                warn!("Schedule has no upcoming ticks, stopping");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next = %next.format("%Y-%m-%d %H:%M:%S"), "Next digest scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    pipeline.run().await;
                    runs += 1;
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
            }
        }

        runs
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).earliest().unwrap()
    }

    #[test]
    fn default_schedule_parses() {
        assert!(parse_schedule(DEFAULT_SCHEDULE).is_ok());
    }

    #[test]
    fn invalid_schedule_is_config_error() {
        let err = parse_schedule("every morning").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MAIL_DIGEST_SCHEDULE"));
    }

    #[test]
    fn next_tick_same_day_before_eight() {
        let scheduler = DigestScheduler::new(parse_schedule(DEFAULT_SCHEDULE).unwrap());
        let next = scheduler.next_after(local(2026, 6, 10, 6, 30)).unwrap();
        assert_eq!(next.date_naive(), local(2026, 6, 10, 0, 0).date_naive());
        assert_eq!((next.hour(), next.minute()), (8, 0));
    }

    #[test]
    fn next_tick_rolls_to_tomorrow_after_eight() {
        let scheduler = DigestScheduler::new(parse_schedule(DEFAULT_SCHEDULE).unwrap());
        let next = scheduler.next_after(local(2026, 6, 10, 9, 0)).unwrap();
        assert_eq!(next.date_naive(), local(2026, 6, 11, 0, 0).date_naive());
        assert_eq!(next.hour(), 8);
    }
}
