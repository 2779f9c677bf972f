//! Bounded fixed-delay retries for pipeline steps.

use std::time::Duration;

use tracing::{error, warn};
use wap_model::{Result, ScheduleConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// the retry bound is exhausted.
    pub fn run<T>(&self, step: &'static str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    warn!(
                        step,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "retryable failure, will retry"
                    );
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
                Err(err) => {
                    if err.is_retryable() {
                        error!(step, attempt, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl From<&ScheduleConfig> for RetryPolicy {
    fn from(schedule: &ScheduleConfig) -> Self {
        Self::new(schedule.max_retries, schedule.retry_delay())
    }
}

#[cfg(test)]
mod tests {
    use wap_model::{AuditReport, WapError};

    use super::*;

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let value = RetryPolicy::new(3, Duration::ZERO)
            .run("write", || {
                calls += 1;
                if calls < 3 {
                    Err(WapError::transformation("fct_songplays", "deadlock"))
                } else {
                    Ok(calls)
                }
            })
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn gives_up_after_bound() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let mut calls = 0;
        let err = policy
            .run("publish", || -> Result<()> {
                calls += 1;
                Err(WapError::promotion("dim_users", "merge", "timeout"))
            })
            .unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(err.table(), Some("dim_users"));
    }

    #[test]
    fn quality_violation_is_not_retried() {
        let mut calls = 0;
        let err = RetryPolicy::new(5, Duration::ZERO)
            .run("audit", || -> Result<()> {
                calls += 1;
                Err(WapError::QualityViolation(Box::new(AuditReport::default())))
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, WapError::QualityViolation(_)));
    }
}
