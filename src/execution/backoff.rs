use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Normal poll cadence and first retry delay
    pub base: Duration,
    /// Hard cap on the retry delay
    pub cap: Duration,
    /// Emit a diagnostic every `log_every` consecutive failures
    pub log_every: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(900),
            log_every: 5,
        }
    }
}

/// Exponential backoff with a cap and rate-limited failure diagnostics.
///
/// The K-th consecutive failure yields `min(base * 2^(K-1), cap)`. Any
/// success resets to `base`. There is no terminal state.
#[derive(Debug, Clone)]
pub struct BackoffController {
    config: BackoffConfig,
    current_interval: Duration,
    consecutive_failures: u32,
    total_failures: u64,
    diagnostics_emitted: u64,
    last_error: Option<String>,
}

impl BackoffController {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            current_interval: config.base,
            consecutive_failures: 0,
            total_failures: 0,
            diagnostics_emitted: 0,
            last_error: None,
        }
    }

    /// Record the outcome of an attempt and return how long to wait before
    /// the next one. `error` is the failure detail and is ignored on success.
    pub fn next_interval(&mut self, success: bool, error: Option<&str>) -> Duration {
        if success {
            self.on_success()
        } else {
            self.on_failure(error.unwrap_or("unknown error"))
        }
    }

    pub fn on_success(&mut self) -> Duration {
        if self.consecutive_failures > 0 {
            tracing::info!(
                failures = self.consecutive_failures,
                "Recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }

        self.consecutive_failures = 0;
        self.current_interval = self.config.base;
        self.last_error = None;
        self.current_interval
    }

    pub fn on_failure(&mut self, error: &str) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_failures += 1;
        self.current_interval = self.interval_for(self.consecutive_failures);
        self.last_error = Some(error.to_string());

        tracing::debug!(
            failures = self.consecutive_failures,
            interval_secs = self.current_interval.as_secs_f64(),
            error = %error,
            "Fetch failed"
        );

        if self.diagnostic_due() {
            self.diagnostics_emitted += 1;
            tracing::error!(
                failures = self.consecutive_failures,
                total_failures = self.total_failures,
                interval_secs = self.current_interval.as_secs_f64(),
                "{} consecutive failures, retrying in {:?}: {}",
                self.consecutive_failures,
                self.current_interval,
                error
            );
        }

        self.current_interval
    }

    fn diagnostic_due(&self) -> bool {
        self.config.log_every > 0
            && self.consecutive_failures > 0
            && self.consecutive_failures % self.config.log_every == 0
    }

    fn interval_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.config.base;
        }

        // 2^31 already exceeds any sensible cap
        let exponent = (failures - 1).min(31);
        self.config
            .base
            .checked_mul(1u32 << exponent)
            .map_or(self.config.cap, |d| d.min(self.config.cap))
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    /// Number of rate-limited diagnostics logged so far
    pub fn diagnostics_emitted(&self) -> u64 {
        self.diagnostics_emitted
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_backing_off(&self) -> bool {
        self.consecutive_failures > 0
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

impl Default for BackoffController {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
