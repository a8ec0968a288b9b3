use super::backoff::{BackoffConfig, BackoffController};
use super::price_window::{DuplicatePolicy, PriceWindow, PushOutcome};
use super::report::{ConsoleSink, Tick, TickSink};
use super::shutdown::ShutdownSignal;
use crate::api::PriceSource;
use crate::error::FetchError;
use crate::models::PriceObservation;
use std::time::Duration;

/// Monitor settings
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// CoinGecko coin id, e.g. "bitcoin"
    pub coin: String,
    pub window_size: usize,
    pub duplicates: DuplicatePolicy,
    pub backoff: BackoffConfig,
}

impl MonitorConfig {
    pub fn new(coin: impl Into<String>, window_size: usize) -> Self {
        Self {
            coin: coin.into(),
            window_size,
            duplicates: DuplicatePolicy::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Normal poll cadence
    Running,
    /// Last attempt failed; waiting an escalating interval
    BackingOff,
    /// Terminal. No further fetches or sleeps.
    ShuttingDown,
}

/// Counters reported when the monitor stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub cycles: u64,
    pub successes: u64,
    pub failures: u64,
    pub skipped_duplicates: u64,
}

/// Polls one coin, keeps its SMA window and paces requests with backoff.
///
/// Single task, sequential: fetch, update, sleep, repeat until the
/// shutdown signal is observed.
pub struct PriceMonitor<S, K = ConsoleSink> {
    source: S,
    sink: K,
    coin: String,
    symbol: String,
    window: PriceWindow,
    backoff: BackoffController,
    state: MonitorState,
    summary: MonitorSummary,
}

impl<S: PriceSource, K: TickSink> PriceMonitor<S, K> {
    pub fn new(source: S, sink: K, config: MonitorConfig) -> Self {
        Self {
            source,
            sink,
            symbol: config.coin.to_uppercase(),
            coin: config.coin,
            window: PriceWindow::new(config.window_size, config.duplicates),
            backoff: BackoffController::new(config.backoff),
            state: MonitorState::Running,
            summary: MonitorSummary::default(),
        }
    }

    /// Look up the display symbol, retrying transient failures with the
    /// same backoff as the price loop.
    ///
    /// Returns `Ok(None)` if shutdown was requested before a symbol was
    /// obtained, and `Err` only for fatal errors (unknown coin).
    pub async fn resolve_symbol(
        &mut self,
        shutdown: &ShutdownSignal,
    ) -> Result<Option<String>, FetchError> {
        loop {
            if shutdown.is_triggered() {
                self.state = MonitorState::ShuttingDown;
                return Ok(None);
            }

            match self.source.fetch_symbol(&self.coin).await {
                Ok(symbol) => {
                    self.backoff.on_success();
                    self.state = MonitorState::Running;
                    tracing::info!(coin = %self.coin, symbol = %symbol, "Resolved coin symbol");
                    self.symbol = symbol.clone();
                    return Ok(Some(symbol));
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(coin = %self.coin, "Symbol lookup failed: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    let interval = self.backoff.on_failure(&e.to_string());
                    self.state = MonitorState::BackingOff;
                    if !shutdown.sleep(interval).await {
                        self.state = MonitorState::ShuttingDown;
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// One fetch attempt. Updates window, backoff and state, and returns
    /// how long to wait before the next attempt.
    pub async fn poll_once(&mut self) -> Duration {
        self.summary.cycles += 1;

        match self.source.fetch_price(&self.coin).await {
            Ok(quote) => {
                self.summary.successes += 1;
                let observation = PriceObservation::new(self.coin.clone(), quote);

                let sample_added = match self.window.push(observation.clone()) {
                    PushOutcome::SkippedDuplicate => {
                        self.summary.skipped_duplicates += 1;
                        tracing::debug!(
                            timestamp = %observation.timestamp,
                            "Duplicate upstream timestamp, sample skipped"
                        );
                        false
                    }
                    PushOutcome::Added | PushOutcome::Evicted(_) => true,
                };

                let tick = Tick {
                    symbol: self.symbol.clone(),
                    vs_currency: self.source.vs_currency().to_string(),
                    observation,
                    sma: self.window.current_average(),
                    window_len: self.window.len(),
                    window_capacity: self.window.capacity(),
                    sample_added,
                };
                self.sink.on_tick(&tick);

                self.state = MonitorState::Running;
                self.backoff.on_success()
            }
            Err(e) => {
                self.summary.failures += 1;
                tracing::debug!(coin = %self.coin, kind = ?e.kind(), "Price fetch failed: {}", e);

                self.state = MonitorState::BackingOff;
                self.backoff.on_failure(&e.to_string())
            }
        }
    }

    /// Run until `shutdown` is triggered.
    ///
    /// A fetch already in flight is allowed to finish; sleeps are cut short.
    pub async fn run(&mut self, shutdown: &ShutdownSignal) -> MonitorSummary {
        tracing::info!(
            coin = %self.coin,
            window = self.window.capacity(),
            duplicates = ?self.window.duplicate_policy(),
            "Price monitor starting"
        );

        while self.state != MonitorState::ShuttingDown {
            if shutdown.is_triggered() {
                break;
            }

            let interval = self.poll_once().await;

            if shutdown.is_triggered() || !shutdown.sleep(interval).await {
                break;
            }
        }

        self.state = MonitorState::ShuttingDown;
        tracing::info!(
            cycles = self.summary.cycles,
            successes = self.summary.successes,
            failures = self.summary.failures,
            skipped_duplicates = self.summary.skipped_duplicates,
            "Price monitor stopped"
        );

        self.summary.clone()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn backoff(&self) -> &BackoffController {
        &self.backoff
    }

    pub fn summary(&self) -> &MonitorSummary {
        &self.summary
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}
