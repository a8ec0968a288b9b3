// Polling loop and the state it owns
pub mod backoff;
pub mod price_feed;
pub mod price_window;
pub mod report;
pub mod shutdown;

pub use backoff::{BackoffConfig, BackoffController};
pub use price_feed::{MonitorConfig, MonitorState, MonitorSummary, PriceMonitor};
pub use price_window::{DuplicatePolicy, PriceWindow, PushOutcome, SmaValue};
pub use report::{format_tick, format_usd, ConsoleSink, Tick, TickSink};
pub use shutdown::ShutdownSignal;
