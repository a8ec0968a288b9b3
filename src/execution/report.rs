use super::price_window::SmaValue;
use crate::models::PriceObservation;

/// Everything the monitor knows after one successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub vs_currency: String,
    pub observation: PriceObservation,
    pub sma: SmaValue,
    pub window_len: usize,
    pub window_capacity: usize,
    /// False when the sample was dropped as a duplicate timestamp
    pub sample_added: bool,
}

/// Receives per-cycle output from the price monitor
pub trait TickSink: Send {
    fn on_tick(&mut self, tick: &Tick);
}

/// Prints each tick to stdout and mirrors it into the log
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl TickSink for ConsoleSink {
    fn on_tick(&mut self, tick: &Tick) {
        println!("{}", format_tick(tick));

        tracing::info!(
            coin = %tick.observation.coin,
            symbol = %tick.symbol,
            price = tick.observation.price,
            sma = ?tick.sma.value(),
            window = tick.window_len,
            source_time = %tick.observation.timestamp,
            "Price update"
        );
    }
}

/// Collects ticks in memory
impl TickSink for Vec<Tick> {
    fn on_tick(&mut self, tick: &Tick) {
        self.push(tick.clone());
    }
}

/// `[2023-11-14T22:13:20] BTC → USD: $43,210.55 | SMA(10): $43,100.00`
pub fn format_tick(tick: &Tick) -> String {
    let sma = match tick.sma {
        SmaValue::Ready(avg) => format!("SMA({}): ${}", tick.window_capacity, format_usd(avg)),
        SmaValue::Insufficient { have, need } => {
            format!("SMA({}): insufficient data ({}/{})", need, have, need)
        }
    };
    let duplicate = if tick.sample_added {
        ""
    } else {
        " (duplicate timestamp, not sampled)"
    };

    format!(
        "[{}] {} → {}: ${} | {}{}",
        tick.observation.timestamp.format("%Y-%m-%dT%H:%M:%S"),
        tick.symbol,
        tick.vs_currency.to_uppercase(),
        format_usd(tick.observation.price),
        sma,
        duplicate
    )
}

/// Two decimals with thousands separators: 1234567.891 -> "1,234,567.89"
pub fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}
