pub mod coingecko;

pub use coingecko::{CoinGeckoClient, CoinGeckoConfig};

use crate::error::FetchError;
use crate::models::PriceQuote;
use async_trait::async_trait;

/// Upstream collaborator the price monitor polls.
///
/// Implementations perform exactly one request per call; retrying is the
/// caller's job.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price of `coin`
    async fn fetch_price(&self, coin: &str) -> Result<PriceQuote, FetchError>;

    /// Display symbol of `coin` (e.g. "BTC" for "bitcoin")
    async fn fetch_symbol(&self, coin: &str) -> Result<String, FetchError>;

    /// Quote currency the prices are expressed in
    fn vs_currency(&self) -> &str;
}
