use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price reported by a price source for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    /// Upstream "last updated" time. Coarse: several quotes in a row
    /// may carry the same value.
    pub last_updated: DateTime<Utc>,
}

/// One successful fetch, as stored in the rolling window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub coin: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceObservation {
    pub fn new(coin: impl Into<String>, quote: PriceQuote) -> Self {
        Self {
            coin: coin.into(),
            price: quote.price,
            timestamp: quote.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_observation_from_quote() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let obs = PriceObservation::new(
            "bitcoin",
            PriceQuote {
                price: 43_210.5,
                last_updated: ts,
            },
        );

        assert_eq!(obs.coin, "bitcoin");
        assert_eq!(obs.price, 43_210.5);
        assert_eq!(obs.timestamp, ts);
    }
}
