use crate::api::PriceSource;
use crate::error::FetchError;
use crate::models::PriceQuote;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for [`CoinGeckoClient`]
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub vs_currency: String,
    pub timeout: Duration,
    /// Demo API key, sent as `x_cg_demo_api_key` when present
    pub api_key: Option<String>,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API_BASE.to_string(),
            vs_currency: "usd".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_key: None,
        }
    }
}

/// CoinGecko API client.
///
/// Each call issues a single request. Failures are classified into
/// [`FetchError`] variants and handed back to the caller, which owns the
/// retry policy.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    config: CoinGeckoConfig,
}

/// Response from /coins/{id}
#[derive(Debug, Deserialize)]
struct CoinDetail {
    symbol: String,
}

/// Error body CoinGecko attaches to throttled or rejected requests
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    status: Option<ApiErrorStatus>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorStatus {
    error_message: Option<String>,
}

impl CoinGeckoClient {
    /// Create a new CoinGecko client
    pub fn new(config: CoinGeckoConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CoinGeckoConfig {
        &self.config
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Response, FetchError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let mut request = self.client.get(&url).query(params);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("x_cg_demo_api_key", key.as_str())]);
        }

        tracing::debug!(url = %url, "CoinGecko request");
        Ok(request.send().await?)
    }

    /// Turn a non-2xx response into the matching [`FetchError`]
    async fn classify_failure(response: Response) -> FetchError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body).unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.clone()
            }
        });

        match status {
            StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited(message),
            StatusCode::NOT_FOUND => FetchError::NotFound(message),
            _ => FetchError::Http {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Fetch the latest price and its upstream update time
    pub async fn get_price(&self, coin: &str) -> Result<PriceQuote, FetchError> {
        let vs = self.config.vs_currency.as_str();
        let response = self
            .get(
                "/simple/price",
                &[
                    ("ids", coin),
                    ("vs_currencies", vs),
                    ("include_last_updated_at", "true"),
                ],
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let body = response.text().await?;
        parse_simple_price(&body, coin, vs)
    }

    /// Look up the ticker symbol of a coin, upper-cased
    pub async fn get_symbol(&self, coin: &str) -> Result<String, FetchError> {
        let path = format!("/coins/{}", coin);
        let response = self
            .get(
                &path,
                &[
                    ("localization", "false"),
                    ("tickers", "false"),
                    ("market_data", "false"),
                    ("community_data", "false"),
                    ("developer_data", "false"),
                ],
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let body = response.text().await?;
        let detail: CoinDetail = serde_json::from_str(&body)?;
        if detail.symbol.is_empty() {
            return Err(FetchError::malformed(format!("empty symbol for {}", coin)));
        }

        Ok(detail.symbol.to_uppercase())
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_price(&self, coin: &str) -> Result<PriceQuote, FetchError> {
        self.get_price(coin).await
    }

    async fn fetch_symbol(&self, coin: &str) -> Result<String, FetchError> {
        self.get_symbol(coin).await
    }

    fn vs_currency(&self) -> &str {
        &self.config.vs_currency
    }
}

/// Parse a /simple/price body:
/// `{"bitcoin": {"usd": 43210.5, "last_updated_at": 1700000000}}`
fn parse_simple_price(body: &str, coin: &str, vs: &str) -> Result<PriceQuote, FetchError> {
    let data: HashMap<String, HashMap<String, Value>> = serde_json::from_str(body)?;

    let fields = data
        .get(coin)
        .ok_or_else(|| FetchError::malformed(format!("no entry for {} in response", coin)))?;

    let price = fields
        .get(vs)
        .and_then(Value::as_f64)
        .ok_or_else(|| FetchError::malformed(format!("missing {} price for {}", vs, coin)))?;

    if !price.is_finite() || price < 0.0 {
        return Err(FetchError::malformed(format!("invalid price {}", price)));
    }

    let ts = fields
        .get("last_updated_at")
        .and_then(Value::as_i64)
        .ok_or_else(|| FetchError::malformed(format!("missing last_updated_at for {}", coin)))?;

    let last_updated = DateTime::<Utc>::from_timestamp(ts, 0)
        .ok_or_else(|| FetchError::malformed(format!("timestamp out of range: {}", ts)))?;

    Ok(PriceQuote {
        price,
        last_updated,
    })
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .status
        .and_then(|s| s.error_message)
        .or(parsed.error)
}
