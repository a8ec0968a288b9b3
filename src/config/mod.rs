//! Configuration management
//!
//! Layered, lowest precedence first: built-in defaults, `cryptosma.toml`
//! (or an explicit file), `.env` / environment (`CRYPTOSMA__SECTION__KEY`),
//! then command-line overrides.

use crate::api::CoinGeckoConfig;
use crate::error::ConfigError;
use crate::execution::{BackoffConfig, DuplicatePolicy, MonitorConfig};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "cryptosma";
const ENV_PREFIX: &str = "CRYPTOSMA";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub monitor: MonitorSettings,
    pub backoff: BackoffSettings,
    pub api: ApiSettings,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    /// CoinGecko coin id ("bitcoin", "solana", ...)
    pub coin: String,
    /// Quote currency
    pub vs_currency: String,
    /// Number of prices the SMA is computed over
    pub sma_window: usize,
    pub duplicate_timestamps: DuplicatePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackoffSettings {
    pub base_secs: u64,
    pub max_secs: u64,
    /// Log a diagnostic every N consecutive failures
    pub log_every: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    pub dir: PathBuf,
    pub file_prefix: String,
    pub rotation: LogRotation,
    /// Rotated files kept on disk
    pub max_files: usize,
}

/// Values given on the command line. `None` leaves the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub coin: Option<String>,
    pub sma_window: Option<usize>,
    pub vs_currency: Option<String>,
    pub skip_duplicate_timestamps: bool,
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Load configuration from defaults, file and environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = defaults()?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Apply command-line overrides, normalize, and validate
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if let Some(coin) = overrides.coin {
            self.monitor.coin = coin;
        }
        if let Some(window) = overrides.sma_window {
            self.monitor.sma_window = window;
        }
        if let Some(vs) = overrides.vs_currency {
            self.monitor.vs_currency = vs;
        }
        if overrides.skip_duplicate_timestamps {
            self.monitor.duplicate_timestamps = DuplicatePolicy::Skip;
        }
        if let Some(dir) = overrides.log_dir {
            self.logging.dir = dir;
        }

        self.monitor.coin = self.monitor.coin.trim().to_lowercase();
        self.monitor.vs_currency = self.monitor.vs_currency.trim().to_lowercase();

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.sma_window == 0 {
            return Err(ConfigError::InvalidWindow(self.monitor.sma_window));
        }

        if !is_valid_id(&self.monitor.coin) {
            return Err(ConfigError::InvalidCoin(self.monitor.coin.clone()));
        }

        let vs = &self.monitor.vs_currency;
        if vs.is_empty() || !vs.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidCurrency(vs.clone()));
        }

        if self.backoff.base_secs == 0 || self.backoff.base_secs > self.backoff.max_secs {
            return Err(ConfigError::InvalidBackoff {
                base: self.backoff.base_secs,
                max: self.backoff.max_secs,
            });
        }

        if self.backoff.log_every == 0 {
            return Err(ConfigError::InvalidLogEvery);
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            coin: self.monitor.coin.clone(),
            window_size: self.monitor.sma_window,
            duplicates: self.monitor.duplicate_timestamps,
            backoff: BackoffConfig {
                base: Duration::from_secs(self.backoff.base_secs),
                cap: Duration::from_secs(self.backoff.max_secs),
                log_every: self.backoff.log_every,
            },
        }
    }

    pub fn coingecko_config(&self) -> CoinGeckoConfig {
        CoinGeckoConfig {
            base_url: self.api.base_url.clone(),
            vs_currency: self.monitor.vs_currency.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            api_key: self.api.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    /// One-line summary for the startup log (never includes the API key)
    pub fn digest(&self) -> String {
        format!(
            "coin={} vs={} sma={} duplicates={:?} backoff={}s..{}s api={} key={}",
            self.monitor.coin,
            self.monitor.vs_currency,
            self.monitor.sma_window,
            self.monitor.duplicate_timestamps,
            self.backoff.base_secs,
            self.backoff.max_secs,
            self.api.base_url,
            if self.coingecko_config().api_key.is_some() {
                "set"
            } else {
                "none"
            },
        )
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(Config::builder()
        // Monitor defaults
        .set_default("monitor.coin", "bitcoin")?
        .set_default("monitor.vs_currency", "usd")?
        .set_default("monitor.sma_window", 10)?
        .set_default("monitor.duplicate_timestamps", "keep")?
        // Backoff defaults
        .set_default("backoff.base_secs", 1)?
        .set_default("backoff.max_secs", 900)?
        .set_default("backoff.log_every", 5)?
        // API defaults
        .set_default("api.base_url", crate::api::coingecko::COINGECKO_API_BASE)?
        .set_default("api.timeout_secs", 10)?
        // Logging defaults
        .set_default("logging.level", "cryptosma=info")?
        .set_default("logging.dir", "logs")?
        .set_default("logging.file_prefix", "cryptosma.log")?
        .set_default("logging.rotation", "daily")?
        .set_default("logging.max_files", 7)?)
}

/// CoinGecko ids are lowercase ASCII words joined by '-'
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('-')
        && !id.ends_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Settings {
        defaults()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = from_toml("");

        assert_eq!(settings.monitor.coin, "bitcoin");
        assert_eq!(settings.monitor.sma_window, 10);
        assert_eq!(settings.monitor.duplicate_timestamps, DuplicatePolicy::Keep);
        assert_eq!(settings.backoff.base_secs, 1);
        assert_eq!(settings.backoff.max_secs, 900);
        assert_eq!(settings.backoff.log_every, 5);
        assert_eq!(settings.logging.rotation, LogRotation::Daily);
        assert!(settings.api.api_key.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_file_values() {
        let settings = from_toml(
            r#"
            [monitor]
            coin = "solana"
            sma_window = 20
            duplicate_timestamps = "skip"

            [logging]
            rotation = "hourly"
            "#,
        );

        assert_eq!(settings.monitor.coin, "solana");
        assert_eq!(settings.monitor.sma_window, 20);
        assert_eq!(settings.monitor.duplicate_timestamps, DuplicatePolicy::Skip);
        assert_eq!(settings.logging.rotation, LogRotation::Hourly);
        // Untouched sections keep defaults
        assert_eq!(settings.backoff.max_secs, 900);
    }

    #[test]
    fn test_unknown_rotation_rejected() {
        let result = defaults()
            .unwrap()
            .add_source(File::from_str(
                "[logging]\nrotation = \"weekly\"",
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<Settings>();

        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_win_and_normalize() {
        let settings = from_toml("")
            .with_overrides(Overrides {
                coin: Some("  Ethereum ".to_string()),
                sma_window: Some(3),
                vs_currency: Some("EUR".to_string()),
                skip_duplicate_timestamps: true,
                log_dir: Some(PathBuf::from("/tmp/sma")),
            })
            .unwrap();

        assert_eq!(settings.monitor.coin, "ethereum");
        assert_eq!(settings.monitor.sma_window, 3);
        assert_eq!(settings.monitor.vs_currency, "eur");
        assert_eq!(settings.monitor.duplicate_timestamps, DuplicatePolicy::Skip);
        assert_eq!(settings.logging.dir, PathBuf::from("/tmp/sma"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = from_toml("")
            .with_overrides(Overrides {
                sma_window: Some(0),
                ..Default::default()
            })
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidWindow(0)));
    }

    #[test]
    fn test_bad_coin_rejected() {
        for coin in ["", "bit coin", "btc/usd", "-bitcoin"] {
            let err = from_toml("")
                .with_overrides(Overrides {
                    coin: Some(coin.to_string()),
                    ..Default::default()
                })
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidCoin(_)), "{:?}", coin);
        }
    }

    #[test]
    fn test_dashed_coin_accepted() {
        let settings = from_toml("")
            .with_overrides(Overrides {
                coin: Some("jupiter-exchange-solana".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(settings.monitor.coin, "jupiter-exchange-solana");
    }

    #[test]
    fn test_backoff_bounds_validated() {
        let settings = from_toml("[backoff]\nbase_secs = 10\nmax_secs = 5");
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidBackoff { base: 10, max: 5 })
        ));

        let settings = from_toml("[backoff]\nlog_every = 0");
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidLogEvery)
        ));
    }

    #[test]
    fn test_monitor_config_mapping() {
        let settings = from_toml("[monitor]\nsma_window = 4\n[backoff]\nmax_secs = 60");
        let config = settings.monitor_config();

        assert_eq!(config.window_size, 4);
        assert_eq!(config.backoff.base, Duration::from_secs(1));
        assert_eq!(config.backoff.cap, Duration::from_secs(60));
        assert_eq!(config.backoff.log_every, 5);
    }

    #[test]
    fn test_empty_api_key_treated_as_none() {
        let settings = from_toml("[api]\napi_key = \"\"");
        assert!(settings.coingecko_config().api_key.is_none());
        assert!(settings.digest().contains("key=none"));
    }
}
