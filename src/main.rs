use clap::Parser;
use cryptosma::api::CoinGeckoClient;
use cryptosma::config::{Overrides, Settings};
use cryptosma::execution::{ConsoleSink, PriceMonitor, ShutdownSignal};
use cryptosma::logging::init_logging;
use std::path::PathBuf;
use std::process::ExitCode;

/// Track a live crypto price and its simple moving average
#[derive(Parser, Debug)]
#[command(name = "cryptosma")]
#[command(version)]
struct Cli {
    /// CoinGecko coin id ("bitcoin", "solana", "ethereum", ...) [default: bitcoin]
    #[arg(long)]
    coin: Option<String>,

    /// Number of prices used for the SMA [default: 10]
    #[arg(long)]
    sma: Option<usize>,

    /// Quote currency [default: usd]
    #[arg(long = "vs")]
    vs_currency: Option<String>,

    /// Drop samples whose upstream timestamp repeats the previous one
    #[arg(long)]
    skip_duplicate_timestamps: bool,

    /// Directory for rotated log files [default: logs]
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Configuration file (defaults to ./cryptosma.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            coin: self.coin.clone(),
            sma_window: self.sma,
            vs_currency: self.vs_currency.clone(),
            skip_duplicate_timestamps: self.skip_duplicate_timestamps,
            log_dir: self.log_dir.clone(),
        }
    }
}

// Exit codes
const EXIT_FATAL: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref())
        .and_then(|s| s.with_overrides(cli.overrides()))
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let _log_guard = match init_logging(&settings.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match run(settings).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Fatal: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(settings: Settings) -> cryptosma::Result<ExitCode> {
    tracing::info!("🚀 cryptosma starting");
    tracing::info!("Configuration: {}", settings.digest());

    let shutdown = ShutdownSignal::new();
    let listener = shutdown.listen_for_ctrl_c();

    let client = CoinGeckoClient::new(settings.coingecko_config())?;
    let mut monitor = PriceMonitor::new(client, ConsoleSink, settings.monitor_config());

    let code = match monitor.resolve_symbol(&shutdown).await {
        Ok(Some(_)) => {
            monitor.run(&shutdown).await;
            ExitCode::SUCCESS
        }
        // Interrupted before the symbol was known
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(coin = %settings.monitor.coin, "Cannot start: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    };

    listener.abort();
    tracing::info!("👋 cryptosma stopped");
    Ok(code)
}
