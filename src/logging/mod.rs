//! Console + rotating file logging

use crate::config::{LogRotation, LogSettings};
use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Install the global subscriber.
///
/// Console output goes to stderr so it does not interleave with the price
/// lines on stdout. The returned guard flushes the file writer on drop and
/// must be held for the life of the process.
pub fn init_logging(settings: &LogSettings) -> anyhow::Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .with_context(|| format!("Invalid log filter '{}'", settings.level))?;

    std::fs::create_dir_all(&settings.dir)
        .with_context(|| format!("Failed to create log directory {}", settings.dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(settings.rotation.into())
        .filename_prefix(&settings.file_prefix)
        .max_log_files(settings.max_files.max(1))
        .build(&settings.dir)
        .context("Failed to create rolling log file")?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    Ok(guard)
}
