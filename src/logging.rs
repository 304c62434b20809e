//! Logging setup for the `datamorph` binary.
//!
//! The library only emits `tracing` events. The binary installs a subscriber
//! with a console layer and, when [`Settings::log_dir`] is set, a daily
//! rolling file layer.
//!
//! ```no_run
//! use datamorph::{config::Settings, logging};
//!
//! let _guard = logging::init(&Settings::default())?;
//! tracing::info!("ready");
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::config::Settings;
use anyhow::{Context as _, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Filter from `RUST_LOG`, falling back to `default_directive`.
///
/// # Errors
///
/// Fails if neither yields a valid filter.
pub fn env_filter(default_directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .context("Failed to create env filter")
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for as long as file logging is needed;
/// dropping it flushes and stops the file writer.
///
/// # Errors
///
/// Fails if the log directory cannot be created or the filter is invalid.
pub fn init(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(&settings.log_level)?;

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &settings.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).with_context(|| {
                format!("Failed to create log directory: {}", log_dir.display())
            })?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(10)
                .filename_prefix("datamorph")
                .filename_suffix("log")
                .build(log_dir)
                .context("Failed to create file appender")?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(log_dir) = &settings.log_dir {
        tracing::debug!("Logging initialized, log directory: {}", log_dir.display());
    }
    Ok(guard)
}
