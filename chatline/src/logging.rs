use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

const LOG_FILE_PREFIX: &str = "chatline.log";

/// Install the global subscriber. Filter comes from `RUST_LOG`, default `info`.
///
/// With a log directory configured, output goes to a daily rolling file so it
/// stays out of the terminal; keep the returned guard alive to flush it.
pub fn init(config: &ClientConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_dir) = config.log_dir.as_ref() else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .try_init()
            .map_err(|e| Error::Config(format!("cannot install logger: {e}")))?;
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .map_err(|e| Error::Config(format!("cannot create log dir {}: {e}", log_dir.display())))?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("cannot install logger: {e}")))?;

    tracing::debug!(path = %log_dir.display(), "File logging initialized");
    Ok(Some(guard))
}
