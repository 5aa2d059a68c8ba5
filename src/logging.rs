//! Tracing subscriber initialization for the `helpdesk` binary.
//!
//! Filter priority, highest first: `HELPDESK_LOG`, `RUST_LOG`, `--verbose`
//! (forces `debug`), then `logging.level` from helpdesk.toml.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::LoggingSection;

const LOG_FILE_PREFIX: &str = "helpdesk.log";

/// Build the filter from the environment, CLI and config layers.
pub fn build_env_filter(verbose: bool, configured_level: &str) -> EnvFilter {
    if let Ok(directives) = std::env::var("HELPDESK_LOG")
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if verbose { "debug" } else { configured_level };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process when file logging is enabled.
pub fn init_subscriber(
    verbose: bool,
    logging: &LoggingSection,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = build_env_filter(verbose, &logging.level);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_json = logging.json.then(|| fmt::layer().with_writer(std::io::stderr).json());
    let stderr_text = (!logging.json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_json)
        .with(stderr_text)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug_when_env_unset() {
        if std::env::var("HELPDESK_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = build_env_filter(true, "warn");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_configured_level_is_used() {
        if std::env::var("HELPDESK_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = build_env_filter(false, "helpdesk=trace,warn");
        assert!(filter.to_string().contains("helpdesk=trace"));
    }

    #[test]
    fn test_invalid_level_falls_back_to_info() {
        if std::env::var("HELPDESK_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = build_env_filter(false, "helpdesk=notalevel");
        assert_eq!(filter.to_string(), "info");
    }
}
