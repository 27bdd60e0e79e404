use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber. Logs go to a daily rolling file under
/// `config.directory`, or to stderr when that directory cannot be created.
pub fn initialize_logging(config: &LoggingConfig) -> WorkerGuard {
    let dir_error = ensure_log_dir(&config.directory).err();

    let (non_blocking, guard) = match dir_error {
        None => tracing_appender::non_blocking(tracing_appender::rolling::daily(
            &config.directory,
            &config.file_name,
        )),
        Some(_) => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    match dir_error {
        None => tracing::info!("Logging to {}/{}", config.directory, config.file_name),
        Some(e) => tracing::warn!(
            "Could not create log directory {}: {}. Logging to stderr",
            config.directory,
            e
        ),
    }
    guard
}

fn ensure_log_dir(directory: impl AsRef<Path>) -> std::io::Result<()> {
    std::fs::create_dir_all(directory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_nested_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("var").join("logs");

        ensure_log_dir(&logs).unwrap();
        assert!(logs.is_dir());
    }

    #[test]
    fn reports_unusable_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();

        assert!(ensure_log_dir(blocker.join("geofix")).is_err());
    }
}
