//! Logging setup for host binaries and tests

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::{DialogError, DialogResult};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Include file and line information
    pub file_info: bool,
    /// Log span enter/exit
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            file_info: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Installs a global `fmt` subscriber filtered by `RUST_LOG` and `config.level`
///
/// Fails with `DialogError::Config` when a subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> DialogResult<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .try_init()
        .map_err(|e| DialogError::Config(format!("Logging already initialised: {}", e)))
}

/// Parses a level name such as `debug` or `WARN`
pub fn parse_log_level(level: &str) -> DialogResult<Level> {
    level
        .parse()
        .map_err(|_| DialogError::Config(format!("Invalid log level: {}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(matches!(parse_log_level("loud"), Err(DialogError::Config(_))));
    }

    #[test]
    fn test_second_setup_fails_softly() {
        let _ = setup_logging(LoggingConfig::new(Level::DEBUG).with_file_info());
        assert!(setup_logging(LoggingConfig::default()).is_err());
    }
}
