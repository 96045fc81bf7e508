//! Diagnostics for the `lenframe` binary.
//!
//! Stdout carries received messages only, so every log line goes to stderr.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Log line encoding on stderr.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Most verbose level that reaches stderr.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    /// Per-frame sizes from the framing layer.
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the stderr subscriber. Returns `false` if one was already set.
pub fn init_logging(format: LogFormat, level: LogLevel) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::from(level))
        .with_ansi(false)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_filters_in_order() {
        let filters: Vec<LevelFilter> = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
        .into_iter()
        .map(LevelFilter::from)
        .collect();

        assert!(filters.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(filters[1], LevelFilter::WARN);
    }

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(LogLevel::from_str("debug", true).unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("TRACE", true).unwrap(), LogLevel::Trace);
        assert!(LogLevel::from_str("loud", true).is_err());
        assert_eq!(LogFormat::from_str("json", false).unwrap(), LogFormat::Json);
    }

    #[test]
    fn second_install_is_reported() {
        init_logging(LogFormat::Text, LogLevel::Error);
        assert!(!init_logging(LogFormat::Json, LogLevel::Trace));
    }
}
