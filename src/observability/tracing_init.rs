//! Tracing initialization with configurable logging formats.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LogLevel, LoggingConfig};

/// Initialize the global tracing subscriber.
///
/// This sets up:
/// - Console logging with configurable format (pretty, compact, JSON)
/// - Environment-based log filtering (`RUST_LOG` overrides the config)
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), TracingError> {
    let filter = build_env_filter(logging);

    let result = match (logging.format, logging.timestamps) {
        (LogFormat::Pretty, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Pretty, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Compact, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Compact, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Json, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .with_current_span(logging.include_spans);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Json, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .with_current_span(logging.include_spans)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    result.map_err(|e| TracingError::Init(e.to_string()))
}

fn base_level(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Build the event filter. `RUST_LOG` wins over the configured level and
/// directives; invalid directives fall back to the plain level.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let directives = filter_directives(config, std::env::var("RUST_LOG").ok());
    let base = base_level(config.level);
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(base))
}

fn filter_directives(config: &LoggingConfig, rust_log: Option<String>) -> String {
    let base = base_level(config.level);
    if let Some(env_filter) = rust_log.filter(|f| !f.trim().is_empty()) {
        env_filter
    } else if let Some(filter) = &config.filter {
        format!("{},{}", base, filter)
    } else {
        // Default filter that quiets noisy crates
        format!("{},hyper=warn,h2=warn,tower=info", base)
    }
}

/// Tracing initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        let config = LoggingConfig {
            filter: Some("tower_http=debug".to_string()),
            ..Default::default()
        };
        assert_eq!(
            filter_directives(&config, Some("scimgate=trace".to_string())),
            "scimgate=trace"
        );
    }

    #[test]
    fn test_config_filter_appended_to_level() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            filter: Some("tower_http=debug".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_directives(&config, None), "warn,tower_http=debug");
        assert_eq!(
            filter_directives(&config, Some("  ".to_string())),
            "warn,tower_http=debug"
        );
    }

    #[test]
    fn test_default_directives_quiet_noisy_crates() {
        let config = LoggingConfig::default();
        let directives = filter_directives(&config, None);
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("hyper=warn"));
    }
}
