use ia_core::config::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines for terminals.
    Pretty,
    /// One JSON object per line (Vector / Loki / ELK).
    Json,
}

/// Initialize logging from the `[logging]` configuration section.
pub fn init_from_config(service_name: &str, config: &LoggingConfig) {
    let format = if config.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init(service_name, &config.level, format);
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `default_level` (e.g. "info",
/// "ia_agents=debug,warn"). Safe to call multiple times, e.g. from several
/// tests: only the first call installs a subscriber.
pub fn init(service_name: &str, default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = match format {
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_level(true)
            .try_init()
            .is_ok(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .with_level(true)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(service = service_name, ?format, "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init("test", "debug", LogFormat::Pretty);
        init("test", "debug", LogFormat::Json);
        init_from_config("test", &LoggingConfig::default());
        tracing::debug!("still logging after repeated init");
    }
}
