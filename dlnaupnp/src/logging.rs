//! Initialisation du système de traces.

use dlnaconfig::LoggerConfig;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Installe le subscriber `tracing` global.
///
/// `RUST_LOG` est prioritaire ; à défaut le niveau minimal vient de la
/// configuration. Un second appel est sans effet.
pub fn init_logging(config: &LoggerConfig) {
    let level = string_to_level(&config.min_level).unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = Registry::default().with(filter);

    let result = if config.enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_level() {
        assert_eq!(string_to_level("debug"), Some(Level::DEBUG));
        assert_eq!(string_to_level("WARN"), Some(Level::WARN));
        assert_eq!(string_to_level("verbose"), None);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggerConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
