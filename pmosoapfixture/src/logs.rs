//! Initialisation du logging pour le binaire.

use pmosoapconfig::Config;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Options de logging, lues dans la section `log` de la configuration
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Niveau minimal (ERROR, WARN, INFO, DEBUG, TRACE)
    pub min_level: String,
    /// Activer la sortie console
    pub enable_console: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            min_level: "INFO".to_string(),
            enable_console: true,
        }
    }
}

impl LoggingOptions {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            min_level: config.get_log_min_level().unwrap_or(defaults.min_level),
            enable_console: config
                .get_log_enable_console()
                .unwrap_or(defaults.enable_console),
        }
    }

    /// Filtre construit depuis `RUST_LOG` s'il est défini, sinon depuis `min_level`
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(self.min_level.to_lowercase())
                .unwrap_or_else(|_| EnvFilter::new("info"))
        })
    }
}

/// Installe le subscriber global
///
/// Sans effet si un subscriber est déjà installé.
pub fn init_logging(options: &LoggingOptions) {
    let subscriber = Registry::default().with(options.filter());

    let result = if options.enable_console {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "Logging already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = Config::from_yaml_str("log:\n  min_level: DEBUG\n  enable_console: false\n").unwrap();
        let options = LoggingOptions::from_config(&config);

        assert_eq!(options.min_level, "DEBUG");
        assert!(!options.enable_console);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let options = LoggingOptions {
            enable_console: false,
            ..LoggingOptions::default()
        };
        init_logging(&options);
        init_logging(&options);
    }
}
