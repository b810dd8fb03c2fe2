use crate::analytics::{CollectorTarget, QueueSettings};
use clap::{Parser, ValueEnum};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("analytics_max_queue ({max_queue}) must be at least analytics_batch_size ({batch_size})")]
    QueueSmallerThanBatch { max_queue: usize, batch_size: usize },
    #[error("ga4 measurement id and api secret must be set together")]
    PartialGa4,
    #[error("admin token must not be blank")]
    EmptyAdminToken,
}

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "dentistry-gateway")]
#[command(about = "Rate limiting, analytics batching and MDX template suggestions for the dentistry content API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Internal error details are only exposed in development
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Production)]
    pub environment: Environment,

    // Custom analytics collector, payloads go to {endpoint}/collect
    #[arg(long, env = "ANALYTICS_COLLECTOR_ENDPOINT")]
    pub collector_endpoint: Option<String>,

    #[arg(long, env = "GA4_MEASUREMENT_ID")]
    pub ga4_measurement_id: Option<String>,

    #[arg(long, env = "GA4_API_SECRET")]
    pub ga4_api_secret: Option<String>,

    // Events per delivery batch
    #[arg(long, env = "ANALYTICS_BATCH_SIZE", default_value_t = 10)]
    pub analytics_batch_size: usize,

    // Delay before a partial batch is flushed
    #[arg(long, env = "ANALYTICS_FLUSH_DELAY_MS", default_value_t = 5000)]
    pub analytics_flush_delay_ms: u64,

    // Oldest events are dropped beyond this
    #[arg(long, env = "ANALYTICS_MAX_QUEUE", default_value_t = 1000)]
    pub analytics_max_queue: usize,

    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
    pub max_body_bytes: u64,

    // Minimum spacing between rate limit sweeps
    #[arg(long, env = "RATE_LIMIT_SWEEP_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    // Housekeeping tick (sweep + analytics flush)
    #[arg(long, env = "HOUSEKEEPING_INTERVAL_SECS", default_value_t = 60)]
    pub housekeeping_interval_secs: u64,

    // Bearer token for /api/admin, admin routes answer 401 when unset
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            port: 8080,
            environment: Environment::Production,
            collector_endpoint: None,
            ga4_measurement_id: None,
            ga4_api_secret: None,
            analytics_batch_size: 10,
            analytics_flush_delay_ms: 5000,
            analytics_max_queue: 1000,
            max_body_bytes: 1024 * 1024,
            sweep_interval_secs: 300,
            housekeeping_interval_secs: 60,
            admin_token: None,
        }
    }
}

impl Args {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("analytics_batch_size", self.analytics_batch_size as u64),
            ("analytics_flush_delay_ms", self.analytics_flush_delay_ms),
            ("analytics_max_queue", self.analytics_max_queue as u64),
            ("max_body_bytes", self.max_body_bytes),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("housekeeping_interval_secs", self.housekeeping_interval_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(name));
        }
        if self.analytics_max_queue < self.analytics_batch_size {
            return Err(ConfigError::QueueSmallerThanBatch {
                max_queue: self.analytics_max_queue,
                batch_size: self.analytics_batch_size,
            });
        }
        if self.ga4_measurement_id.is_some() != self.ga4_api_secret.is_some() {
            return Err(ConfigError::PartialGa4);
        }
        if self.admin_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ConfigError::EmptyAdminToken);
        }
        Ok(())
    }

    /// Where analytics go. A custom collector wins over GA4; `None` disables tracking.
    pub fn collector_target(&self) -> Option<CollectorTarget> {
        if let Some(endpoint) = self.collector_endpoint.as_deref().filter(|e| !e.is_empty()) {
            return Some(CollectorTarget::Custom {
                endpoint: endpoint.to_string(),
            });
        }
        match (&self.ga4_measurement_id, &self.ga4_api_secret) {
            (Some(measurement_id), Some(api_secret)) => Some(CollectorTarget::Ga4 {
                measurement_id: measurement_id.clone(),
                api_secret: api_secret.clone(),
                debug: self.environment.is_development(),
            }),
            _ => None,
        }
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            batch_size: self.analytics_batch_size,
            flush_delay: Duration::from_millis(self.analytics_flush_delay_ms),
            max_queue: self.analytics_max_queue,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_untracked() {
        let args = Args::default();
        assert_eq!(args.validate(), Ok(()));
        assert!(args.collector_target().is_none());
        assert_eq!(args.queue_settings(), QueueSettings::default());
    }

    #[test]
    fn parses_cli_flags() {
        let args = Args::try_parse_from([
            "dentistry-gateway",
            "--port",
            "9000",
            "--environment",
            "development",
            "--analytics-batch-size",
            "25",
        ])
        .unwrap();
        assert_eq!(args.port, 9000);
        assert!(args.environment.is_development());
        assert_eq!(args.analytics_batch_size, 25);
    }

    #[test]
    fn rejects_bad_values() {
        let args = Args {
            analytics_batch_size: 0,
            ..Args::default()
        };
        assert_eq!(args.validate(), Err(ConfigError::Zero("analytics_batch_size")));

        let args = Args {
            analytics_batch_size: 50,
            analytics_max_queue: 20,
            ..Args::default()
        };
        assert!(matches!(
            args.validate(),
            Err(ConfigError::QueueSmallerThanBatch { .. })
        ));

        let args = Args {
            ga4_measurement_id: Some("G-1".into()),
            ..Args::default()
        };
        assert_eq!(args.validate(), Err(ConfigError::PartialGa4));

        let args = Args {
            admin_token: Some("  ".into()),
            ..Args::default()
        };
        assert_eq!(args.validate(), Err(ConfigError::EmptyAdminToken));
    }

    #[test]
    fn custom_collector_wins_over_ga4() {
        let args = Args {
            collector_endpoint: Some("http://collector".into()),
            ga4_measurement_id: Some("G-1".into()),
            ga4_api_secret: Some("secret".into()),
            ..Args::default()
        };
        assert_eq!(
            args.collector_target(),
            Some(CollectorTarget::Custom {
                endpoint: "http://collector".into()
            })
        );

        let ga4 = Args {
            collector_endpoint: None,
            ..args
        };
        assert!(matches!(
            ga4.collector_target(),
            Some(CollectorTarget::Ga4 { debug: false, .. })
        ));
    }
}
