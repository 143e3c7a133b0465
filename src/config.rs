use std::env;

use tracing_subscriber::{EnvFilter, fmt};

use crate::analyzer::AnalyzerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Install the global subscriber. `RUST_LOG` wins over the configured level.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        // An embedding service may already have installed one.
        let _ = match self.format {
            LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
            LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub analyzer: AnalyzerConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Read `.env.local`, then `.env`, then the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AppConfig::default();

        let similar_top_k = lookup("TIPGRAPH_SIMILAR_TOP_K")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(defaults.analyzer.similar_top_k)
            .clamp(1, 50);
        let h2h_link_weight = lookup("TIPGRAPH_H2H_LINK_WEIGHT")
            .and_then(|val| val.trim().parse::<f64>().ok())
            .filter(|w| w.is_finite())
            .unwrap_or(defaults.analyzer.h2h_link_weight)
            .clamp(0.0, 1.0);

        let level = lookup("TIPGRAPH_LOG_LEVEL")
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .unwrap_or(defaults.logging.level);
        let format = match lookup("TIPGRAPH_LOG_FORMAT")
            .map(|val| val.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            analyzer: AnalyzerConfig {
                similar_top_k,
                h2h_link_weight,
            },
            logging: LoggingConfig { level, format },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config_from(&[]), AppConfig::default());
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let cfg = config_from(&[
            ("TIPGRAPH_SIMILAR_TOP_K", "500"),
            ("TIPGRAPH_H2H_LINK_WEIGHT", " 0.5 "),
            ("TIPGRAPH_LOG_LEVEL", "debug"),
            ("TIPGRAPH_LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(cfg.analyzer.similar_top_k, 50);
        assert_eq!(cfg.analyzer.h2h_link_weight, 0.5);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let cfg = config_from(&[
            ("TIPGRAPH_SIMILAR_TOP_K", "lots"),
            ("TIPGRAPH_H2H_LINK_WEIGHT", "NaN"),
            ("TIPGRAPH_LOG_FORMAT", "xml"),
        ]);
        assert_eq!(cfg.analyzer, AnalyzerConfig::default());
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
    }
}
