//! # Observability Configuration
//!
//! Environment-specific logging and metrics settings.

use std::env;

/// Observability configuration for different environments
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Log level for the catalog's own targets
    pub log_level: String,
    /// Output format override ("pretty" or "json")
    pub log_format: Option<String>,
    /// Whether to install the Prometheus metrics recorder
    pub enable_metrics_export: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: None,
            enable_metrics_export: true,
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("OBSERVABILITY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").ok(),
            enable_metrics_export: env::var("ENABLE_METRICS_EXPORT")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Pretty output in development or when asked for, JSON otherwise
    pub fn use_pretty_logs(&self) -> bool {
        match self.log_format.as_deref() {
            Some(format) => format == "pretty",
            None => self.is_development(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!("Invalid log level: {}", self.log_level));
        }

        if let Some(format) = &self.log_format {
            if format != "pretty" && format != "json" {
                return Err(format!("Invalid log format: {}", format));
            }
        }

        Ok(())
    }
}

/// Environment-specific configuration presets
pub mod presets {
    use super::ObservabilityConfig;

    /// Development configuration with verbose logging
    pub fn development() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "development".to_string(),
            log_level: "debug".to_string(),
            ..Default::default()
        }
    }

    /// Production configuration
    pub fn production() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "production".to_string(),
            log_level: "warn".to_string(),
            ..Default::default()
        }
    }

    /// Minimal configuration without metrics
    pub fn minimal() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "minimal".to_string(),
            log_level: "error".to_string(),
            enable_metrics_export: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.environment, "development");
        assert_eq!(config.log_level, "info");
        assert!(config.enable_metrics_export);
        assert!(config.use_pretty_logs());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ObservabilityConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        config.log_level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.log_format = Some("xml".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_selection() {
        let mut prod = presets::production();
        assert!(!prod.use_pretty_logs());

        prod.log_format = Some("pretty".to_string());
        assert!(prod.use_pretty_logs());

        let mut dev = presets::development();
        dev.log_format = Some("json".to_string());
        assert!(!dev.use_pretty_logs());
    }

    #[test]
    fn test_presets() {
        let dev = presets::development();
        assert!(dev.is_development());
        assert!(!dev.is_production());

        let prod = presets::production();
        assert!(prod.is_production());

        let minimal = presets::minimal();
        assert!(!minimal.enable_metrics_export);
    }
}
