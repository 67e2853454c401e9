//! Observability module for centralized logging and metrics setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Metrics collection with a Prometheus recorder
//! - Database spans and metric helpers used by the use cases
//! - A database health check

use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::PgPool;
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;

/// Initialize logging and, when enabled, the metrics recorder
///
/// Returns the Prometheus handle so the caller can render a snapshot.
pub fn init_observability(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;

    let handle = if config.enable_metrics_export {
        Some(init_metrics()?)
    } else {
        tracing::info!("Metrics export disabled");
        None
    };

    tracing::info!(
        environment = %config.environment,
        metrics_enabled = %config.enable_metrics_export,
        "Observability stack initialized successfully"
    );
    Ok(handle)
}

/// Initialize structured logging with tracing and configuration
fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("recipe_catalog={}", config.log_level.to_lowercase()).parse()?)
        .add_directive("sqlx=warn".parse()?);

    if config.use_pretty_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Install the Prometheus recorder
fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    tracing::info!("Metrics collection initialized");
    Ok(handle)
}

/// Create a span for database operations
pub fn db_span(operation: &str, table: &str) -> tracing::Span {
    tracing::info_span!(
        "db_operation",
        operation = operation,
        table = table,
        component = "database"
    )
}

/// Record database operation metrics
pub fn record_db_metrics(operation: &str, duration: Duration) {
    let operation = operation.to_string();
    metrics::counter!("db_operations_total", "operation" => operation).increment(1);
    metrics::histogram!("db_operation_duration_seconds").record(duration.as_secs_f64());
}

/// Record a failed use case, labelled by error kind
pub fn record_db_failure(operation: &str, kind: &'static str) {
    let operation = operation.to_string();
    metrics::counter!("db_operation_failures_total", "operation" => operation, "kind" => kind)
        .increment(1);
}

/// Check database connectivity and basic query capability
pub async fn check_database_health(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;

    tracing::debug!("Database health check passed");
    Ok(())
}

/// In-memory log sink for tests asserting on emitted events
#[cfg(test)]
pub(crate) mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        /// A plain-text subscriber writing into this sink
        pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
            let logs = self.clone();
            tracing_subscriber::fmt()
                .with_writer(move || logs.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish()
        }

        pub(crate) fn contents(&self) -> String {
            let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::other("log buffer poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::capture::CapturedLogs;
    use super::*;

    #[test]
    fn test_db_metrics_are_recorded() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_db_metrics("ingredients.create", Duration::from_millis(3));
            record_db_metrics("ingredients.create", Duration::from_millis(5));
            record_db_failure("ingredients.update", "conflict");
        });

        let rendered = handle.render();
        assert!(
            rendered.contains("db_operations_total{operation=\"ingredients.create\"} 2"),
            "{rendered}"
        );
        assert!(rendered.contains("db_operation_duration_seconds"), "{rendered}");
        assert!(rendered.contains("db_operation_failures_total{"), "{rendered}");
        assert!(rendered.contains("kind=\"conflict\""), "{rendered}");
        assert!(!rendered.contains("operation=\"recipes."), "{rendered}");
    }

    #[test]
    fn test_db_span_carries_operation_and_table() {
        let logs = CapturedLogs::default();

        tracing::subscriber::with_default(logs.subscriber(), || {
            let span = db_span("recipes.get_all", "recipes");
            assert_eq!(span.metadata().map(|m| m.name()), Some("db_operation"));

            let _entered = span.enter();
            tracing::info!("inside span");
        });

        let output = logs.contents();
        assert!(output.contains("db_operation{"), "{output}");
        assert!(output.contains("recipes.get_all"), "{output}");
        assert!(output.contains("table="), "{output}");
        assert!(output.contains("component="), "{output}");
        assert!(output.contains("inside span"), "{output}");
    }
}
