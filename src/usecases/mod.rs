//! Use cases: one async function per business operation, each taking the
//! shared connection pool.

pub mod ingredients;
pub mod recipes;

use std::future::Future;
use std::time::Instant;

use tracing::Instrument;

use crate::errors::error_logging::log_database_error;
use crate::errors::{AppError, AppResult};
use crate::observability::{db_span, record_db_failure, record_db_metrics};

/// Run a use case inside a database span and record its metrics
///
/// Store and internal failures are logged here. Validation errors are
/// logged where they are raised; missing records and name conflicts are
/// ordinary outcomes and only counted.
pub(crate) async fn observed<T, F>(operation: &'static str, table: &'static str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    let span = db_span(operation, table);
    let start = Instant::now();
    let result = fut.instrument(span.clone()).await;
    record_db_metrics(operation, start.elapsed());

    if let Err(e) = &result {
        record_db_failure(operation, e.kind());
        if matches!(e, AppError::Database(_) | AppError::Internal(_)) {
            span.in_scope(|| log_database_error(e, operation, table, None));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::capture::CapturedLogs;

    #[tokio::test]
    async fn test_store_failures_are_logged() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let result: AppResult<()> = observed("recipes.update", "recipes", async {
            Err(AppError::Database("connection reset".to_string()))
        })
        .await;
        assert!(matches!(result, Err(AppError::Database(_))));

        let output = logs.contents();
        assert!(output.contains("Database operation failed"), "{output}");
        assert!(output.contains("connection reset"), "{output}");
        assert!(output.contains("recipes.update"), "{output}");
    }

    #[tokio::test]
    async fn test_expected_failures_are_not_logged_as_errors() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let missing: AppResult<()> = observed("ingredients.delete", "ingredients", async {
            Err(AppError::NotFound("Ingredient 7 not found".to_string()))
        })
        .await;
        assert!(missing.is_err());

        let taken: AppResult<()> = observed("ingredients.update", "ingredients", async {
            Err(AppError::Conflict("taken".to_string()))
        })
        .await;
        assert!(taken.is_err());

        let output = logs.contents();
        assert!(!output.contains("Database operation failed"), "{output}");
        assert!(!output.contains("ERROR"), "{output}");
    }

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let value = observed("recipes.get_all", "recipes", async { Ok::<_, AppError>(3) }).await;
        assert_eq!(value, Ok(3));
    }
}
