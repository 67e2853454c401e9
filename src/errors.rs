//! # Application Error Types
//!
//! This module defines the error types shared by the use cases, the store
//! bootstrap and configuration loading.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// The addressed ingredient or recipe does not exist
    NotFound(String),
    /// The write would clash with another record (e.g. a duplicate name)
    Conflict(String),
    /// Validation errors (names, quantities, etc.)
    Validation(String),
    /// Database operation errors
    Database(String),
    /// Configuration validation errors
    Config(String),
    /// Internal application errors
    Internal(String),
}

impl AppError {
    /// HTTP-equivalent status code a request handler should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) | AppError::Validation(_) => 400,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => 500,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "[NOT_FOUND] {}", msg),
            AppError::Conflict(msg) => write!(f, "[CONFLICT] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Database(msg) => write!(f, "[DATABASE] {}", msg),
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities
pub mod error_logging {
    use tracing::error;

    /// Log database operation errors with contextual information
    pub fn log_database_error(
        error: &impl std::fmt::Display,
        operation: &str,
        table: &str,
        record_id: Option<i64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            table = %table,
            record_id = ?record_id,
            "Database operation failed"
        );
    }

    /// Log recipe write errors with recipe-specific context
    pub fn log_recipe_error(
        error: &impl std::fmt::Display,
        operation: &str,
        recipe_id: Option<i64>,
        recipe_name: Option<&str>,
        ingredient_count: Option<usize>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            recipe_id = ?recipe_id,
            recipe_name = ?recipe_name,
            ingredient_count = ?ingredient_count,
            "Recipe operation failed"
        );
    }

    /// Log validation errors with input context
    pub fn log_validation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        input_type: &str,
        input_value: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            input_type = %input_type,
            input_value = ?input_value.map(|v| if v.chars().count() > 100 { format!("{}...", v.chars().take(100).collect::<String>()) } else { v.to_string() }),
            "Validation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::Conflict("x".into()).status_code(), 400);
        assert_eq!(AppError::Validation("x".into()).status_code(), 400);
        assert_eq!(AppError::Database("x".into()).status_code(), 500);
        assert_eq!(AppError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_display_prefixes() {
        let err = AppError::Conflict("Ingredient name already in use".to_string());
        assert_eq!(err.to_string(), "[CONFLICT] Ingredient name already in use");

        let err = AppError::NotFound("Recipe 3 not found".to_string());
        assert_eq!(err.to_string(), "[NOT_FOUND] Recipe 3 not found");
    }

    #[test]
    fn test_not_found_and_conflict_are_distinguishable() {
        let not_found = AppError::NotFound("gone".into());
        let conflict = AppError::Conflict("taken".into());
        assert!(not_found.is_not_found() && !not_found.is_conflict());
        assert!(conflict.is_conflict() && !conflict.is_not_found());
    }

    #[test]
    fn test_anyhow_conversion_is_internal() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(err, AppError::Internal("boom".to_string()));
    }
}
