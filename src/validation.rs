//! Validation module for catalog writes
//!
//! Input checks shared by the ingredient and recipe use cases:
//!
//! - Ingredient and recipe names
//! - Ingredient usage quantities

use crate::errors::{AppError, AppResult};

/// Width of the `name` columns
pub const MAX_NAME_LENGTH: usize = 255;

/// Largest value a `NUMERIC(5,2)` quantity can hold
pub const MAX_QUANTITY: f64 = 999.99;

/// Validates an ingredient or recipe name
///
/// # Arguments
/// * `field` - Field label used in the error message
/// * `name` - The name to validate
///
/// # Examples
/// ```
/// use recipe_catalog::validation::validate_name;
///
/// assert!(validate_name("ingredient name", "Egg").is_ok());
/// assert!(validate_name("ingredient name", "   ").is_err());
/// assert!(validate_name("recipe name", &"a".repeat(256)).is_err());
/// assert!(validate_name("recipe name", "Bad\0").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }

    if name.contains('\0') {
        return Err(AppError::Validation(format!(
            "{field} cannot contain NUL characters"
        )));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "{field} cannot be longer than {MAX_NAME_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Validates the quantity of an ingredient usage
///
/// Quantities are stored with two fractional digits, so anything that
/// would not fit `NUMERIC(5,2)` after rounding is rejected here.
///
/// # Examples
/// ```
/// use recipe_catalog::validation::validate_quantity;
///
/// assert!(validate_quantity(2.0).is_ok());
/// assert!(validate_quantity(-1.0).is_err());
/// assert!(validate_quantity(f64::NAN).is_err());
/// ```
pub fn validate_quantity(quantity: f64) -> AppResult<()> {
    if !quantity.is_finite() {
        return Err(AppError::Validation(
            "Quantity must be a finite number".to_string(),
        ));
    }

    if quantity < 0.0 {
        return Err(AppError::Validation(
            "Quantity cannot be negative".to_string(),
        ));
    }

    if round_quantity(quantity) > MAX_QUANTITY {
        return Err(AppError::Validation(format!(
            "Quantity cannot be greater than {MAX_QUANTITY}"
        )));
    }

    Ok(())
}

/// Round a quantity to the two fractional digits the store keeps
pub fn round_quantity(quantity: f64) -> f64 {
    (quantity * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("ingredient name", "Salt").is_ok());
        assert!(validate_name("ingredient name", " Salt ").is_ok());
        assert!(validate_name("ingredient name", &"é".repeat(255)).is_ok());

        let err = validate_name("ingredient name", "").unwrap_err();
        assert_eq!(
            err,
            AppError::Validation("ingredient name cannot be empty".to_string())
        );
        assert!(validate_name("recipe name", "\t\n").is_err());
        assert!(validate_name("recipe name", &"a".repeat(256)).is_err());

        // Postgres text cannot hold NUL
        let err = validate_name("ingredient name", "Bad\0").unwrap_err();
        assert_eq!(
            err,
            AppError::Validation("ingredient name cannot contain NUL characters".to_string())
        );
        assert!(validate_name("recipe name", "\0").is_err());
    }

    #[test]
    fn test_validate_quantity_bounds() {
        assert!(validate_quantity(0.0).is_ok());
        assert!(validate_quantity(0.5).is_ok());
        assert!(validate_quantity(999.99).is_ok());
        assert!(validate_quantity(999.994).is_ok());

        assert!(validate_quantity(999.996).is_err());
        assert!(validate_quantity(1000.0).is_err());
        assert!(validate_quantity(-0.01).is_err());
        assert!(validate_quantity(f64::INFINITY).is_err());
        assert!(validate_quantity(f64::NAN).is_err());
    }

    #[test]
    fn test_round_quantity() {
        assert_eq!(round_quantity(2.0), 2.0);
        assert_eq!(round_quantity(0.499), 0.5);
        assert_eq!(round_quantity(1.234), 1.23);
    }
}
