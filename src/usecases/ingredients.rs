//! Ingredient use cases.
//!
//! Names are not unique on creation; uniqueness is only enforced when an
//! ingredient is renamed through [`update`].

use sqlx::PgPool;
use tracing::{debug, info};

use crate::db;
use crate::entities::Ingredient;
use crate::errors::error_logging::log_validation_error;
use crate::errors::{AppError, AppResult};
use crate::usecases::observed;
use crate::validation::validate_name;

const TABLE: &str = "ingredients";

fn check_name(operation: &str, name: &str) -> AppResult<()> {
    validate_name("Ingredient name", name)
        .inspect_err(|e| log_validation_error(e, operation, "ingredient_name", Some(name)))
}

fn not_found(ingredient_id: i64) -> AppError {
    AppError::NotFound(format!("Ingredient {ingredient_id} not found"))
}

/// Create and store a new ingredient
pub async fn create(pool: &PgPool, name: &str, description: &str) -> AppResult<Ingredient> {
    observed("ingredients.create", TABLE, async {
        check_name("ingredients.create", name)?;

        let mut conn = pool.acquire().await?;
        let ingredient = db::insert_ingredient(&mut *conn, name, description).await?;

        info!(ingredient_id = %ingredient.id, "Ingredient created");
        Ok::<_, AppError>(ingredient)
    })
    .await
}

/// Look up an ingredient by exact name
///
/// When several ingredients share the name, the oldest one is returned.
pub async fn get_by_name(pool: &PgPool, name: &str) -> AppResult<Option<Ingredient>> {
    observed("ingredients.get_by_name", TABLE, async {
        // Stored names never contain NUL
        if name.contains('\0') {
            return Ok(None);
        }

        let mut conn = pool.acquire().await?;
        let ingredient = db::find_ingredient_by_name(&mut *conn, name).await?;

        debug!(name = %name, found = %ingredient.is_some(), "Ingredient lookup by name");
        Ok::<_, AppError>(ingredient)
    })
    .await
}

/// Look up an ingredient by ID
pub async fn get_by_id(pool: &PgPool, ingredient_id: i64) -> AppResult<Option<Ingredient>> {
    observed("ingredients.get_by_id", TABLE, async {
        let mut conn = pool.acquire().await?;
        let ingredient = db::find_ingredient_by_id(&mut *conn, ingredient_id).await?;

        debug!(ingredient_id = %ingredient_id, found = %ingredient.is_some(), "Ingredient lookup by ID");
        Ok::<_, AppError>(ingredient)
    })
    .await
}

/// List all ingredients by ascending ID
pub async fn get_all(pool: &PgPool) -> AppResult<Vec<Ingredient>> {
    observed("ingredients.get_all", TABLE, async {
        let mut conn = pool.acquire().await?;
        let ingredients = db::list_ingredients(&mut *conn).await?;

        debug!(count = %ingredients.len(), "Listed ingredients");
        Ok::<_, AppError>(ingredients)
    })
    .await
}

/// Rename an ingredient and optionally replace its description
///
/// Fails with [`AppError::NotFound`] when the ingredient does not exist,
/// before `new_name` is validated, and with [`AppError::Conflict`] when a
/// different ingredient already has `new_name`. A `None` description keeps
/// the stored one.
pub async fn update(
    pool: &PgPool,
    ingredient_id: i64,
    new_name: &str,
    new_description: Option<&str>,
) -> AppResult<Ingredient> {
    observed("ingredients.update", TABLE, async {
        let mut tx = pool.begin().await?;

        if !db::lock_ingredient(&mut *tx, ingredient_id).await? {
            info!(ingredient_id = %ingredient_id, "No ingredient to update");
            return Err(not_found(ingredient_id));
        }

        check_name("ingredients.update", new_name)?;

        if db::ingredient_name_taken(&mut *tx, new_name, ingredient_id).await? {
            info!(ingredient_id = %ingredient_id, name = %new_name, "Ingredient name already in use");
            return Err(AppError::Conflict(
                "An ingredient with the same name already exists".to_string(),
            ));
        }

        let ingredient = db::update_ingredient_row(&mut *tx, ingredient_id, new_name, new_description)
            .await?
            .ok_or_else(|| not_found(ingredient_id))?;

        tx.commit().await?;

        info!(ingredient_id = %ingredient_id, "Ingredient updated");
        Ok::<_, AppError>(ingredient)
    })
    .await
}

/// Delete an ingredient
///
/// Recipe links that still reference it are removed by the cascade.
pub async fn delete(pool: &PgPool, ingredient_id: i64) -> AppResult<()> {
    observed("ingredients.delete", TABLE, async {
        let mut conn = pool.acquire().await?;

        if !db::delete_ingredient_row(&mut *conn, ingredient_id).await? {
            info!(ingredient_id = %ingredient_id, "No ingredient to delete");
            return Err(not_found(ingredient_id));
        }

        info!(ingredient_id = %ingredient_id, "Ingredient deleted");
        Ok::<_, AppError>(())
    })
    .await
}
