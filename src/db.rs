use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::entities::{Ingredient, NewRecipeIngredient, Recipe, RecipeIngredient};
use crate::errors::{AppError, AppResult};
use crate::validation::round_quantity;

/// Serializes concurrent schema bootstraps across processes
const SCHEMA_LOCK_KEY: i64 = 0x5245_4349_5045;

const INGREDIENT_COLUMNS: &str = "id, name, description, created_at, updated_at";
const RECIPE_COLUMNS: &str = "id, name, elaboration, created_at, updated_at";

/// A recipe row before its ingredient list is attached
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRecord {
    pub id: i64,
    pub name: String,
    pub elaboration: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipeRecord {
    pub fn into_recipe(self, ingredients: Vec<RecipeIngredient>) -> Recipe {
        Recipe {
            id: self.id,
            name: self.name,
            elaboration: self.elaboration,
            ingredients,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::Database(format!("{context}: {e}"))
}

fn ingredient_from_row(row: &PgRow) -> Ingredient {
    Ingredient {
        id: row.get(0),
        name: row.get(1),
        description: row.get(2),
        created_at: row.get(3),
        updated_at: row.get(4),
    }
}

fn recipe_from_row(row: &PgRow) -> RecipeRecord {
    RecipeRecord {
        id: row.get(0),
        name: row.get(1),
        elaboration: row.get(2),
        created_at: row.get(3),
        updated_at: row.get(4),
    }
}

/// Build the connection pool from configuration
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(secs) = config.max_lifetime_secs {
        options = options.max_lifetime(Duration::from_secs(secs));
    }
    if let Some(secs) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(secs));
    }

    let pool = options
        .connect(&config.url)
        .await
        .context("Failed to connect to database")?;

    info!(
        max_connections = %config.max_connections,
        "Database connection pool created"
    );
    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema");

    let mut tx = pool.begin().await.context("Failed to begin schema transaction")?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await
        .context("Failed to acquire schema lock")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ingredients (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to create ingredients table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS recipes (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            elaboration TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to create recipes table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS recipe_ingredients (
            id BIGSERIAL PRIMARY KEY,
            recipe_id BIGINT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            ingredient_id BIGINT NOT NULL REFERENCES ingredients(id) ON DELETE CASCADE,
            quantity NUMERIC(5,2) NOT NULL
        )",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to create recipe_ingredients table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ingredients_name_idx ON ingredients(name)")
        .execute(&mut *tx)
        .await
        .context("Failed to create ingredients name index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS recipes_name_idx ON recipes(name)")
        .execute(&mut *tx)
        .await
        .context("Failed to create recipes name index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS recipe_ingredients_recipe_id_idx ON recipe_ingredients(recipe_id)",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to create recipe_ingredients recipe_id index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS recipe_ingredients_ingredient_id_idx ON recipe_ingredients(ingredient_id)",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to create recipe_ingredients ingredient_id index")?;

    tx.commit().await.context("Failed to commit schema")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Count stored ingredients and recipes
pub async fn catalog_counts(pool: &PgPool) -> Result<(i64, i64)> {
    let row = sqlx::query(
        "SELECT (SELECT COUNT(*) FROM ingredients), (SELECT COUNT(*) FROM recipes)",
    )
    .fetch_one(pool)
    .await
    .context("Failed to count catalog rows")?;

    Ok((row.get(0), row.get(1)))
}

/// Insert an ingredient row
pub async fn insert_ingredient(
    conn: &mut PgConnection,
    name: &str,
    description: &str,
) -> AppResult<Ingredient> {
    debug!(name = %name, "Inserting ingredient");

    let row = sqlx::query(&format!(
        "INSERT INTO ingredients (name, description) VALUES ($1, $2) RETURNING {INGREDIENT_COLUMNS}"
    ))
    .bind(name)
    .bind(description)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err("Failed to insert new ingredient"))?;

    let ingredient = ingredient_from_row(&row);
    debug!(ingredient_id = %ingredient.id, "Ingredient inserted");
    Ok(ingredient)
}

/// Read a single ingredient by ID
pub async fn find_ingredient_by_id(
    conn: &mut PgConnection,
    ingredient_id: i64,
) -> AppResult<Option<Ingredient>> {
    let row = sqlx::query(&format!(
        "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = $1"
    ))
    .bind(ingredient_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err("Failed to fetch ingredient"))?;

    Ok(row.as_ref().map(ingredient_from_row))
}

/// Read the lowest-id ingredient with exactly this name
pub async fn find_ingredient_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> AppResult<Option<Ingredient>> {
    let row = sqlx::query(&format!(
        "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE name = $1 ORDER BY id LIMIT 1"
    ))
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err("Failed to fetch ingredient by name"))?;

    Ok(row.as_ref().map(ingredient_from_row))
}

/// List every ingredient by ascending ID
pub async fn list_ingredients(conn: &mut PgConnection) -> AppResult<Vec<Ingredient>> {
    let rows = sqlx::query(&format!(
        "SELECT {INGREDIENT_COLUMNS} FROM ingredients ORDER BY id"
    ))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err("Failed to list ingredients"))?;

    Ok(rows.iter().map(ingredient_from_row).collect())
}

/// Lock an ingredient row for the rest of the transaction
///
/// Returns `false` when no such row exists.
pub async fn lock_ingredient(conn: &mut PgConnection, ingredient_id: i64) -> AppResult<bool> {
    let row = sqlx::query("SELECT id FROM ingredients WHERE id = $1 FOR UPDATE")
        .bind(ingredient_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to lock ingredient"))?;

    Ok(row.is_some())
}

/// Whether an ingredient other than `exclude_id` already uses `name`
pub async fn ingredient_name_taken(
    conn: &mut PgConnection,
    name: &str,
    exclude_id: i64,
) -> AppResult<bool> {
    let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM ingredients WHERE name = $1 AND id <> $2)")
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("Failed to check ingredient name"))?;

    Ok(row.get(0))
}

/// Overwrite an ingredient's name, and its description when one is given
pub async fn update_ingredient_row(
    conn: &mut PgConnection,
    ingredient_id: i64,
    name: &str,
    description: Option<&str>,
) -> AppResult<Option<Ingredient>> {
    let row = sqlx::query(&format!(
        "UPDATE ingredients SET name = $1, description = COALESCE($2, description), updated_at = CURRENT_TIMESTAMP WHERE id = $3 RETURNING {INGREDIENT_COLUMNS}"
    ))
    .bind(name)
    .bind(description)
    .bind(ingredient_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err("Failed to update ingredient"))?;

    Ok(row.as_ref().map(ingredient_from_row))
}

/// Delete an ingredient row, returning whether it existed
pub async fn delete_ingredient_row(conn: &mut PgConnection, ingredient_id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(ingredient_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err("Failed to delete ingredient"))?;

    Ok(result.rows_affected() > 0)
}

/// Delete a set of ingredient rows
pub async fn delete_ingredient_rows(conn: &mut PgConnection, ingredient_ids: &[i64]) -> AppResult<u64> {
    if ingredient_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query("DELETE FROM ingredients WHERE id = ANY($1)")
        .bind(ingredient_ids)
        .execute(&mut *conn)
        .await
        .map_err(db_err("Failed to delete recipe ingredients"))?;

    Ok(result.rows_affected())
}

/// Insert a recipe row without ingredients
pub async fn insert_recipe(
    conn: &mut PgConnection,
    name: &str,
    elaboration: &str,
) -> AppResult<RecipeRecord> {
    debug!(name = %name, "Inserting recipe");

    let row = sqlx::query(&format!(
        "INSERT INTO recipes (name, elaboration) VALUES ($1, $2) RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(name)
    .bind(elaboration)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err("Failed to insert new recipe"))?;

    let record = recipe_from_row(&row);
    debug!(recipe_id = %record.id, "Recipe inserted");
    Ok(record)
}

/// Read a recipe row by ID
pub async fn find_recipe_by_id(
    conn: &mut PgConnection,
    recipe_id: i64,
) -> AppResult<Option<RecipeRecord>> {
    let row = sqlx::query(&format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"))
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to read recipe"))?;

    Ok(row.as_ref().map(recipe_from_row))
}

/// Read the lowest-id recipe with exactly this name
pub async fn find_recipe_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> AppResult<Option<RecipeRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE name = $1 ORDER BY id LIMIT 1"
    ))
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err("Failed to read recipe by name"))?;

    Ok(row.as_ref().map(recipe_from_row))
}

/// List every recipe row by ascending ID
pub async fn list_recipes(conn: &mut PgConnection) -> AppResult<Vec<RecipeRecord>> {
    let rows = sqlx::query(&format!("SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY id"))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err("Failed to list recipes"))?;

    Ok(rows.iter().map(recipe_from_row).collect())
}

/// Lock a recipe row for the rest of the transaction
pub async fn lock_recipe(conn: &mut PgConnection, recipe_id: i64) -> AppResult<bool> {
    let row = sqlx::query("SELECT id FROM recipes WHERE id = $1 FOR UPDATE")
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to lock recipe"))?;

    Ok(row.is_some())
}

/// Overwrite a recipe's name and elaboration
pub async fn update_recipe_row(
    conn: &mut PgConnection,
    recipe_id: i64,
    name: &str,
    elaboration: &str,
) -> AppResult<Option<RecipeRecord>> {
    let row = sqlx::query(&format!(
        "UPDATE recipes SET name = $1, elaboration = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(name)
    .bind(elaboration)
    .bind(recipe_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err("Failed to update recipe"))?;

    Ok(row.as_ref().map(recipe_from_row))
}

/// Delete a recipe row, returning whether it existed
pub async fn delete_recipe_row(conn: &mut PgConnection, recipe_id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err("Failed to delete recipe"))?;

    Ok(result.rows_affected() > 0)
}

/// Link an ingredient to a recipe at a quantity, returning the link ID
pub async fn insert_link(
    conn: &mut PgConnection,
    recipe_id: i64,
    ingredient_id: i64,
    quantity: f64,
) -> AppResult<i64> {
    let row = sqlx::query(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity) VALUES ($1, $2, $3::NUMERIC(5,2)) RETURNING id",
    )
    .bind(recipe_id)
    .bind(ingredient_id)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err("Failed to link ingredient to recipe"))?;

    Ok(row.get(0))
}

/// IDs of the ingredients a recipe's links point to
pub async fn linked_ingredient_ids(conn: &mut PgConnection, recipe_id: i64) -> AppResult<Vec<i64>> {
    let rows = sqlx::query(
        "SELECT ingredient_id FROM recipe_ingredients WHERE recipe_id = $1 ORDER BY id",
    )
    .bind(recipe_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err("Failed to read recipe links"))?;

    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// Delete every link of a recipe
pub async fn delete_links(conn: &mut PgConnection, recipe_id: i64) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err("Failed to delete recipe links"))?;

    Ok(result.rows_affected())
}

/// Count the links still pointing at a recipe
pub async fn count_links(conn: &mut PgConnection, recipe_id: i64) -> AppResult<i64> {
    let row = sqlx::query("SELECT COUNT(*) FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("Failed to count recipe links"))?;

    Ok(row.get(0))
}

/// Ingredient usages of several recipes, as `(recipe_id, usage)` pairs
/// ordered by recipe and then by link insertion order
pub async fn fetch_recipe_ingredients(
    conn: &mut PgConnection,
    recipe_ids: &[i64],
) -> AppResult<Vec<(i64, RecipeIngredient)>> {
    if recipe_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        "SELECT ri.recipe_id, ri.id, i.name, ri.quantity::FLOAT8
         FROM recipe_ingredients ri
         JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE ri.recipe_id = ANY($1)
         ORDER BY ri.recipe_id, ri.id",
    )
    .bind(recipe_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err("Failed to read recipe ingredients"))?;

    Ok(rows
        .iter()
        .map(|row| {
            (
                row.get(0),
                RecipeIngredient {
                    link_id: row.get(1),
                    ingredient_name: row.get(2),
                    quantity: row.get(3),
                },
            )
        })
        .collect())
}


/// Store one fresh ingredient row and one link per usage
pub async fn insert_usages(
    conn: &mut PgConnection,
    recipe_id: i64,
    usages: &[NewRecipeIngredient],
) -> AppResult<()> {
    for usage in usages {
        let ingredient = insert_ingredient(&mut *conn, &usage.name, "").await?;
        let link_id = insert_link(
            &mut *conn,
            recipe_id,
            ingredient.id,
            round_quantity(usage.quantity),
        )
        .await?;
        debug!(recipe_id = %recipe_id, link_id = %link_id, ingredient = %usage.name, "Linked ingredient");
    }
    Ok(())
}

/// Remove every link of a recipe together with the ingredient rows it owns
pub async fn remove_usages(conn: &mut PgConnection, recipe_id: i64) -> AppResult<()> {
    let ingredient_ids = linked_ingredient_ids(&mut *conn, recipe_id).await?;
    let links = delete_links(&mut *conn, recipe_id).await?;
    let ingredients = delete_ingredient_rows(&mut *conn, &ingredient_ids).await?;

    debug!(
        recipe_id = %recipe_id,
        links_deleted = %links,
        ingredients_deleted = %ingredients,
        "Removed recipe ingredients"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_into_recipe_keeps_fields() {
        let now = Utc::now();
        let record = RecipeRecord {
            id: 4,
            name: "Omelette".to_string(),
            elaboration: "Beat and fry".to_string(),
            created_at: now,
            updated_at: now,
        };
        let usage = RecipeIngredient {
            link_id: 9,
            ingredient_name: "Egg".to_string(),
            quantity: 2.0,
        };

        let recipe = record.into_recipe(vec![usage.clone()]);
        assert_eq!(recipe.id, 4);
        assert_eq!(recipe.name, "Omelette");
        assert_eq!(recipe.elaboration, "Beat and fry");
        assert_eq!(recipe.ingredients, vec![usage]);
    }

    #[test]
    fn test_db_err_keeps_context() {
        let err = db_err("Failed to read recipe")(sqlx::Error::RowNotFound);
        match err {
            AppError::Database(msg) => assert!(msg.starts_with("Failed to read recipe: ")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
