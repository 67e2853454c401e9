//! Recipe use cases.
//!
//! Recipe ingredients are owned by their recipe: every write stores fresh
//! ingredient rows for the recipe, and those rows are destroyed again when
//! the recipe's ingredient set is replaced or the recipe is deleted. Rows
//! are never shared between recipes or matched up by name.
//!
//! Every write spanning more than one statement runs in a single
//! transaction, so readers never observe a recipe with half of its links.

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use crate::db::{self, RecipeRecord};
use crate::entities::{NewRecipe, NewRecipeIngredient, Recipe, RecipeIngredient};
use crate::errors::error_logging::{log_recipe_error, log_validation_error};
use crate::errors::{AppError, AppResult};
use crate::usecases::observed;
use crate::validation::{validate_name, validate_quantity};

const TABLE: &str = "recipes";

fn not_found(recipe_id: i64) -> AppError {
    AppError::NotFound(format!("Recipe {recipe_id} not found"))
}

fn validate_recipe(operation: &str, name: &str, ingredients: &[NewRecipeIngredient]) -> AppResult<()> {
    validate_name("Recipe name", name)
        .inspect_err(|e| log_validation_error(e, operation, "recipe_name", Some(name)))?;

    for usage in ingredients {
        validate_name("Ingredient name", &usage.name)
            .inspect_err(|e| log_validation_error(e, operation, "ingredient_name", Some(&usage.name)))?;
        validate_quantity(usage.quantity).inspect_err(|e| {
            log_validation_error(e, operation, "quantity", Some(&usage.quantity.to_string()))
        })?;
    }

    Ok(())
}

/// Attach ingredient lists, reconstructed from the join rows, to recipe rows
async fn assemble(conn: &mut PgConnection, records: Vec<RecipeRecord>) -> AppResult<Vec<Recipe>> {
    let ids: Vec<i64> = records.iter().map(|record| record.id).collect();

    let mut usages: HashMap<i64, Vec<RecipeIngredient>> = HashMap::new();
    for (recipe_id, usage) in db::fetch_recipe_ingredients(&mut *conn, &ids).await? {
        usages.entry(recipe_id).or_default().push(usage);
    }

    Ok(records
        .into_iter()
        .map(|record| {
            let ingredients = usages.remove(&record.id).unwrap_or_default();
            record.into_recipe(ingredients)
        })
        .collect())
}

async fn assemble_one(conn: &mut PgConnection, record: Option<RecipeRecord>) -> AppResult<Option<Recipe>> {
    match record {
        Some(record) => Ok(assemble(conn, vec![record]).await?.pop()),
        None => Ok(None),
    }
}

/// Construct a recipe in memory without storing it
pub fn build(name: &str, ingredients: Vec<NewRecipeIngredient>, elaboration: &str) -> NewRecipe {
    NewRecipe {
        name: name.to_string(),
        ingredients,
        elaboration: elaboration.to_string(),
    }
}

/// Create a recipe with its ingredients and store it atomically
pub async fn create(
    pool: &PgPool,
    name: &str,
    ingredients: Vec<NewRecipeIngredient>,
    elaboration: &str,
) -> AppResult<Recipe> {
    save(pool, &build(name, ingredients, elaboration)).await
}

/// Store a recipe built with [`build`]
pub async fn save(pool: &PgPool, recipe: &NewRecipe) -> AppResult<Recipe> {
    observed("recipes.create", TABLE, async {
        validate_recipe("recipes.create", &recipe.name, &recipe.ingredients)?;

        let mut tx = pool.begin().await?;

        let record = db::insert_recipe(&mut *tx, &recipe.name, &recipe.elaboration).await?;
        let recipe_id = record.id;
        db::insert_usages(&mut *tx, recipe_id, &recipe.ingredients)
            .await
            .inspect_err(|e| {
                log_recipe_error(
                    e,
                    "recipes.create",
                    Some(recipe_id),
                    Some(&recipe.name),
                    Some(recipe.ingredients.len()),
                )
            })?;

        let stored = assemble_one(&mut *tx, Some(record))
            .await?
            .ok_or_else(|| not_found(recipe_id))?;

        tx.commit().await?;

        info!(
            recipe_id = %recipe_id,
            ingredient_count = %stored.ingredients.len(),
            "Recipe created"
        );
        Ok::<_, AppError>(stored)
    })
    .await
}

/// Look up a recipe by exact name
///
/// When several recipes share the name, the oldest one is returned.
pub async fn get_by_name(pool: &PgPool, name: &str) -> AppResult<Option<Recipe>> {
    observed("recipes.get_by_name", TABLE, async {
        // Stored names never contain NUL
        if name.contains('\0') {
            return Ok(None);
        }

        let mut conn = pool.acquire().await?;
        let record = db::find_recipe_by_name(&mut *conn, name).await?;
        let recipe = assemble_one(&mut *conn, record).await?;

        debug!(name = %name, found = %recipe.is_some(), "Recipe lookup by name");
        Ok::<_, AppError>(recipe)
    })
    .await
}

/// Look up a recipe by ID
pub async fn get_by_id(pool: &PgPool, recipe_id: i64) -> AppResult<Option<Recipe>> {
    observed("recipes.get_by_id", TABLE, async {
        let mut conn = pool.acquire().await?;
        let record = db::find_recipe_by_id(&mut *conn, recipe_id).await?;
        let recipe = assemble_one(&mut *conn, record).await?;

        debug!(recipe_id = %recipe_id, found = %recipe.is_some(), "Recipe lookup by ID");
        Ok::<_, AppError>(recipe)
    })
    .await
}

/// List all recipes by ascending ID
///
/// Store failures are returned to the caller, never an empty list.
pub async fn get_all(pool: &PgPool) -> AppResult<Vec<Recipe>> {
    observed("recipes.get_all", TABLE, async {
        let mut conn = pool.acquire().await?;
        let records = db::list_recipes(&mut *conn).await?;
        let recipes = assemble(&mut *conn, records).await?;

        debug!(count = %recipes.len(), "Listed recipes");
        Ok::<_, AppError>(recipes)
    })
    .await
}

/// Replace a recipe's name, elaboration and whole ingredient set
///
/// The previous links and the ingredient rows they owned are deleted; each
/// entry of `new_ingredients` becomes a fresh ingredient row and link. A
/// missing recipe is reported before the new values are validated.
pub async fn update(
    pool: &PgPool,
    recipe_id: i64,
    new_name: &str,
    new_ingredients: Vec<NewRecipeIngredient>,
    new_elaboration: &str,
) -> AppResult<Recipe> {
    observed("recipes.update", TABLE, async {
        let mut tx = pool.begin().await?;

        if !db::lock_recipe(&mut *tx, recipe_id).await? {
            info!(recipe_id = %recipe_id, "No recipe to update");
            return Err(not_found(recipe_id));
        }

        validate_recipe("recipes.update", new_name, &new_ingredients)?;

        let record = db::update_recipe_row(&mut *tx, recipe_id, new_name, new_elaboration)
            .await?
            .ok_or_else(|| not_found(recipe_id))?;

        db::remove_usages(&mut *tx, recipe_id).await?;
        db::insert_usages(&mut *tx, recipe_id, &new_ingredients)
            .await
            .inspect_err(|e| {
                log_recipe_error(
                    e,
                    "recipes.update",
                    Some(recipe_id),
                    Some(new_name),
                    Some(new_ingredients.len()),
                )
            })?;

        let stored = assemble_one(&mut *tx, Some(record))
            .await?
            .ok_or_else(|| not_found(recipe_id))?;

        tx.commit().await?;

        info!(
            recipe_id = %recipe_id,
            ingredient_count = %stored.ingredients.len(),
            "Recipe updated"
        );
        Ok::<_, AppError>(stored)
    })
    .await
}

/// Delete a recipe, its links and the ingredient rows it owns
pub async fn delete(pool: &PgPool, recipe_id: i64) -> AppResult<()> {
    observed("recipes.delete", TABLE, async {
        let mut tx = pool.begin().await?;

        if !db::lock_recipe(&mut *tx, recipe_id).await? {
            info!(recipe_id = %recipe_id, "No recipe to delete");
            return Err(not_found(recipe_id));
        }

        db::remove_usages(&mut *tx, recipe_id).await?;
        if !db::delete_recipe_row(&mut *tx, recipe_id).await? {
            return Err(not_found(recipe_id));
        }

        tx.commit().await?;

        info!(recipe_id = %recipe_id, "Recipe deleted");
        Ok::<_, AppError>(())
    })
    .await
}

/// Number of ingredient links stored for a recipe ID
///
/// Zero for a deleted recipe or one without ingredients. Answers without
/// loading the recipe itself.
pub async fn link_count(pool: &PgPool, recipe_id: i64) -> AppResult<i64> {
    observed("recipes.link_count", TABLE, async {
        let mut conn = pool.acquire().await?;
        let count = db::count_links(&mut *conn, recipe_id).await?;

        debug!(recipe_id = %recipe_id, links = %count, "Counted recipe links");
        Ok::<_, AppError>(count)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_keeps_usages_in_order() {
        let recipe = build(
            "Omelette",
            vec![
                NewRecipeIngredient::new("Egg", 2.0),
                NewRecipeIngredient::new("Salt", 0.5),
            ],
            "Beat and fry",
        );

        assert_eq!(recipe.name, "Omelette");
        assert_eq!(recipe.elaboration, "Beat and fry");
        let names: Vec<&str> = recipe.ingredients.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Egg", "Salt"]);
    }

    #[test]
    fn test_validate_recipe_rejects_bad_usages() {
        let ok = vec![NewRecipeIngredient::new("Egg", 2.0)];
        assert!(validate_recipe("test", "Omelette", &ok).is_ok());
        assert!(validate_recipe("test", "Omelette", &[]).is_ok());

        assert!(matches!(
            validate_recipe("test", "", &ok),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_recipe("test", "Omelette", &[NewRecipeIngredient::new(" ", 1.0)]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_recipe("test", "Omelette", &[NewRecipeIngredient::new("Egg", -2.0)]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_recipe("test", "Omelette", &[NewRecipeIngredient::new("Egg", 1000.0)]),
            Err(AppError::Validation(_))
        ));
    }
}
