//! Read-only ingredient access for callers that hold a pool handle rather
//! than calling the use cases directly.

use sqlx::PgPool;

use crate::entities::Ingredient;
use crate::errors::AppResult;
use crate::usecases::ingredients;

/// Narrow ingredient lookup bound to a connection pool
#[derive(Debug, Clone)]
pub struct IngredientRepository {
    pool: PgPool,
}

impl IngredientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Same contract as [`ingredients::get_by_name`]
    pub async fn get_by_name(&self, name: &str) -> AppResult<Option<Ingredient>> {
        ingredients::get_by_name(&self.pool, name).await
    }
}
