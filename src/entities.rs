//! Plain data records for the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named consumable item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One ingredient usage inside a recipe, reconstructed from a join row.
///
/// `link_id` is the id of the join row, not of the ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub link_id: i64,
    pub ingredient_name: String,
    pub quantity: f64,
}

/// Ingredient usage as supplied by a caller writing a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipeIngredient {
    pub name: String,
    pub quantity: f64,
}

impl NewRecipeIngredient {
    pub fn new(name: impl Into<String>, quantity: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// A persisted recipe with its ingredient list in link insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub elaboration: String,
    pub ingredients: Vec<RecipeIngredient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A recipe that has been constructed but not stored yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    pub ingredients: Vec<NewRecipeIngredient>,
    pub elaboration: String,
}
