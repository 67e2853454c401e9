//! # Recipe Catalog
//!
//! Use cases for creating, reading, updating and deleting ingredients and
//! recipes stored in PostgreSQL. Request handling lives outside this crate
//! and calls into [`usecases`].

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod observability;
pub mod observability_config;
pub mod repository;
pub mod usecases;
pub mod validation;

// Re-export types for easier access
pub use entities::{Ingredient, NewRecipe, NewRecipeIngredient, Recipe, RecipeIngredient};
pub use errors::{AppError, AppResult};
pub use repository::IngredientRepository;
