//! # Test Helper Library
//!
//! Common setup for the database-backed tests. Tests share one database and
//! run in parallel, so every record they create carries a unique suffix and
//! no test drops tables.

#![allow(dead_code)]

use anyhow::{Context, Result};
use recipe_catalog::db;
use sqlx::PgPool;
use std::env;

/// Helper macro to skip tests when database is not available
#[allow(unused_macros)]
macro_rules! skip_if_no_db {
    ($test_fn:expr) => {
        match crate::test_helpers::setup_test_db().await {
            Ok(pool) => $test_fn(&pool).await,
            Err(_) => {
                eprintln!("Skipping test: Database not available");
                Ok(())
            }
        }
    };
}

/// Connect to `DATABASE_URL` and make sure the schema exists
pub async fn setup_test_db() -> Result<PgPool> {
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping database tests: DATABASE_URL not set");
            return Err(anyhow::anyhow!("Test database not configured"));
        }
    };

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to test database")?;

    db::init_database_schema(&pool).await?;

    Ok(pool)
}

/// A name no other test run will produce
pub fn unique(base: &str) -> String {
    format!("{base} {:016x}", rand::random::<u64>())
}
