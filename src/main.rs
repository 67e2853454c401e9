use anyhow::Result;
use recipe_catalog::config::AppConfig;
use recipe_catalog::db;
use recipe_catalog::errors::error_logging::log_config_error;
use recipe_catalog::observability;
use tracing::{debug, info};

/// Prepare the catalog store: validate configuration, connect, create the
/// schema and report what is stored.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let metrics_handle = observability::init_observability(&config.observability)?;

    if let Err(e) = config.validate() {
        log_config_error(&e, "database", "startup");
        return Err(e.into());
    }
    info!("{}", config.summary());

    let pool = db::connect(&config.database).await?;
    db::init_database_schema(&pool).await?;
    observability::check_database_health(&pool).await?;

    let (ingredients, recipes) = db::catalog_counts(&pool).await?;
    info!(
        ingredients = %ingredients,
        recipes = %recipes,
        "Recipe catalog store ready"
    );

    if let Some(handle) = metrics_handle {
        debug!(metrics = %handle.render(), "Startup metrics");
    }

    pool.close().await;
    Ok(())
}
