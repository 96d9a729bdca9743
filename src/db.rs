use sqlx::{postgres::PgPoolOptions, PgPool};
use crate::config::Config;

pub type Db = PgPool;

/// Build the connection pool lazily: a missing or wrong database
/// configuration must not crash startup — the first real query surfaces
/// the connection failure to its caller instead.
pub fn connect_lazy(config: &Config) -> anyhow::Result<Db> {
    let url = format!(
        "postgres://{}:{}@{}:{}/{}",
        config.db_user,
        config.db_password,
        config.db_host,
        config.db_port,
        config.db_name,
    );

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_lazy(&url)?;

    tracing::info!("Database connection pool created");
    Ok(pool)
}

/// Run all SQLx migrations from the `migrations/` directory embedded at compile time.
pub async fn run_migrations(pool: &Db) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
