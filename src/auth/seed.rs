use crate::auth::hash_password;
use crate::config::Config;
use crate::db::Db;

/// Seeds the administrator account.
/// Safe to call on every startup — existence is checked before inserting.
pub async fn seed_admin(pool: &Db, config: &Config) -> anyhow::Result<()> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND role = 'admin')",
    )
    .bind(&config.admin_username)
    .fetch_one(pool)
    .await?;

    if exists {
        return Ok(());
    }

    let hash = hash_password(&config.admin_password)?;
    sqlx::query(
        "INSERT INTO users (username, password_hash, full_name, role, is_active)
         VALUES ($1, $2, 'Primary Administrator', 'admin', TRUE)
         ON CONFLICT (username) DO NOTHING",
    )
    .bind(&config.admin_username)
    .bind(hash)
    .execute(pool)
    .await?;

    tracing::info!(username = %config.admin_username, "Seeded admin account");
    Ok(())
}
