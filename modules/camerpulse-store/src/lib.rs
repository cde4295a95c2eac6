//! Postgres persistence for autonomous poll generation.

pub mod store;

pub use store::{PulseStore, GENERATION_LOCK_KEY};

/// Apply the embedded migrations.
pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
