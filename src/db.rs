use sqlx::{Pool, Postgres};

pub type DbPool = Pool<Postgres>;

/// Connects to Postgres and applies the embedded schema migrations.
pub async fn init_db(database_url: &str) -> anyhow::Result<DbPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}
