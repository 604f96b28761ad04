mod directory;
mod memory;
mod postgres;

pub use directory::Directory;
pub use memory::MemoryDirectory;
pub use postgres::PgDirectory;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let pg = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");

        Ok(Self { pg })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    pub fn directory(&self) -> PgDirectory {
        PgDirectory::new(self.pg.clone())
    }
}
