use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod setup;

pub async fn postgres_persistence(database_url: &str) -> anyhow::Result<PostgresPersistence> {
    let pool = init_db(database_url).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
