use crate::db::repo::config::ConfigRepo;
use crate::db::repo::count_rows;
use crate::db::{Db, DbResult, map_row_opt, map_rows};
use crate::models::config_entry::ConfigEntry;
use crate::models::page::PageWindow;
use std::sync::Arc;

pub struct ConfigRepository {
    db: Arc<Db>,
}

impl ConfigRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl ConfigRepo for ConfigRepository {
    async fn get(&self, key: &str) -> DbResult<Option<ConfigEntry>> {
        let client = self.db.get_client().await?;

        let stmt = client.prepare_cached("SELECT * FROM config_entry WHERE key = $1").await?;
        let row_opt = client.query_opt(&stmt, &[&key]).await?;
        map_row_opt(row_opt, ConfigEntry::try_from_row, &format!("ConfigRepo::get key={key}"))
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<ConfigEntry> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO config_entry (key, value) VALUES ($1, $2)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
                RETURNING *
                "#,
            )
            .await?;
        let row = client.query_one(&stmt, &[&key, &value]).await?;
        ConfigEntry::try_from_row(&row)
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ConfigEntry>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM config_entry ORDER BY key LIMIT $1 OFFSET $2")
            .await?;
        let rows = client.query(&stmt, &[&window.limit, &window.offset]).await?;
        let entries = map_rows(&rows, ConfigEntry::try_from_row, "ConfigRepo::list")?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM config_entry", &[]).await?;
        Ok((entries, total))
    }
}
