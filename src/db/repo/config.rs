use crate::db::DbResult;
use crate::models::config_entry::ConfigEntry;
use crate::models::page::PageWindow;

#[async_trait::async_trait]
pub trait ConfigRepo: Send + Sync {
    async fn get(&self, key: &str) -> DbResult<Option<ConfigEntry>>;

    /// Insert the key or overwrite its value
    async fn set(&self, key: &str, value: &str) -> DbResult<ConfigEntry>;

    /// Ordered by key, together with the total number of keys
    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ConfigEntry>, i64)>;
}
