use crate::db::DbResult;
use crate::models::item::{Item, NewItem};
use crate::models::page::PageWindow;
use crate::models::types::{EntityPatch, ItemId};

#[async_trait::async_trait]
pub trait ItemRepo: Send + Sync {
    async fn create(&self, new: NewItem) -> DbResult<Item>;

    /// Fails with `NotFound` when the item does not exist
    async fn update(&self, id: ItemId, patch: EntityPatch) -> DbResult<Item>;

    async fn get(&self, id: ItemId) -> DbResult<Option<Item>>;

    /// Newest first, together with the total number of items
    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Item>, i64)>;

    /// Case-insensitive regex match on the name
    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<Item>, i64)>;
}
