use crate::db::DbResult;
use crate::models::page::PageWindow;
use crate::models::player::{NewPlayer, Player};
use crate::models::types::{EntityPatch, PlayerId};

#[async_trait::async_trait]
pub trait PlayerRepo: Send + Sync {
    async fn create(&self, new: NewPlayer) -> DbResult<Player>;
    async fn update(&self, id: PlayerId, patch: EntityPatch) -> DbResult<Player>;

    /// Player with the id and name of each storage it owns
    async fn get(&self, id: PlayerId) -> DbResult<Option<Player>>;

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Player>, i64)>;
    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<Player>, i64)>;
}
