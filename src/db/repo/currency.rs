use crate::db::DbResult;
use crate::models::currency::{Currency, CurrencyPatch, NewCurrency};
use crate::models::page::PageWindow;
use crate::models::types::CurrencyId;

#[async_trait::async_trait]
pub trait CurrencyRepo: Send + Sync {
    async fn create(&self, new: NewCurrency) -> DbResult<Currency>;
    async fn update(&self, id: CurrencyId, patch: CurrencyPatch) -> DbResult<Currency>;
    async fn get(&self, id: CurrencyId) -> DbResult<Option<Currency>>;
    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Currency>, i64)>;
}
