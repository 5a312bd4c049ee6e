use crate::db::DbResult;
use crate::models::product::Price;
use crate::models::types::{CurrencyId, ItemId, PriceCurrencyId, PriceId, PriceItemId, ProductId};

#[async_trait::async_trait]
pub trait PriceRepo: Send + Sync {
    async fn create(&self, product_id: ProductId) -> DbResult<Price>;
    async fn get(&self, id: PriceId) -> DbResult<Option<Price>>;
    async fn delete(&self, id: PriceId) -> DbResult<()>;
    async fn list_for_product(&self, product_id: ProductId) -> DbResult<Vec<Price>>;

    async fn attach_item(&self, price_id: PriceId, item_id: ItemId, amount: i64) -> DbResult<PriceItemId>;

    /// Returns the price the line belonged to
    async fn detach_item(&self, id: PriceItemId) -> DbResult<PriceId>;

    async fn attach_currency(&self, price_id: PriceId, currency_id: CurrencyId, amount: i64)
    -> DbResult<PriceCurrencyId>;

    async fn detach_currency(&self, id: PriceCurrencyId) -> DbResult<PriceId>;
}
