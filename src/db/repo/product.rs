use crate::db::DbResult;
use crate::models::page::PageWindow;
use crate::models::product::{Product, ProductSummary};
use crate::models::types::{CurrencyId, ItemId, ProductCurrencyId, ProductId, ProductItemId};

#[async_trait::async_trait]
pub trait ProductRepo: Send + Sync {
    async fn create(&self, name: &str) -> DbResult<Product>;
    async fn update(&self, id: ProductId, name: &str) -> DbResult<Product>;

    /// Product with its reward basket and every price
    async fn get(&self, id: ProductId) -> DbResult<Option<Product>>;

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ProductSummary>, i64)>;
    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<ProductSummary>, i64)>;

    async fn attach_item(&self, product_id: ProductId, item_id: ItemId, amount: i64) -> DbResult<ProductItemId>;

    /// Returns the product the line belonged to
    async fn detach_item(&self, id: ProductItemId) -> DbResult<ProductId>;

    async fn attach_currency(
        &self,
        product_id: ProductId,
        currency_id: CurrencyId,
        amount: i64,
    ) -> DbResult<ProductCurrencyId>;

    async fn detach_currency(&self, id: ProductCurrencyId) -> DbResult<ProductId>;
}
