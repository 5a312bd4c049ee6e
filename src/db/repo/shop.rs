use crate::db::DbResult;
use crate::models::page::PageWindow;
use crate::models::shop::{NewShop, Shop, ShopSummary};
use crate::models::types::{EntityPatch, ProductId, ShopId, ShopProductId};

#[async_trait::async_trait]
pub trait ShopRepo: Send + Sync {
    async fn create(&self, new: NewShop) -> DbResult<Shop>;
    async fn update(&self, id: ShopId, patch: EntityPatch) -> DbResult<Shop>;

    /// Shop with every offered product fully assembled
    async fn get(&self, id: ShopId) -> DbResult<Option<Shop>>;

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ShopSummary>, i64)>;
    async fn attach_product(&self, shop_id: ShopId, product_id: ProductId) -> DbResult<ShopProductId>;

    /// Returns the shop the link belonged to
    async fn detach_product(&self, id: ShopProductId) -> DbResult<ShopId>;
}
