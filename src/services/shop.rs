use crate::db::repo::{ProductRepo, ShopRepo};
use crate::error::{AppResult, DomainError};
use crate::models::page::{Page, PageRequest};
use crate::models::shop::{NewShop, Shop, ShopSummary};
use crate::models::types::{EntityPatch, ProductId, ShopId, ShopProductId, parse_id};
use crate::services::require_name;
use crate::util::paging;
use std::sync::Arc;

pub struct ShopService {
    shops: Arc<dyn ShopRepo>,
    products: Arc<dyn ProductRepo>,
    page_size: i64,
}

impl ShopService {
    pub fn new(shops: Arc<dyn ShopRepo>, products: Arc<dyn ProductRepo>, page_size: i64) -> Self {
        Self {
            shops,
            products,
            page_size,
        }
    }

    pub async fn create(&self, new: NewShop) -> AppResult<Shop> {
        require_name(&new.name)?;
        let shop = self
            .shops
            .create(new)
            .await
            .map_err(DomainError::internal("unable to create shop"))?;
        tracing::info!(shop_id = %shop.id, name = %shop.name, "shop created");
        Ok(shop)
    }

    pub async fn update(&self, shop_id: &str, patch: EntityPatch) -> AppResult<Shop> {
        let id: ShopId = parse_id("shop_id", shop_id)?;
        if patch.is_empty() {
            return Err(DomainError::invalid("nothing to update"));
        }
        if let Some(name) = &patch.name {
            require_name(name)?;
        }
        self.shops
            .update(id, patch)
            .await
            .map_err(DomainError::lookup("shop not found", "unable to update shop"))
    }

    pub async fn get(&self, shop_id: &str) -> AppResult<Shop> {
        let id: ShopId = parse_id("shop_id", shop_id)?;
        self.fetch(id).await
    }

    pub async fn list(&self, req: &PageRequest) -> AppResult<Page<ShopSummary>> {
        let w = paging::window(req, self.page_size);
        let (shops, total) = self
            .shops
            .list(w)
            .await
            .map_err(DomainError::internal("unable to list shops"))?;
        Ok(paging::page(shops, total, w))
    }

    pub async fn attach_product(&self, shop_id: &str, product_id: &str) -> AppResult<Shop> {
        let shop_id: ShopId = parse_id("shop_id", shop_id)?;
        let product_id: ProductId = parse_id("product_id", product_id)?;

        self.fetch(shop_id).await?;
        self.products
            .get(product_id)
            .await
            .map_err(DomainError::internal("unable to get product"))?
            .ok_or_else(|| DomainError::not_found("product not found"))?;

        self.shops
            .attach_product(shop_id, product_id)
            .await
            .map_err(DomainError::internal("unable to attach product"))?;
        self.fetch(shop_id).await
    }

    pub async fn detach_product(&self, shop_product_id: &str) -> AppResult<Shop> {
        let id: ShopProductId = parse_id("shop_product_id", shop_product_id)?;
        let shop_id = self
            .shops
            .detach_product(id)
            .await
            .map_err(DomainError::lookup("shop product not found", "unable to detach product"))?;
        self.fetch(shop_id).await
    }

    async fn fetch(&self, id: ShopId) -> AppResult<Shop> {
        self.shops
            .get(id)
            .await
            .map_err(DomainError::internal("unable to get shop"))?
            .ok_or_else(|| DomainError::not_found("shop not found"))
    }
}
