use crate::db::repo::{CurrencyRepo, ItemRepo, PriceRepo, ProductRepo, StorageRepo};
use crate::error::{AppResult, DomainError};
use crate::models::page::{Page, PageRequest};
use crate::models::product::{Price, Product, ProductSummary};
use crate::models::storage::Storage;
use crate::models::types::{
    CurrencyId, ItemId, PriceId, ProductCurrencyId, ProductId, ProductItemId, StorageId, parse_id,
};
use crate::services::{apply_planned, require_name, require_positive, require_query};
use crate::stacking::{check_affordable, check_grant, plan_purchase};
use crate::util::paging;
use std::sync::Arc;

pub struct ProductService {
    products: Arc<dyn ProductRepo>,
    prices: Arc<dyn PriceRepo>,
    storages: Arc<dyn StorageRepo>,
    items: Arc<dyn ItemRepo>,
    currencies: Arc<dyn CurrencyRepo>,
    page_size: i64,
}

impl ProductService {
    pub fn new(
        products: Arc<dyn ProductRepo>,
        prices: Arc<dyn PriceRepo>,
        storages: Arc<dyn StorageRepo>,
        items: Arc<dyn ItemRepo>,
        currencies: Arc<dyn CurrencyRepo>,
        page_size: i64,
    ) -> Self {
        Self {
            products,
            prices,
            storages,
            items,
            currencies,
            page_size,
        }
    }

    pub async fn create(&self, name: &str) -> AppResult<Product> {
        require_name(name)?;
        let product = self
            .products
            .create(name)
            .await
            .map_err(DomainError::internal("unable to create product"))?;
        tracing::info!(product_id = %product.id, name, "product created");
        Ok(product)
    }

    pub async fn update(&self, product_id: &str, name: &str) -> AppResult<Product> {
        let id: ProductId = parse_id("product_id", product_id)?;
        require_name(name)?;
        self.products
            .update(id, name)
            .await
            .map_err(DomainError::lookup("product not found", "unable to update product"))
    }

    pub async fn get(&self, product_id: &str) -> AppResult<Product> {
        let id: ProductId = parse_id("product_id", product_id)?;
        self.fetch(id).await
    }

    pub async fn list(&self, req: &PageRequest) -> AppResult<Page<ProductSummary>> {
        let w = paging::window(req, self.page_size);
        let (products, total) = self
            .products
            .list(w)
            .await
            .map_err(DomainError::internal("unable to list products"))?;
        Ok(paging::page(products, total, w))
    }

    pub async fn search(&self, query: &str, req: &PageRequest) -> AppResult<Page<ProductSummary>> {
        require_query(query)?;
        let w = paging::window(req, self.page_size);
        let (products, total) = self
            .products
            .search(query, w)
            .await
            .map_err(DomainError::internal("unable to search products"))?;
        Ok(paging::page(products, total, w))
    }

    /// Add an item to the product's reward basket.
    pub async fn attach_item(&self, product_id: &str, item_id: &str, amount: i64) -> AppResult<Product> {
        let product_id: ProductId = parse_id("product_id", product_id)?;
        let item_id: ItemId = parse_id("item_id", item_id)?;
        require_positive(amount)?;

        let product = self.fetch(product_id).await?;
        let item = self
            .items
            .get(item_id)
            .await
            .map_err(DomainError::internal("unable to get item"))?
            .ok_or_else(|| DomainError::not_found("item not found"))?;

        // the basket is granted summed per item, so bound the total
        let already = product
            .reward_items()
            .into_iter()
            .find(|(i, _)| i.id == item_id)
            .map_or(0, |(_, n)| n);
        check_grant(&item, already.saturating_add(amount))?;

        self.products
            .attach_item(product_id, item_id, amount)
            .await
            .map_err(DomainError::internal("unable to attach item"))?;
        self.fetch(product_id).await
    }

    pub async fn detach_item(&self, product_item_id: &str) -> AppResult<Product> {
        let id: ProductItemId = parse_id("product_item_id", product_item_id)?;
        let product_id = self
            .products
            .detach_item(id)
            .await
            .map_err(DomainError::lookup("product item not found", "unable to detach item"))?;
        self.fetch(product_id).await
    }

    /// Add a currency to the product's reward basket.
    pub async fn attach_currency(&self, product_id: &str, currency_id: &str, amount: i64) -> AppResult<Product> {
        let product_id: ProductId = parse_id("product_id", product_id)?;
        let currency_id: CurrencyId = parse_id("currency_id", currency_id)?;
        require_positive(amount)?;

        self.fetch(product_id).await?;
        self.currencies
            .get(currency_id)
            .await
            .map_err(DomainError::internal("unable to get currency"))?
            .ok_or_else(|| DomainError::not_found("currency not found"))?;

        self.products
            .attach_currency(product_id, currency_id, amount)
            .await
            .map_err(DomainError::internal("unable to attach currency"))?;
        self.fetch(product_id).await
    }

    pub async fn detach_currency(&self, product_currency_id: &str) -> AppResult<Product> {
        let id: ProductCurrencyId = parse_id("product_currency_id", product_currency_id)?;
        let product_id = self
            .products
            .detach_currency(id)
            .await
            .map_err(DomainError::lookup("product currency not found", "unable to detach currency"))?;
        self.fetch(product_id).await
    }

    pub async fn list_prices(&self, product_id: &str) -> AppResult<Vec<Price>> {
        let id: ProductId = parse_id("product_id", product_id)?;
        self.fetch(id).await?;
        self.prices
            .list_for_product(id)
            .await
            .map_err(DomainError::internal("unable to list prices"))
    }

    /// Exchange the cost basket of one of the product's prices, taken from
    /// the paying storage, for the product's reward basket, placed into the
    /// receiving storage. Nothing is written unless the whole exchange
    /// succeeds.
    pub async fn buy(
        &self,
        product_id: &str,
        price_id: &str,
        paying_storage_id: &str,
        receiving_storage_id: &str,
    ) -> AppResult<Product> {
        let product_id: ProductId = parse_id("product_id", product_id)?;
        let price_id: PriceId = parse_id("price_id", price_id)?;
        let paying_id: StorageId = parse_id("paying_storage_id", paying_storage_id)?;
        let receiving_id: StorageId = parse_id("receiving_storage_id", receiving_storage_id)?;

        let product = self.fetch(product_id).await?;
        let price = product
            .price(price_id)
            .ok_or_else(|| DomainError::not_found("price not found in product"))?;
        let product_ref = &product;

        apply_planned(self.storages.as_ref(), "unable to complete purchase", || async move {
            let paying = self.storage(paying_id, "paying storage not found").await?;
            let receiving = if receiving_id == paying_id {
                None
            } else {
                Some(self.storage(receiving_id, "receiving storage not found").await?)
            };

            if let Err(e) = check_affordable(&paying, price) {
                tracing::warn!(%product_id, %price_id, storage_id = %paying_id, error = %e, "purchase rejected");
                return Err(e);
            }

            let set = plan_purchase(product_ref, price, &paying, receiving.as_ref())?;
            tracing::debug!(%product_id, %price_id, writes = set.changes.len(), "purchase planned");
            Ok(set)
        })
        .await?;

        tracing::info!(
            %product_id,
            %price_id,
            paying_storage_id = %paying_id,
            receiving_storage_id = %receiving_id,
            "product bought"
        );
        Ok(product)
    }

    async fn fetch(&self, id: ProductId) -> AppResult<Product> {
        self.products
            .get(id)
            .await
            .map_err(DomainError::internal("unable to get product"))?
            .ok_or_else(|| DomainError::not_found("product not found"))
    }

    async fn storage(&self, id: StorageId, missing: &'static str) -> AppResult<Storage> {
        self.storages
            .get(id)
            .await
            .map_err(DomainError::internal("unable to get storage"))?
            .ok_or_else(|| DomainError::not_found(missing))
    }
}
