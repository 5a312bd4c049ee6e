use crate::db::repo::{CurrencyRepo, ItemRepo, PriceRepo, ProductRepo};
use crate::error::{AppResult, DomainError};
use crate::models::product::Price;
use crate::models::types::{CurrencyId, ItemId, PriceCurrencyId, PriceId, PriceItemId, ProductId, parse_id};
use crate::services::require_positive;
use std::sync::Arc;

pub struct PriceService {
    prices: Arc<dyn PriceRepo>,
    products: Arc<dyn ProductRepo>,
    items: Arc<dyn ItemRepo>,
    currencies: Arc<dyn CurrencyRepo>,
}

impl PriceService {
    pub fn new(
        prices: Arc<dyn PriceRepo>,
        products: Arc<dyn ProductRepo>,
        items: Arc<dyn ItemRepo>,
        currencies: Arc<dyn CurrencyRepo>,
    ) -> Self {
        Self {
            prices,
            products,
            items,
            currencies,
        }
    }

    /// New empty cost basket for a product.
    pub async fn create(&self, product_id: &str) -> AppResult<Price> {
        let product_id: ProductId = parse_id("product_id", product_id)?;
        self.products
            .get(product_id)
            .await
            .map_err(DomainError::internal("unable to get product"))?
            .ok_or_else(|| DomainError::not_found("product not found"))?;

        let price = self
            .prices
            .create(product_id)
            .await
            .map_err(DomainError::internal("unable to create price"))?;
        tracing::info!(price_id = %price.id, %product_id, "price created");
        Ok(price)
    }

    pub async fn get(&self, price_id: &str) -> AppResult<Price> {
        let id: PriceId = parse_id("price_id", price_id)?;
        self.fetch(id).await
    }

    pub async fn delete(&self, price_id: &str) -> AppResult<()> {
        let id: PriceId = parse_id("price_id", price_id)?;
        self.prices
            .delete(id)
            .await
            .map_err(DomainError::lookup("price not found", "unable to delete price"))?;
        tracing::info!(price_id = %id, "price deleted");
        Ok(())
    }

    pub async fn attach_item(&self, price_id: &str, item_id: &str, amount: i64) -> AppResult<Price> {
        let price_id: PriceId = parse_id("price_id", price_id)?;
        let item_id: ItemId = parse_id("item_id", item_id)?;
        require_positive(amount)?;

        self.fetch(price_id).await?;
        self.items
            .get(item_id)
            .await
            .map_err(DomainError::internal("unable to get item"))?
            .ok_or_else(|| DomainError::not_found("item not found"))?;

        self.prices
            .attach_item(price_id, item_id, amount)
            .await
            .map_err(DomainError::internal("unable to attach item"))?;
        self.fetch(price_id).await
    }

    pub async fn detach_item(&self, price_item_id: &str) -> AppResult<Price> {
        let id: PriceItemId = parse_id("price_item_id", price_item_id)?;
        let price_id = self
            .prices
            .detach_item(id)
            .await
            .map_err(DomainError::lookup("price item not found", "unable to detach item"))?;
        self.fetch(price_id).await
    }

    pub async fn attach_currency(&self, price_id: &str, currency_id: &str, amount: i64) -> AppResult<Price> {
        let price_id: PriceId = parse_id("price_id", price_id)?;
        let currency_id: CurrencyId = parse_id("currency_id", currency_id)?;
        require_positive(amount)?;

        self.fetch(price_id).await?;
        self.currencies
            .get(currency_id)
            .await
            .map_err(DomainError::internal("unable to get currency"))?
            .ok_or_else(|| DomainError::not_found("currency not found"))?;

        self.prices
            .attach_currency(price_id, currency_id, amount)
            .await
            .map_err(DomainError::internal("unable to attach currency"))?;
        self.fetch(price_id).await
    }

    pub async fn detach_currency(&self, price_currency_id: &str) -> AppResult<Price> {
        let id: PriceCurrencyId = parse_id("price_currency_id", price_currency_id)?;
        let price_id = self
            .prices
            .detach_currency(id)
            .await
            .map_err(DomainError::lookup("price currency not found", "unable to detach currency"))?;
        self.fetch(price_id).await
    }

    async fn fetch(&self, id: PriceId) -> AppResult<Price> {
        self.prices
            .get(id)
            .await
            .map_err(DomainError::internal("unable to get price"))?
            .ok_or_else(|| DomainError::not_found("price not found"))
    }
}
