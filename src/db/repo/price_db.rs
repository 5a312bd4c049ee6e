use crate::db::error::DbError;
use crate::db::repo::price::PriceRepo;
use crate::db::repo::product_db::load_products;
use crate::db::{Db, DbResult};
use crate::models::product::Price;
use crate::models::types::{CurrencyId, ItemId, PriceCurrencyId, PriceId, PriceItemId, ProductId};
use std::sync::Arc;

pub struct PriceRepository {
    db: Arc<Db>,
}

impl PriceRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl PriceRepo for PriceRepository {
    async fn create(&self, product_id: ProductId) -> DbResult<Price> {
        let client = self.db.get_client().await?;

        let id = PriceId::new();
        let stmt = client
            .prepare_cached("INSERT INTO price (id, product_id) VALUES ($1, $2)")
            .await?;
        client.execute(&stmt, &[&id, &product_id]).await?;

        Ok(Price {
            id,
            product_id,
            items: Vec::new(),
            currencies: Vec::new(),
        })
    }

    async fn get(&self, id: PriceId) -> DbResult<Option<Price>> {
        let client = self.db.get_client().await?;

        let stmt = client.prepare_cached("SELECT product_id FROM price WHERE id = $1").await?;
        let Some(row) = client.query_opt(&stmt, &[&id]).await? else {
            return Ok(None);
        };
        let product_id: ProductId = row.try_get("product_id")?;

        let products = load_products(&client, &[product_id]).await?;
        Ok(products
            .into_iter()
            .flat_map(|p| p.prices)
            .find(|price| price.id == id))
    }

    async fn delete(&self, id: PriceId) -> DbResult<()> {
        let client = self.db.get_client().await?;

        let stmt = client.prepare_cached("DELETE FROM price WHERE id = $1").await?;
        match client.execute(&stmt, &[&id]).await? {
            0 => Err(DbError::NotFound),
            _ => Ok(()),
        }
    }

    async fn list_for_product(&self, product_id: ProductId) -> DbResult<Vec<Price>> {
        let client = self.db.get_client().await?;
        let products = load_products(&client, &[product_id]).await?;
        Ok(products.into_iter().flat_map(|p| p.prices).collect())
    }

    async fn attach_item(&self, price_id: PriceId, item_id: ItemId, amount: i64) -> DbResult<PriceItemId> {
        let client = self.db.get_client().await?;

        let id = PriceItemId::new();
        let stmt = client
            .prepare_cached("INSERT INTO price_item (id, price_id, item_id, amount) VALUES ($1, $2, $3, $4)")
            .await?;
        client.execute(&stmt, &[&id, &price_id, &item_id, &amount]).await?;
        Ok(id)
    }

    async fn detach_item(&self, id: PriceItemId) -> DbResult<PriceId> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("DELETE FROM price_item WHERE id = $1 RETURNING price_id")
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?.ok_or(DbError::NotFound)?;
        Ok(row.try_get("price_id")?)
    }

    async fn attach_currency(
        &self,
        price_id: PriceId,
        currency_id: CurrencyId,
        amount: i64,
    ) -> DbResult<PriceCurrencyId> {
        let client = self.db.get_client().await?;

        let id = PriceCurrencyId::new();
        let stmt = client
            .prepare_cached("INSERT INTO price_currency (id, price_id, currency_id, amount) VALUES ($1, $2, $3, $4)")
            .await?;
        client.execute(&stmt, &[&id, &price_id, &currency_id, &amount]).await?;
        Ok(id)
    }

    async fn detach_currency(&self, id: PriceCurrencyId) -> DbResult<PriceId> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("DELETE FROM price_currency WHERE id = $1 RETURNING price_id")
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?.ok_or(DbError::NotFound)?;
        Ok(row.try_get("price_id")?)
    }
}
