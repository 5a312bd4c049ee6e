use crate::db::assemble::{ProductRow, assemble_products};
use crate::db::error::DbError;
use crate::db::repo::count_rows;
use crate::db::repo::product::ProductRepo;
use crate::db::{Db, DbResult, map_rows};
use crate::models::page::PageWindow;
use crate::models::product::{Product, ProductSummary};
use crate::models::types::{CurrencyId, ItemId, ProductCurrencyId, ProductId, ProductItemId};
use std::sync::{Arc, LazyLock};

static PRODUCT_SELECT: LazyLock<String> = LazyLock::new(ProductRow::select);

/// Load and assemble every product in `ids`. Missing ids are skipped.
pub(crate) async fn load_products(client: &deadpool_postgres::Client, ids: &[ProductId]) -> DbResult<Vec<Product>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let stmt = client.prepare_cached(&PRODUCT_SELECT).await?;
    let rows = client.query(&stmt, &[&ids]).await?;
    let rows = map_rows(&rows, ProductRow::try_from_row, "ProductRepo::load_products")?;
    Ok(assemble_products(rows))
}

pub struct ProductRepository {
    db: Arc<Db>,
}

impl ProductRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl ProductRepo for ProductRepository {
    async fn create(&self, name: &str) -> DbResult<Product> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("INSERT INTO product (id, name) VALUES ($1, $2) RETURNING *")
            .await?;
        let row = client.query_one(&stmt, &[&ProductId::new(), &name]).await?;
        let summary = ProductSummary::try_from_row(&row)?;

        Ok(Product {
            id: summary.id,
            name: summary.name,
            items: Vec::new(),
            currencies: Vec::new(),
            prices: Vec::new(),
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        })
    }

    async fn update(&self, id: ProductId, name: &str) -> DbResult<Product> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("UPDATE product SET name = $2, updated_at = now() WHERE id = $1")
            .await?;
        if client.execute(&stmt, &[&id, &name]).await? == 0 {
            return Err(DbError::NotFound);
        }
        load_products(&client, &[id]).await?.pop().ok_or(DbError::NotFound)
    }

    async fn get(&self, id: ProductId) -> DbResult<Option<Product>> {
        let client = self.db.get_client().await?;
        Ok(load_products(&client, &[id]).await?.pop())
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ProductSummary>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM product ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .await?;
        let rows = client.query(&stmt, &[&window.limit, &window.offset]).await?;
        let products = map_rows(&rows, ProductSummary::try_from_row, "ProductRepo::list")?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM product", &[]).await?;
        Ok((products, total))
    }

    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<ProductSummary>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM product WHERE name ~* $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3")
            .await?;
        let rows = client.query(&stmt, &[&query, &window.limit, &window.offset]).await?;
        let products = map_rows(&rows, ProductSummary::try_from_row, &format!("ProductRepo::search query={query}"))?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM product WHERE name ~* $1", &[&query]).await?;
        Ok((products, total))
    }

    async fn attach_item(&self, product_id: ProductId, item_id: ItemId, amount: i64) -> DbResult<ProductItemId> {
        let client = self.db.get_client().await?;

        let id = ProductItemId::new();
        let stmt = client
            .prepare_cached("INSERT INTO product_item (id, product_id, item_id, amount) VALUES ($1, $2, $3, $4)")
            .await?;
        client.execute(&stmt, &[&id, &product_id, &item_id, &amount]).await?;
        Ok(id)
    }

    async fn detach_item(&self, id: ProductItemId) -> DbResult<ProductId> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("DELETE FROM product_item WHERE id = $1 RETURNING product_id")
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?.ok_or(DbError::NotFound)?;
        Ok(row.try_get("product_id")?)
    }

    async fn attach_currency(
        &self,
        product_id: ProductId,
        currency_id: CurrencyId,
        amount: i64,
    ) -> DbResult<ProductCurrencyId> {
        let client = self.db.get_client().await?;

        let id = ProductCurrencyId::new();
        let stmt = client
            .prepare_cached(
                "INSERT INTO product_currency (id, product_id, currency_id, amount) VALUES ($1, $2, $3, $4)",
            )
            .await?;
        client.execute(&stmt, &[&id, &product_id, &currency_id, &amount]).await?;
        Ok(id)
    }

    async fn detach_currency(&self, id: ProductCurrencyId) -> DbResult<ProductId> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("DELETE FROM product_currency WHERE id = $1 RETURNING product_id")
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?.ok_or(DbError::NotFound)?;
        Ok(row.try_get("product_id")?)
    }
}
