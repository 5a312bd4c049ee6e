use crate::db::assemble::{ShopRow, assemble_shop, linked_products};
use crate::db::error::DbError;
use crate::db::repo::count_rows;
use crate::db::repo::product_db::load_products;
use crate::db::repo::shop::ShopRepo;
use crate::db::{Db, DbResult, map_rows};
use crate::models::page::PageWindow;
use crate::models::shop::{NewShop, Shop, ShopSummary};
use crate::models::types::{EntityPatch, ProductId, ShopId, ShopProductId};
use std::sync::Arc;

pub struct ShopRepository {
    db: Arc<Db>,
}

impl ShopRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    async fn load(&self, client: &deadpool_postgres::Client, id: ShopId) -> DbResult<Option<Shop>> {
        let stmt = client.prepare_cached(ShopRow::SELECT).await?;
        let rows = client.query(&stmt, &[&id]).await?;
        let rows = map_rows(&rows, ShopRow::try_from_row, &format!("ShopRepo::get id={id}"))?;

        let products = load_products(client, &linked_products(&rows)).await?;
        Ok(assemble_shop(rows, products))
    }
}

#[async_trait::async_trait]
impl ShopRepo for ShopRepository {
    async fn create(&self, new: NewShop) -> DbResult<Shop> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("INSERT INTO shop (id, name, metadata) VALUES ($1, $2, $3) RETURNING *")
            .await?;
        let row = client.query_one(&stmt, &[&ShopId::new(), &new.name, &new.metadata]).await?;

        Ok(Shop {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            metadata: row.try_get("metadata")?,
            products: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn update(&self, id: ShopId, patch: EntityPatch) -> DbResult<Shop> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
                UPDATE shop
                SET name = COALESCE($2, name),
                    metadata = COALESCE($3, metadata),
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .await?;
        if client.execute(&stmt, &[&id, &patch.name, &patch.metadata]).await? == 0 {
            return Err(DbError::NotFound);
        }
        self.load(&client, id).await?.ok_or(DbError::NotFound)
    }

    async fn get(&self, id: ShopId) -> DbResult<Option<Shop>> {
        let client = self.db.get_client().await?;
        self.load(&client, id).await
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ShopSummary>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM shop ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .await?;
        let rows = client.query(&stmt, &[&window.limit, &window.offset]).await?;
        let shops = map_rows(&rows, ShopSummary::try_from_row, "ShopRepo::list")?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM shop", &[]).await?;
        Ok((shops, total))
    }

    async fn attach_product(&self, shop_id: ShopId, product_id: ProductId) -> DbResult<ShopProductId> {
        let client = self.db.get_client().await?;

        let id = ShopProductId::new();
        let stmt = client
            .prepare_cached("INSERT INTO shop_product (id, shop_id, product_id) VALUES ($1, $2, $3)")
            .await?;
        client.execute(&stmt, &[&id, &shop_id, &product_id]).await?;
        Ok(id)
    }

    async fn detach_product(&self, id: ShopProductId) -> DbResult<ShopId> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("DELETE FROM shop_product WHERE id = $1 RETURNING shop_id")
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?.ok_or(DbError::NotFound)?;
        Ok(row.try_get("shop_id")?)
    }
}
