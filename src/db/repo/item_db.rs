use crate::db::error::DbError;
use crate::db::repo::count_rows;
use crate::db::repo::item::ItemRepo;
use crate::db::{Db, DbResult, map_row_opt, map_rows};
use crate::models::item::{Item, NewItem};
use crate::models::page::PageWindow;
use crate::models::types::{EntityPatch, ItemId};
use std::sync::Arc;

pub struct ItemRepository {
    db: Arc<Db>,
}

impl ItemRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl ItemRepo for ItemRepository {
    async fn create(&self, new: NewItem) -> DbResult<Item> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO item (id, name, stackable, stack_max_amount, stack_balancing_method, metadata)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .await?;

        let row = client
            .query_one(
                &stmt,
                &[
                    &ItemId::new(),
                    &new.name,
                    &new.stackable,
                    &new.stack_max_amount,
                    &new.stack_balancing_method,
                    &new.metadata,
                ],
            )
            .await?;
        Item::try_from_row(&row)
    }

    async fn update(&self, id: ItemId, patch: EntityPatch) -> DbResult<Item> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
                UPDATE item
                SET name = COALESCE($2, name),
                    metadata = COALESCE($3, metadata),
                    updated_at = now()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .await?;

        let row_opt = client.query_opt(&stmt, &[&id, &patch.name, &patch.metadata]).await?;
        map_row_opt(row_opt, Item::try_from_row, &format!("ItemRepo::update id={id}"))?.ok_or(DbError::NotFound)
    }

    async fn get(&self, id: ItemId) -> DbResult<Option<Item>> {
        let client = self.db.get_client().await?;

        let stmt = client.prepare_cached("SELECT * FROM item WHERE id = $1").await?;
        let row_opt = client.query_opt(&stmt, &[&id]).await?;
        map_row_opt(row_opt, Item::try_from_row, &format!("ItemRepo::get id={id}"))
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Item>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM item ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .await?;
        let rows = client.query(&stmt, &[&window.limit, &window.offset]).await?;
        let items = map_rows(&rows, Item::try_from_row, "ItemRepo::list")?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM item", &[]).await?;
        Ok((items, total))
    }

    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<Item>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM item WHERE name ~* $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3")
            .await?;
        let rows = client.query(&stmt, &[&query, &window.limit, &window.offset]).await?;
        let items = map_rows(&rows, Item::try_from_row, &format!("ItemRepo::search query={query}"))?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM item WHERE name ~* $1", &[&query]).await?;
        Ok((items, total))
    }
}
