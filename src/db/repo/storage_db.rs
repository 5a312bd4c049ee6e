use crate::db::assemble::{StorageRow, assemble_storage};
use crate::db::error::DbError;
use crate::db::repo::count_rows;
use crate::db::repo::storage::StorageRepo;
use crate::db::{Db, DbResult, expect_one, map_rows};
use crate::models::page::PageWindow;
use crate::models::storage::{NewStorage, Storage, StorageSummary};
use crate::models::types::{EntityPatch, StorageCurrencyId, StorageId, StorageItemId};
use crate::stacking::{ChangeSet, StorageChange};
use std::sync::{Arc, LazyLock};

static STORAGE_SELECT: LazyLock<String> = LazyLock::new(StorageRow::select);

pub struct StorageRepository {
    db: Arc<Db>,
}

impl StorageRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    async fn load(&self, client: &deadpool_postgres::Client, id: StorageId) -> DbResult<Option<Storage>> {
        let stmt = client.prepare_cached(&STORAGE_SELECT).await?;
        let rows = client.query(&stmt, &[&id]).await?;
        let rows = map_rows(&rows, StorageRow::try_from_row, &format!("StorageRepo::get id={id}"))?;
        Ok(assemble_storage(rows))
    }
}

async fn apply_change(tx: &deadpool_postgres::Transaction<'_>, change: &StorageChange) -> DbResult<()> {
    match change {
        StorageChange::CreateStack {
            storage_id,
            item_id,
            amount,
            metadata,
        } => {
            let stmt = tx
                .prepare_cached(
                    "INSERT INTO storage_item (id, storage_id, item_id, amount, metadata) VALUES ($1, $2, $3, $4, $5)",
                )
                .await?;
            tx.execute(&stmt, &[&StorageItemId::new(), storage_id, item_id, amount, metadata])
                .await?;
        }
        StorageChange::FillStack { id, expected, add } => {
            let stmt = tx
                .prepare_cached(
                    "UPDATE storage_item SET amount = amount + $3, updated_at = now() WHERE id = $1 AND amount = $2",
                )
                .await?;
            expect_one(tx.execute(&stmt, &[id, expected, add]).await?, "storage_item")?;
        }
        StorageChange::ShrinkStack { id, expected, by } => {
            let stmt = tx
                .prepare_cached(
                    "UPDATE storage_item SET amount = amount - $3, updated_at = now() WHERE id = $1 AND amount = $2",
                )
                .await?;
            expect_one(tx.execute(&stmt, &[id, expected, by]).await?, "storage_item")?;
        }
        StorageChange::DeleteStack { id, expected } => {
            let stmt = tx
                .prepare_cached("DELETE FROM storage_item WHERE id = $1 AND amount = $2")
                .await?;
            expect_one(tx.execute(&stmt, &[id, expected]).await?, "storage_item")?;
        }
        StorageChange::AddCurrency {
            storage_id,
            currency_id,
            amount,
        } => {
            let stmt = tx
                .prepare_cached(
                    r#"
                    INSERT INTO storage_currency (id, storage_id, currency_id, amount)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (currency_id, storage_id)
                    DO UPDATE SET amount = storage_currency.amount + EXCLUDED.amount, updated_at = now()
                    "#,
                )
                .await?;
            tx.execute(&stmt, &[&StorageCurrencyId::new(), storage_id, currency_id, amount])
                .await?;
        }
        StorageChange::TakeCurrency { id, expected, amount } => {
            let stmt = tx
                .prepare_cached(
                    "UPDATE storage_currency SET amount = amount - $3, updated_at = now() WHERE id = $1 AND amount = $2",
                )
                .await?;
            expect_one(tx.execute(&stmt, &[id, expected, amount]).await?, "storage_currency")?;
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl StorageRepo for StorageRepository {
    async fn create(&self, new: NewStorage) -> DbResult<Storage> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("INSERT INTO storage (id, player_id, name, metadata) VALUES ($1, $2, $3, $4) RETURNING *")
            .await?;
        let row = client
            .query_one(&stmt, &[&StorageId::new(), &new.player_id, &new.name, &new.metadata])
            .await?;

        Ok(Storage {
            id: row.try_get("id")?,
            player_id: row.try_get("player_id")?,
            name: row.try_get("name")?,
            metadata: row.try_get("metadata")?,
            items: Vec::new(),
            currencies: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn update(&self, id: StorageId, patch: EntityPatch) -> DbResult<Storage> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
                UPDATE storage
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

    async fn get(&self, id: StorageId) -> DbResult<Option<Storage>> {
        let client = self.db.get_client().await?;
        self.load(&client, id).await
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<StorageSummary>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM storage ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .await?;
        let rows = client.query(&stmt, &[&window.limit, &window.offset]).await?;
        let storages = map_rows(&rows, StorageSummary::try_from_row, "StorageRepo::list")?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM storage", &[]).await?;
        Ok((storages, total))
    }

    async fn storage_of_stack(&self, id: StorageItemId) -> DbResult<Option<StorageId>> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT storage_id FROM storage_item WHERE id = $1")
            .await?;
        let row_opt = client.query_opt(&stmt, &[&id]).await?;
        Ok(row_opt.map(|row| row.try_get("storage_id")).transpose()?)
    }

    async fn apply(&self, set: ChangeSet) -> DbResult<()> {
        let mut client = self.db.get_client().await?;
        let tx = client.build_transaction().start().await?;

        // paying storage first, receiving second
        let lock = tx.prepare_cached("SELECT id FROM storage WHERE id = $1 FOR UPDATE").await?;
        for storage_id in &set.locks {
            tx.query_opt(&lock, &[storage_id]).await?.ok_or(DbError::NotFound)?;
        }

        for change in &set.changes {
            if let Err(e) = apply_change(&tx, change).await {
                tracing::warn!(error = %e, ?change, "storage change failed, rolling back");
                return Err(e);
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
