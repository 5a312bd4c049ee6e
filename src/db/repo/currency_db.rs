use crate::db::error::DbError;
use crate::db::repo::count_rows;
use crate::db::repo::currency::CurrencyRepo;
use crate::db::{Db, DbResult, map_row_opt, map_rows};
use crate::models::currency::{Currency, CurrencyPatch, NewCurrency};
use crate::models::page::PageWindow;
use crate::models::types::CurrencyId;
use std::sync::Arc;

pub struct CurrencyRepository {
    db: Arc<Db>,
}

impl CurrencyRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl CurrencyRepo for CurrencyRepository {
    async fn create(&self, new: NewCurrency) -> DbResult<Currency> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("INSERT INTO currency (id, name, short_name, symbol) VALUES ($1, $2, $3, $4) RETURNING *")
            .await?;
        let row = client
            .query_one(&stmt, &[&CurrencyId::new(), &new.name, &new.short_name, &new.symbol])
            .await?;
        Currency::try_from_row(&row)
    }

    async fn update(&self, id: CurrencyId, patch: CurrencyPatch) -> DbResult<Currency> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
                UPDATE currency
                SET name = COALESCE($2, name),
                    short_name = COALESCE($3, short_name),
                    symbol = COALESCE($4, symbol),
                    updated_at = now()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .await?;
        let row_opt = client
            .query_opt(&stmt, &[&id, &patch.name, &patch.short_name, &patch.symbol])
            .await?;
        map_row_opt(row_opt, Currency::try_from_row, &format!("CurrencyRepo::update id={id}"))?
            .ok_or(DbError::NotFound)
    }

    async fn get(&self, id: CurrencyId) -> DbResult<Option<Currency>> {
        let client = self.db.get_client().await?;

        let stmt = client.prepare_cached("SELECT * FROM currency WHERE id = $1").await?;
        let row_opt = client.query_opt(&stmt, &[&id]).await?;
        map_row_opt(row_opt, Currency::try_from_row, &format!("CurrencyRepo::get id={id}"))
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Currency>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM currency ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .await?;
        let rows = client.query(&stmt, &[&window.limit, &window.offset]).await?;
        let currencies = map_rows(&rows, Currency::try_from_row, "CurrencyRepo::list")?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM currency", &[]).await?;
        Ok((currencies, total))
    }
}
