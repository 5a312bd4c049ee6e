use crate::db::DbResult;
use crate::models::types::CurrencyId;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: CurrencyId,
    pub name: String,
    /// e.g. "GLD"
    pub short_name: String,
    /// e.g. "G"
    pub symbol: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Currency {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            short_name: row.try_get("short_name")?,
            symbol: row.try_get("symbol")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCurrency {
    pub name: String,
    pub short_name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Default)]
pub struct CurrencyPatch {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub symbol: Option<String>,
}

impl CurrencyPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.short_name.is_none() && self.symbol.is_none()
    }
}
