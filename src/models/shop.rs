use crate::models::product::Product;
use crate::models::types::{Metadata, ShopId, ShopProductId};
use crate::db::DbResult;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// A catalog of products. Shops are read-only to the purchase workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub metadata: Metadata,
    pub products: Vec<ShopProduct>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Link row between a shop and one of the products it offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopProduct {
    pub id: ShopProductId,
    pub product: Product,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopSummary {
    pub id: ShopId,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ShopSummary {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewShop {
    pub name: String,
    pub metadata: Metadata,
}
