use crate::models::currency::Currency;
use crate::models::item::Item;
use crate::models::types::{CurrencyId, ItemId, Metadata, PlayerId, StorageCurrencyId, StorageId, StorageItemId};
use crate::db::DbResult;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// An inventory/wallet owned by a player, with all of its stacks and balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub id: StorageId,
    pub player_id: PlayerId,
    pub name: String,
    pub metadata: Metadata,
    /// Ordered by stack id
    pub items: Vec<StorageItem>,
    /// Ordered by balance id
    pub currencies: Vec<StorageCurrency>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Storage {
    /// All stacks holding the given item, in stack id order.
    pub fn stacks_of(&self, item_id: ItemId) -> impl Iterator<Item = &StorageItem> {
        self.items.iter().filter(move |s| s.item.id == item_id)
    }

    /// Number of units of an item held, counting each non-stackable row as one.
    pub fn units_of(&self, item_id: ItemId) -> i64 {
        self.stacks_of(item_id).map(StorageItem::units).sum()
    }

    pub fn balance_of(&self, currency_id: CurrencyId) -> Option<&StorageCurrency> {
        self.currencies.iter().find(|c| c.currency.id == currency_id)
    }

    pub fn stack(&self, id: StorageItemId) -> Option<&StorageItem> {
        self.items.iter().find(|s| s.id == id)
    }
}

/// A single stack (or, for non-stackable items, a single unit) inside a storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageItem {
    pub id: StorageItemId,
    pub storage_id: StorageId,
    pub item: Item,
    pub amount: i64,
    pub metadata: Metadata,
}

impl StorageItem {
    pub fn units(&self) -> i64 {
        if self.item.stackable { self.amount } else { 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageCurrency {
    pub id: StorageCurrencyId,
    pub storage_id: StorageId,
    pub currency: Currency,
    pub amount: i64,
}

/// Lightweight listing entry; `ListStorage` does not load stacks or balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSummary {
    pub id: StorageId,
    pub player_id: PlayerId,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl StorageSummary {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            player_id: row.try_get("player_id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewStorage {
    pub player_id: PlayerId,
    pub name: String,
    pub metadata: Metadata,
}

/// Outcome of `GiveItem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGrant {
    pub storage_id: StorageId,
    pub item_id: ItemId,
    pub amount_granted: i64,
}
