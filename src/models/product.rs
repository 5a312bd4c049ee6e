use crate::models::currency::Currency;
use crate::models::item::Item;
use crate::models::types::{PriceCurrencyId, PriceId, PriceItemId, ProductCurrencyId, ProductId, ProductItemId};
use crate::db::DbResult;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use std::collections::BTreeMap;

/// A purchasable bundle. `items` and `currencies` form the reward basket, each
/// price is an alternative cost basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub items: Vec<ProductItem>,
    pub currencies: Vec<ProductCurrency>,
    pub prices: Vec<Price>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Product {
    pub fn price(&self, price_id: PriceId) -> Option<&Price> {
        self.prices.iter().find(|p| p.id == price_id)
    }

    /// Reward items summed per item, so a product listing the same item twice
    /// is placed as one grant.
    pub fn reward_items(&self) -> Vec<(Item, i64)> {
        sum_by_key(self.items.iter().map(|pi| (pi.item.id, &pi.item, pi.amount)))
    }

    pub fn reward_currencies(&self) -> Vec<(Currency, i64)> {
        sum_by_key(self.currencies.iter().map(|pc| (pc.currency.id, &pc.currency, pc.amount)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub id: ProductItemId,
    pub item: Item,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCurrency {
    pub id: ProductCurrencyId,
    pub currency: Currency,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub id: PriceId,
    pub product_id: ProductId,
    pub items: Vec<PriceItem>,
    pub currencies: Vec<PriceCurrency>,
}

impl Price {
    /// Required items summed per item.
    pub fn required_items(&self) -> Vec<(Item, i64)> {
        sum_by_key(self.items.iter().map(|pi| (pi.item.id, &pi.item, pi.amount)))
    }

    /// Required currencies summed per currency.
    pub fn required_currencies(&self) -> Vec<(Currency, i64)> {
        sum_by_key(self.currencies.iter().map(|pc| (pc.currency.id, &pc.currency, pc.amount)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceItem {
    pub id: PriceItemId,
    pub item: Item,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCurrency {
    pub id: PriceCurrencyId,
    pub currency: Currency,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ProductSummary {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn sum_by_key<'a, K: Ord + Copy, T: Clone + 'a>(entries: impl Iterator<Item = (K, &'a T, i64)>) -> Vec<(T, i64)> {
    let mut summed: BTreeMap<K, (T, i64)> = BTreeMap::new();
    for (key, value, amount) in entries {
        summed
            .entry(key)
            .and_modify(|e| e.1 = e.1.saturating_add(amount))
            .or_insert_with(|| (value.clone(), amount));
    }
    summed.into_values().collect()
}
