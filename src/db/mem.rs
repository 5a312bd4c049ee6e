//! In-memory backend implementing every repository trait. Used by tests and
//! by `memory:` database urls.
//!
//! All state sits behind one mutex. Change sets are applied to a copy of the
//! state which replaces the original only if every change succeeded.

use crate::db::DbResult;
use crate::db::assemble::{
    Line, ProductHead, ProductRow, ShopHead, ShopRow, StackCols, StorageHead, StorageRow, assemble_product,
    assemble_shop, assemble_storage, linked_products,
};
use crate::db::error::DbError;
use crate::db::repo::{ConfigRepo, CurrencyRepo, ItemRepo, PlayerRepo, PriceRepo, ProductRepo, ShopRepo, StorageRepo};
use crate::models::config_entry::ConfigEntry;
use crate::models::currency::{Currency, CurrencyPatch, NewCurrency};
use crate::models::item::{Item, NewItem};
use crate::models::page::PageWindow;
use crate::models::player::{NewPlayer, Player, PlayerStorage};
use crate::models::product::{Price, Product, ProductSummary};
use crate::models::shop::{NewShop, Shop, ShopSummary};
use crate::models::storage::{NewStorage, Storage, StorageSummary};
use crate::models::types::*;
use crate::stacking::{ChangeSet, StorageChange};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::cmp::Reverse;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Named {
    name: String,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Named {
    fn new(name: String, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            name,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    fn patch(&mut self, patch: EntityPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone)]
struct StorageRec {
    player_id: PlayerId,
    named: Named,
}

#[derive(Debug, Clone)]
struct StackRec {
    storage_id: StorageId,
    item_id: ItemId,
    amount: i64,
    metadata: Metadata,
}

#[derive(Debug, Clone)]
struct BalanceRec {
    storage_id: StorageId,
    currency_id: CurrencyId,
    amount: i64,
}

/// A basket line: `owner` is the product or price, `of` the item or currency.
#[derive(Debug, Clone)]
struct LineRec<O, T> {
    owner: O,
    of: T,
    amount: i64,
}

#[derive(Debug, Clone, Default)]
struct State {
    players: BTreeMap<PlayerId, Named>,
    storages: BTreeMap<StorageId, StorageRec>,
    items: BTreeMap<ItemId, Item>,
    currencies: BTreeMap<CurrencyId, Currency>,
    stacks: BTreeMap<StorageItemId, StackRec>,
    balances: BTreeMap<StorageCurrencyId, BalanceRec>,
    products: BTreeMap<ProductId, Named>,
    product_items: BTreeMap<ProductItemId, LineRec<ProductId, ItemId>>,
    product_currencies: BTreeMap<ProductCurrencyId, LineRec<ProductId, CurrencyId>>,
    prices: BTreeMap<PriceId, ProductId>,
    price_items: BTreeMap<PriceItemId, LineRec<PriceId, ItemId>>,
    price_currencies: BTreeMap<PriceCurrencyId, LineRec<PriceId, CurrencyId>>,
    shops: BTreeMap<ShopId, Named>,
    shop_products: BTreeMap<ShopProductId, (ShopId, ProductId)>,
    configs: BTreeMap<String, ConfigEntry>,
}

/// Every element wrapped in `Some`, or a single `None` for an empty list:
/// the shape a left join gives a parent without children.
fn left<T>(children: Vec<T>) -> Vec<Option<T>> {
    if children.is_empty() {
        vec![None]
    } else {
        children.into_iter().map(Some).collect()
    }
}

fn search_pattern(query: &str) -> DbResult<Regex> {
    RegexBuilder::new(query)
        .case_insensitive(true)
        .build()
        .map_err(|_| DbError::Validation("invalid search pattern".to_string()))
}

/// Newest first, then by id, sliced to the window.
fn paged<K: Ord + Copy, T>(mut entries: Vec<(K, DateTime<Utc>, T)>, window: PageWindow) -> (Vec<T>, i64) {
    let total = entries.len() as i64;
    entries.sort_by_key(|(id, created, _)| (Reverse(*created), *id));
    let page = entries
        .into_iter()
        .skip(window.offset.max(0) as usize)
        .take(window.limit.max(0) as usize)
        .map(|(_, _, v)| v)
        .collect();
    (page, total)
}

impl State {
    fn player(&self, id: PlayerId) -> Option<Player> {
        let named = self.players.get(&id)?;
        let mut owned: Vec<(&StorageId, &StorageRec)> =
            self.storages.iter().filter(|(_, s)| s.player_id == id).collect();
        owned.sort_by_key(|(sid, s)| (s.named.created_at, **sid));

        Some(Player {
            id,
            name: named.name.clone(),
            metadata: named.metadata.clone(),
            storages: owned
                .into_iter()
                .map(|(sid, s)| PlayerStorage {
                    id: *sid,
                    name: s.named.name.clone(),
                })
                .collect(),
            created_at: named.created_at,
            updated_at: named.updated_at,
        })
    }

    fn storage_rows(&self, id: StorageId) -> Vec<StorageRow> {
        let Some(rec) = self.storages.get(&id) else {
            return Vec::new();
        };
        let head = StorageHead {
            id,
            player_id: rec.player_id,
            name: rec.named.name.clone(),
            metadata: rec.named.metadata.clone(),
            created_at: rec.named.created_at,
            updated_at: rec.named.updated_at,
        };

        let stacks: Vec<StackCols> = self
            .stacks
            .iter()
            .filter(|(_, s)| s.storage_id == id)
            .filter_map(|(sid, s)| {
                Some(StackCols {
                    id: *sid,
                    amount: s.amount,
                    metadata: s.metadata.clone(),
                    item: self.items.get(&s.item_id)?.clone(),
                })
            })
            .collect();
        let balances: Vec<Line<StorageCurrencyId, Currency>> = self
            .balances
            .iter()
            .filter(|(_, b)| b.storage_id == id)
            .filter_map(|(bid, b)| {
                Some(Line {
                    id: *bid,
                    amount: b.amount,
                    of: self.currencies.get(&b.currency_id)?.clone(),
                })
            })
            .collect();

        let mut rows = Vec::new();
        for stack in left(stacks) {
            for balance in left(balances.clone()) {
                rows.push(StorageRow {
                    head: head.clone(),
                    stack: stack.clone(),
                    balance,
                });
            }
        }
        rows
    }

    fn storage(&self, id: StorageId) -> Option<Storage> {
        assemble_storage(self.storage_rows(id))
    }

    fn item_lines<O: PartialEq + Copy, I: Copy>(
        &self,
        lines: &BTreeMap<I, LineRec<O, ItemId>>,
        owner: O,
    ) -> Vec<Line<I, Item>> {
        lines
            .iter()
            .filter(|(_, l)| l.owner == owner)
            .filter_map(|(id, l)| {
                Some(Line {
                    id: *id,
                    amount: l.amount,
                    of: self.items.get(&l.of)?.clone(),
                })
            })
            .collect()
    }

    fn currency_lines<O: PartialEq + Copy, I: Copy>(
        &self,
        lines: &BTreeMap<I, LineRec<O, CurrencyId>>,
        owner: O,
    ) -> Vec<Line<I, Currency>> {
        lines
            .iter()
            .filter(|(_, l)| l.owner == owner)
            .filter_map(|(id, l)| {
                Some(Line {
                    id: *id,
                    amount: l.amount,
                    of: self.currencies.get(&l.of)?.clone(),
                })
            })
            .collect()
    }

    fn product_rows(&self, id: ProductId) -> Vec<ProductRow> {
        let Some(named) = self.products.get(&id) else {
            return Vec::new();
        };
        let head = ProductHead {
            id,
            name: named.name.clone(),
            created_at: named.created_at,
            updated_at: named.updated_at,
        };

        let mut price_parts = Vec::new();
        for (price_id, _) in self.prices.iter().filter(|(_, owner)| **owner == id) {
            for item in left(self.item_lines(&self.price_items, *price_id)) {
                for currency in left(self.currency_lines(&self.price_currencies, *price_id)) {
                    price_parts.push((Some(*price_id), item.clone(), currency));
                }
            }
        }

        if price_parts.is_empty() {
            price_parts.push((None, None, None));
        }

        let mut rows = Vec::new();
        for reward_item in left(self.item_lines(&self.product_items, id)) {
            for reward_currency in left(self.currency_lines(&self.product_currencies, id)) {
                for (price_id, price_item, price_currency) in price_parts.iter().cloned() {
                    rows.push(ProductRow {
                        head: head.clone(),
                        reward_item: reward_item.clone(),
                        reward_currency: reward_currency.clone(),
                        price_id,
                        price_item,
                        price_currency,
                    });
                }
            }
        }
        rows
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        assemble_product(self.product_rows(id))
    }

    fn shop(&self, id: ShopId) -> Option<Shop> {
        let named = self.shops.get(&id)?;
        let head = ShopHead {
            id,
            name: named.name.clone(),
            metadata: named.metadata.clone(),
            created_at: named.created_at,
            updated_at: named.updated_at,
        };
        let links: Vec<(ShopProductId, ProductId)> = self
            .shop_products
            .iter()
            .filter(|(_, (shop_id, _))| *shop_id == id)
            .map(|(link_id, (_, product_id))| (*link_id, *product_id))
            .collect();
        let rows: Vec<ShopRow> = left(links)
            .into_iter()
            .map(|link| ShopRow {
                head: head.clone(),
                link,
            })
            .collect();

        let products = linked_products(&rows)
            .into_iter()
            .filter_map(|pid| self.product(pid))
            .collect();
        assemble_shop(rows, products)
    }

    fn apply_change(&mut self, change: &StorageChange) -> DbResult<()> {
        match change {
            StorageChange::CreateStack {
                storage_id,
                item_id,
                amount,
                metadata,
            } => {
                if !self.storages.contains_key(storage_id) || !self.items.contains_key(item_id) {
                    return Err(DbError::ForeignKey);
                }
                if *amount <= 0 {
                    return Err(DbError::Conflict("storage_item amount must be positive".into()));
                }
                self.stacks.insert(
                    StorageItemId::new(),
                    StackRec {
                        storage_id: *storage_id,
                        item_id: *item_id,
                        amount: *amount,
                        metadata: metadata.clone(),
                    },
                );
            }
            StorageChange::FillStack { id, expected, add } => {
                let stack = self.guarded_stack(*id, *expected)?;
                stack.amount = stack
                    .amount
                    .checked_add(*add)
                    .ok_or_else(|| DbError::Conflict("storage_item amount out of range".into()))?;
            }
            StorageChange::ShrinkStack { id, expected, by } => {
                let stack = self.guarded_stack(*id, *expected)?;
                if stack.amount - by <= 0 {
                    return Err(DbError::Conflict("storage_item amount must be positive".into()));
                }
                stack.amount -= by;
            }
            StorageChange::DeleteStack { id, expected } => {
                self.guarded_stack(*id, *expected)?;
                self.stacks.remove(id);
            }
            StorageChange::AddCurrency {
                storage_id,
                currency_id,
                amount,
            } => {
                if !self.storages.contains_key(storage_id) || !self.currencies.contains_key(currency_id) {
                    return Err(DbError::ForeignKey);
                }
                match self
                    .balances
                    .values_mut()
                    .find(|b| b.storage_id == *storage_id && b.currency_id == *currency_id)
                {
                    Some(balance) => {
                        balance.amount = balance
                            .amount
                            .checked_add(*amount)
                            .ok_or_else(|| DbError::Conflict("storage_currency amount out of range".into()))?;
                    }
                    None => {
                        self.balances.insert(
                            StorageCurrencyId::new(),
                            BalanceRec {
                                storage_id: *storage_id,
                                currency_id: *currency_id,
                                amount: *amount,
                            },
                        );
                    }
                }
            }
            StorageChange::TakeCurrency { id, expected, amount } => {
                let balance = self
                    .balances
                    .get_mut(id)
                    .filter(|b| b.amount == *expected)
                    .ok_or_else(|| DbError::Conflict("storage_currency".into()))?;
                if balance.amount < *amount {
                    return Err(DbError::Conflict("storage_currency amount must not be negative".into()));
                }
                balance.amount -= amount;
            }
        }
        Ok(())
    }

    fn guarded_stack(&mut self, id: StorageItemId, expected: i64) -> DbResult<&mut StackRec> {
        self.stacks
            .get_mut(&id)
            .filter(|s| s.amount == expected)
            .ok_or_else(|| DbError::Conflict("storage_item".into()))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ItemRepo for MemoryStore {
    async fn create(&self, new: NewItem) -> DbResult<Item> {
        let now = Utc::now();
        let item = Item {
            id: ItemId::new(),
            name: new.name,
            stackable: new.stackable,
            stack_max_amount: new.stack_max_amount,
            stack_balancing_method: new.stack_balancing_method,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update(&self, id: ItemId, patch: EntityPatch) -> DbResult<Item> {
        let mut state = self.state.lock();
        let item = state.items.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = patch.name {
            item.name = name;
        }
        if let Some(metadata) = patch.metadata {
            item.metadata = metadata;
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn get(&self, id: ItemId) -> DbResult<Option<Item>> {
        Ok(self.state.lock().items.get(&id).cloned())
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Item>, i64)> {
        let state = self.state.lock();
        let entries = state.items.values().map(|i| (i.id, i.created_at, i.clone())).collect();
        Ok(paged(entries, window))
    }

    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<Item>, i64)> {
        let pattern = search_pattern(query)?;
        let state = self.state.lock();
        let entries = state
            .items
            .values()
            .filter(|i| pattern.is_match(&i.name))
            .map(|i| (i.id, i.created_at, i.clone()))
            .collect();
        Ok(paged(entries, window))
    }
}

#[async_trait::async_trait]
impl CurrencyRepo for MemoryStore {
    async fn create(&self, new: NewCurrency) -> DbResult<Currency> {
        let now = Utc::now();
        let currency = Currency {
            id: CurrencyId::new(),
            name: new.name,
            short_name: new.short_name,
            symbol: new.symbol,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().currencies.insert(currency.id, currency.clone());
        Ok(currency)
    }

    async fn update(&self, id: CurrencyId, patch: CurrencyPatch) -> DbResult<Currency> {
        let mut state = self.state.lock();
        let currency = state.currencies.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = patch.name {
            currency.name = name;
        }
        if let Some(short_name) = patch.short_name {
            currency.short_name = short_name;
        }
        if let Some(symbol) = patch.symbol {
            currency.symbol = symbol;
        }
        currency.updated_at = Utc::now();
        Ok(currency.clone())
    }

    async fn get(&self, id: CurrencyId) -> DbResult<Option<Currency>> {
        Ok(self.state.lock().currencies.get(&id).cloned())
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Currency>, i64)> {
        let state = self.state.lock();
        let entries = state
            .currencies
            .values()
            .map(|c| (c.id, c.created_at, c.clone()))
            .collect();
        Ok(paged(entries, window))
    }
}

#[async_trait::async_trait]
impl PlayerRepo for MemoryStore {
    async fn create(&self, new: NewPlayer) -> DbResult<Player> {
        let id = PlayerId::new();
        let mut state = self.state.lock();
        state.players.insert(id, Named::new(new.name, new.metadata));
        state.player(id).ok_or(DbError::NotFound)
    }

    async fn update(&self, id: PlayerId, patch: EntityPatch) -> DbResult<Player> {
        let mut state = self.state.lock();
        state.players.get_mut(&id).ok_or(DbError::NotFound)?.patch(patch);
        state.player(id).ok_or(DbError::NotFound)
    }

    async fn get(&self, id: PlayerId) -> DbResult<Option<Player>> {
        Ok(self.state.lock().player(id))
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Player>, i64)> {
        let state = self.state.lock();
        let entries = state
            .players
            .iter()
            .filter_map(|(id, p)| Some((*id, p.created_at, state.player(*id)?)))
            .collect();
        Ok(paged(entries, window))
    }

    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<Player>, i64)> {
        let pattern = search_pattern(query)?;
        let state = self.state.lock();
        let entries = state
            .players
            .iter()
            .filter(|(_, p)| pattern.is_match(&p.name))
            .filter_map(|(id, p)| Some((*id, p.created_at, state.player(*id)?)))
            .collect();
        Ok(paged(entries, window))
    }
}

#[async_trait::async_trait]
impl StorageRepo for MemoryStore {
    async fn create(&self, new: NewStorage) -> DbResult<Storage> {
        let mut state = self.state.lock();
        if !state.players.contains_key(&new.player_id) {
            return Err(DbError::ForeignKey);
        }
        let id = StorageId::new();
        state.storages.insert(
            id,
            StorageRec {
                player_id: new.player_id,
                named: Named::new(new.name, new.metadata),
            },
        );
        state.storage(id).ok_or(DbError::NotFound)
    }

    async fn update(&self, id: StorageId, patch: EntityPatch) -> DbResult<Storage> {
        let mut state = self.state.lock();
        state.storages.get_mut(&id).ok_or(DbError::NotFound)?.named.patch(patch);
        state.storage(id).ok_or(DbError::NotFound)
    }

    async fn get(&self, id: StorageId) -> DbResult<Option<Storage>> {
        Ok(self.state.lock().storage(id))
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<StorageSummary>, i64)> {
        let state = self.state.lock();
        let entries = state
            .storages
            .iter()
            .map(|(id, s)| {
                let summary = StorageSummary {
                    id: *id,
                    player_id: s.player_id,
                    name: s.named.name.clone(),
                    created_at: s.named.created_at,
                    updated_at: s.named.updated_at,
                };
                (*id, s.named.created_at, summary)
            })
            .collect();
        Ok(paged(entries, window))
    }

    async fn storage_of_stack(&self, id: StorageItemId) -> DbResult<Option<StorageId>> {
        Ok(self.state.lock().stacks.get(&id).map(|s| s.storage_id))
    }

    async fn apply(&self, set: ChangeSet) -> DbResult<()> {
        let mut state = self.state.lock();
        for storage_id in &set.locks {
            if !state.storages.contains_key(storage_id) {
                return Err(DbError::NotFound);
            }
        }

        let mut next = state.clone();
        for change in &set.changes {
            if let Err(e) = next.apply_change(change) {
                tracing::warn!(error = %e, ?change, "storage change failed, rolling back");
                return Err(e);
            }
        }
        *state = next;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProductRepo for MemoryStore {
    async fn create(&self, name: &str) -> DbResult<Product> {
        let id = ProductId::new();
        let mut state = self.state.lock();
        state.products.insert(id, Named::new(name.to_string(), Metadata::default()));
        state.product(id).ok_or(DbError::NotFound)
    }

    async fn update(&self, id: ProductId, name: &str) -> DbResult<Product> {
        let mut state = self.state.lock();
        state.products.get_mut(&id).ok_or(DbError::NotFound)?.patch(EntityPatch {
            name: Some(name.to_string()),
            metadata: None,
        });
        state.product(id).ok_or(DbError::NotFound)
    }

    async fn get(&self, id: ProductId) -> DbResult<Option<Product>> {
        Ok(self.state.lock().product(id))
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ProductSummary>, i64)> {
        let state = self.state.lock();
        let entries = state
            .products
            .iter()
            .map(|(id, p)| (*id, p.created_at, product_summary(*id, p)))
            .collect();
        Ok(paged(entries, window))
    }

    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<ProductSummary>, i64)> {
        let pattern = search_pattern(query)?;
        let state = self.state.lock();
        let entries = state
            .products
            .iter()
            .filter(|(_, p)| pattern.is_match(&p.name))
            .map(|(id, p)| (*id, p.created_at, product_summary(*id, p)))
            .collect();
        Ok(paged(entries, window))
    }

    async fn attach_item(&self, product_id: ProductId, item_id: ItemId, amount: i64) -> DbResult<ProductItemId> {
        let mut state = self.state.lock();
        if !state.products.contains_key(&product_id) || !state.items.contains_key(&item_id) {
            return Err(DbError::ForeignKey);
        }
        let id = ProductItemId::new();
        state.product_items.insert(
            id,
            LineRec {
                owner: product_id,
                of: item_id,
                amount,
            },
        );
        Ok(id)
    }

    async fn detach_item(&self, id: ProductItemId) -> DbResult<ProductId> {
        let mut state = self.state.lock();
        state.product_items.remove(&id).map(|l| l.owner).ok_or(DbError::NotFound)
    }

    async fn attach_currency(
        &self,
        product_id: ProductId,
        currency_id: CurrencyId,
        amount: i64,
    ) -> DbResult<ProductCurrencyId> {
        let mut state = self.state.lock();
        if !state.products.contains_key(&product_id) || !state.currencies.contains_key(&currency_id) {
            return Err(DbError::ForeignKey);
        }
        let id = ProductCurrencyId::new();
        state.product_currencies.insert(
            id,
            LineRec {
                owner: product_id,
                of: currency_id,
                amount,
            },
        );
        Ok(id)
    }

    async fn detach_currency(&self, id: ProductCurrencyId) -> DbResult<ProductId> {
        let mut state = self.state.lock();
        state.product_currencies.remove(&id).map(|l| l.owner).ok_or(DbError::NotFound)
    }
}

fn product_summary(id: ProductId, p: &Named) -> ProductSummary {
    ProductSummary {
        id,
        name: p.name.clone(),
        created_at: p.created_at,
        updated_at: p.updated_at,
    }
}

#[async_trait::async_trait]
impl PriceRepo for MemoryStore {
    async fn create(&self, product_id: ProductId) -> DbResult<Price> {
        let mut state = self.state.lock();
        if !state.products.contains_key(&product_id) {
            return Err(DbError::ForeignKey);
        }
        let id = PriceId::new();
        state.prices.insert(id, product_id);
        Ok(Price {
            id,
            product_id,
            items: Vec::new(),
            currencies: Vec::new(),
        })
    }

    async fn get(&self, id: PriceId) -> DbResult<Option<Price>> {
        let state = self.state.lock();
        let Some(product_id) = state.prices.get(&id) else {
            return Ok(None);
        };
        Ok(state
            .product(*product_id)
            .and_then(|p| p.prices.into_iter().find(|price| price.id == id)))
    }

    async fn delete(&self, id: PriceId) -> DbResult<()> {
        let mut state = self.state.lock();
        state.prices.remove(&id).ok_or(DbError::NotFound)?;
        state.price_items.retain(|_, l| l.owner != id);
        state.price_currencies.retain(|_, l| l.owner != id);
        Ok(())
    }

    async fn list_for_product(&self, product_id: ProductId) -> DbResult<Vec<Price>> {
        Ok(self
            .state
            .lock()
            .product(product_id)
            .map(|p| p.prices)
            .unwrap_or_default())
    }

    async fn attach_item(&self, price_id: PriceId, item_id: ItemId, amount: i64) -> DbResult<PriceItemId> {
        let mut state = self.state.lock();
        if !state.prices.contains_key(&price_id) || !state.items.contains_key(&item_id) {
            return Err(DbError::ForeignKey);
        }
        let id = PriceItemId::new();
        state.price_items.insert(
            id,
            LineRec {
                owner: price_id,
                of: item_id,
                amount,
            },
        );
        Ok(id)
    }

    async fn detach_item(&self, id: PriceItemId) -> DbResult<PriceId> {
        let mut state = self.state.lock();
        state.price_items.remove(&id).map(|l| l.owner).ok_or(DbError::NotFound)
    }

    async fn attach_currency(
        &self,
        price_id: PriceId,
        currency_id: CurrencyId,
        amount: i64,
    ) -> DbResult<PriceCurrencyId> {
        let mut state = self.state.lock();
        if !state.prices.contains_key(&price_id) || !state.currencies.contains_key(&currency_id) {
            return Err(DbError::ForeignKey);
        }
        let id = PriceCurrencyId::new();
        state.price_currencies.insert(
            id,
            LineRec {
                owner: price_id,
                of: currency_id,
                amount,
            },
        );
        Ok(id)
    }

    async fn detach_currency(&self, id: PriceCurrencyId) -> DbResult<PriceId> {
        let mut state = self.state.lock();
        state.price_currencies.remove(&id).map(|l| l.owner).ok_or(DbError::NotFound)
    }
}

#[async_trait::async_trait]
impl ShopRepo for MemoryStore {
    async fn create(&self, new: NewShop) -> DbResult<Shop> {
        let id = ShopId::new();
        let mut state = self.state.lock();
        state.shops.insert(id, Named::new(new.name, new.metadata));
        state.shop(id).ok_or(DbError::NotFound)
    }

    async fn update(&self, id: ShopId, patch: EntityPatch) -> DbResult<Shop> {
        let mut state = self.state.lock();
        state.shops.get_mut(&id).ok_or(DbError::NotFound)?.patch(patch);
        state.shop(id).ok_or(DbError::NotFound)
    }

    async fn get(&self, id: ShopId) -> DbResult<Option<Shop>> {
        Ok(self.state.lock().shop(id))
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ShopSummary>, i64)> {
        let state = self.state.lock();
        let entries = state
            .shops
            .iter()
            .map(|(id, s)| {
                let summary = ShopSummary {
                    id: *id,
                    name: s.name.clone(),
                    created_at: s.created_at,
                    updated_at: s.updated_at,
                };
                (*id, s.created_at, summary)
            })
            .collect();
        Ok(paged(entries, window))
    }

    async fn attach_product(&self, shop_id: ShopId, product_id: ProductId) -> DbResult<ShopProductId> {
        let mut state = self.state.lock();
        if !state.shops.contains_key(&shop_id) || !state.products.contains_key(&product_id) {
            return Err(DbError::ForeignKey);
        }
        let id = ShopProductId::new();
        state.shop_products.insert(id, (shop_id, product_id));
        Ok(id)
    }

    async fn detach_product(&self, id: ShopProductId) -> DbResult<ShopId> {
        let mut state = self.state.lock();
        state.shop_products.remove(&id).map(|(shop_id, _)| shop_id).ok_or(DbError::NotFound)
    }
}

#[async_trait::async_trait]
impl ConfigRepo for MemoryStore {
    async fn get(&self, key: &str) -> DbResult<Option<ConfigEntry>> {
        Ok(self.state.lock().configs.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<ConfigEntry> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let entry = state
            .configs
            .entry(key.to_string())
            .and_modify(|e| {
                e.value = value.to_string();
                e.updated_at = now;
            })
            .or_insert_with(|| ConfigEntry {
                key: key.to_string(),
                value: value.to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(entry.clone())
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<ConfigEntry>, i64)> {
        let state = self.state.lock();
        let entries = state
            .configs
            .values()
            .skip(window.offset.max(0) as usize)
            .take(window.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((entries, state.configs.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::StackBalancingMethod;

    async fn stocked(store: &MemoryStore, amount: i64) -> (StorageId, StorageItemId) {
        let player = PlayerRepo::create(store, NewPlayer { name: "ann".into(), metadata: Metadata::default() })
            .await
            .unwrap();
        let storage = StorageRepo::create(
            store,
            NewStorage { player_id: player.id, name: "bag".into(), metadata: Metadata::default() },
        )
        .await
        .unwrap();
        let ore = ItemRepo::create(
            store,
            NewItem {
                name: "ore".into(),
                stackable: true,
                stack_max_amount: 0,
                stack_balancing_method: StackBalancingMethod::UnbalancedFillExistingStacks,
                metadata: Metadata::default(),
            },
        )
        .await
        .unwrap();

        let mut set = ChangeSet::new();
        set.lock(storage.id).extend([StorageChange::CreateStack {
            storage_id: storage.id,
            item_id: ore.id,
            amount,
            metadata: Metadata::parse(r#"{"batch":7}"#).unwrap(),
        }]);
        store.apply(set).await.unwrap();

        let stack = StorageRepo::get(store, storage.id).await.unwrap().unwrap().items[0].clone();
        assert_eq!(stack.metadata.as_str(), r#"{"batch":7}"#);
        (storage.id, stack.id)
    }

    #[tokio::test]
    async fn fill_past_i64_is_a_conflict_and_rolls_back() {
        let store = MemoryStore::new();
        let (storage_id, stack_id) = stocked(&store, i64::MAX - 1).await;

        let mut set = ChangeSet::new();
        set.lock(storage_id)
            .extend([StorageChange::FillStack { id: stack_id, expected: i64::MAX - 1, add: 2 }]);
        let err = store.apply(set).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let storage = StorageRepo::get(&store, storage_id).await.unwrap().unwrap();
        assert_eq!(storage.stack(stack_id).map(|s| s.amount), Some(i64::MAX - 1));
    }

    #[tokio::test]
    async fn config_entries_upsert_and_list_by_key() {
        let store = MemoryStore::new();
        store.set("motd", "hello").await.unwrap();
        store.set("banner", "x").await.unwrap();
        let updated = store.set("motd", "bye").await.unwrap();
        assert_eq!(updated.value, "bye");
        assert!(updated.updated_at >= updated.created_at);

        let (entries, total) = ConfigRepo::list(&store, PageWindow { index: 0, limit: 10, offset: 0 })
            .await
            .unwrap();
        assert_eq!(total, 2);
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["banner", "motd"]);
        assert!(ConfigRepo::get(&store, "missing").await.unwrap().is_none());
    }
}
