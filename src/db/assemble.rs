//! Folding of denormalized join rows into nested entities.
//!
//! Every joined entity is read as an `Option`: the left joins produce NULL
//! columns for parents without children, and a child is only built when its
//! own id column is present. Children are collected into maps keyed by id
//! since the one-to-many-to-many joins repeat each child many times.

use crate::db::DbResult;
use crate::models::currency::Currency;
use crate::models::item::Item;
use crate::models::product::{Price, PriceCurrency, PriceItem, Product, ProductCurrency, ProductItem};
use crate::models::shop::{Shop, ShopProduct};
use crate::models::storage::{Storage, StorageCurrency, StorageItem};
use crate::models::types::*;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio_postgres::Row;

/// Select list for an `item` table aliased as `alias`, with every column
/// renamed to `{alias}_{column}`.
pub(crate) fn item_columns(alias: &str) -> String {
    prefixed(
        alias,
        &[
            "id",
            "name",
            "stackable",
            "stack_max_amount",
            "stack_balancing_method",
            "metadata",
            "created_at",
            "updated_at",
        ],
    )
}

pub(crate) fn currency_columns(alias: &str) -> String {
    prefixed(alias, &["id", "name", "short_name", "symbol", "created_at", "updated_at"])
}

fn prefixed(alias: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{alias}.{c} AS {alias}_{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn col(prefix: &str, name: &str) -> String {
    format!("{prefix}_{name}")
}

fn read_item(row: &Row, prefix: &str) -> DbResult<Option<Item>> {
    let Some(id) = row.try_get::<_, Option<ItemId>>(col(prefix, "id").as_str())? else {
        return Ok(None);
    };
    Ok(Some(Item {
        id,
        name: row.try_get(col(prefix, "name").as_str())?,
        stackable: row.try_get(col(prefix, "stackable").as_str())?,
        stack_max_amount: row.try_get(col(prefix, "stack_max_amount").as_str())?,
        stack_balancing_method: row.try_get(col(prefix, "stack_balancing_method").as_str())?,
        metadata: row.try_get(col(prefix, "metadata").as_str())?,
        created_at: row.try_get(col(prefix, "created_at").as_str())?,
        updated_at: row.try_get(col(prefix, "updated_at").as_str())?,
    }))
}

fn read_currency(row: &Row, prefix: &str) -> DbResult<Option<Currency>> {
    let Some(id) = row.try_get::<_, Option<CurrencyId>>(col(prefix, "id").as_str())? else {
        return Ok(None);
    };
    Ok(Some(Currency {
        id,
        name: row.try_get(col(prefix, "name").as_str())?,
        short_name: row.try_get(col(prefix, "short_name").as_str())?,
        symbol: row.try_get(col(prefix, "symbol").as_str())?,
        created_at: row.try_get(col(prefix, "created_at").as_str())?,
        updated_at: row.try_get(col(prefix, "updated_at").as_str())?,
    }))
}

/// A joined `(id, amount, entity)` triple such as a product item or a price
/// currency.
#[derive(Debug, Clone)]
pub struct Line<I, T> {
    pub id: I,
    pub amount: i64,
    pub of: T,
}

fn read_line<I, T>(
    row: &Row,
    prefix: &str,
    entity_prefix: &str,
    read: fn(&Row, &str) -> DbResult<Option<T>>,
) -> DbResult<Option<Line<I, T>>>
where
    I: for<'a> postgres_types::FromSql<'a>,
{
    let id: Option<I> = row.try_get(col(prefix, "id").as_str())?;
    let amount: Option<i64> = row.try_get(col(prefix, "amount").as_str())?;
    match (id, amount, read(row, entity_prefix)?) {
        (Some(id), Some(amount), Some(of)) => Ok(Some(Line { id, amount, of })),
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StorageHead {
    pub id: StorageId,
    pub player_id: PlayerId,
    pub name: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StackCols {
    pub id: StorageItemId,
    pub amount: i64,
    pub metadata: Metadata,
    pub item: Item,
}

/// One row of storage × storage_item × storage_currency.
#[derive(Debug, Clone)]
pub struct StorageRow {
    pub head: StorageHead,
    pub stack: Option<StackCols>,
    pub balance: Option<Line<StorageCurrencyId, Currency>>,
}

impl StorageRow {
    pub fn select() -> String {
        format!(
            r#"
            SELECT s.id, s.player_id, s.name, s.metadata, s.created_at, s.updated_at,
                   si.id AS si_id, si.amount AS si_amount, si.metadata AS si_metadata, {items},
                   sc.id AS sc_id, sc.amount AS sc_amount, {currencies}
            FROM storage s
            LEFT JOIN (storage_item si JOIN item i ON i.id = si.item_id) ON si.storage_id = s.id
            LEFT JOIN (storage_currency sc JOIN currency c ON c.id = sc.currency_id) ON sc.storage_id = s.id
            WHERE s.id = $1
            "#,
            items = item_columns("i"),
            currencies = currency_columns("c"),
        )
    }

    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        let head = StorageHead {
            id: row.try_get("id")?,
            player_id: row.try_get("player_id")?,
            name: row.try_get("name")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        };

        let stack_id: Option<StorageItemId> = row.try_get("si_id")?;
        let stack = match (stack_id, read_item(row, "i")?) {
            (Some(id), Some(item)) => Some(StackCols {
                id,
                amount: row.try_get("si_amount")?,
                metadata: row.try_get("si_metadata")?,
                item,
            }),
            _ => None,
        };

        Ok(Self {
            head,
            stack,
            balance: read_line(row, "sc", "c", read_currency)?,
        })
    }
}

pub fn assemble_storage(rows: Vec<StorageRow>) -> Option<Storage> {
    let head = rows.first()?.head.clone();
    let mut items = BTreeMap::new();
    let mut currencies = BTreeMap::new();

    for row in rows {
        if let Some(stack) = row.stack {
            items.entry(stack.id).or_insert_with(|| StorageItem {
                id: stack.id,
                storage_id: head.id,
                item: stack.item,
                amount: stack.amount,
                metadata: stack.metadata,
            });
        }
        if let Some(balance) = row.balance {
            currencies.entry(balance.id).or_insert_with(|| StorageCurrency {
                id: balance.id,
                storage_id: head.id,
                currency: balance.of,
                amount: balance.amount,
            });
        }
    }

    Some(Storage {
        id: head.id,
        player_id: head.player_id,
        name: head.name,
        metadata: head.metadata,
        items: items.into_values().collect(),
        currencies: currencies.into_values().collect(),
        created_at: head.created_at,
        updated_at: head.updated_at,
    })
}

// ---------------------------------------------------------------------------
// product
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProductHead {
    pub id: ProductId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of product × rewards × prices × price baskets.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub head: ProductHead,
    pub reward_item: Option<Line<ProductItemId, Item>>,
    pub reward_currency: Option<Line<ProductCurrencyId, Currency>>,
    pub price_id: Option<PriceId>,
    pub price_item: Option<Line<PriceItemId, Item>>,
    pub price_currency: Option<Line<PriceCurrencyId, Currency>>,
}

impl ProductRow {
    /// Select for every product whose id is in the `$1` array.
    pub fn select() -> String {
        format!(
            r#"
            SELECT p.id, p.name, p.created_at, p.updated_at,
                   pi.id AS pi_id, pi.amount AS pi_amount, {reward_items},
                   pc.id AS pc_id, pc.amount AS pc_amount, {reward_currencies},
                   pr.id AS pr_id,
                   ri.id AS ri_id, ri.amount AS ri_amount, {price_items},
                   rc.id AS rc_id, rc.amount AS rc_amount, {price_currencies}
            FROM product p
            LEFT JOIN (product_item pi JOIN item pii ON pii.id = pi.item_id) ON pi.product_id = p.id
            LEFT JOIN (product_currency pc JOIN currency pcc ON pcc.id = pc.currency_id) ON pc.product_id = p.id
            LEFT JOIN price pr ON pr.product_id = p.id
            LEFT JOIN (price_item ri JOIN item rii ON rii.id = ri.item_id) ON ri.price_id = pr.id
            LEFT JOIN (price_currency rc JOIN currency rcc ON rcc.id = rc.currency_id) ON rc.price_id = pr.id
            WHERE p.id = ANY($1)
            "#,
            reward_items = item_columns("pii"),
            reward_currencies = currency_columns("pcc"),
            price_items = item_columns("rii"),
            price_currencies = currency_columns("rcc"),
        )
    }

    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        let price_id: Option<PriceId> = row.try_get("pr_id")?;
        Ok(Self {
            head: ProductHead {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            },
            reward_item: read_line(row, "pi", "pii", read_item)?,
            reward_currency: read_line(row, "pc", "pcc", read_currency)?,
            price_id,
            price_item: if price_id.is_some() {
                read_line(row, "ri", "rii", read_item)?
            } else {
                None
            },
            price_currency: if price_id.is_some() {
                read_line(row, "rc", "rcc", read_currency)?
            } else {
                None
            },
        })
    }
}

#[derive(Default)]
struct PriceParts {
    items: BTreeMap<PriceItemId, PriceItem>,
    currencies: BTreeMap<PriceCurrencyId, PriceCurrency>,
}

#[derive(Default)]
struct ProductParts {
    head: Option<ProductHead>,
    items: BTreeMap<ProductItemId, ProductItem>,
    currencies: BTreeMap<ProductCurrencyId, ProductCurrency>,
    prices: BTreeMap<PriceId, PriceParts>,
}

/// Fold rows of any number of products; products come out in order of first
/// appearance.
pub fn assemble_products(rows: Vec<ProductRow>) -> Vec<Product> {
    let mut order = Vec::new();
    let mut parts: BTreeMap<ProductId, ProductParts> = BTreeMap::new();

    for row in rows {
        let p = parts.entry(row.head.id).or_insert_with(|| {
            order.push(row.head.id);
            ProductParts::default()
        });
        if p.head.is_none() {
            p.head = Some(row.head.clone());
        }

        if let Some(line) = row.reward_item {
            p.items.entry(line.id).or_insert(ProductItem {
                id: line.id,
                item: line.of,
                amount: line.amount,
            });
        }
        if let Some(line) = row.reward_currency {
            p.currencies.entry(line.id).or_insert(ProductCurrency {
                id: line.id,
                currency: line.of,
                amount: line.amount,
            });
        }
        if let Some(price_id) = row.price_id {
            let price = p.prices.entry(price_id).or_default();
            if let Some(line) = row.price_item {
                price.items.entry(line.id).or_insert(PriceItem {
                    id: line.id,
                    item: line.of,
                    amount: line.amount,
                });
            }
            if let Some(line) = row.price_currency {
                price.currencies.entry(line.id).or_insert(PriceCurrency {
                    id: line.id,
                    currency: line.of,
                    amount: line.amount,
                });
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let p = parts.remove(&id)?;
            let head = p.head?;
            Some(Product {
                id: head.id,
                name: head.name,
                items: p.items.into_values().collect(),
                currencies: p.currencies.into_values().collect(),
                prices: p
                    .prices
                    .into_iter()
                    .map(|(price_id, parts)| Price {
                        id: price_id,
                        product_id: head.id,
                        items: parts.items.into_values().collect(),
                        currencies: parts.currencies.into_values().collect(),
                    })
                    .collect(),
                created_at: head.created_at,
                updated_at: head.updated_at,
            })
        })
        .collect()
}

pub fn assemble_product(rows: Vec<ProductRow>) -> Option<Product> {
    assemble_products(rows).into_iter().next()
}

// ---------------------------------------------------------------------------
// shop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ShopHead {
    pub id: ShopId,
    pub name: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of shop × shop_product.
#[derive(Debug, Clone)]
pub struct ShopRow {
    pub head: ShopHead,
    pub link: Option<(ShopProductId, ProductId)>,
}

impl ShopRow {
    pub const SELECT: &'static str = r#"
        SELECT s.id, s.name, s.metadata, s.created_at, s.updated_at,
               sp.id AS sp_id, sp.product_id AS sp_product_id
        FROM shop s
        LEFT JOIN shop_product sp ON sp.shop_id = s.id
        WHERE s.id = $1
    "#;

    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        let link_id: Option<ShopProductId> = row.try_get("sp_id")?;
        let product_id: Option<ProductId> = row.try_get("sp_product_id")?;
        Ok(Self {
            head: ShopHead {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                metadata: row.try_get("metadata")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            },
            link: link_id.zip(product_id),
        })
    }
}

/// Product ids linked from the shop rows, without duplicates.
pub fn linked_products(rows: &[ShopRow]) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = rows.iter().filter_map(|r| r.link.map(|(_, p)| p)).collect();
    ids.sort();
    ids.dedup();
    ids
}

pub fn assemble_shop(rows: Vec<ShopRow>, products: Vec<Product>) -> Option<Shop> {
    let head = rows.first()?.head.clone();
    let products: BTreeMap<ProductId, Product> = products.into_iter().map(|p| (p.id, p)).collect();

    let mut links = BTreeMap::new();
    for (link_id, product_id) in rows.into_iter().filter_map(|r| r.link) {
        if let Some(product) = products.get(&product_id) {
            links.entry(link_id).or_insert_with(|| ShopProduct {
                id: link_id,
                product: product.clone(),
            });
        }
    }

    Some(Shop {
        id: head.id,
        name: head.name,
        metadata: head.metadata,
        products: links.into_values().collect(),
        created_at: head.created_at,
        updated_at: head.updated_at,
    })
}
