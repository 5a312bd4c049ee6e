mod config;
mod config_db;
mod currency;
mod currency_db;
mod item;
mod item_db;
mod player;
mod player_db;
mod price;
mod price_db;
mod product;
mod product_db;
mod shop;
mod shop_db;
mod storage;
mod storage_db;

pub use config_db::ConfigRepository;
pub use currency_db::CurrencyRepository;
pub use item_db::ItemRepository;
pub use player_db::PlayerRepository;
pub use price_db::PriceRepository;
pub use product_db::ProductRepository;
pub use shop_db::ShopRepository;
pub use storage_db::StorageRepository;

pub use config::ConfigRepo;
pub use currency::CurrencyRepo;
pub use item::ItemRepo;
pub use player::PlayerRepo;
pub use price::PriceRepo;
pub use product::ProductRepo;
pub use shop::ShopRepo;
pub use storage::StorageRepo;

use crate::db::DbResult;
use tokio_postgres::types::ToSql;

/// Run a `SELECT COUNT(*) ...` and return the count.
pub(crate) async fn count_rows(
    client: &deadpool_postgres::Client,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> DbResult<i64> {
    let stmt = client.prepare_cached(sql).await?;
    let row = client.query_one(&stmt, params).await?;
    Ok(row.try_get(0)?)
}
