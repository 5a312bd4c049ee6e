mod config;
mod currency;
mod item;
mod player;
mod price;
mod product;
mod shop;
mod storage;

pub use config::ConfigService;
pub use currency::CurrencyService;
pub use item::ItemService;
pub use player::PlayerService;
pub use price::PriceService;
pub use product::ProductService;
pub use shop::ShopService;
pub use storage::StorageService;

use crate::db::error::DbError;
use crate::db::repo::StorageRepo;
use crate::error::{AppResult, DomainError};
use crate::stacking::ChangeSet;
use std::future::Future;

/// Times a storage write is planned and applied before a lost race is
/// reported to the caller.
const APPLY_ATTEMPTS: u32 = 3;

fn require_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::invalid("no name given"));
    }
    Ok(())
}

/// Search queries are case-insensitive regular expressions on the name.
fn require_query(query: &str) -> AppResult<()> {
    if query.is_empty() {
        return Err(DomainError::invalid("no query given"));
    }
    regex::RegexBuilder::new(query)
        .case_insensitive(true)
        .build()
        .map_err(|_| DomainError::invalid("query is not a valid pattern"))?;
    Ok(())
}

fn require_positive(amount: i64) -> AppResult<()> {
    if amount <= 0 {
        return Err(DomainError::invalid("amount must be positive"));
    }
    Ok(())
}

/// Plan a change set against fresh reads and apply it. When a guard no longer
/// holds, another writer got there first and `plan` runs again on the new
/// state. Other data-layer failures map to `Internal(context)`.
async fn apply_planned<P, F>(storages: &dyn StorageRepo, context: &'static str, mut plan: P) -> AppResult<()>
where
    P: FnMut() -> F,
    F: Future<Output = AppResult<ChangeSet>>,
{
    let mut attempt = 1;
    loop {
        let set = plan().await?;
        if set.is_empty() {
            return Ok(());
        }
        match storages.apply(set).await {
            Ok(()) => return Ok(()),
            Err(DbError::Conflict(what)) if attempt < APPLY_ATTEMPTS => {
                tracing::debug!(attempt, %what, context, "storage changed while planning, retrying");
                attempt += 1;
            }
            Err(DbError::Conflict(what)) => {
                tracing::warn!(attempt, %what, context, "storage kept changing, giving up");
                return Err(DomainError::aborted("storage could not be updated, try again"));
            }
            Err(e) => return Err(DomainError::internal(context)(e)),
        }
    }
}
