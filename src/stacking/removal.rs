use crate::error::{AppResult, DomainError};
use crate::models::currency::Currency;
use crate::models::item::Item;
use crate::models::product::Price;
use crate::models::storage::{Storage, StorageItem};
use crate::stacking::StorageChange;

/// Verify `storage` holds everything `price` asks for. Pure; never mutates.
pub fn check_affordable(storage: &Storage, price: &Price) -> AppResult<()> {
    for (currency, required) in price.required_currencies() {
        let held = storage.balance_of(currency.id).map(|b| b.amount).unwrap_or(0);
        if held < required {
            return Err(not_enough_currency(&currency));
        }
    }

    for (item, required) in price.required_items() {
        if storage.units_of(item.id) < required {
            return Err(not_enough_items(&item));
        }
    }

    Ok(())
}

/// Guarded decrement of the storage's balance of `currency`.
pub fn plan_currency_debit(storage: &Storage, currency: &Currency, amount: i64) -> AppResult<Option<StorageChange>> {
    if amount <= 0 {
        return Ok(None);
    }
    match storage.balance_of(currency.id) {
        Some(balance) if balance.amount >= amount => Ok(Some(StorageChange::TakeCurrency {
            id: balance.id,
            expected: balance.amount,
            amount,
        })),
        _ => Err(not_enough_currency(currency)),
    }
}

/// Remove `amount` units of `item`. Stackable items are taken from the
/// largest stacks first, shrinking the last one touched; non-stackable items
/// lose whole rows.
pub fn plan_item_debit(storage: &Storage, item: &Item, amount: i64) -> AppResult<Vec<StorageChange>> {
    if amount <= 0 {
        return Ok(Vec::new());
    }
    if storage.units_of(item.id) < amount {
        return Err(not_enough_items(item));
    }

    let mut stacks: Vec<&StorageItem> = storage.stacks_of(item.id).collect();
    if item.stackable {
        stacks.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.id.cmp(&b.id)));
    } else {
        stacks.sort_by_key(|s| s.id);
    }

    let mut changes = Vec::new();
    let mut remaining = amount;
    for stack in stacks {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(stack.units());
        if take == stack.units() {
            changes.push(StorageChange::DeleteStack {
                id: stack.id,
                expected: stack.amount,
            });
        } else {
            changes.push(StorageChange::ShrinkStack {
                id: stack.id,
                expected: stack.amount,
                by: take,
            });
        }
        remaining -= take;
    }
    Ok(changes)
}

fn not_enough_currency(currency: &Currency) -> DomainError {
    DomainError::aborted(format!("not enough of currency {} in the storage", currency.name))
}

fn not_enough_items(item: &Item) -> DomainError {
    DomainError::aborted(format!("not enough of items {} in the storage", item.name))
}
