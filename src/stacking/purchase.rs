use crate::error::AppResult;
use crate::models::product::{Price, Product};
use crate::models::storage::Storage;
use crate::stacking::{
    ChangeSet, StorageChange, after_debits, check_grant, plan_currency_debit, plan_grant, plan_item_debit,
};

/// Plan the full exchange of a purchase: currency debits, item debits,
/// currency credits and item credits, in that order. `receiving` is `None`
/// when the buyer pays from and receives into the same storage; credits are
/// then planned against the storage as it looks after the debits.
pub fn plan_purchase(
    product: &Product,
    price: &Price,
    paying: &Storage,
    receiving: Option<&Storage>,
) -> AppResult<ChangeSet> {
    let mut set = ChangeSet::new();
    set.lock(paying.id);
    if let Some(receiving) = receiving {
        set.lock(receiving.id);
    }

    for (currency, amount) in price.required_currencies() {
        set.extend(plan_currency_debit(paying, &currency, amount)?);
    }
    for (item, amount) in price.required_items() {
        set.extend(plan_item_debit(paying, &item, amount)?);
    }

    let target = match receiving {
        Some(receiving) => receiving.clone(),
        None => after_debits(paying, &set.changes),
    };

    for (currency, amount) in product.reward_currencies() {
        if amount > 0 {
            set.extend([StorageChange::AddCurrency {
                storage_id: target.id,
                currency_id: currency.id,
                amount,
            }]);
        }
    }
    for (item, amount) in product.reward_items() {
        check_grant(&item, amount)?;
        set.extend(plan_grant(&target, &item, amount));
    }

    Ok(set)
}
