//! Pure inventory engine. Everything here works on a storage snapshot and
//! produces a [`ChangeSet`]; nothing touches the store until the set is
//! handed to `StorageRepo::apply`.

use crate::models::storage::Storage;
use crate::models::types::{CurrencyId, ItemId, Metadata, StorageCurrencyId, StorageId, StorageItemId};
use serde::Serialize;

pub mod placement;
pub mod purchase;
pub mod removal;
pub mod split;

pub use placement::{check_grant, plan_grant, plan_grant_with};
pub use purchase::plan_purchase;
pub use removal::{check_affordable, plan_currency_debit, plan_item_debit};
pub use split::{SplitSpec, derive_amounts, plan_merge, plan_split};

/// Most rows a single grant or split may create. Larger requests are
/// rejected before anything is planned.
pub const MAX_NEW_STACKS: i64 = 10_000;

/// A single write against the stacks or balances of a storage. Variants
/// carrying an `expected` amount only apply if the row still holds exactly
/// that amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StorageChange {
    CreateStack {
        storage_id: StorageId,
        item_id: ItemId,
        amount: i64,
        metadata: Metadata,
    },
    FillStack {
        id: StorageItemId,
        expected: i64,
        add: i64,
    },
    ShrinkStack {
        id: StorageItemId,
        expected: i64,
        by: i64,
    },
    DeleteStack {
        id: StorageItemId,
        expected: i64,
    },
    /// Upsert: creates the balance row if the storage has none for the currency
    AddCurrency {
        storage_id: StorageId,
        currency_id: CurrencyId,
        amount: i64,
    },
    TakeCurrency {
        id: StorageCurrencyId,
        expected: i64,
        amount: i64,
    },
}

/// Changes applied all-or-nothing, after locking `locks` in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub locks: Vec<StorageId>,
    pub changes: Vec<StorageChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a storage. Repeated ids are ignored so the order of first use wins.
    pub fn lock(&mut self, storage_id: StorageId) -> &mut Self {
        if !self.locks.contains(&storage_id) {
            self.locks.push(storage_id);
        }
        self
    }

    pub fn extend(&mut self, changes: impl IntoIterator<Item = StorageChange>) -> &mut Self {
        self.changes.extend(changes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// The storage as it looks after the debit side of `changes` has been
/// applied. Used to plan credits into the same storage a purchase pays from.
pub fn after_debits(storage: &Storage, changes: &[StorageChange]) -> Storage {
    let mut projected = storage.clone();
    for change in changes {
        match change {
            StorageChange::ShrinkStack { id, by, .. } => {
                if let Some(stack) = projected.items.iter_mut().find(|s| s.id == *id) {
                    stack.amount -= by;
                }
            }
            StorageChange::DeleteStack { id, .. } => projected.items.retain(|s| s.id != *id),
            StorageChange::TakeCurrency { id, amount, .. } => {
                if let Some(balance) = projected.currencies.iter_mut().find(|c| c.id == *id) {
                    balance.amount -= amount;
                }
            }
            _ => {}
        }
    }
    projected
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::models::item::StackBalancingMethod;

    #[test]
    fn lock_keeps_first_order() {
        let (a, b) = (StorageId::new(), StorageId::new());
        let mut set = ChangeSet::new();
        set.lock(a).lock(b).lock(a);
        assert_eq!(set.locks, vec![a, b]);
    }

    #[test]
    fn projection_applies_debits_only() {
        let gold = item(true, 100, StackBalancingMethod::Default);
        let coin = currency("coin");
        let mut s = storage();
        let a = with_stack(&mut s, &gold, 40);
        let b = with_stack(&mut s, &gold, 10);
        let bal = with_balance(&mut s, &coin, 30);

        let changes = vec![
            StorageChange::ShrinkStack { id: a, expected: 40, by: 15 },
            StorageChange::DeleteStack { id: b, expected: 10 },
            StorageChange::TakeCurrency { id: bal, expected: 30, amount: 30 },
            StorageChange::CreateStack {
                storage_id: s.id,
                item_id: gold.id,
                amount: 5,
                metadata: Metadata::default(),
            },
        ];
        let p = after_debits(&s, &changes);
        assert_eq!(p.items.len(), 1);
        assert_eq!(p.stack(a).map(|s| s.amount), Some(25));
        assert_eq!(p.currencies[0].amount, 0);
    }
}
