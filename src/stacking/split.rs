use crate::error::{AppResult, DomainError};
use crate::models::storage::{Storage, StorageItem};
use crate::models::types::StorageItemId;
use crate::stacking::{MAX_NEW_STACKS, StorageChange};
use serde::{Deserialize, Serialize};

/// How the caller wants a stack divided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSpec {
    Amounts(Vec<i64>),
    Chunks(i64),
    FixedAmount(i64),
}

/// Turn a split request into the list of resulting stack amounts for a stack
/// holding `total` units. The list is not checked against `total` here.
pub fn derive_amounts(split: &SplitSpec, total: i64) -> AppResult<Vec<i64>> {
    match split {
        SplitSpec::Amounts(amounts) => {
            if amounts.is_empty() {
                return Err(DomainError::invalid("no amounts given"));
            }
            if amounts.len() as i64 > MAX_NEW_STACKS {
                return Err(DomainError::invalid(format!("cannot split into more than {MAX_NEW_STACKS} stacks")));
            }
            Ok(amounts.clone())
        }
        SplitSpec::Chunks(chunks) => {
            let chunks = *chunks;
            if chunks <= 0 {
                return Err(DomainError::invalid("chunks must be positive"));
            }
            if chunks > total {
                return Err(DomainError::aborted(format!("cannot split {total} units into {chunks} chunks")));
            }
            if chunks > MAX_NEW_STACKS {
                return Err(DomainError::invalid(format!("cannot split into more than {MAX_NEW_STACKS} stacks")));
            }
            let per_chunk = total / chunks;
            let mut amounts = vec![per_chunk; (chunks - 1) as usize];
            // trailing chunk is total / chunks as well, so an uneven total fails the sum check
            amounts.push(total / chunks);
            Ok(amounts)
        }
        SplitSpec::FixedAmount(amount) => {
            let amount = *amount;
            if amount <= 0 {
                return Err(DomainError::invalid("amount must be positive"));
            }
            if total / amount + i64::from(total % amount != 0) > MAX_NEW_STACKS {
                return Err(DomainError::invalid(format!("cannot split into more than {MAX_NEW_STACKS} stacks")));
            }
            let mut amounts = Vec::new();
            let mut left = total;
            while left > amount {
                amounts.push(amount);
                left -= amount;
            }
            if left > 0 {
                amounts.push(left);
            }
            Ok(amounts)
        }
    }
}

/// Replace one stack by stacks of exactly `amounts`.
pub fn plan_split(storage: &Storage, stack_id: StorageItemId, amounts: &[i64]) -> AppResult<Vec<StorageChange>> {
    let stack = find(storage, stack_id)?;
    if !stack.item.stackable {
        return Err(DomainError::aborted(format!("item {} is not stackable", stack.item.name)));
    }
    if amounts.iter().any(|a| *a <= 0) {
        return Err(DomainError::invalid("split amounts must be positive"));
    }

    let sum = amounts.iter().try_fold(0i64, |acc, a| acc.checked_add(*a));
    if sum != Some(stack.amount) {
        return Err(DomainError::aborted(format!(
            "split amounts do not add up to the stack amount {}",
            stack.amount
        )));
    }

    let mut changes = Vec::with_capacity(amounts.len() + 1);
    changes.push(StorageChange::DeleteStack {
        id: stack.id,
        expected: stack.amount,
    });
    changes.extend(amounts.iter().map(|a| StorageChange::CreateStack {
        storage_id: storage.id,
        item_id: stack.item.id,
        amount: *a,
        metadata: stack.metadata.clone(),
    }));
    Ok(changes)
}

/// Move everything in `from` onto `to` and drop `from`.
pub fn plan_merge(storage: &Storage, to: StorageItemId, from: StorageItemId) -> AppResult<Vec<StorageChange>> {
    if to == from {
        return Err(DomainError::invalid("cannot merge a stack into itself"));
    }
    let target = find(storage, to)?;
    let source = find(storage, from)?;

    if target.item.id != source.item.id {
        return Err(DomainError::aborted("stacks hold different items"));
    }
    if !target.item.stackable {
        return Err(DomainError::aborted(format!("item {} is not stackable", target.item.name)));
    }

    let merged = target.amount.checked_add(source.amount);
    let max = target.item.stack_max_amount;
    match merged {
        Some(m) if max == 0 || m <= max => {}
        _ => {
            return Err(DomainError::aborted(format!(
                "merged stack would exceed the maximum stack amount {max}"
            )));
        }
    }

    Ok(vec![
        StorageChange::FillStack {
            id: target.id,
            expected: target.amount,
            add: source.amount,
        },
        StorageChange::DeleteStack {
            id: source.id,
            expected: source.amount,
        },
    ])
}

fn find(storage: &Storage, id: StorageItemId) -> AppResult<&StorageItem> {
    storage
        .stack(id)
        .ok_or_else(|| DomainError::not_found(format!("storage item {id} not found in storage")))
}
