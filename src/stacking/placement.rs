use crate::error::{AppResult, DomainError};
use crate::models::item::{Item, StackBalancingMethod};
use crate::models::storage::{Storage, StorageItem};
use crate::models::types::Metadata;
use crate::stacking::{MAX_NEW_STACKS, StorageChange};

/// Reject grants that could create more than [`MAX_NEW_STACKS`] rows. The
/// bound is taken before any existing stack is topped up.
pub fn check_grant(item: &Item, amount: i64) -> AppResult<()> {
    let rows = if !item.stackable {
        amount
    } else if item.stack_max_amount > 0 {
        amount / item.stack_max_amount + i64::from(amount % item.stack_max_amount != 0)
    } else {
        1
    };
    if rows > MAX_NEW_STACKS {
        return Err(DomainError::invalid(format!(
            "granting {amount} of {} would create more than {MAX_NEW_STACKS} stacks",
            item.name
        )));
    }
    Ok(())
}

/// Plan the writes that place `amount` units of `item` into `storage`
/// according to the item's stack balancing method. The units written always
/// add up to `amount`; a non-positive amount plans nothing.
pub fn plan_grant(storage: &Storage, item: &Item, amount: i64) -> Vec<StorageChange> {
    plan_grant_with(storage, item, amount, &Metadata::default())
}

/// [`plan_grant`], stamping `metadata` on every stack it creates. Stacks
/// that are only topped up keep their own metadata.
pub fn plan_grant_with(storage: &Storage, item: &Item, amount: i64, metadata: &Metadata) -> Vec<StorageChange> {
    let mut changes = Vec::new();
    if amount <= 0 {
        return changes;
    }

    if !item.stackable {
        changes.extend((0..amount).map(|_| create(storage, item, 1, metadata)));
        return changes;
    }

    let mut remainder = amount;
    if item.stack_balancing_method.fills_existing() {
        remainder = fill_existing(storage, item, remainder, &mut changes);
    }
    create_stacks(storage, item, remainder, metadata, &mut changes);

    tracing::debug!(
        storage_id = %storage.id,
        item_id = %item.id,
        amount,
        method = %item.stack_balancing_method,
        writes = changes.len(),
        "planned grant"
    );
    changes
}

/// Stacks that can still take units, in stack id order.
fn candidates<'a>(storage: &'a Storage, item: &Item) -> Vec<&'a StorageItem> {
    let mut stacks: Vec<&StorageItem> = storage
        .stacks_of(item.id)
        .filter(|s| item.stack_max_amount == 0 || s.amount < item.stack_max_amount)
        .collect();
    stacks.sort_by_key(|s| s.id);
    stacks
}

fn fill_existing(storage: &Storage, item: &Item, mut remainder: i64, changes: &mut Vec<StorageChange>) -> i64 {
    let stacks = candidates(storage, item);

    if item.stack_max_amount == 0 {
        if let Some(first) = stacks.first() {
            changes.push(StorageChange::FillStack {
                id: first.id,
                expected: first.amount,
                add: remainder,
            });
            remainder = 0;
        }
        return remainder;
    }

    let limit = match item.stack_balancing_method {
        StackBalancingMethod::BalancedFillExistingStacks => stacks.len(),
        _ => 1,
    };

    for stack in stacks.into_iter().take(limit) {
        if remainder == 0 {
            break;
        }
        let take = remainder.min(item.stack_max_amount - stack.amount);
        changes.push(StorageChange::FillStack {
            id: stack.id,
            expected: stack.amount,
            add: take,
        });
        remainder -= take;
    }
    remainder
}

fn create_stacks(
    storage: &Storage,
    item: &Item,
    remainder: i64,
    metadata: &Metadata,
    changes: &mut Vec<StorageChange>,
) {
    if remainder <= 0 {
        return;
    }
    if item.stack_max_amount == 0 {
        changes.push(create(storage, item, remainder, metadata));
        return;
    }

    let full = remainder / item.stack_max_amount;
    changes.extend((0..full).map(|_| create(storage, item, item.stack_max_amount, metadata)));

    let partial = remainder % item.stack_max_amount;
    if partial > 0 {
        changes.push(create(storage, item, partial, metadata));
    }
}

fn create(storage: &Storage, item: &Item, amount: i64, metadata: &Metadata) -> StorageChange {
    StorageChange::CreateStack {
        storage_id: storage.id,
        item_id: item.id,
        amount,
        metadata: metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::stacking::fixtures::*;
    use crate::models::item::StackBalancingMethod as M;

    fn granted(changes: &[StorageChange]) -> i64 {
        changes
            .iter()
            .map(|c| match c {
                StorageChange::CreateStack { amount, .. } => *amount,
                StorageChange::FillStack { add, .. } => *add,
                _ => 0,
            })
            .sum()
    }

    fn created(changes: &[StorageChange]) -> Vec<i64> {
        changes
            .iter()
            .filter_map(|c| match c {
                StorageChange::CreateStack { amount, .. } => Some(*amount),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn non_stackable_creates_one_row_per_unit() {
        let sword = item(false, 0, M::Default);
        let changes = plan_grant(&storage(), &sword, 3);
        assert_eq!(created(&changes), vec![1, 1, 1]);
    }

    #[test]
    fn create_new_never_touches_existing() {
        let gold = item(true, 100, M::UnbalancedCreateNewStacks);
        let mut s = storage();
        with_stack(&mut s, &gold, 60);
        assert_eq!(plan_grant(&s, &gold, 60), vec![create(&s, &gold, 60, &Metadata::default())]);
    }

    #[test]
    fn capped_creation_splits_into_full_and_partial() {
        let gold = item(true, 100, M::Default);
        assert_eq!(created(&plan_grant(&storage(), &gold, 250)), vec![100, 100, 50]);
        assert_eq!(created(&plan_grant(&storage(), &gold, 200)), vec![100, 100]);
    }

    #[test]
    fn unbounded_creation_is_one_stack() {
        let gold = item(true, 0, M::UnbalancedCreateNewStacks);
        assert_eq!(created(&plan_grant(&storage(), &gold, 12345)), vec![12345]);
    }

    #[test]
    fn balanced_fill_tops_up_then_overflows() {
        let gold = item(true, 100, M::BalancedFillExistingStacks);
        let mut s = storage();
        let existing = with_stack(&mut s, &gold, 80);

        let changes = plan_grant(&s, &gold, 50);
        assert_eq!(
            changes,
            vec![
                StorageChange::FillStack { id: existing, expected: 80, add: 20 },
                create(&s, &gold, 30, &Metadata::default()),
            ]
        );
    }

    #[test]
    fn balanced_fill_spreads_over_all_candidates() {
        let gold = item(true, 10, M::BalancedFillExistingStacks);
        let mut s = storage();
        with_stack(&mut s, &gold, 7);
        with_stack(&mut s, &gold, 10);
        with_stack(&mut s, &gold, 5);

        let changes = plan_grant(&s, &gold, 9);
        let fills = changes.iter().filter(|c| matches!(c, StorageChange::FillStack { .. })).count();
        assert_eq!(fills, 2);
        assert_eq!(created(&changes), vec![1]);
        assert_eq!(granted(&changes), 9);
    }

    #[test]
    fn unbalanced_fill_uses_only_first_candidate() {
        let gold = item(true, 10, M::UnbalancedFillExistingStacks);
        let mut s = storage();
        with_stack(&mut s, &gold, 7);
        with_stack(&mut s, &gold, 5);
        let first = s.items[0].clone();

        let changes = plan_grant(&s, &gold, 9);
        assert_eq!(
            changes[0],
            StorageChange::FillStack {
                id: first.id,
                expected: first.amount,
                add: 10 - first.amount,
            }
        );
        assert_eq!(granted(&changes), 9);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn unbounded_fill_puts_everything_in_first_stack() {
        let gold = item(true, 0, M::UnbalancedFillExistingStacks);
        let mut s = storage();
        with_stack(&mut s, &gold, 500);
        with_stack(&mut s, &gold, 3);
        let first = s.items[0].id;

        assert_eq!(
            plan_grant(&s, &gold, 1000),
            vec![StorageChange::FillStack {
                id: first,
                expected: s.items[0].amount,
                add: 1000,
            }]
        );
    }

    #[test]
    fn fill_without_candidates_creates() {
        let gold = item(true, 100, M::BalancedFillExistingStacks);
        let mut s = storage();
        with_stack(&mut s, &gold, 100);
        assert_eq!(created(&plan_grant(&s, &gold, 30)), vec![30]);
    }

    #[test]
    fn zero_amount_plans_nothing() {
        let gold = item(true, 100, M::Default);
        assert!(plan_grant(&storage(), &gold, 0).is_empty());
    }

    #[test]
    fn new_stacks_carry_metadata_and_fills_do_not() {
        let gold = item(true, 10, M::BalancedFillExistingStacks);
        let mut s = storage();
        with_stack(&mut s, &gold, 8);
        let tag = Metadata::parse(r#"{"minted":"event"}"#).unwrap();

        let changes = plan_grant_with(&s, &gold, 5, &tag);
        assert!(matches!(changes[0], StorageChange::FillStack { add: 2, .. }));
        assert!(matches!(&changes[1], StorageChange::CreateStack { amount: 3, metadata, .. } if *metadata == tag));
    }

    #[test]
    fn oversized_grants_are_rejected() {
        let sword = item(false, 0, M::Default);
        assert!(check_grant(&sword, MAX_NEW_STACKS).is_ok());
        let err = check_grant(&sword, 1 << 62).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);

        let ore = item(true, 1, M::Default);
        assert!(check_grant(&ore, MAX_NEW_STACKS + 1).is_err());

        let capped = item(true, 100, M::Default);
        assert!(check_grant(&capped, 100 * MAX_NEW_STACKS).is_ok());
        assert!(check_grant(&capped, 100 * MAX_NEW_STACKS + 1).is_err());

        let unbounded = item(true, 0, M::Default);
        assert!(check_grant(&unbounded, i64::MAX).is_ok());
    }

    #[test]
    fn grants_are_exact_and_respect_capacity() {
        for method in [M::Default, M::UnbalancedCreateNewStacks, M::UnbalancedFillExistingStacks, M::BalancedFillExistingStacks] {
            for max in [0, 1, 7, 100] {
                let gold = item(true, max, method);
                let mut s = storage();
                with_stack(&mut s, &gold, if max == 0 { 40 } else { max.min(3) });
                let changes = plan_grant(&s, &gold, 123);
                assert_eq!(granted(&changes), 123, "{method} max={max}");
                if max > 0 {
                    assert!(created(&changes).iter().all(|a| *a <= max));
                    for c in &changes {
                        if let StorageChange::FillStack { expected, add, .. } = c {
                            assert!(expected + add <= max);
                        }
                    }
                }
            }
        }
    }
}
