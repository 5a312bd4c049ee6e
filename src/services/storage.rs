use crate::db::repo::{CurrencyRepo, ItemRepo, PlayerRepo, StorageRepo};
use crate::error::{AppResult, DomainError};
use crate::models::page::{Page, PageRequest};
use crate::models::storage::{ItemGrant, NewStorage, Storage, StorageCurrency, StorageSummary};
use crate::models::types::{CurrencyId, EntityPatch, ItemId, Metadata, PlayerId, StorageId, StorageItemId, parse_id};
use crate::services::{apply_planned, require_name};
use crate::stacking::{
    ChangeSet, SplitSpec, StorageChange, check_grant, derive_amounts, plan_grant_with, plan_merge, plan_split,
};
use crate::util::paging;
use crate::util::random::{GrantAmount, RandomSource};
use std::sync::Arc;

pub struct StorageService {
    storages: Arc<dyn StorageRepo>,
    players: Arc<dyn PlayerRepo>,
    items: Arc<dyn ItemRepo>,
    currencies: Arc<dyn CurrencyRepo>,
    rng: Arc<dyn RandomSource>,
    page_size: i64,
}

impl StorageService {
    pub fn new(
        storages: Arc<dyn StorageRepo>,
        players: Arc<dyn PlayerRepo>,
        items: Arc<dyn ItemRepo>,
        currencies: Arc<dyn CurrencyRepo>,
        rng: Arc<dyn RandomSource>,
        page_size: i64,
    ) -> Self {
        Self {
            storages,
            players,
            items,
            currencies,
            rng,
            page_size,
        }
    }

    pub async fn create(&self, player_id: &str, name: &str, metadata: Metadata) -> AppResult<Storage> {
        let player_id: PlayerId = parse_id("player_id", player_id)?;
        require_name(name)?;

        self.players
            .get(player_id)
            .await
            .map_err(DomainError::internal("unable to get player"))?
            .ok_or_else(|| DomainError::not_found("player not found"))?;

        let storage = self
            .storages
            .create(NewStorage {
                player_id,
                name: name.to_string(),
                metadata,
            })
            .await
            .map_err(DomainError::internal("unable to create storage"))?;
        tracing::info!(storage_id = %storage.id, %player_id, "storage created");
        Ok(storage)
    }

    pub async fn update(&self, storage_id: &str, patch: EntityPatch) -> AppResult<Storage> {
        let id: StorageId = parse_id("storage_id", storage_id)?;
        if patch.is_empty() {
            return Err(DomainError::invalid("nothing to update"));
        }
        if let Some(name) = &patch.name {
            require_name(name)?;
        }

        self.storages
            .update(id, patch)
            .await
            .map_err(DomainError::lookup("storage not found", "unable to update storage"))
    }

    pub async fn get(&self, storage_id: &str) -> AppResult<Storage> {
        let id: StorageId = parse_id("storage_id", storage_id)?;
        self.fetch(id, "storage not found").await
    }

    pub async fn list(&self, req: &PageRequest) -> AppResult<Page<StorageSummary>> {
        let w = paging::window(req, self.page_size);
        let (storages, total) = self
            .storages
            .list(w)
            .await
            .map_err(DomainError::internal("unable to list storages"))?;
        Ok(paging::page(storages, total, w))
    }

    /// Place `amount` units of an item into a storage following the item's
    /// stack balancing method. `metadata` is attached to every stack the
    /// grant creates; stacks that are only topped up keep theirs.
    pub async fn give_item(
        &self,
        storage_id: &str,
        item_id: &str,
        amount: GrantAmount,
        metadata: Option<Metadata>,
    ) -> AppResult<ItemGrant> {
        let storage_id: StorageId = parse_id("storage_id", storage_id)?;
        let item_id: ItemId = parse_id("item_id", item_id)?;

        let amount = amount.resolve(self.rng.as_ref());
        if amount < 0 {
            return Err(DomainError::invalid("amount must not be negative"));
        }

        let item = self
            .items
            .get(item_id)
            .await
            .map_err(DomainError::internal("unable to get item"))?
            .ok_or_else(|| DomainError::not_found("item not found"))?;
        check_grant(&item, amount)?;
        self.fetch(storage_id, "storage not found").await?;

        let grant = ItemGrant {
            storage_id,
            item_id,
            amount_granted: amount,
        };
        if amount == 0 {
            return Ok(grant);
        }

        let metadata = metadata.unwrap_or_default();
        let (item, metadata) = (&item, &metadata);
        apply_planned(self.storages.as_ref(), "unable to give item", || async move {
            let storage = self.fetch(storage_id, "storage not found").await?;
            let mut set = ChangeSet::new();
            set.lock(storage.id).extend(plan_grant_with(&storage, item, amount, metadata));
            Ok::<_, DomainError>(set)
        })
        .await?;

        tracing::info!(%storage_id, %item_id, amount, "item given");
        Ok(grant)
    }

    /// Add to the storage's balance of a currency, creating it if needed.
    pub async fn give_currency(
        &self,
        storage_id: &str,
        currency_id: &str,
        amount: GrantAmount,
    ) -> AppResult<StorageCurrency> {
        let storage_id: StorageId = parse_id("storage_id", storage_id)?;
        let currency_id: CurrencyId = parse_id("currency_id", currency_id)?;

        let amount = amount.resolve(self.rng.as_ref());
        if amount < 0 {
            return Err(DomainError::invalid("amount must not be negative"));
        }

        self.currencies
            .get(currency_id)
            .await
            .map_err(DomainError::internal("unable to get currency"))?
            .ok_or_else(|| DomainError::not_found("currency not found"))?;
        self.fetch(storage_id, "storage not found").await?;

        apply_planned(self.storages.as_ref(), "unable to give currency", || async move {
            let mut set = ChangeSet::new();
            set.lock(storage_id).extend([StorageChange::AddCurrency {
                storage_id,
                currency_id,
                amount,
            }]);
            Ok::<_, DomainError>(set)
        })
        .await?;

        let storage = self.fetch(storage_id, "storage not found").await?;
        let balance = storage
            .balance_of(currency_id)
            .cloned()
            .ok_or_else(|| DomainError::Internal("unable to give currency".to_string()))?;

        tracing::info!(%storage_id, %currency_id, amount, balance = balance.amount, "currency given");
        Ok(balance)
    }

    /// Replace one stack by several whose amounts add up to the original.
    pub async fn split_stack(&self, storage_id: &str, storage_item_id: &str, split: SplitSpec) -> AppResult<Storage> {
        let storage_id: StorageId = parse_id("storage_id", storage_id)?;
        let stack_id: StorageItemId = parse_id("storage_item_id", storage_item_id)?;

        let split = &split;
        apply_planned(self.storages.as_ref(), "unable to split stack", || async move {
            let storage = self.fetch(storage_id, "storage not found").await?;
            let total = storage
                .stack(stack_id)
                .map(|s| s.amount)
                .ok_or_else(|| DomainError::not_found("storage item not found in storage"))?;

            let amounts = derive_amounts(split, total)?;
            let changes = plan_split(&storage, stack_id, &amounts).inspect_err(|e| {
                tracing::warn!(%storage_id, %stack_id, ?amounts, error = %e, "split rejected");
            })?;
            tracing::debug!(%storage_id, %stack_id, parts = amounts.len(), "split planned");

            let mut set = ChangeSet::new();
            set.lock(storage_id).extend(changes);
            Ok::<_, DomainError>(set)
        })
        .await?;

        tracing::info!(%storage_id, %stack_id, "stack split");
        self.fetch(storage_id, "storage not found").await
    }

    /// Move the whole of `from` onto `to`. Both stacks must live in the same
    /// storage and hold the same stackable item; the result may not exceed the
    /// item's maximum stack amount.
    pub async fn merge_stack(&self, to_storage_item_id: &str, from_storage_item_id: &str) -> AppResult<Storage> {
        let to: StorageItemId = parse_id("to_storage_item_id", to_storage_item_id)?;
        let from: StorageItemId = parse_id("from_storage_item_id", from_storage_item_id)?;

        let to_storage = self.storage_of(to).await?;
        let from_storage = self.storage_of(from).await?;
        if to_storage != from_storage {
            return Err(DomainError::aborted("stacks are in different storages"));
        }

        apply_planned(self.storages.as_ref(), "unable to merge stacks", || async move {
            let storage = self.fetch(to_storage, "storage not found").await?;
            let changes = plan_merge(&storage, to, from).inspect_err(|e| {
                tracing::warn!(storage_id = %storage.id, %to, %from, error = %e, "merge rejected");
            })?;

            let mut set = ChangeSet::new();
            set.lock(storage.id).extend(changes);
            Ok::<_, DomainError>(set)
        })
        .await?;

        tracing::info!(storage_id = %to_storage, %to, %from, "stacks merged");
        self.fetch(to_storage, "storage not found").await
    }

    async fn fetch(&self, id: StorageId, missing: &'static str) -> AppResult<Storage> {
        self.storages
            .get(id)
            .await
            .map_err(DomainError::internal("unable to get storage"))?
            .ok_or_else(|| DomainError::not_found(missing))
    }

    async fn storage_of(&self, stack_id: StorageItemId) -> AppResult<StorageId> {
        self.storages
            .storage_of_stack(stack_id)
            .await
            .map_err(DomainError::internal("unable to get storage item"))?
            .ok_or_else(|| DomainError::not_found(format!("storage item {stack_id} not found")))
    }
}
