use crate::db::DbResult;
use crate::models::page::PageWindow;
use crate::models::storage::{NewStorage, Storage, StorageSummary};
use crate::models::types::{EntityPatch, StorageId, StorageItemId};
use crate::stacking::ChangeSet;

#[async_trait::async_trait]
pub trait StorageRepo: Send + Sync {
    async fn create(&self, new: NewStorage) -> DbResult<Storage>;
    async fn update(&self, id: StorageId, patch: EntityPatch) -> DbResult<Storage>;

    /// Full storage with all stacks and balances
    async fn get(&self, id: StorageId) -> DbResult<Option<Storage>>;

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<StorageSummary>, i64)>;

    /// Storage a stack belongs to
    async fn storage_of_stack(&self, id: StorageItemId) -> DbResult<Option<StorageId>>;

    /// Apply every change of the set or none of them. Storages named in
    /// `locks` are locked in the given order before anything is written. A
    /// guarded change whose row no longer holds the expected amount fails the
    /// whole set with `DbError::Conflict`.
    async fn apply(&self, set: ChangeSet) -> DbResult<()>;
}
