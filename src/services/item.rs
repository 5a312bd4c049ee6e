use crate::db::repo::ItemRepo;
use crate::error::{AppResult, DomainError};
use crate::models::item::{Item, NewItem};
use crate::models::page::{Page, PageRequest};
use crate::models::types::{EntityPatch, ItemId, parse_id};
use crate::services::{require_name, require_query};
use crate::util::paging;
use std::sync::Arc;

pub struct ItemService {
    repo: Arc<dyn ItemRepo>,
    page_size: i64,
}

impl ItemService {
    pub fn new(repo: Arc<dyn ItemRepo>, page_size: i64) -> Self {
        Self { repo, page_size }
    }

    pub async fn create(&self, new: NewItem) -> AppResult<Item> {
        require_name(&new.name)?;
        if new.stack_max_amount < 0 {
            return Err(DomainError::invalid("stack_max_amount must not be negative"));
        }

        let item = self
            .repo
            .create(new)
            .await
            .map_err(DomainError::internal("unable to create item"))?;
        tracing::info!(item_id = %item.id, name = %item.name, "item created");
        Ok(item)
    }

    /// Only the name and metadata can change; stacking rules are fixed at creation.
    pub async fn update(&self, item_id: &str, patch: EntityPatch) -> AppResult<Item> {
        let id: ItemId = parse_id("item_id", item_id)?;
        if patch.is_empty() {
            return Err(DomainError::invalid("nothing to update"));
        }
        if let Some(name) = &patch.name {
            require_name(name)?;
        }

        self.repo
            .update(id, patch)
            .await
            .map_err(DomainError::lookup("item not found", "unable to update item"))
    }

    pub async fn get(&self, item_id: &str) -> AppResult<Item> {
        let id: ItemId = parse_id("item_id", item_id)?;
        self.repo
            .get(id)
            .await
            .map_err(DomainError::internal("unable to get item"))?
            .ok_or_else(|| DomainError::not_found("item not found"))
    }

    pub async fn list(&self, req: &PageRequest) -> AppResult<Page<Item>> {
        let w = paging::window(req, self.page_size);
        let (items, total) = self
            .repo
            .list(w)
            .await
            .map_err(DomainError::internal("unable to list items"))?;
        Ok(paging::page(items, total, w))
    }

    pub async fn search(&self, query: &str, req: &PageRequest) -> AppResult<Page<Item>> {
        require_query(query)?;
        let w = paging::window(req, self.page_size);
        let (items, total) = self
            .repo
            .search(query, w)
            .await
            .map_err(DomainError::internal("unable to search items"))?;
        Ok(paging::page(items, total, w))
    }
}
