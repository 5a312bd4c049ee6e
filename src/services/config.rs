use crate::db::repo::ConfigRepo;
use crate::error::{AppResult, DomainError};
use crate::models::config_entry::ConfigEntry;
use crate::models::page::{Page, PageRequest};
use crate::util::paging;
use std::sync::Arc;

/// Runtime key/value settings kept next to the economy data.
pub struct ConfigService {
    repo: Arc<dyn ConfigRepo>,
    page_size: i64,
}

impl ConfigService {
    pub fn new(repo: Arc<dyn ConfigRepo>, page_size: i64) -> Self {
        Self { repo, page_size }
    }

    pub async fn get(&self, key: &str) -> AppResult<ConfigEntry> {
        require_key(key)?;
        self.repo
            .get(key)
            .await
            .map_err(DomainError::internal("unable to get config"))?
            .ok_or_else(|| DomainError::not_found("config not found"))
    }

    pub async fn set(&self, key: &str, value: &str) -> AppResult<ConfigEntry> {
        require_key(key)?;
        let entry = self
            .repo
            .set(key, value)
            .await
            .map_err(DomainError::internal("unable to set config"))?;
        tracing::info!(key, "config set");
        Ok(entry)
    }

    pub async fn list(&self, req: &PageRequest) -> AppResult<Page<ConfigEntry>> {
        let w = paging::window(req, self.page_size);
        let (entries, total) = self
            .repo
            .list(w)
            .await
            .map_err(DomainError::internal("unable to retrieve config list"))?;
        Ok(paging::page(entries, total, w))
    }
}

fn require_key(key: &str) -> AppResult<()> {
    if key.trim().is_empty() {
        return Err(DomainError::invalid("no key given"));
    }
    Ok(())
}
