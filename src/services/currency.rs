use crate::db::repo::CurrencyRepo;
use crate::error::{AppResult, DomainError};
use crate::models::currency::{Currency, CurrencyPatch, NewCurrency};
use crate::models::page::{Page, PageRequest};
use crate::models::types::{CurrencyId, parse_id};
use crate::services::require_name;
use crate::util::paging;
use std::sync::Arc;

pub struct CurrencyService {
    repo: Arc<dyn CurrencyRepo>,
    page_size: i64,
}

impl CurrencyService {
    pub fn new(repo: Arc<dyn CurrencyRepo>, page_size: i64) -> Self {
        Self { repo, page_size }
    }

    pub async fn create(&self, new: NewCurrency) -> AppResult<Currency> {
        require_name(&new.name)?;
        if new.short_name.trim().is_empty() {
            return Err(DomainError::invalid("no short_name given"));
        }

        let currency = self
            .repo
            .create(new)
            .await
            .map_err(DomainError::internal("unable to create currency"))?;
        tracing::info!(currency_id = %currency.id, name = %currency.name, "currency created");
        Ok(currency)
    }

    pub async fn update(&self, currency_id: &str, patch: CurrencyPatch) -> AppResult<Currency> {
        let id: CurrencyId = parse_id("currency_id", currency_id)?;
        if patch.is_empty() {
            return Err(DomainError::invalid("nothing to update"));
        }

        self.repo
            .update(id, patch)
            .await
            .map_err(DomainError::lookup("currency not found", "unable to update currency"))
    }

    pub async fn get(&self, currency_id: &str) -> AppResult<Currency> {
        let id: CurrencyId = parse_id("currency_id", currency_id)?;
        self.repo
            .get(id)
            .await
            .map_err(DomainError::internal("unable to get currency"))?
            .ok_or_else(|| DomainError::not_found("currency not found"))
    }

    pub async fn list(&self, req: &PageRequest) -> AppResult<Page<Currency>> {
        let w = paging::window(req, self.page_size);
        let (currencies, total) = self
            .repo
            .list(w)
            .await
            .map_err(DomainError::internal("unable to list currencies"))?;
        Ok(paging::page(currencies, total, w))
    }
}
