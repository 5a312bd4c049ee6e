use crate::db::repo::PlayerRepo;
use crate::error::{AppResult, DomainError};
use crate::models::page::{Page, PageRequest};
use crate::models::player::{NewPlayer, Player};
use crate::models::types::{EntityPatch, PlayerId, parse_id};
use crate::services::{require_name, require_query};
use crate::util::paging;
use std::sync::Arc;

pub struct PlayerService {
    repo: Arc<dyn PlayerRepo>,
    page_size: i64,
}

impl PlayerService {
    pub fn new(repo: Arc<dyn PlayerRepo>, page_size: i64) -> Self {
        Self { repo, page_size }
    }

    pub async fn create(&self, new: NewPlayer) -> AppResult<Player> {
        require_name(&new.name)?;
        let player = self
            .repo
            .create(new)
            .await
            .map_err(DomainError::internal("unable to create player"))?;
        tracing::info!(player_id = %player.id, "player created");
        Ok(player)
    }

    pub async fn update(&self, player_id: &str, patch: EntityPatch) -> AppResult<Player> {
        let id: PlayerId = parse_id("player_id", player_id)?;
        if patch.is_empty() {
            return Err(DomainError::invalid("nothing to update"));
        }
        if let Some(name) = &patch.name {
            require_name(name)?;
        }

        self.repo
            .update(id, patch)
            .await
            .map_err(DomainError::lookup("player not found", "unable to update player"))
    }

    pub async fn get(&self, player_id: &str) -> AppResult<Player> {
        let id: PlayerId = parse_id("player_id", player_id)?;
        self.repo
            .get(id)
            .await
            .map_err(DomainError::internal("unable to get player"))?
            .ok_or_else(|| DomainError::not_found("player not found"))
    }

    pub async fn list(&self, req: &PageRequest) -> AppResult<Page<Player>> {
        let w = paging::window(req, self.page_size);
        let (players, total) = self
            .repo
            .list(w)
            .await
            .map_err(DomainError::internal("unable to list players"))?;
        Ok(paging::page(players, total, w))
    }

    pub async fn search(&self, query: &str, req: &PageRequest) -> AppResult<Page<Player>> {
        require_query(query)?;
        let w = paging::window(req, self.page_size);
        let (players, total) = self
            .repo
            .search(query, w)
            .await
            .map_err(DomainError::internal("unable to search players"))?;
        Ok(paging::page(players, total, w))
    }
}
