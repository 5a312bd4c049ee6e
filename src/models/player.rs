use crate::db::DbResult;
use crate::models::types::{Metadata, PlayerId, StorageId};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub metadata: Metadata,
    /// Storages owned by this player (id and name only)
    pub storages: Vec<PlayerStorage>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Player {
    /// Maps a bare `player` row; storages are attached by the caller.
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            metadata: row.try_get("metadata")?,
            storages: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStorage {
    pub id: StorageId,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewPlayer {
    pub name: String,
    pub metadata: Metadata,
}
