use crate::db::error::DbError;
use crate::db::repo::count_rows;
use crate::db::repo::player::PlayerRepo;
use crate::db::{Db, DbResult, map_row_opt, map_rows};
use crate::models::page::PageWindow;
use crate::models::player::{NewPlayer, Player, PlayerStorage};
use crate::models::types::{EntityPatch, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;

pub struct PlayerRepository {
    db: Arc<Db>,
}

impl PlayerRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Fill in the storages of the given players.
    async fn attach_storages(&self, client: &deadpool_postgres::Client, players: &mut [Player]) -> DbResult<()> {
        if players.is_empty() {
            return Ok(());
        }
        let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();

        let stmt = client
            .prepare_cached("SELECT id, player_id, name FROM storage WHERE player_id = ANY($1) ORDER BY created_at, id")
            .await?;
        let rows = client.query(&stmt, &[&ids]).await?;

        let mut owned: HashMap<PlayerId, Vec<PlayerStorage>> = HashMap::new();
        for row in rows {
            let owner: PlayerId = row.try_get("player_id")?;
            owned.entry(owner).or_default().push(PlayerStorage {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }
        for player in players.iter_mut() {
            player.storages = owned.remove(&player.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PlayerRepo for PlayerRepository {
    async fn create(&self, new: NewPlayer) -> DbResult<Player> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("INSERT INTO player (id, name, metadata) VALUES ($1, $2, $3) RETURNING *")
            .await?;
        let row = client
            .query_one(&stmt, &[&PlayerId::new(), &new.name, &new.metadata])
            .await?;
        Player::try_from_row(&row)
    }

    async fn update(&self, id: PlayerId, patch: EntityPatch) -> DbResult<Player> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
                UPDATE player
                SET name = COALESCE($2, name),
                    metadata = COALESCE($3, metadata),
                    updated_at = now()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .await?;
        let row_opt = client.query_opt(&stmt, &[&id, &patch.name, &patch.metadata]).await?;
        let player = map_row_opt(row_opt, Player::try_from_row, &format!("PlayerRepo::update id={id}"))?;

        let mut players: Vec<Player> = player.into_iter().collect();
        self.attach_storages(&client, &mut players).await?;
        players.pop().ok_or(DbError::NotFound)
    }

    async fn get(&self, id: PlayerId) -> DbResult<Option<Player>> {
        let client = self.db.get_client().await?;

        let stmt = client.prepare_cached("SELECT * FROM player WHERE id = $1").await?;
        let row_opt = client.query_opt(&stmt, &[&id]).await?;
        let player = map_row_opt(row_opt, Player::try_from_row, &format!("PlayerRepo::get id={id}"))?;

        let mut players: Vec<Player> = player.into_iter().collect();
        self.attach_storages(&client, &mut players).await?;
        Ok(players.pop())
    }

    async fn list(&self, window: PageWindow) -> DbResult<(Vec<Player>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM player ORDER BY created_at DESC, id LIMIT $1 OFFSET $2")
            .await?;
        let rows = client.query(&stmt, &[&window.limit, &window.offset]).await?;
        let mut players = map_rows(&rows, Player::try_from_row, "PlayerRepo::list")?;
        self.attach_storages(&client, &mut players).await?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM player", &[]).await?;
        Ok((players, total))
    }

    async fn search(&self, query: &str, window: PageWindow) -> DbResult<(Vec<Player>, i64)> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT * FROM player WHERE name ~* $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3")
            .await?;
        let rows = client.query(&stmt, &[&query, &window.limit, &window.offset]).await?;
        let mut players = map_rows(&rows, Player::try_from_row, &format!("PlayerRepo::search query={query}"))?;
        self.attach_storages(&client, &mut players).await?;

        let total = count_rows(&client, "SELECT COUNT(*) FROM player WHERE name ~* $1", &[&query]).await?;
        Ok((players, total))
    }
}
