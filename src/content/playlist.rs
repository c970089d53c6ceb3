/// Playlist manager
use crate::{
    auth::{authorize_mutation, OwnedResource},
    content::{optional, required},
    db::{
        self,
        account::{Account, AccountRole},
        models::{Playlist, PlaylistDetails, Video},
    },
    error::{AppError, AppResult},
    listing::{self, Filter, ListingSpec, Page, Pagination, Sort},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

impl OwnedResource for Playlist {
    const KIND: &'static str = "playlist";
    const OVERRIDE_ROLES: &'static [AccountRole] = &[];

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

const PLAYLIST_COLUMNS: &str = "id, owner_id, name, description, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Playlist manager service
pub struct PlaylistManager {
    db: SqlitePool,
}

impl PlaylistManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, owner_id: &str, req: CreatePlaylistRequest) -> AppResult<Playlist> {
        let now = Utc::now();
        let playlist = Playlist {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: required(&req.name, "name")?,
            description: required(&req.description, "description")?,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO playlist (id, owner_id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&playlist.id)
        .bind(&playlist.owner_id)
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!("Playlist {} created by {}", playlist.id, owner_id);
        Ok(playlist)
    }

    /// A user's playlists, newest first
    pub async fn list_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> AppResult<Page<Playlist>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM account WHERE id = ?1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let spec = ListingSpec {
            select: PLAYLIST_COLUMNS,
            from: "playlist",
            tiebreak: "rowid",
            filters: vec![Filter::Equals {
                column: "owner_id",
                value: user_id.to_string(),
            }],
            sort: Sort::desc("created_at"),
        };

        listing::list(&self.db, &spec, pagination).await
    }

    pub async fn load(&self, id: &str) -> AppResult<Playlist> {
        sqlx::query_as::<_, Playlist>(&format!(
            "SELECT {} FROM playlist WHERE id = ?1",
            PLAYLIST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))
    }

    /// Playlist with its videos in the order they were added
    ///
    /// Members that were deleted are skipped, drafts only show for their owner.
    pub async fn get(&self, id: &str, viewer_id: Option<&str>) -> AppResult<PlaylistDetails> {
        let playlist = self.load(id).await?;

        let videos = sqlx::query_as::<_, Video>(
            "SELECT v.id, v.owner_id, v.title, v.description, v.video_file, v.thumbnail,
                    v.duration, v.views, v.is_published, v.created_at, v.updated_at
             FROM playlist_video pv
             JOIN video v ON v.id = pv.video_id
             WHERE pv.playlist_id = ?1 AND (v.is_published = 1 OR v.owner_id = ?2)
             ORDER BY pv.position",
        )
        .bind(id)
        .bind(viewer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(PlaylistDetails { playlist, videos })
    }

    pub async fn update(
        &self,
        account: &Account,
        id: &str,
        req: UpdatePlaylistRequest,
    ) -> AppResult<Playlist> {
        let playlist = self.load(id).await?;
        authorize_mutation(account, &playlist)?;

        let name = optional(req.name.as_deref(), "name")?;
        let description = optional(req.description.as_deref(), "description")?;
        if name.is_none() && description.is_none() {
            return Err(AppError::Validation(
                "Nothing to update: provide name or description".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE playlist
             SET name = COALESCE(?1, name), description = COALESCE(?2, description), updated_at = ?3
             WHERE id = ?4",
        )
        .bind(&name)
        .bind(&description)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        self.load(id).await
    }

    pub async fn delete(&self, account: &Account, id: &str) -> AppResult<()> {
        let playlist = self.load(id).await?;
        authorize_mutation(account, &playlist)?;

        sqlx::query("DELETE FROM playlist WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!("Playlist {} deleted by {}", id, account.id);
        Ok(())
    }

    /// Append a video; adding a member twice is a conflict and changes nothing
    pub async fn add_video(
        &self,
        account: &Account,
        playlist_id: &str,
        video_id: &str,
    ) -> AppResult<PlaylistDetails> {
        let playlist = self.load(playlist_id).await?;
        authorize_mutation(account, &playlist)?;

        let video_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM video WHERE id = ?1)")
                .bind(video_id)
                .fetch_one(&self.db)
                .await?;
        if !video_exists {
            return Err(AppError::NotFound("Video not found".to_string()));
        }

        let inserted = sqlx::query(
            "INSERT INTO playlist_video (playlist_id, video_id, position, added_at)
             SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1, ?3
             FROM playlist_video WHERE playlist_id = ?1",
        )
        .bind(playlist_id)
        .bind(video_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if db::is_unique_violation(&e) => {
                return Err(AppError::Conflict(
                    "Video already exists in playlist".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Video {} added to playlist {}", video_id, playlist_id);
        self.get(playlist_id, Some(&account.id)).await
    }

    /// Remove a member video; removing a non-member is rejected
    pub async fn remove_video(
        &self,
        account: &Account,
        playlist_id: &str,
        video_id: &str,
    ) -> AppResult<PlaylistDetails> {
        let playlist = self.load(playlist_id).await?;
        authorize_mutation(account, &playlist)?;

        let removed = sqlx::query("DELETE FROM playlist_video WHERE playlist_id = ?1 AND video_id = ?2")
            .bind(playlist_id)
            .bind(video_id)
            .execute(&self.db)
            .await?;

        if removed.rows_affected() == 0 {
            return Err(AppError::Validation(
                "Video does not exist in playlist".to_string(),
            ));
        }

        tracing::info!("Video {} removed from playlist {}", video_id, playlist_id);
        self.get(playlist_id, Some(&account.id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::test_support::create_account,
        content::video::{test_support::create_request, VideoManager},
    };

    async fn account(pool: &SqlitePool, id: &str) -> Account {
        sqlx::query_as::<_, Account>("SELECT * FROM account WHERE id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn new_playlist(name: &str) -> CreatePlaylistRequest {
        CreatePlaylistRequest {
            name: name.to_string(),
            description: format!("{} collection", name),
        }
    }

    #[tokio::test]
    async fn test_create_requires_name_and_description() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        let playlists = PlaylistManager::new(pool.clone());

        let mut req = new_playlist("mix");
        req.description = " ".to_string();
        assert!(matches!(
            playlists.create(&owner, req).await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert_eq!(playlists.create(&owner, new_playlist("mix")).await.unwrap().name, "mix");
    }

    #[tokio::test]
    async fn test_membership_order_duplicates_and_removal() {
        let pool = db::test_pool().await;
        let owner_id = create_account(&pool, "owner").await;
        let owner = account(&pool, &owner_id).await;
        let videos = VideoManager::new(pool.clone());
        let a = videos.create(&owner_id, create_request("a")).await.unwrap();
        let b = videos.create(&owner_id, create_request("b")).await.unwrap();
        let playlists = PlaylistManager::new(pool.clone());
        let playlist = playlists.create(&owner_id, new_playlist("mix")).await.unwrap();

        playlists.add_video(&owner, &playlist.id, &b.id).await.unwrap();
        let details = playlists.add_video(&owner, &playlist.id, &a.id).await.unwrap();
        let ids: Vec<_> = details.videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, [b.id.as_str(), a.id.as_str()]);

        assert!(matches!(
            playlists.add_video(&owner, &playlist.id, &a.id).await.unwrap_err(),
            AppError::Conflict(_)
        ));
        assert_eq!(playlists.get(&playlist.id, None).await.unwrap().videos.len(), 2);

        assert!(matches!(
            playlists.add_video(&owner, &playlist.id, "missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));

        let details = playlists.remove_video(&owner, &playlist.id, &b.id).await.unwrap();
        assert_eq!(details.videos.len(), 1);
        assert!(matches!(
            playlists.remove_video(&owner, &playlist.id, &b.id).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_deleted_member_is_skipped() {
        let pool = db::test_pool().await;
        let owner_id = create_account(&pool, "owner").await;
        let owner = account(&pool, &owner_id).await;
        let videos = VideoManager::new(pool.clone());
        let a = videos.create(&owner_id, create_request("a")).await.unwrap();
        let playlists = PlaylistManager::new(pool.clone());
        let playlist = playlists.create(&owner_id, new_playlist("mix")).await.unwrap();
        playlists.add_video(&owner, &playlist.id, &a.id).await.unwrap();

        videos.delete(&owner, &a.id).await.unwrap();
        assert!(playlists.get(&playlist.id, None).await.unwrap().videos.is_empty());
    }

    #[tokio::test]
    async fn test_mutations_are_owner_only() {
        let pool = db::test_pool().await;
        let owner_id = create_account(&pool, "owner").await;
        let admin_id = create_account(&pool, "admin").await;
        sqlx::query("UPDATE account SET role = 'admin' WHERE id = ?1")
            .bind(&admin_id)
            .execute(&pool)
            .await
            .unwrap();
        let admin = account(&pool, &admin_id).await;
        let owner = account(&pool, &owner_id).await;
        let video = VideoManager::new(pool.clone())
            .create(&admin_id, create_request("a"))
            .await
            .unwrap();
        let playlists = PlaylistManager::new(pool.clone());
        let playlist = playlists.create(&owner_id, new_playlist("mix")).await.unwrap();

        let rename = UpdatePlaylistRequest {
            name: Some("renamed".to_string()),
            description: None,
        };
        assert!(matches!(
            playlists.update(&admin, &playlist.id, rename.clone()).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            playlists.add_video(&admin, &playlist.id, &video.id).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            playlists.delete(&admin, &playlist.id).await.unwrap_err(),
            AppError::Forbidden(_)
        ));

        assert_eq!(
            playlists.update(&owner, &playlist.id, rename).await.unwrap().name,
            "renamed"
        );
        playlists.delete(&owner, &playlist.id).await.unwrap();
        assert!(matches!(
            playlists.get(&playlist.id, None).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        let playlists = PlaylistManager::new(pool.clone());
        for name in ["one", "two", "three"] {
            playlists.create(&owner, new_playlist(name)).await.unwrap();
        }

        let page = playlists
            .list_for_user(&owner, Pagination { page: 1, page_size: 2 })
            .await
            .unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.items[0].name, "three");
        assert!(playlists.list_for_user("ghost", Pagination::default()).await.is_err());
    }
}
