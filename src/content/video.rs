/// Video manager
use crate::{
    auth::{authorize_mutation, OwnedResource},
    content::{optional, required},
    db::{
        account::{Account, AccountRole},
        models::{Video, VideoDetails},
    },
    error::{AppError, AppResult},
    listing::{self, Filter, ListQuery, ListingSpec, Page, Pagination, Sort},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

impl OwnedResource for Video {
    const KIND: &'static str = "video";
    const OVERRIDE_ROLES: &'static [AccountRole] = &[AccountRole::Admin];

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

const VIDEO_COLUMNS: &str = "id, owner_id, title, description, video_file, thumbnail, duration, views,
     is_published, created_at, updated_at";

const DETAILS_SELECT: &str = "v.id, v.owner_id, v.title, v.description, v.video_file, v.thumbnail,
     v.duration, v.views, v.is_published, v.created_at, v.updated_at,
     a.username AS owner_username, a.avatar AS owner_avatar,
     (SELECT COUNT(*) FROM relationship_edge e
       WHERE e.kind = 'video_like' AND e.target_id = v.id) AS likes_count";

const DETAILS_FROM: &str = "video v JOIN account a ON a.id = v.owner_id";

const SORT_FIELDS: &[(&str, &str)] = &[
    ("createdAt", "v.created_at"),
    ("updatedAt", "v.updated_at"),
    ("title", "v.title"),
    ("views", "v.views"),
    ("duration", "v.duration"),
];

/// Video creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    pub title: String,
    pub description: Option<String>,
    pub video_file: String,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
}

/// Video update request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

/// Video manager service
pub struct VideoManager {
    db: SqlitePool,
}

impl VideoManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Publish a new video owned by `owner_id`
    pub async fn create(&self, owner_id: &str, req: CreateVideoRequest) -> AppResult<Video> {
        let title = required(&req.title, "title")?;
        let video_file = required(&req.video_file, "videoFile")?;
        let duration = req.duration.unwrap_or(0.0);
        if !duration.is_finite() || duration < 0.0 {
            return Err(AppError::Validation(
                "duration must be a non-negative number".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO video (id, owner_id, title, description, video_file, thumbnail, duration, views, is_published, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 1, ?8, ?8)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&title)
        .bind(req.description.as_deref().map(str::trim).unwrap_or_default())
        .bind(&video_file)
        .bind(&req.thumbnail)
        .bind(duration)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!("Video {} created by {}", id, owner_id);

        self.load(&id).await
    }

    pub async fn find(&self, id: &str) -> AppResult<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {} FROM video WHERE id = ?1",
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(video)
    }

    /// Get a video by id, NotFound when absent
    pub async fn load(&self, id: &str) -> AppResult<Video> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found".to_string()))
    }

    /// Fetch a video for display and count the view
    ///
    /// Unpublished videos are only visible to their owner.
    pub async fn view(&self, id: &str, viewer_id: Option<&str>) -> AppResult<VideoDetails> {
        let counted = sqlx::query(
            "UPDATE video SET views = views + 1
             WHERE id = ?1 AND (is_published = 1 OR owner_id = ?2)",
        )
        .bind(id)
        .bind(viewer_id)
        .execute(&self.db)
        .await?;

        if counted.rows_affected() == 0 {
            return Err(AppError::NotFound("Video not found".to_string()));
        }

        let details = sqlx::query_as::<_, VideoDetails>(&format!(
            "SELECT {} FROM {} WHERE v.id = ?1",
            DETAILS_SELECT, DETAILS_FROM
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        details.ok_or_else(|| AppError::NotFound("Video not found".to_string()))
    }

    /// Search published videos (plus the viewer's own drafts)
    pub async fn list(
        &self,
        query: &ListQuery,
        pagination: Pagination,
        viewer_id: Option<&str>,
    ) -> AppResult<Page<VideoDetails>> {
        let mut filters = Vec::new();
        if let Some(needle) = query.search_text() {
            filters.push(Filter::Contains {
                columns: &["v.title", "v.description"],
                needle: needle.to_string(),
            });
        }
        if let Some(user_id) = query.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            filters.push(Filter::Equals {
                column: "v.owner_id",
                value: user_id.to_string(),
            });
        }
        filters.push(Filter::IsTrue {
            column: "v.is_published",
            bypass: viewer_id.map(|viewer| ("v.owner_id", viewer.to_string())),
        });

        self.run_listing(query, pagination, filters).await
    }

    /// All of an owner's videos, drafts included
    pub async fn list_owned(
        &self,
        owner_id: &str,
        query: &ListQuery,
        pagination: Pagination,
    ) -> AppResult<Page<VideoDetails>> {
        let filters = vec![Filter::Equals {
            column: "v.owner_id",
            value: owner_id.to_string(),
        }];

        self.run_listing(query, pagination, filters).await
    }

    async fn run_listing(
        &self,
        query: &ListQuery,
        pagination: Pagination,
        filters: Vec<Filter>,
    ) -> AppResult<Page<VideoDetails>> {
        let spec = ListingSpec {
            select: DETAILS_SELECT,
            from: DETAILS_FROM,
            tiebreak: "v.rowid",
            filters,
            sort: Sort::resolve(
                query.sort_by.as_deref(),
                query.sort_type.as_deref(),
                SORT_FIELDS,
                Sort::desc("v.created_at"),
            ),
        };

        listing::list(&self.db, &spec, pagination).await
    }

    /// Edit title, description or thumbnail
    pub async fn update(
        &self,
        account: &Account,
        id: &str,
        req: UpdateVideoRequest,
    ) -> AppResult<Video> {
        let video = self.load(id).await?;
        authorize_mutation(account, &video)?;

        let title = optional(req.title.as_deref(), "title")?;
        let thumbnail = optional(req.thumbnail.as_deref(), "thumbnail")?;
        let description = req.description.as_deref().map(str::trim);
        if title.is_none() && description.is_none() && thumbnail.is_none() {
            return Err(AppError::Validation(
                "Nothing to update: provide title, description or thumbnail".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE video
             SET title = COALESCE(?1, title),
                 description = COALESCE(?2, description),
                 thumbnail = COALESCE(?3, thumbnail),
                 updated_at = ?4
             WHERE id = ?5",
        )
        .bind(&title)
        .bind(description)
        .bind(&thumbnail)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        self.load(id).await
    }

    pub async fn delete(&self, account: &Account, id: &str) -> AppResult<()> {
        let video = self.load(id).await?;
        authorize_mutation(account, &video)?;

        sqlx::query("DELETE FROM video WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!("Video {} deleted by {}", id, account.id);
        Ok(())
    }

    /// Flip `is_published` in a single statement
    pub async fn toggle_publish(&self, account: &Account, id: &str) -> AppResult<Video> {
        let video = self.load(id).await?;
        authorize_mutation(account, &video)?;

        let updated = sqlx::query_as::<_, Video>(&format!(
            "UPDATE video SET is_published = NOT is_published, updated_at = ?1
             WHERE id = ?2
             RETURNING {}",
            VIDEO_COLUMNS
        ))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

        tracing::info!(
            "Video {} publish state now {} (by {})",
            id,
            updated.is_published,
            account.id
        );
        Ok(updated)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::create_request;
    use super::*;
    use crate::{account::test_support::create_account, db};

    async fn account(pool: &SqlitePool, id: &str) -> Account {
        sqlx::query_as::<_, Account>("SELECT * FROM account WHERE id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn make_admin(pool: &SqlitePool, id: &str) -> Account {
        sqlx::query("UPDATE account SET role = 'admin' WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
        account(pool, id).await
    }

    #[tokio::test]
    async fn test_create_requires_title_and_file() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        let videos = VideoManager::new(pool.clone());

        let mut req = create_request("clip");
        req.title = "  ".to_string();
        assert!(matches!(
            videos.create(&owner, req).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut req = create_request("clip");
        req.duration = Some(-1.0);
        assert!(videos.create(&owner, req).await.is_err());

        let video = videos.create(&owner, create_request("clip")).await.unwrap();
        assert_eq!(video.owner_id, owner);
        assert!(video.is_published);
        assert_eq!(video.views, 0);
    }

    #[tokio::test]
    async fn test_view_counts_and_hides_drafts() {
        let pool = db::test_pool().await;
        let owner_id = create_account(&pool, "owner").await;
        let other = create_account(&pool, "other").await;
        let owner = account(&pool, &owner_id).await;
        let videos = VideoManager::new(pool.clone());
        let video = videos.create(&owner_id, create_request("clip")).await.unwrap();

        let seen = videos.view(&video.id, None).await.unwrap();
        assert_eq!(seen.video.views, 1);
        assert_eq!(seen.owner_username, "owner");
        assert_eq!(seen.likes_count, 0);

        videos.toggle_publish(&owner, &video.id).await.unwrap();
        assert!(matches!(
            videos.view(&video.id, Some(&other)).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert_eq!(videos.view(&video.id, Some(&owner_id)).await.unwrap().video.views, 2);

        assert!(videos.view("missing", None).await.is_err());
    }

    #[tokio::test]
    async fn test_only_owner_or_admin_may_mutate() {
        let pool = db::test_pool().await;
        let owner_id = create_account(&pool, "owner").await;
        let intruder_id = create_account(&pool, "intruder").await;
        let admin_id = create_account(&pool, "moderator").await;
        let intruder = account(&pool, &intruder_id).await;
        let admin = make_admin(&pool, &admin_id).await;
        let videos = VideoManager::new(pool.clone());
        let video = videos.create(&owner_id, create_request("clip")).await.unwrap();

        let edit = UpdateVideoRequest {
            title: Some("hijacked".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            videos.update(&intruder, &video.id, edit.clone()).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            videos.toggle_publish(&intruder, &video.id).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            videos.delete(&intruder, &video.id).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert_eq!(videos.load(&video.id).await.unwrap().title, "clip");

        let edited = videos.update(&admin, &video.id, edit).await.unwrap();
        assert_eq!(edited.title, "hijacked");
        assert!(!videos.toggle_publish(&admin, &video.id).await.unwrap().is_published);
        videos.delete(&admin, &video.id).await.unwrap();
        assert!(videos.find(&video.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_validation() {
        let pool = db::test_pool().await;
        let owner_id = create_account(&pool, "owner").await;
        let owner = account(&pool, &owner_id).await;
        let videos = VideoManager::new(pool.clone());
        let video = videos.create(&owner_id, create_request("clip")).await.unwrap();

        assert!(matches!(
            videos
                .update(&owner, &video.id, UpdateVideoRequest::default())
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));

        let updated = videos
            .update(
                &owner,
                &video.id,
                UpdateVideoRequest {
                    description: Some("new words".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "new words");
        assert_eq!(updated.title, "clip");
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_hides_drafts() {
        let pool = db::test_pool().await;
        let alice_id = create_account(&pool, "alice").await;
        let bob_id = create_account(&pool, "bob").await;
        let alice = account(&pool, &alice_id).await;
        let videos = VideoManager::new(pool.clone());

        for title in ["Rust basics", "Cooking pasta", "Advanced rust"] {
            videos.create(&alice_id, create_request(title)).await.unwrap();
        }
        let draft = videos.create(&alice_id, create_request("rust draft")).await.unwrap();
        videos.toggle_publish(&alice, &draft.id).await.unwrap();
        videos.create(&bob_id, create_request("Bob on rust")).await.unwrap();

        let search = ListQuery {
            query: Some("RUST".to_string()),
            user_id: Some(alice_id.clone()),
            sort_by: Some("title".to_string()),
            sort_type: Some("asc".to_string()),
            ..Default::default()
        };

        let anonymous = videos.list(&search, Pagination::default(), None).await.unwrap();
        let titles: Vec<_> = anonymous.items.iter().map(|v| v.video.title.as_str()).collect();
        assert_eq!(titles, ["Advanced rust", "Rust basics"]);

        let as_owner = videos
            .list(&search, Pagination::default(), Some(&alice_id))
            .await
            .unwrap();
        assert_eq!(as_owner.total_count, 3);

        let everything = videos
            .list(&ListQuery::default(), Pagination::default(), None)
            .await
            .unwrap();
        assert_eq!(everything.total_count, 4);
        assert_eq!(everything.items[0].video.title, "Bob on rust");

        let owned = videos
            .list_owned(&alice_id, &ListQuery::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(owned.total_count, 4);
    }
}
