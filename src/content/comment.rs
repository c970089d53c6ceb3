/// Comment manager
use crate::{
    auth::{authorize_mutation, OwnedResource},
    content::required,
    db::{
        account::{Account, AccountRole},
        models::{Comment, CommentDetails},
    },
    error::{AppError, AppResult},
    listing::{self, Filter, ListingSpec, Page, Pagination, Sort},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

impl OwnedResource for Comment {
    const KIND: &'static str = "comment";
    const OVERRIDE_ROLES: &'static [AccountRole] = &[];

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Body of a comment create or edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// Comment manager service
pub struct CommentManager {
    db: SqlitePool,
}

impl CommentManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Drafts only exist for their owner
    async fn require_video(&self, video_id: &str, viewer: Option<&str>) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM video WHERE id = ?1 AND (is_published = 1 OR owner_id = ?2))",
        )
        .bind(video_id)
        .bind(viewer)
        .fetch_one(&self.db)
        .await?;
        if !exists {
            return Err(AppError::NotFound("Video not found".to_string()));
        }
        Ok(())
    }

    /// Comments on a video, newest first
    pub async fn list_for_video(
        &self,
        video_id: &str,
        viewer: Option<&str>,
        pagination: Pagination,
    ) -> AppResult<Page<CommentDetails>> {
        self.require_video(video_id, viewer).await?;

        let spec = ListingSpec {
            select: "c.id, c.video_id, c.owner_id, c.content, c.created_at, c.updated_at,
                     a.username AS owner_username, a.avatar AS owner_avatar,
                     (SELECT COUNT(*) FROM relationship_edge e
                       WHERE e.kind = 'comment_like' AND e.target_id = c.id) AS likes_count",
            from: "comment c JOIN account a ON a.id = c.owner_id",
            tiebreak: "c.rowid",
            filters: vec![Filter::Equals {
                column: "c.video_id",
                value: video_id.to_string(),
            }],
            sort: Sort::desc("c.created_at"),
        };

        listing::list(&self.db, &spec, pagination).await
    }

    pub async fn add(&self, owner_id: &str, video_id: &str, req: CommentRequest) -> AppResult<Comment> {
        let content = required(&req.content, "content")?;
        self.require_video(video_id, Some(owner_id)).await?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            video_id: video_id.to_string(),
            owner_id: owner_id.to_string(),
            content,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO comment (id, video_id, owner_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&comment.id)
        .bind(&comment.video_id)
        .bind(&comment.owner_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.db)
        .await?;

        tracing::info!("Comment {} added to video {}", comment.id, video_id);
        Ok(comment)
    }

    pub async fn load(&self, id: &str) -> AppResult<Comment> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, video_id, owner_id, content, created_at, updated_at FROM comment WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    pub async fn update(&self, account: &Account, id: &str, req: CommentRequest) -> AppResult<Comment> {
        let content = required(&req.content, "content")?;
        let mut comment = self.load(id).await?;
        authorize_mutation(account, &comment)?;

        comment.content = content;
        comment.updated_at = Utc::now();
        sqlx::query("UPDATE comment SET content = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(&comment.content)
            .bind(comment.updated_at)
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(comment)
    }

    pub async fn delete(&self, account: &Account, id: &str) -> AppResult<()> {
        let comment = self.load(id).await?;
        authorize_mutation(account, &comment)?;

        sqlx::query("DELETE FROM comment WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!("Comment {} deleted by {}", id, account.id);
        Ok(())
    }
}
