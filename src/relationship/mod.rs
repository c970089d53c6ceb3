/// Relationship toggle engine
///
/// Likes and subscriptions are rows in `relationship_edge`; a row existing is
/// the relationship. Toggling deletes the row if present and inserts it
/// otherwise. The `(actor_id, kind, target_id)` unique key makes concurrent
/// creates collapse into a single edge.

use crate::{
    auth::authorize_not_self,
    db::{self, account::AccountSummary, models::VideoDetails},
    error::{AppError, AppResult},
    listing::{Page, Pagination},
    metrics,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Kind of relationship an edge encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    VideoLike,
    CommentLike,
    TweetLike,
    Subscription,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::VideoLike => "video_like",
            EdgeKind::CommentLike => "comment_like",
            EdgeKind::TweetLike => "tweet_like",
            EdgeKind::Subscription => "subscription",
        }
    }

    /// Table holding the edge's target
    fn target_table(&self) -> &'static str {
        match self {
            EdgeKind::VideoLike => "video",
            EdgeKind::CommentLike => "comment",
            EdgeKind::TweetLike => "tweet",
            EdgeKind::Subscription => "account",
        }
    }

    fn target_label(&self) -> &'static str {
        match self {
            EdgeKind::VideoLike => "Video",
            EdgeKind::CommentLike => "Comment",
            EdgeKind::TweetLike => "Tweet",
            EdgeKind::Subscription => "Channel",
        }
    }
}

/// Outcome of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    Created,
    Removed,
}

impl ToggleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleState::Created => "created",
            ToggleState::Removed => "removed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ToggleState::Created)
    }
}

/// Relationship engine service
pub struct RelationshipEngine {
    db: SqlitePool,
}

impl RelationshipEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Flip the edge between `actor_id` and `target_id`
    pub async fn toggle(
        &self,
        actor_id: &str,
        kind: EdgeKind,
        target_id: &str,
    ) -> AppResult<ToggleState> {
        if kind == EdgeKind::Subscription {
            authorize_not_self(actor_id, target_id)?;
        }

        if !self.target_visible(actor_id, kind, target_id).await? {
            return Err(AppError::NotFound(format!(
                "{} not found",
                kind.target_label()
            )));
        }

        // The delete is the existence check: it either removes the edge or
        // proves there was none to remove.
        let removed = sqlx::query(
            "DELETE FROM relationship_edge WHERE actor_id = ?1 AND kind = ?2 AND target_id = ?3",
        )
        .bind(actor_id)
        .bind(kind.as_str())
        .bind(target_id)
        .execute(&self.db)
        .await?;

        let state = if removed.rows_affected() > 0 {
            ToggleState::Removed
        } else {
            self.create_edge(actor_id, kind, target_id).await?;
            ToggleState::Created
        };

        metrics::record_toggle(kind.as_str(), state.as_str());
        tracing::info!(
            "{} {} {} -> {}",
            actor_id,
            kind.as_str(),
            target_id,
            state.as_str()
        );

        Ok(state)
    }

    /// Insert an edge; a concurrent duplicate resolves to the existing edge
    ///
    /// Returns false when the edge was already there.
    pub(crate) async fn create_edge(
        &self,
        actor_id: &str,
        kind: EdgeKind,
        target_id: &str,
    ) -> AppResult<bool> {
        let inserted = sqlx::query(
            "INSERT INTO relationship_edge (id, actor_id, kind, target_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(actor_id)
        .bind(kind.as_str())
        .bind(target_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(e) if db::is_unique_violation(&e) => {
                tracing::debug!(
                    "Edge {} {} {} already exists",
                    actor_id,
                    kind.as_str(),
                    target_id
                );
                metrics::record_toggle_conflict(kind.as_str());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Target exists and the actor may see it; drafts are visible to their owner only
    async fn target_visible(
        &self,
        actor_id: &str,
        kind: EdgeKind,
        target_id: &str,
    ) -> AppResult<bool> {
        let sql = match kind {
            EdgeKind::VideoLike => {
                "SELECT EXISTS(SELECT 1 FROM video WHERE id = ?1 AND (is_published = 1 OR owner_id = ?2))"
                    .to_string()
            }
            _ => format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)",
                kind.target_table()
            ),
        };

        let mut query = sqlx::query_scalar::<_, bool>(&sql).bind(target_id);
        if kind == EdgeKind::VideoLike {
            query = query.bind(actor_id);
        }

        Ok(query.fetch_one(&self.db).await?)
    }

    /// Videos the actor has liked, most recent like first
    ///
    /// Edges whose video no longer exists fall out of the inner join, as do
    /// videos that were unpublished by someone else.
    pub async fn liked_videos(
        &self,
        actor_id: &str,
        pagination: Pagination,
    ) -> AppResult<Page<VideoDetails>> {
        const VISIBLE: &str = "FROM relationship_edge e
             JOIN video v ON v.id = e.target_id
             JOIN account a ON a.id = v.owner_id
             WHERE e.actor_id = ?1 AND e.kind = ?2
               AND (v.is_published = 1 OR v.owner_id = ?1)";

        let total_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", VISIBLE))
            .bind(actor_id)
            .bind(EdgeKind::VideoLike.as_str())
            .fetch_one(&self.db)
            .await?;

        let items = sqlx::query_as::<_, VideoDetails>(&format!(
            "SELECT v.id, v.owner_id, v.title, v.description, v.video_file, v.thumbnail,
                    v.duration, v.views, v.is_published, v.created_at, v.updated_at,
                    a.username AS owner_username, a.avatar AS owner_avatar,
                    (SELECT COUNT(*) FROM relationship_edge l
                      WHERE l.kind = ?2 AND l.target_id = v.id) AS likes_count
             {}
             ORDER BY e.created_at DESC, e.rowid DESC
             LIMIT ?3 OFFSET ?4",
            VISIBLE
        ))
        .bind(actor_id)
        .bind(EdgeKind::VideoLike.as_str())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(items, pagination, total_count))
    }

    /// Accounts subscribed to `channel_id`
    pub async fn subscribers(&self, channel_id: &str) -> AppResult<Vec<AccountSummary>> {
        self.require_account(channel_id, "Channel").await?;

        let subscribers = sqlx::query_as::<_, AccountSummary>(
            "SELECT a.id, a.username, a.fullname, a.avatar
             FROM relationship_edge e
             JOIN account a ON a.id = e.actor_id
             WHERE e.kind = ?1 AND e.target_id = ?2
             ORDER BY e.created_at DESC, e.rowid DESC",
        )
        .bind(EdgeKind::Subscription.as_str())
        .bind(channel_id)
        .fetch_all(&self.db)
        .await?;

        Ok(subscribers)
    }

    /// Channels `subscriber_id` is subscribed to
    pub async fn subscribed_channels(&self, subscriber_id: &str) -> AppResult<Vec<AccountSummary>> {
        self.require_account(subscriber_id, "User").await?;

        let channels = sqlx::query_as::<_, AccountSummary>(
            "SELECT a.id, a.username, a.fullname, a.avatar
             FROM relationship_edge e
             JOIN account a ON a.id = e.target_id
             WHERE e.kind = ?1 AND e.actor_id = ?2
             ORDER BY e.created_at DESC, e.rowid DESC",
        )
        .bind(EdgeKind::Subscription.as_str())
        .bind(subscriber_id)
        .fetch_all(&self.db)
        .await?;

        Ok(channels)
    }

    async fn require_account(&self, id: &str, label: &str) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM account WHERE id = ?1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound(format!("{} not found", label)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::test_support::create_account;
    use std::sync::Arc;

    async fn insert_video(pool: &SqlitePool, id: &str, owner: &str, published: bool) {
        sqlx::query(
            "INSERT INTO video (id, owner_id, title, video_file, is_published, created_at, updated_at)
             VALUES (?1, ?2, ?1, 'file.mp4', ?3, ?4, ?4)",
        )
        .bind(id)
        .bind(owner)
        .bind(published)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    async fn edge_count(pool: &SqlitePool, actor: &str, kind: EdgeKind, target: &str) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM relationship_edge WHERE actor_id = ?1 AND kind = ?2 AND target_id = ?3",
        )
        .bind(actor)
        .bind(kind.as_str())
        .bind(target)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_toggle_alternates() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        let fan = create_account(&pool, "fan").await;
        insert_video(&pool, "v1", &owner, true).await;
        let engine = RelationshipEngine::new(pool.clone());

        let states = [
            engine.toggle(&fan, EdgeKind::VideoLike, "v1").await.unwrap(),
            engine.toggle(&fan, EdgeKind::VideoLike, "v1").await.unwrap(),
            engine.toggle(&fan, EdgeKind::VideoLike, "v1").await.unwrap(),
        ];
        assert_eq!(
            states,
            [ToggleState::Created, ToggleState::Removed, ToggleState::Created]
        );
        assert_eq!(edge_count(&pool, &fan, EdgeKind::VideoLike, "v1").await, 1);
    }

    #[tokio::test]
    async fn test_draft_video_only_likable_by_owner() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        let fan = create_account(&pool, "fan").await;
        insert_video(&pool, "draft", &owner, false).await;
        let engine = RelationshipEngine::new(pool.clone());

        let err = engine.toggle(&fan, EdgeKind::VideoLike, "draft").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(edge_count(&pool, &fan, EdgeKind::VideoLike, "draft").await, 0);

        assert_eq!(
            engine.toggle(&owner, EdgeKind::VideoLike, "draft").await.unwrap(),
            ToggleState::Created
        );
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        insert_video(&pool, "shared-id", &owner, true).await;
        sqlx::query(
            "INSERT INTO tweet (id, owner_id, content, created_at, updated_at) VALUES ('shared-id', ?1, 'hi', ?2, ?2)",
        )
        .bind(&owner)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();
        let engine = RelationshipEngine::new(pool.clone());

        assert_eq!(
            engine.toggle(&owner, EdgeKind::VideoLike, "shared-id").await.unwrap(),
            ToggleState::Created
        );
        assert_eq!(
            engine.toggle(&owner, EdgeKind::TweetLike, "shared-id").await.unwrap(),
            ToggleState::Created
        );
    }

    #[tokio::test]
    async fn test_missing_target_is_not_found() {
        let pool = db::test_pool().await;
        let fan = create_account(&pool, "fan").await;
        let engine = RelationshipEngine::new(pool.clone());

        for kind in [
            EdgeKind::VideoLike,
            EdgeKind::CommentLike,
            EdgeKind::TweetLike,
            EdgeKind::Subscription,
        ] {
            let err = engine.toggle(&fan, kind, "missing").await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "{:?}", kind);
        }
    }

    #[tokio::test]
    async fn test_self_subscription_rejected() {
        let pool = db::test_pool().await;
        let me = create_account(&pool, "me").await;
        let engine = RelationshipEngine::new(pool.clone());

        let err = engine.toggle(&me, EdgeKind::Subscription, &me).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
        assert_eq!(edge_count(&pool, &me, EdgeKind::Subscription, &me).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_create_resolves_to_existing() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        insert_video(&pool, "v1", &owner, true).await;
        let engine = RelationshipEngine::new(pool.clone());

        assert!(engine.create_edge(&owner, EdgeKind::VideoLike, "v1").await.unwrap());
        assert!(!engine.create_edge(&owner, EdgeKind::VideoLike, "v1").await.unwrap());
        assert_eq!(edge_count(&pool, &owner, EdgeKind::VideoLike, "v1").await, 1);
    }

    async fn file_pool(dir: &tempfile::TempDir) -> SqlitePool {
        let pool = db::create_pool(
            &dir.path().join("race.sqlite"),
            db::DatabaseOptions {
                max_connections: 8,
                enable_wal: true,
            },
        )
        .await
        .unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_yield_one_edge() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir).await;
        let owner = create_account(&pool, "owner").await;
        insert_video(&pool, "v1", &owner, true).await;
        let engine = Arc::new(RelationshipEngine::new(pool.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let owner = owner.clone();
                tokio::spawn(async move { engine.create_edge(&owner, EdgeKind::VideoLike, "v1").await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(edge_count(&pool, &owner, EdgeKind::VideoLike, "v1").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_never_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir).await;
        let owner = create_account(&pool, "owner").await;
        let fan = create_account(&pool, "fan").await;
        let engine = Arc::new(RelationshipEngine::new(pool.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let fan = fan.clone();
                let owner = owner.clone();
                tokio::spawn(async move { engine.toggle(&fan, EdgeKind::Subscription, &owner).await })
            })
            .collect();

        let (mut created, mut removed) = (0, 0);
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ToggleState::Created => created += 1,
                ToggleState::Removed => removed += 1,
            }
        }
        assert_eq!(created + removed, 16);
        // Every removal deleted an edge some earlier toggle inserted
        assert!(created >= 1);
        assert!(removed <= created);

        let remaining = edge_count(&pool, &fan, EdgeKind::Subscription, &owner).await;
        assert!(remaining == 0 || remaining == 1);

        // The table stays a consistent boolean: the next toggle flips it
        let next = engine.toggle(&fan, EdgeKind::Subscription, &owner).await.unwrap();
        let expected = if remaining == 1 {
            ToggleState::Removed
        } else {
            ToggleState::Created
        };
        assert_eq!(next, expected);
        assert_eq!(
            edge_count(&pool, &fan, EdgeKind::Subscription, &owner).await,
            1 - remaining
        );
    }

    #[tokio::test]
    async fn test_liked_videos_skip_dangling_and_hidden() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        let fan = create_account(&pool, "fan").await;
        let engine = RelationshipEngine::new(pool.clone());

        insert_video(&pool, "kept", &owner, true).await;
        insert_video(&pool, "deleted", &owner, true).await;
        insert_video(&pool, "hidden", &owner, true).await;
        insert_video(&pool, "own-draft", &fan, false).await;
        for id in ["kept", "deleted", "hidden", "own-draft"] {
            engine.toggle(&fan, EdgeKind::VideoLike, id).await.unwrap();
        }

        sqlx::query("DELETE FROM video WHERE id = 'deleted'")
            .execute(&pool)
            .await
            .unwrap();
        // Unpublished by its owner after the like
        sqlx::query("UPDATE video SET is_published = 0 WHERE id = 'hidden'")
            .execute(&pool)
            .await
            .unwrap();

        let page = engine.liked_videos(&fan, Pagination::default()).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|v| v.video.id.as_str()).collect();
        assert_eq!(ids, ["own-draft", "kept"]);
        assert_eq!(page.total_count, 2);
        assert_eq!(page.items[1].likes_count, 1);
        assert_eq!(page.items[1].owner_username, "owner");
    }

    #[tokio::test]
    async fn test_liked_videos_paginates() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        let engine = RelationshipEngine::new(pool.clone());

        for i in 0..12 {
            let id = format!("v{:02}", i);
            insert_video(&pool, &id, &owner, true).await;
            engine.toggle(&owner, EdgeKind::VideoLike, &id).await.unwrap();
        }

        let page = engine
            .liked_videos(&owner, Pagination { page: 2, page_size: 5 })
            .await
            .unwrap();
        assert_eq!(page.total_count, 12);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 5);
        // newest like first: v11..v07 on page 1, v06..v02 on page 2
        assert_eq!(page.items[0].video.id, "v06");
    }

    #[tokio::test]
    async fn test_subscription_projections() {
        let pool = db::test_pool().await;
        let channel = create_account(&pool, "channel").await;
        let alice = create_account(&pool, "alice").await;
        let bob = create_account(&pool, "bob").await;
        let engine = RelationshipEngine::new(pool.clone());

        engine.toggle(&alice, EdgeKind::Subscription, &channel).await.unwrap();
        engine.toggle(&bob, EdgeKind::Subscription, &channel).await.unwrap();
        engine.toggle(&alice, EdgeKind::Subscription, &bob).await.unwrap();

        let subscribers = engine.subscribers(&channel).await.unwrap();
        let names: Vec<_> = subscribers.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, ["bob", "alice"]);
        assert_eq!(subscribers[0].fullname, "bob fullname");

        let channels = engine.subscribed_channels(&alice).await.unwrap();
        let names: Vec<_> = channels.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, ["bob", "channel"]);

        assert!(engine.subscribed_channels(&channel).await.unwrap().is_empty());
        assert!(matches!(
            engine.subscribers("missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            engine.subscribed_channels("missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
