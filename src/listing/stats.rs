/// Aggregate statistics over an owner's resources
use crate::{error::AppResult, relationship::EdgeKind};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Channel-level totals shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_videos: i64,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_subscribers: i64,
}

/// Compute totals for `owner_id` in one grouped pass
///
/// Likes are grouped per video once and joined back, so the cost does not
/// grow with one query per video. An aggregate without GROUP BY always yields
/// a row, which gives owners without videos all zeros.
pub async fn channel_stats(db: &SqlitePool, owner_id: &str) -> AppResult<ChannelStats> {
    let stats = sqlx::query_as::<_, ChannelStats>(
        "SELECT COUNT(v.id) AS total_videos,
                COALESCE(SUM(v.views), 0) AS total_views,
                COALESCE(SUM(l.likes), 0) AS total_likes,
                (SELECT COUNT(*) FROM relationship_edge s
                  WHERE s.kind = ?2 AND s.target_id = ?3) AS total_subscribers
         FROM video v
         LEFT JOIN (
             SELECT target_id, COUNT(*) AS likes
             FROM relationship_edge
             WHERE kind = ?1
             GROUP BY target_id
         ) l ON l.target_id = v.id
         WHERE v.owner_id = ?3",
    )
    .bind(EdgeKind::VideoLike.as_str())
    .bind(EdgeKind::Subscription.as_str())
    .bind(owner_id)
    .fetch_one(db)
    .await?;

    tracing::debug!("Channel stats for {}: {:?}", owner_id, stats);

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::test_support::create_account, db};
    use chrono::Utc;

    async fn insert_video(pool: &SqlitePool, id: &str, owner: &str, views: i64) {
        sqlx::query(
            "INSERT INTO video (id, owner_id, title, video_file, views, created_at, updated_at)
             VALUES (?1, ?2, 'title', 'file.mp4', ?3, ?4, ?4)",
        )
        .bind(id)
        .bind(owner)
        .bind(views)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    async fn insert_edge(pool: &SqlitePool, actor: &str, kind: EdgeKind, target: &str) {
        sqlx::query(
            "INSERT INTO relationship_edge (id, actor_id, kind, target_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(actor)
        .bind(kind.as_str())
        .bind(target)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_owner_without_videos_gets_zeros() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "empty").await;

        let stats = channel_stats(&pool, &owner).await.unwrap();
        assert_eq!(stats, ChannelStats::default());
    }

    #[tokio::test]
    async fn test_totals_aggregate_views_likes_and_subscribers() {
        let pool = db::test_pool().await;
        let owner = create_account(&pool, "owner").await;
        let fan = create_account(&pool, "fan").await;
        let other = create_account(&pool, "other").await;

        insert_video(&pool, "v1", &owner, 10).await;
        insert_video(&pool, "v2", &owner, 5).await;
        insert_video(&pool, "v3", &other, 1000).await;

        insert_edge(&pool, &fan, EdgeKind::VideoLike, "v1").await;
        insert_edge(&pool, &other, EdgeKind::VideoLike, "v1").await;
        insert_edge(&pool, &fan, EdgeKind::VideoLike, "v2").await;
        insert_edge(&pool, &fan, EdgeKind::VideoLike, "v3").await;
        // comment likes with a colliding id must not count
        insert_edge(&pool, &fan, EdgeKind::CommentLike, "v1").await;
        insert_edge(&pool, &fan, EdgeKind::Subscription, &owner).await;

        let stats = channel_stats(&pool, &owner).await.unwrap();
        assert_eq!(
            stats,
            ChannelStats {
                total_videos: 2,
                total_views: 15,
                total_likes: 3,
                total_subscribers: 1,
            }
        );
    }
}
