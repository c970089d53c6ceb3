/// Tweet manager
use crate::{
    auth::{authorize_mutation, OwnedResource},
    content::required,
    db::{
        account::{Account, AccountRole},
        models::{Tweet, TweetDetails},
    },
    error::{AppError, AppResult},
    listing::{self, Filter, ListingSpec, Page, Pagination, Sort},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

impl OwnedResource for Tweet {
    const KIND: &'static str = "tweet";
    const OVERRIDE_ROLES: &'static [AccountRole] = &[];

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetRequest {
    pub content: String,
}

/// Tweet manager service
pub struct TweetManager {
    db: SqlitePool,
}

impl TweetManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, owner_id: &str, req: TweetRequest) -> AppResult<Tweet> {
        let content = required(&req.content, "content")?;
        let now = Utc::now();
        let tweet = Tweet {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            content,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO tweet (id, owner_id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(&tweet.id)
        .bind(&tweet.owner_id)
        .bind(&tweet.content)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!("Tweet {} created by {}", tweet.id, owner_id);
        Ok(tweet)
    }

    /// A user's tweets, newest first
    pub async fn list_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> AppResult<Page<TweetDetails>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM account WHERE id = ?1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let spec = ListingSpec {
            select: "t.id, t.owner_id, t.content, t.created_at, t.updated_at,
                     a.username AS owner_username, a.fullname AS owner_fullname,
                     a.avatar AS owner_avatar,
                     (SELECT COUNT(*) FROM relationship_edge e
                       WHERE e.kind = 'tweet_like' AND e.target_id = t.id) AS likes_count",
            from: "tweet t JOIN account a ON a.id = t.owner_id",
            tiebreak: "t.rowid",
            filters: vec![Filter::Equals {
                column: "t.owner_id",
                value: user_id.to_string(),
            }],
            sort: Sort::desc("t.created_at"),
        };

        listing::list(&self.db, &spec, pagination).await
    }

    pub async fn load(&self, id: &str) -> AppResult<Tweet> {
        sqlx::query_as::<_, Tweet>(
            "SELECT id, owner_id, content, created_at, updated_at FROM tweet WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Tweet not found".to_string()))
    }

    pub async fn update(&self, account: &Account, id: &str, req: TweetRequest) -> AppResult<Tweet> {
        let content = required(&req.content, "content")?;
        let mut tweet = self.load(id).await?;
        authorize_mutation(account, &tweet)?;

        tweet.content = content;
        tweet.updated_at = Utc::now();
        sqlx::query("UPDATE tweet SET content = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(&tweet.content)
            .bind(tweet.updated_at)
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(tweet)
    }

    pub async fn delete(&self, account: &Account, id: &str) -> AppResult<()> {
        let tweet = self.load(id).await?;
        authorize_mutation(account, &tweet)?;

        sqlx::query("DELETE FROM tweet WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!("Tweet {} deleted by {}", id, account.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::test_support::create_account, db};

    async fn account(pool: &SqlitePool, id: &str) -> Account {
        sqlx::query_as::<_, Account>("SELECT * FROM account WHERE id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn body(content: &str) -> TweetRequest {
        TweetRequest {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let pool = db::test_pool().await;
        let alice = create_account(&pool, "alice").await;
        let bob = create_account(&pool, "bob").await;
        let tweets = TweetManager::new(pool.clone());

        assert!(tweets.create(&alice, body("")).await.is_err());
        tweets.create(&alice, body("first")).await.unwrap();
        tweets.create(&alice, body("second")).await.unwrap();
        tweets.create(&bob, body("bob's")).await.unwrap();

        let page = tweets.list_for_user(&alice, Pagination::default()).await.unwrap();
        let texts: Vec<_> = page.items.iter().map(|t| t.tweet.content.as_str()).collect();
        assert_eq!(texts, ["second", "first"]);
        assert_eq!(page.items[0].owner_fullname, "alice fullname");

        assert!(matches!(
            tweets.list_for_user("ghost", Pagination::default()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_mutations_are_owner_only() {
        let pool = db::test_pool().await;
        let alice_id = create_account(&pool, "alice").await;
        let bob_id = create_account(&pool, "bob").await;
        let alice = account(&pool, &alice_id).await;
        let bob = account(&pool, &bob_id).await;
        let tweets = TweetManager::new(pool.clone());
        let tweet = tweets.create(&alice_id, body("hello")).await.unwrap();

        assert!(matches!(
            tweets.update(&bob, &tweet.id, body("pwned")).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            tweets.delete(&bob, &tweet.id).await.unwrap_err(),
            AppError::Forbidden(_)
        ));

        assert_eq!(tweets.update(&alice, &tweet.id, body("hi")).await.unwrap().content, "hi");
        tweets.delete(&alice, &tweet.id).await.unwrap();
        assert!(tweets.load(&tweet.id).await.is_err());
    }
}
