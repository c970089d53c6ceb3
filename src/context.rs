/// Application context and dependency injection
use crate::{
    account::{AccountManager, Argon2Hasher, PasswordHasher},
    auth::TokenService,
    config::ServerConfig,
    content::{CommentManager, PlaylistManager, TweetManager, VideoManager},
    db,
    error::AppResult,
    rate_limit::RateLimiter,
    relationship::RelationshipEngine,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub token_service: Arc<TokenService>,
    pub account_manager: Arc<AccountManager>,
    pub relationships: Arc<RelationshipEngine>,
    // Owned content
    pub videos: Arc<VideoManager>,
    pub comments: Arc<CommentManager>,
    pub tweets: Arc<TweetManager>,
    pub playlists: Arc<PlaylistManager>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        }

        let pool = db::create_pool(
            &config.storage.database_path,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                ..Default::default()
            },
        )
        .await?;

        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        tracing::info!(
            "Database ready at {}",
            config.storage.database_path.display()
        );

        Ok(Self::with_pool(config, pool, Arc::new(Argon2Hasher::new())))
    }

    /// Wire every service around an already-migrated pool
    pub fn with_pool(
        config: ServerConfig,
        pool: SqlitePool,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let token_service = Arc::new(TokenService::new(
            pool.clone(),
            config.authentication.clone(),
        ));
        let account_manager = Arc::new(AccountManager::new(
            pool.clone(),
            hasher,
            Arc::clone(&token_service),
        ));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config: Arc::new(config),
            token_service,
            account_manager,
            relationships: Arc::new(RelationshipEngine::new(pool.clone())),
            videos: Arc::new(VideoManager::new(pool.clone())),
            comments: Arc::new(CommentManager::new(pool.clone())),
            tweets: Arc::new(TweetManager::new(pool.clone())),
            playlists: Arc::new(PlaylistManager::new(pool.clone())),
            rate_limiter,
            db: pool,
        }
    }

    /// In-memory context with cheap password hashing
    #[cfg(test)]
    pub async fn for_tests() -> Self {
        Self::with_pool(
            ServerConfig::for_tests(),
            db::test_pool().await,
            Arc::new(Argon2Hasher::fast()),
        )
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
