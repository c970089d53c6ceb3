/// Account manager implementation using runtime queries
use crate::{
    account::{
        ChangePasswordRequest, ChannelProfile, LoginRequest, PasswordHasher, RegisterRequest,
        UpdateAccountRequest,
    },
    auth::{TokenPair, TokenService},
    db::{self, account::Account},
    error::{AppError, AppResult},
    relationship::EdgeKind,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const ACCOUNT_COLUMNS: &str = "id, username, email, fullname, avatar, cover_image, password_hash,
     refresh_token_hash, role, created_at, updated_at";

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<TokenService>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, hasher: Arc<dyn PasswordHasher>, tokens: Arc<TokenService>) -> Self {
        Self { db, hasher, tokens }
    }

    /// Create a new account
    pub async fn register(&self, req: RegisterRequest) -> AppResult<Account> {
        let req = req.normalized();
        req.validate()?;

        if self.username_exists(&req.username).await? {
            return Err(AppError::Conflict(format!(
                "Username {} already taken",
                req.username
            )));
        }
        if self.email_exists(&req.email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.hasher.hash(&req.password)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        // The pre-checks above race with concurrent registrations; the unique
        // indexes have the final word.
        let inserted = sqlx::query(
            "INSERT INTO account (id, username, email, fullname, avatar, cover_image, password_hash, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'standard', ?8, ?8)",
        )
        .bind(&id)
        .bind(&req.username)
        .bind(&req.email)
        .bind(&req.fullname)
        .bind(&req.avatar)
        .bind(&req.cover_image)
        .bind(&password_hash)
        .bind(now)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if db::is_unique_violation(&e) => {
                return Err(AppError::Conflict(
                    "Username or email already registered".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Registered account {} ({})", req.username, id);

        self.get_account(&id).await
    }

    /// Verify credentials and issue a fresh token pair
    pub async fn login(&self, req: &LoginRequest) -> AppResult<(Account, TokenPair)> {
        let identifier = req
            .username
            .as_deref()
            .or(req.email.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("username or email is required".to_string()))?;

        let account = self
            .find_by_identifier(identifier)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if !self.hasher.verify(&req.password, &account.password_hash)? {
            tracing::warn!("Failed login for {}", account.username);
            return Err(AppError::Unauthenticated(
                "Invalid user credentials".to_string(),
            ));
        }

        let tokens = self.tokens.issue_token_pair(&account.id).await?;
        tracing::info!("Account {} logged in", account.username);

        Ok((account, tokens))
    }

    /// Clear the caller's refresh pointer
    pub async fn logout(&self, account_id: &str) -> AppResult<()> {
        self.tokens.invalidate_session(account_id).await?;
        tracing::info!("Account {} logged out", account_id);
        Ok(())
    }

    /// Exchange a refresh token for a rotated pair
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        self.tokens.refresh_token_pair(refresh_token).await
    }

    /// Look up an account by id
    pub async fn find_account(&self, id: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    /// Get an account by id, NotFound when absent
    pub async fn get_account(&self, id: &str) -> AppResult<Account> {
        self.find_account(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Verify the old password, store the new one and end the session
    pub async fn change_password(
        &self,
        account: &Account,
        req: &ChangePasswordRequest,
    ) -> AppResult<()> {
        req.validate()?;

        if !self.hasher.verify(&req.old_password, &account.password_hash)? {
            return Err(AppError::Validation("Invalid old password".to_string()));
        }

        let password_hash = self.hasher.hash(&req.new_password)?;

        sqlx::query(
            "UPDATE account SET password_hash = ?1, refresh_token_hash = NULL, updated_at = ?2 WHERE id = ?3",
        )
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        tracing::info!("Password changed for account {}", account.id);
        crate::metrics::record_session_event("invalidated");

        Ok(())
    }

    /// Update fullname and/or email
    pub async fn update_profile(
        &self,
        account_id: &str,
        req: UpdateAccountRequest,
    ) -> AppResult<Account> {
        let req = UpdateAccountRequest {
            fullname: req.fullname.map(|s| s.trim().to_string()),
            email: req.email.map(|s| s.trim().to_string()),
        };
        req.validate()?;

        if req.fullname.is_none() && req.email.is_none() {
            return Err(AppError::Validation(
                "At least one of fullname or email is required".to_string(),
            ));
        }

        let updated = sqlx::query(
            "UPDATE account
             SET fullname = COALESCE(?1, fullname), email = COALESCE(?2, email), updated_at = ?3
             WHERE id = ?4",
        )
        .bind(&req.fullname)
        .bind(&req.email)
        .bind(Utc::now())
        .bind(account_id)
        .execute(&self.db)
        .await;

        match updated {
            Ok(result) if result.rows_affected() == 0 => {
                return Err(AppError::NotFound("User not found".to_string()))
            }
            Ok(_) => {}
            Err(e) if db::is_unique_violation(&e) => {
                return Err(AppError::Conflict("Email already registered".to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        self.get_account(account_id).await
    }

    /// Channel view of an account with subscription counts
    pub async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<ChannelProfile> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(AppError::Validation("username is missing".to_string()));
        }

        let kind = EdgeKind::Subscription.as_str();
        let profile = sqlx::query_as::<_, ChannelProfile>(
            "SELECT a.id, a.username, a.fullname, a.email, a.avatar, a.cover_image,
                    (SELECT COUNT(*) FROM relationship_edge e
                      WHERE e.kind = ?1 AND e.target_id = a.id) AS subscribers_count,
                    (SELECT COUNT(*) FROM relationship_edge e
                      WHERE e.kind = ?1 AND e.actor_id = a.id) AS channels_subscribed_to_count,
                    EXISTS(SELECT 1 FROM relationship_edge e
                      WHERE e.kind = ?1 AND e.target_id = a.id AND e.actor_id = ?2) AS is_subscribed
             FROM account a
             WHERE a.username = ?3",
        )
        .bind(kind)
        .bind(viewer_id)
        .bind(&username)
        .fetch_optional(&self.db)
        .await?;

        profile.ok_or_else(|| AppError::NotFound("Channel does not exist".to_string()))
    }

    /// Usernames never contain `@`, so an identifier with one is an email
    async fn find_by_identifier(&self, identifier: &str) -> AppResult<Option<Account>> {
        let (column, value) = if identifier.contains('@') {
            ("email", identifier.to_string())
        } else {
            ("username", identifier.to_lowercase())
        };

        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE {} = ?1",
            ACCOUNT_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    async fn username_exists(&self, username: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE username = ?1")
            .bind(username)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }
}
