/// Access/refresh token issuing, rotation and invalidation
///
/// Access tokens are stateless HS256 JWTs checked on every request without a
/// storage round-trip, so they cannot be revoked before they expire. Refresh
/// tokens are JWTs signed with a separate secret; the account row stores the
/// SHA-256 digest of the single refresh token it currently accepts, and every
/// refresh swaps that digest for a new one.

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    metrics,
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

const ACCESS_TOKEN_TYPE: &str = "access";
const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Clock skew tolerated when checking `exp`, in seconds
const LEEWAY_SECS: u64 = 5;

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    typ: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    jti: String,
    typ: String,
    iat: i64,
    exp: i64,
}

/// Freshly issued credentials
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub access_ttl: i64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl: i64,
}

/// Digest stored as the account's refresh-token pointer
pub fn refresh_token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Token service
pub struct TokenService {
    db: SqlitePool,
    config: AuthConfig,
}

impl TokenService {
    /// Create a new token service
    pub fn new(db: SqlitePool, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Issue an access/refresh pair and make the refresh token the only one the account accepts
    pub async fn issue_token_pair(&self, account_id: &str) -> AppResult<TokenPair> {
        let refresh_token = self.generate_refresh_token(account_id)?;

        // One write: store the new pointer
        let updated = sqlx::query("UPDATE account SET refresh_token_hash = ?1 WHERE id = ?2")
            .bind(refresh_token_digest(&refresh_token))
            .bind(account_id)
            .execute(&self.db)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Account not found".to_string()));
        }
        let access_token = self.generate_access_token(account_id)?;

        metrics::record_session_event("issued");
        tracing::info!("Issued token pair for account {}", account_id);

        Ok(self.pair(access_token, refresh_token))
    }

    /// Verify signature, type and expiry of an access token and return the account id
    ///
    /// Never touches storage.
    pub fn validate_access_token(&self, token: &str) -> AppResult<String> {
        let claims = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.config.access_token_secret.as_bytes()),
            &validation(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::ExpiredToken,
            _ => AppError::MalformedToken(e.to_string()),
        })?
        .claims;

        if claims.typ != ACCESS_TOKEN_TYPE {
            return Err(AppError::MalformedToken("Not an access token".to_string()));
        }

        Ok(claims.sub)
    }

    /// Exchange a refresh token for a brand-new pair
    ///
    /// The presented token is superseded even though it has not expired, so a
    /// second use of it fails.
    pub async fn refresh_token_pair(&self, presented: &str) -> AppResult<TokenPair> {
        let claims = decode::<RefreshClaims>(
            presented,
            &DecodingKey::from_secret(self.config.refresh_token_secret.as_bytes()),
            &validation(),
        )
        .map_err(|e| {
            metrics::record_session_event("rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::InvalidRefreshToken("Refresh token expired".to_string())
                }
                _ => AppError::InvalidRefreshToken(format!("Refresh token invalid: {}", e)),
            }
        })?
        .claims;

        if claims.typ != REFRESH_TOKEN_TYPE {
            metrics::record_session_event("rejected");
            return Err(AppError::InvalidRefreshToken("Not a refresh token".to_string()));
        }

        let new_refresh = self.generate_refresh_token(&claims.sub)?;

        // Compare-and-swap: only the holder of the current pointer wins
        let swapped = sqlx::query(
            "UPDATE account SET refresh_token_hash = ?1
             WHERE id = ?2 AND refresh_token_hash = ?3",
        )
        .bind(refresh_token_digest(&new_refresh))
        .bind(&claims.sub)
        .bind(refresh_token_digest(presented))
        .execute(&self.db)
        .await?;

        if swapped.rows_affected() == 0 {
            metrics::record_session_event("rejected");
            tracing::warn!("Rejected superseded refresh token for account {}", claims.sub);
            return Err(AppError::InvalidRefreshToken(
                "Refresh token is no longer current".to_string(),
            ));
        }

        let access_token = self.generate_access_token(&claims.sub)?;

        metrics::record_session_event("refreshed");
        tracing::info!("Rotated token pair for account {}", claims.sub);

        Ok(self.pair(access_token, new_refresh))
    }

    /// Clear the stored refresh pointer (logout); a no-op when already clear
    pub async fn invalidate_session(&self, account_id: &str) -> AppResult<()> {
        sqlx::query("UPDATE account SET refresh_token_hash = NULL WHERE id = ?1")
            .bind(account_id)
            .execute(&self.db)
            .await?;

        metrics::record_session_event("invalidated");
        tracing::info!("Invalidated session for account {}", account_id);

        Ok(())
    }

    fn pair(&self, access_token: String, refresh_token: String) -> TokenPair {
        TokenPair {
            access_token,
            refresh_token,
            access_ttl: self.config.access_token_ttl,
            refresh_ttl: self.config.refresh_token_ttl,
        }
    }

    /// Generate access JWT token
    fn generate_access_token(&self, account_id: &str) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: account_id.to_string(),
            typ: ACCESS_TOKEN_TYPE.to_string(),
            iat: now,
            exp: now + self.config.access_token_ttl,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.access_token_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to generate access token: {}", e)))
    }

    /// Generate refresh JWT token
    fn generate_refresh_token(&self, account_id: &str) -> AppResult<String> {
        // Random jti keeps two tokens minted in the same second distinct
        let mut jti = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut jti);

        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: account_id.to_string(),
            jti: hex::encode(jti),
            typ: REFRESH_TOKEN_TYPE.to_string(),
            iat: now,
            exp: now + self.config.refresh_token_ttl,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.refresh_token_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to generate refresh token: {}", e)))
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = LEEWAY_SECS;
    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ServerConfig, db};

    async fn setup() -> (TokenService, SqlitePool) {
        let pool = db::test_pool().await;
        let now = Utc::now();
        for (id, username, role) in [("acc-1", "alice", "standard"), ("acc-2", "root", "admin")] {
            sqlx::query(
                "INSERT INTO account (id, username, email, fullname, password_hash, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'hash', ?5, ?6, ?6)",
            )
            .bind(id)
            .bind(username)
            .bind(format!("{}@example.com", username))
            .bind(username.to_uppercase())
            .bind(role)
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();
        }

        let config = ServerConfig::for_tests().authentication;
        (TokenService::new(pool.clone(), config), pool)
    }

    async fn stored_pointer(pool: &SqlitePool, id: &str) -> Option<String> {
        sqlx::query_scalar("SELECT refresh_token_hash FROM account WHERE id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_issue_persists_pointer_and_validates() {
        let (service, pool) = setup().await;

        let pair = service.issue_token_pair("acc-2").await.unwrap();
        assert_eq!(
            stored_pointer(&pool, "acc-2").await,
            Some(refresh_token_digest(&pair.refresh_token))
        );

        assert_eq!(
            service.validate_access_token(&pair.access_token).unwrap(),
            "acc-2"
        );
    }

    #[tokio::test]
    async fn test_issue_for_missing_account() {
        let (service, _) = setup().await;
        let result = service.issue_token_pair("nobody").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_new_login_invalidates_previous_refresh_token() {
        let (service, _) = setup().await;

        let first = service.issue_token_pair("acc-1").await.unwrap();
        let _second = service.issue_token_pair("acc-1").await.unwrap();

        let result = service.refresh_token_pair(&first.refresh_token).await;
        assert!(matches!(result, Err(AppError::InvalidRefreshToken(_))));
    }

    #[tokio::test]
    async fn test_refresh_rotates_once() {
        let (service, pool) = setup().await;
        let pair = service.issue_token_pair("acc-1").await.unwrap();

        let rotated = service.refresh_token_pair(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);
        assert_eq!(
            stored_pointer(&pool, "acc-1").await,
            Some(refresh_token_digest(&rotated.refresh_token))
        );
        assert_eq!(
            service.validate_access_token(&rotated.access_token).unwrap(),
            "acc-1"
        );

        // Replaying the superseded token fails
        let replay = service.refresh_token_pair(&pair.refresh_token).await;
        assert!(matches!(replay, Err(AppError::InvalidRefreshToken(_))));

        // The rotated one still works
        assert!(service.refresh_token_pair(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (service, pool) = setup().await;
        let pair = service.issue_token_pair("acc-1").await.unwrap();

        service.invalidate_session("acc-1").await.unwrap();
        service.invalidate_session("acc-1").await.unwrap();
        assert_eq!(stored_pointer(&pool, "acc-1").await, None);

        let result = service.refresh_token_pair(&pair.refresh_token).await;
        assert!(matches!(result, Err(AppError::InvalidRefreshToken(_))));
    }

    #[tokio::test]
    async fn test_access_token_rejected_as_refresh_token() {
        let (service, _) = setup().await;
        let pair = service.issue_token_pair("acc-1").await.unwrap();

        // Signed with the access secret, so the refresh key rejects it
        let result = service.refresh_token_pair(&pair.access_token).await;
        assert!(matches!(result, Err(AppError::InvalidRefreshToken(_))));

        let result = service.validate_access_token(&pair.refresh_token);
        assert!(matches!(result, Err(AppError::MalformedToken(_))));
    }

    #[tokio::test]
    async fn test_expired_access_token() {
        let (service, _) = setup().await;
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: "acc-1".to_string(),
            typ: ACCESS_TOKEN_TYPE.to_string(),
            iat: now - 3600,
            exp: now - 600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(service.config.access_token_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            service.validate_access_token(&token),
            Err(AppError::ExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_tampered_access_token() {
        let (service, _) = setup().await;
        let pair = service.issue_token_pair("acc-1").await.unwrap();

        let mut tampered = pair.access_token.clone();
        tampered.push('x');

        assert!(matches!(
            service.validate_access_token(&tampered),
            Err(AppError::MalformedToken(_))
        ));
        assert!(matches!(
            service.validate_access_token("not-a-jwt"),
            Err(AppError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_refresh_token() {
        let (service, pool) = setup().await;
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: "acc-1".to_string(),
            jti: "stale".to_string(),
            typ: REFRESH_TOKEN_TYPE.to_string(),
            iat: now - 7200,
            exp: now - 600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(service.config.refresh_token_secret.as_bytes()),
        )
        .unwrap();

        // Even when it is the stored pointer, expiry wins
        sqlx::query("UPDATE account SET refresh_token_hash = ?1 WHERE id = 'acc-1'")
            .bind(refresh_token_digest(&token))
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            service.refresh_token_pair(&token).await,
            Err(AppError::InvalidRefreshToken(_))
        ));
    }
}
