/// Configuration management for vidshare
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub listing: ListingConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Token and cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    /// Access token lifetime in seconds
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: i64,
    /// Mark auth cookies `Secure`
    pub cookie_secure: bool,
}

/// Pagination defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("VIDSHARE_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("VIDSHARE_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let version =
            env::var("VIDSHARE_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("VIDSHARE_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database_path = env::var("VIDSHARE_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("vidshare.sqlite"));
        let max_connections = env_or("VIDSHARE_DATABASE_MAX_CONNECTIONS", 10);

        let access_token_secret = env::var("VIDSHARE_ACCESS_TOKEN_SECRET")
            .map_err(|_| AppError::Validation("Access token secret required".to_string()))?;
        let refresh_token_secret = env::var("VIDSHARE_REFRESH_TOKEN_SECRET")
            .map_err(|_| AppError::Validation("Refresh token secret required".to_string()))?;

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database_path,
                max_connections,
            },
            authentication: AuthConfig {
                access_token_secret,
                refresh_token_secret,
                access_token_ttl: env_or("VIDSHARE_ACCESS_TOKEN_TTL_SECS", 900),
                refresh_token_ttl: env_or("VIDSHARE_REFRESH_TOKEN_TTL_SECS", 864_000),
                cookie_secure: env_or("VIDSHARE_COOKIE_SECURE", true),
            },
            listing: ListingConfig {
                default_page_size: env_or("VIDSHARE_DEFAULT_PAGE_SIZE", 10),
                max_page_size: env_or("VIDSHARE_MAX_PAGE_SIZE", 100),
            },
            rate_limit: RateLimitConfig {
                enabled: env_or("VIDSHARE_RATE_LIMITS_ENABLED", true),
                requests_per_second: env_or("VIDSHARE_RATE_LIMIT_RPS", 100),
                burst_size: env_or("VIDSHARE_RATE_LIMIT_BURST", 50),
            },
            logging: LoggingConfig {
                level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        let auth = &self.authentication;
        if auth.access_token_secret.len() < 32 || auth.refresh_token_secret.len() < 32 {
            return Err(AppError::Validation(
                "Token secrets must be at least 32 characters".to_string(),
            ));
        }
        if auth.access_token_secret == auth.refresh_token_secret {
            return Err(AppError::Validation(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }
        if auth.access_token_ttl <= 0 || auth.refresh_token_ttl <= 0 {
            return Err(AppError::Validation("Token lifetimes must be positive".to_string()));
        }

        if self.listing.default_page_size == 0
            || self.listing.max_page_size < self.listing.default_page_size
        {
            return Err(AppError::Validation(
                "Page size defaults are inconsistent".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration used by tests: in-memory storage, fixed secrets, no throttling
    #[cfg(test)]
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8000,
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                database_path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            authentication: AuthConfig {
                access_token_secret: "test-access-secret-key-for-testing-only".to_string(),
                refresh_token_secret: "test-refresh-secret-key-for-testing-only".to_string(),
                access_token_ttl: 900,
                refresh_token_ttl: 864_000,
                cookie_secure: false,
            },
            listing: ListingConfig {
                default_page_size: 10,
                max_page_size: 100,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: 100,
                burst_size: 50,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
