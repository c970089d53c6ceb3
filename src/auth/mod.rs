/// Authentication extractors and authorization primitives
pub mod guard;
pub mod token;

pub use guard::{authorize_mutation, authorize_not_self, OwnedResource};
pub use token::{TokenPair, TokenService};

use crate::{
    api::middleware::extract_access_token,
    context::AppContext,
    db::account::Account,
    error::{AppError, AppResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - resolves the caller's account from the access token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: Account,
}

impl AuthContext {
    pub fn account_id(&self) -> &str {
        &self.account.id
    }
}

/// Validate the presented access token and load the account behind it
pub async fn authenticate(ctx: &AppContext, parts: &Parts) -> AppResult<AuthContext> {
    let token = extract_access_token(&parts.headers)
        .ok_or_else(|| AppError::Unauthenticated("Missing access token".to_string()))?;

    let account_id = ctx.token_service.validate_access_token(&token)?;

    let account = ctx
        .account_manager
        .find_account(&account_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Account no longer exists".to_string()))?;

    Ok(AuthContext { account })
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, parts).await
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

impl OptionalAuthContext {
    pub fn account_id(&self) -> Option<&str> {
        self.auth.as_ref().map(|auth| auth.account.id.as_str())
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        // Storage failures still surface; bad or missing tokens just mean anonymous
        let auth = match authenticate(state, parts).await {
            Ok(auth) => Some(auth),
            Err(err @ (AppError::Database(_) | AppError::Internal(_))) => return Err(err),
            Err(_) => None,
        };

        Ok(OptionalAuthContext { auth })
    }
}
