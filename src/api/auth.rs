/// Account and session endpoints
use crate::{
    account::{
        ChangePasswordRequest, ChannelProfile, LoginRequest, RefreshRequest, RefreshResponse,
        RegisterRequest, SessionResponse, UpdateAccountRequest,
    },
    api::{
        middleware::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
        ApiResponse, AppJson,
    },
    auth::{AuthContext, OptionalAuthContext, TokenPair},
    context::AppContext,
    db::account::AccountView,
    error::{AppError, AppResult},
};
use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::{json, Value};
use time::Duration;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(current_account))
        .route("/auth/change-password", post(change_password))
        .route("/auth/account", patch(update_account))
        .route("/auth/channel/:username", get(channel_profile))
}

/// Cookie that lives exactly as long as the token it carries
fn session_cookie(
    name: &'static str,
    value: String,
    ttl_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(ttl_secs))
        .build()
}

fn with_session_cookies(jar: CookieJar, tokens: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        tokens.access_ttl,
        secure,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        tokens.refresh_ttl,
        secure,
    ))
}

fn without_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/").build())
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/").build())
}

async fn register(
    State(ctx): State<AppContext>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<ApiResponse<AccountView>> {
    let account = ctx.account_manager.register(req).await?;
    Ok(ApiResponse::created(
        AccountView::from(account),
        "User registered successfully",
    ))
}

async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<(CookieJar, ApiResponse<SessionResponse>)> {
    let (account, tokens) = ctx.account_manager.login(&req).await?;
    let jar = with_session_cookies(jar, &tokens, ctx.config.authentication.cookie_secure);

    Ok((
        jar,
        ApiResponse::ok(
            SessionResponse {
                user: AccountView::from(account),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    jar: CookieJar,
) -> AppResult<(CookieJar, ApiResponse<Value>)> {
    ctx.account_manager.logout(auth.account_id()).await?;
    Ok((
        without_session_cookies(jar),
        ApiResponse::ok(json!({}), "User logged out"),
    ))
}

async fn refresh(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    body: Option<AppJson<RefreshRequest>>,
) -> AppResult<(CookieJar, ApiResponse<RefreshResponse>)> {
    let presented = body
        .and_then(|AppJson(req)| req.refresh_token)
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            jar.get(REFRESH_TOKEN_COOKIE)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        })
        .ok_or_else(|| AppError::Unauthenticated("Refresh token is missing".to_string()))?;

    let tokens = ctx.account_manager.refresh(presented.trim()).await?;
    let jar = with_session_cookies(jar, &tokens, ctx.config.authentication.cookie_secure);

    Ok((
        jar,
        ApiResponse::ok(
            RefreshResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "Access token refreshed",
        ),
    ))
}

async fn current_account(auth: AuthContext) -> ApiResponse<AccountView> {
    ApiResponse::ok(
        AccountView::from(auth.account),
        "Current user fetched successfully",
    )
}

async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    jar: CookieJar,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> AppResult<(CookieJar, ApiResponse<Value>)> {
    ctx.account_manager
        .change_password(&auth.account, &req)
        .await?;
    Ok((
        without_session_cookies(jar),
        ApiResponse::ok(json!({}), "Password changed successfully"),
    ))
}

async fn update_account(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    AppJson(req): AppJson<UpdateAccountRequest>,
) -> AppResult<ApiResponse<AccountView>> {
    let account = ctx
        .account_manager
        .update_profile(auth.account_id(), req)
        .await?;
    Ok(ApiResponse::ok(
        AccountView::from(account),
        "Account details updated successfully",
    ))
}

async fn channel_profile(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthContext,
    Path(username): Path<String>,
) -> AppResult<ApiResponse<ChannelProfile>> {
    let profile = ctx
        .account_manager
        .channel_profile(&username, viewer.account_id())
        .await?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}
