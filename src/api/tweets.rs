/// Tweet endpoints
use crate::{
    api::{ApiResponse, AppJson},
    auth::AuthContext,
    content::tweet::TweetRequest,
    context::AppContext,
    db::models::{Tweet, TweetDetails},
    error::AppResult,
    listing::{ListQuery, Page},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};

/// Build tweet routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/tweets", post(create_tweet))
        .route("/tweets/user/:user_id", get(list_user_tweets))
        .route("/tweets/:tweet_id", patch(update_tweet).delete(delete_tweet))
}

async fn create_tweet(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    AppJson(req): AppJson<TweetRequest>,
) -> AppResult<ApiResponse<Tweet>> {
    let tweet = ctx.tweets.create(auth.account_id(), req).await?;
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

async fn list_user_tweets(
    State(ctx): State<AppContext>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Page<TweetDetails>>> {
    let pagination = query.pagination(&ctx.config.listing);
    let page = ctx.tweets.list_for_user(&user_id, pagination).await?;
    Ok(ApiResponse::ok(page, "Tweets fetched successfully"))
}

async fn update_tweet(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(tweet_id): Path<String>,
    AppJson(req): AppJson<TweetRequest>,
) -> AppResult<ApiResponse<Tweet>> {
    let tweet = ctx.tweets.update(&auth.account, &tweet_id, req).await?;
    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

async fn delete_tweet(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(tweet_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    ctx.tweets.delete(&auth.account, &tweet_id).await?;
    Ok(ApiResponse::ok(json!({}), "Tweet deleted successfully"))
}
