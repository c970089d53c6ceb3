/// Channel dashboard for the authenticated owner
use crate::{
    api::ApiResponse,
    auth::AuthContext,
    context::AppContext,
    db::models::VideoDetails,
    error::AppResult,
    listing::{self, ChannelStats, ListQuery, Page},
};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};

/// Build dashboard routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/dashboard/stats", get(channel_stats))
        .route("/dashboard/videos", get(channel_videos))
}

async fn channel_stats(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<ApiResponse<ChannelStats>> {
    let stats = listing::channel_stats(&ctx.db, auth.account_id()).await?;
    Ok(ApiResponse::ok(stats, "Channel stats fetched successfully"))
}

async fn channel_videos(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Page<VideoDetails>>> {
    let pagination = query.pagination(&ctx.config.listing);
    let page = ctx
        .videos
        .list_owned(auth.account_id(), &query, pagination)
        .await?;
    Ok(ApiResponse::ok(page, "Channel videos fetched successfully"))
}
