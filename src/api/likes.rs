/// Like toggles and the liked-videos listing
use crate::{
    api::ApiResponse,
    auth::AuthContext,
    context::AppContext,
    db::models::VideoDetails,
    error::AppResult,
    listing::{ListQuery, Page},
    relationship::{EdgeKind, ToggleState},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Serialize;

/// Build like routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/likes/video/:video_id", post(toggle_video_like))
        .route("/likes/comment/:comment_id", post(toggle_comment_like))
        .route("/likes/tweet/:tweet_id", post(toggle_tweet_like))
        .route("/likes/videos", get(liked_videos))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggled {
    pub state: ToggleState,
    pub is_liked: bool,
}

async fn toggle(
    ctx: &AppContext,
    auth: &AuthContext,
    kind: EdgeKind,
    target_id: &str,
    noun: &str,
) -> AppResult<ApiResponse<LikeToggled>> {
    let state = ctx
        .relationships
        .toggle(auth.account_id(), kind, target_id)
        .await?;
    let message = match state {
        ToggleState::Created => format!("{} liked", noun),
        ToggleState::Removed => format!("{} unliked", noun),
    };
    Ok(ApiResponse::ok(
        LikeToggled {
            state,
            is_liked: state.is_active(),
        },
        message,
    ))
}

async fn toggle_video_like(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(video_id): Path<String>,
) -> AppResult<ApiResponse<LikeToggled>> {
    toggle(&ctx, &auth, EdgeKind::VideoLike, &video_id, "Video").await
}

async fn toggle_comment_like(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(comment_id): Path<String>,
) -> AppResult<ApiResponse<LikeToggled>> {
    toggle(&ctx, &auth, EdgeKind::CommentLike, &comment_id, "Comment").await
}

async fn toggle_tweet_like(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(tweet_id): Path<String>,
) -> AppResult<ApiResponse<LikeToggled>> {
    toggle(&ctx, &auth, EdgeKind::TweetLike, &tweet_id, "Tweet").await
}

async fn liked_videos(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Page<VideoDetails>>> {
    let pagination = query.pagination(&ctx.config.listing);
    let page = ctx
        .relationships
        .liked_videos(auth.account_id(), pagination)
        .await?;
    Ok(ApiResponse::ok(page, "Liked videos fetched successfully"))
}
