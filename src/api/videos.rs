/// Video endpoints
use crate::{
    api::{ApiResponse, AppJson},
    auth::{AuthContext, OptionalAuthContext},
    content::video::{CreateVideoRequest, UpdateVideoRequest},
    context::AppContext,
    db::models::{Video, VideoDetails},
    error::AppResult,
    listing::{ListQuery, Page},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Router,
};
use serde_json::{json, Value};

/// Build video routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/videos", get(list_videos).post(publish_video))
        .route(
            "/videos/:video_id",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/videos/:video_id/publish", patch(toggle_publish))
}

async fn list_videos(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthContext,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Page<VideoDetails>>> {
    let pagination = query.pagination(&ctx.config.listing);
    let page = ctx
        .videos
        .list(&query, pagination, viewer.account_id())
        .await?;
    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

async fn publish_video(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    AppJson(req): AppJson<CreateVideoRequest>,
) -> AppResult<ApiResponse<Video>> {
    let video = ctx.videos.create(auth.account_id(), req).await?;
    Ok(ApiResponse::created(video, "Video published successfully"))
}

async fn get_video(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthContext,
    Path(video_id): Path<String>,
) -> AppResult<ApiResponse<VideoDetails>> {
    let video = ctx.videos.view(&video_id, viewer.account_id()).await?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

async fn update_video(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(video_id): Path<String>,
    AppJson(req): AppJson<UpdateVideoRequest>,
) -> AppResult<ApiResponse<Video>> {
    let video = ctx.videos.update(&auth.account, &video_id, req).await?;
    Ok(ApiResponse::ok(video, "Video updated successfully"))
}

async fn delete_video(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(video_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    ctx.videos.delete(&auth.account, &video_id).await?;
    Ok(ApiResponse::ok(json!({}), "Video deleted successfully"))
}

async fn toggle_publish(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(video_id): Path<String>,
) -> AppResult<ApiResponse<Video>> {
    let video = ctx.videos.toggle_publish(&auth.account, &video_id).await?;
    let message = if video.is_published {
        "Video published"
    } else {
        "Video unpublished"
    };
    Ok(ApiResponse::ok(video, message))
}
