/// Comment endpoints
use crate::{
    api::{ApiResponse, AppJson},
    auth::{AuthContext, OptionalAuthContext},
    content::comment::CommentRequest,
    context::AppContext,
    db::models::{Comment, CommentDetails},
    error::AppResult,
    listing::{ListQuery, Page},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Router,
};
use serde_json::{json, Value};

/// Build comment routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/comments/:video_id", get(list_comments).post(add_comment))
        .route(
            "/comments/c/:comment_id",
            patch(update_comment).delete(delete_comment),
        )
}

async fn list_comments(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthContext,
    Path(video_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Page<CommentDetails>>> {
    let pagination = query.pagination(&ctx.config.listing);
    let page = ctx
        .comments
        .list_for_video(&video_id, viewer.account_id(), pagination)
        .await?;
    Ok(ApiResponse::ok(page, "Comments fetched successfully"))
}

async fn add_comment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(video_id): Path<String>,
    AppJson(req): AppJson<CommentRequest>,
) -> AppResult<ApiResponse<Comment>> {
    let comment = ctx.comments.add(auth.account_id(), &video_id, req).await?;
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

async fn update_comment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(comment_id): Path<String>,
    AppJson(req): AppJson<CommentRequest>,
) -> AppResult<ApiResponse<Comment>> {
    let comment = ctx.comments.update(&auth.account, &comment_id, req).await?;
    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(comment_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    ctx.comments.delete(&auth.account, &comment_id).await?;
    Ok(ApiResponse::ok(json!({}), "Comment deleted successfully"))
}
