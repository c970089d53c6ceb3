/// Playlist endpoints
use crate::{
    api::{ApiResponse, AppJson},
    auth::{AuthContext, OptionalAuthContext},
    content::playlist::{CreatePlaylistRequest, UpdatePlaylistRequest},
    context::AppContext,
    db::models::{Playlist, PlaylistDetails},
    error::AppResult,
    listing::{ListQuery, Page},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

/// Build playlist routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/playlists", post(create_playlist))
        .route("/playlists/user/:user_id", get(list_user_playlists))
        .route(
            "/playlists/:playlist_id",
            get(get_playlist)
                .patch(update_playlist)
                .delete(delete_playlist),
        )
        .route(
            "/playlists/:playlist_id/videos/:video_id",
            post(add_video).delete(remove_video),
        )
}

async fn create_playlist(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    AppJson(req): AppJson<CreatePlaylistRequest>,
) -> AppResult<ApiResponse<Playlist>> {
    let playlist = ctx.playlists.create(auth.account_id(), req).await?;
    Ok(ApiResponse::created(playlist, "Playlist created successfully"))
}

async fn list_user_playlists(
    State(ctx): State<AppContext>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Page<Playlist>>> {
    let pagination = query.pagination(&ctx.config.listing);
    let page = ctx.playlists.list_for_user(&user_id, pagination).await?;
    Ok(ApiResponse::ok(page, "User playlists fetched successfully"))
}

async fn get_playlist(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthContext,
    Path(playlist_id): Path<String>,
) -> AppResult<ApiResponse<PlaylistDetails>> {
    let playlist = ctx
        .playlists
        .get(&playlist_id, viewer.account_id())
        .await?;
    Ok(ApiResponse::ok(playlist, "Playlist fetched successfully"))
}

async fn update_playlist(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(playlist_id): Path<String>,
    AppJson(req): AppJson<UpdatePlaylistRequest>,
) -> AppResult<ApiResponse<Playlist>> {
    let playlist = ctx
        .playlists
        .update(&auth.account, &playlist_id, req)
        .await?;
    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

async fn delete_playlist(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(playlist_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    ctx.playlists.delete(&auth.account, &playlist_id).await?;
    Ok(ApiResponse::ok(json!({}), "Playlist deleted successfully"))
}

async fn add_video(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((playlist_id, video_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<PlaylistDetails>> {
    let playlist = ctx
        .playlists
        .add_video(&auth.account, &playlist_id, &video_id)
        .await?;
    Ok(ApiResponse::ok(playlist, "Video added to playlist"))
}

async fn remove_video(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((playlist_id, video_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<PlaylistDetails>> {
    let playlist = ctx
        .playlists
        .remove_video(&auth.account, &playlist_id, &video_id)
        .await?;
    Ok(ApiResponse::ok(playlist, "Video removed from playlist"))
}
