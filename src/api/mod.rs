/// API routes and handlers
pub mod auth;
pub mod comments;
pub mod dashboard;
pub mod health;
pub mod likes;
pub mod middleware;
pub mod playlists;
pub mod response;
pub mod subscriptions;
pub mod tweets;
pub mod videos;

pub use response::ApiResponse;

use crate::{context::AppContext, error::AppError};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json, Router,
};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(videos::routes())
        .merge(comments::routes())
        .merge(tweets::routes())
        .merge(playlists::routes())
        .merge(likes::routes())
        .merge(subscriptions::routes())
        .merge(dashboard::routes())
}

/// JSON body extractor whose rejection renders as the error envelope
#[derive(Debug, Clone)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(AppJson(value))
    }
}
