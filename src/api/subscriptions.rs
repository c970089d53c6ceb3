/// Subscription toggle and projections
use crate::{
    api::ApiResponse,
    auth::AuthContext,
    context::AppContext,
    db::account::AccountSummary,
    error::AppResult,
    relationship::{EdgeKind, ToggleState},
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use serde::Serialize;

/// Build subscription routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/subscriptions/:channel_id", post(toggle_subscription))
        .route(
            "/subscriptions/:channel_id/subscribers",
            get(channel_subscribers),
        )
        .route(
            "/subscriptions/user/:subscriber_id/channels",
            get(subscribed_channels),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionToggled {
    pub state: ToggleState,
    pub is_subscribed: bool,
}

async fn toggle_subscription(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(channel_id): Path<String>,
) -> AppResult<ApiResponse<SubscriptionToggled>> {
    let state = ctx
        .relationships
        .toggle(auth.account_id(), EdgeKind::Subscription, &channel_id)
        .await?;
    let message = match state {
        ToggleState::Created => "Subscribed successfully",
        ToggleState::Removed => "Unsubscribed successfully",
    };
    Ok(ApiResponse::ok(
        SubscriptionToggled {
            state,
            is_subscribed: state.is_active(),
        },
        message,
    ))
}

async fn channel_subscribers(
    State(ctx): State<AppContext>,
    Path(channel_id): Path<String>,
) -> AppResult<ApiResponse<Vec<AccountSummary>>> {
    let subscribers = ctx.relationships.subscribers(&channel_id).await?;
    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

async fn subscribed_channels(
    State(ctx): State<AppContext>,
    Path(subscriber_id): Path<String>,
) -> AppResult<ApiResponse<Vec<AccountSummary>>> {
    let channels = ctx
        .relationships
        .subscribed_channels(&subscriber_id)
        .await?;
    Ok(ApiResponse::ok(
        channels,
        "Subscribed channels fetched successfully",
    ))
}
