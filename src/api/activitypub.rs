//! ActivityPub HTTP surface
//!
//! Actor documents, inbox ingestion and the followers collection.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppError;
use crate::federation::actor::build_actor_document;
use crate::federation::client::ACTIVITY_CONTENT_TYPE;
use crate::federation::types::ACTIVITYSTREAMS_CONTEXT;
use crate::AppState;

/// GET /users/:username
///
/// The user's actor document, served with the ActivityPub media type.
pub async fn get_actor(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let person = build_actor_document(&user);

    Ok((
        [(header::CONTENT_TYPE, ACTIVITY_CONTENT_TYPE)],
        Json(person),
    ))
}

/// POST /users/:username/inbox
///
/// Accepts an inbound activity. Responds 202 once the activity is
/// persisted; remote-side dispatch failures are reconciled later and do not
/// bounce the delivery.
pub async fn post_inbox(
    State(state): State<AppState>,
    Path(username): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    state.inbox.handle_inbox(&username, &body).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /users/:username/inbox
///
/// Activities delivered to the user, newest first, replayed from the
/// stored raw payloads.
pub async fn get_inbox(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let stored = state.db.get_inbox_activities(&user.id).await?;
    let items: Vec<serde_json::Value> = stored
        .iter()
        .filter_map(|row| serde_json::from_slice(&row.raw_content).ok())
        .collect();

    let collection = serde_json::json!({
        "@context": ACTIVITYSTREAMS_CONTEXT,
        "id": format!("{}/inbox", user.actor_id),
        "type": "OrderedCollection",
        "totalItems": items.len(),
        "orderedItems": items,
    });

    Ok((
        [(header::CONTENT_TYPE, ACTIVITY_CONTENT_TYPE)],
        Json(collection),
    ))
}

/// GET /users/:username/followers
///
/// The user's followers as a single-page OrderedCollection.
pub async fn get_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let followers = state.db.get_follower_actor_ids(&user.id).await?;

    let collection = serde_json::json!({
        "@context": ACTIVITYSTREAMS_CONTEXT,
        "id": format!("{}/followers", user.actor_id),
        "type": "OrderedCollection",
        "totalItems": followers.len(),
        "orderedItems": followers,
    });

    Ok((
        [(header::CONTENT_TYPE, ACTIVITY_CONTENT_TYPE)],
        Json(collection),
    ))
}
