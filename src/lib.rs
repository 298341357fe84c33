//! Waypost: a lightweight federated check-in server core.
//!
//! Local users get ActivityPub identities; remote actors can follow them and
//! receive their check-ins. The crate wires an axum HTTP surface over a
//! SQLite store and a federation layer for signed server-to-server traffic.

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod federation;
pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::data::Database;
use crate::error::AppError;
use crate::federation::{DeliveryService, FederationClient, InboxProcessor};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<Database>,
    pub inbox: Arc<InboxProcessor>,
    pub delivery: Arc<DeliveryService>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        let base_url = config.server.base_url();

        let db = Arc::new(Database::connect(&config.database.path).await?);
        let client = FederationClient::new(Duration::from_secs(
            config.federation.request_timeout_seconds,
        ))?;
        let inbox = Arc::new(InboxProcessor::new(db.clone(), client.clone(), &base_url));
        let delivery = Arc::new(DeliveryService::new(db.clone(), client, &base_url));

        Ok(Self {
            config: Arc::new(config),
            db,
            inbox,
            delivery,
        })
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(api::metrics::metrics_handler))
        .route("/users/:username", get(api::activitypub::get_actor))
        .route(
            "/users/:username/inbox",
            get(api::activitypub::get_inbox).post(api::activitypub::post_inbox),
        )
        .route(
            "/users/:username/followers",
            get(api::activitypub::get_followers),
        )
        .layer(axum::middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Record per-request counters using the matched route as the endpoint
/// label, so path parameters don't explode cardinality.
async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &endpoint, response.status().as_str()])
        .inc();

    response
}
