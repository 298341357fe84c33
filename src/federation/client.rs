//! Outbound federation HTTP client
//!
//! Delivers signed activities to remote inboxes and fetches remote actor
//! profiles and collections.

use std::time::Duration;

use super::signature::sign_request;
use super::types::{Activity, Collection, Person};
use crate::error::AppError;
use crate::metrics::{
    ACTIVITIES_SENT_TOTAL, FEDERATION_REQUESTS_TOTAL, FEDERATION_REQUEST_DURATION_SECONDS,
};

/// MIME type for ActivityPub exchanges.
pub const ACTIVITY_CONTENT_TYPE: &str = "application/activity+json";

/// Identity on whose behalf an activity is delivered.
///
/// A sender without a private key delivers unsigned; some peers will reject
/// that, which surfaces as a normal delivery error.
#[derive(Debug, Clone, Copy)]
pub struct Sender<'a> {
    pub actor_id: &'a str,
    pub private_key_pem: Option<&'a str>,
}

/// HTTP client for federation traffic.
///
/// One shared `reqwest::Client` per process; the timeout set here bounds
/// every outbound request.
#[derive(Debug, Clone)]
pub struct FederationClient {
    http_client: reqwest::Client,
}

impl FederationClient {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            // A redirected delivery is a failed delivery; never follow.
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("waypost/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http_client })
    }

    /// POST an activity to a remote inbox.
    ///
    /// The body is the activity's canonical JSON. When the sender holds a
    /// private key the request carries a `Signature` over
    /// `(request-target)`, `host` and `date`. Only a 2xx response counts as
    /// delivered.
    pub async fn send_activity(
        &self,
        activity: &Activity,
        sender: &Sender<'_>,
        inbox_url: &str,
    ) -> Result<(), AppError> {
        let body = serde_json::to_vec(activity)
            .map_err(|e| AppError::Validation(format!("Cannot encode activity: {}", e)))?;

        let mut request = self
            .http_client
            .post(inbox_url)
            .header("Content-Type", ACTIVITY_CONTENT_TYPE)
            .header("Accept", ACTIVITY_CONTENT_TYPE);

        if let Some(private_key_pem) = sender.private_key_pem {
            let key_id = format!("{}#main-key", sender.actor_id);
            let signed = sign_request("POST", inbox_url, private_key_pem, &key_id)?;
            request = request
                .header("Date", &signed.date)
                .header("Signature", &signed.signature);
        }

        let timer = FEDERATION_REQUEST_DURATION_SECONDS
            .with_label_values(&["outbound"])
            .start_timer();
        let result = request.body(body).send().await;
        timer.observe_duration();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                FEDERATION_REQUESTS_TOTAL
                    .with_label_values(&["outbound", "error"])
                    .inc();
                return Err(AppError::RemoteDelivery(format!(
                    "Delivery to {} failed: {}",
                    inbox_url, e
                )));
            }
        };

        if !response.status().is_success() {
            FEDERATION_REQUESTS_TOTAL
                .with_label_values(&["outbound", "error"])
                .inc();
            return Err(AppError::RemoteDelivery(format!(
                "Delivery to {} rejected: HTTP {}",
                inbox_url,
                response.status()
            )));
        }

        FEDERATION_REQUESTS_TOTAL
            .with_label_values(&["outbound", "success"])
            .inc();
        ACTIVITIES_SENT_TOTAL
            .with_label_values(&[activity.activity_type.as_str()])
            .inc();
        tracing::debug!(
            activity_type = %activity.activity_type,
            inbox = inbox_url,
            "Delivered activity"
        );

        Ok(())
    }

    /// Fetch a remote actor profile.
    pub async fn fetch_actor(&self, actor_url: &str) -> Result<Person, AppError> {
        let response = self
            .http_client
            .get(actor_url)
            .header("Accept", ACTIVITY_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| {
                AppError::RemoteFetch(format!("Failed to fetch actor {}: {}", actor_url, e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::RemoteFetch(format!(
                "Failed to fetch actor {}: HTTP {}",
                actor_url,
                response.status()
            )));
        }

        let person: Person = response.json().await.map_err(|e| {
            AppError::RemoteFetch(format!("Undecodable actor document from {}: {}", actor_url, e))
        })?;

        Ok(person)
    }

    /// Fetch a followers/following collection as a list of actor URIs.
    ///
    /// Accepts both `items` and `orderedItems`; a document with neither is
    /// not a collection.
    pub async fn fetch_followers(&self, collection_url: &str) -> Result<Vec<String>, AppError> {
        let response = self
            .http_client
            .get(collection_url)
            .header("Accept", ACTIVITY_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| {
                AppError::RemoteFetch(format!(
                    "Failed to fetch collection {}: {}",
                    collection_url, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(AppError::RemoteFetch(format!(
                "Failed to fetch collection {}: HTTP {}",
                collection_url,
                response.status()
            )));
        }

        let collection: Collection = response.json().await.map_err(|e| {
            AppError::RemoteFetch(format!(
                "Undecodable collection from {}: {}",
                collection_url, e
            ))
        })?;

        collection
            .ordered_items
            .or(collection.items)
            .ok_or_else(|| {
                AppError::RemoteFetch(format!(
                    "Collection {} has neither items nor orderedItems",
                    collection_url
                ))
            })
    }
}
