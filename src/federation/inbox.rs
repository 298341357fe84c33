//! Inbound activity processing
//!
//! Every inbound POST walks the same path: decode, validate, persist,
//! dispatch, mark processed. Persistence is the durability boundary; a
//! remote-side failure after it leaves the row unprocessed for the
//! reconciliation pass instead of bouncing the delivery.

use std::sync::Arc;

use chrono::Utc;

use super::builder::ActivityBuilder;
use super::client::{FederationClient, Sender};
use super::types::{Activity, TYPE_FOLLOW, TYPE_UNDO};
use crate::data::{Database, EntityId, Follower, StoredActivity, User};
use crate::error::AppError;
use crate::metrics::{ACTIVITIES_RECEIVED_TOTAL, FOLLOWERS_TOTAL, UNPROCESSED_ACTIVITIES};

/// Processes inbound activities for local users.
pub struct InboxProcessor {
    db: Arc<Database>,
    client: FederationClient,
    builder: ActivityBuilder,
}

impl InboxProcessor {
    pub fn new(db: Arc<Database>, client: FederationClient, base_url: &str) -> Self {
        Self {
            db,
            client,
            builder: ActivityBuilder::new(base_url),
        }
    }

    /// Handle a POST to a local user's inbox.
    ///
    /// Returns `Ok` once the activity is persisted, even when the follow-up
    /// side effects fail against the remote server; those rows stay
    /// unprocessed and are retried by [`InboxProcessor::process_pending`].
    ///
    /// # Errors
    /// - `AppError::Validation` for malformed or incomplete JSON (nothing
    ///   persisted)
    /// - `AppError::NotFound` for an unknown local user
    /// - `AppError::Database` when persistence itself fails
    pub async fn handle_inbox(&self, username: &str, raw_body: &[u8]) -> Result<(), AppError> {
        let activity: Activity = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::Validation(format!("Invalid activity JSON: {}", e)))?;

        if activity.id.is_empty() {
            return Err(AppError::Validation("Activity is missing id".to_string()));
        }
        if activity.activity_type.is_empty() {
            return Err(AppError::Validation("Activity is missing type".to_string()));
        }
        if activity.actor.is_empty() {
            return Err(AppError::Validation("Activity is missing actor".to_string()));
        }

        let user = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound)?;

        let stored = StoredActivity {
            id: EntityId::new().0,
            activity_id: activity.id.clone(),
            user_id: user.id.clone(),
            actor: activity.actor.clone(),
            activity_type: activity.activity_type.clone(),
            object_id: activity.object_id().to_string(),
            object_type: activity.object_type().to_string(),
            target: activity.target.clone(),
            raw_content: raw_body.to_vec(),
            processed: false,
            created_at: Utc::now(),
        };

        let inserted = self.db.save_activity(&stored).await?;
        ACTIVITIES_RECEIVED_TOTAL
            .with_label_values(&[activity.activity_type.as_str()])
            .inc();

        if !inserted {
            // Redelivery of an already-seen activity; side effects already
            // ran or are queued for reconciliation.
            tracing::debug!(activity_id = %activity.id, "Duplicate activity ignored");
            return Ok(());
        }

        match self.dispatch(&user, &activity).await {
            Ok(()) => {
                self.db.mark_activity_processed(&activity.id).await?;
            }
            Err(err) if err.is_remote() => {
                tracing::warn!(
                    activity_id = %activity.id,
                    activity_type = %activity.activity_type,
                    error = %err,
                    "Dispatch failed against remote server, left for reconciliation"
                );
            }
            Err(err) => return Err(err),
        }

        self.refresh_gauges().await;
        Ok(())
    }

    /// Re-dispatch activities whose side effects never completed.
    ///
    /// Returns the number of rows successfully processed this pass. Rows
    /// that fail against their remote server again stay queued.
    pub async fn process_pending(&self, limit: i64) -> Result<usize, AppError> {
        let pending = self.db.get_unprocessed_activities(limit).await?;
        let mut processed = 0;

        for row in pending {
            let activity: Activity = match serde_json::from_slice(&row.raw_content) {
                Ok(activity) => activity,
                Err(e) => {
                    // Rows are only written after a successful decode, so
                    // this is corruption; retrying forever would wedge the
                    // queue.
                    tracing::error!(
                        activity_id = %row.activity_id,
                        error = %e,
                        "Stored activity no longer decodes, marking processed"
                    );
                    self.db.mark_activity_processed(&row.activity_id).await?;
                    continue;
                }
            };

            let user = match self.db.get_user_by_id(&row.user_id).await? {
                Some(user) => user,
                None => {
                    tracing::warn!(
                        activity_id = %row.activity_id,
                        user_id = %row.user_id,
                        "Recipient user no longer exists, marking processed"
                    );
                    self.db.mark_activity_processed(&row.activity_id).await?;
                    continue;
                }
            };

            match self.dispatch(&user, &activity).await {
                Ok(()) => {
                    self.db.mark_activity_processed(&row.activity_id).await?;
                    processed += 1;
                }
                Err(err) if err.is_remote() => {
                    tracing::warn!(
                        activity_id = %row.activity_id,
                        error = %err,
                        "Reconciliation dispatch failed, will retry"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        self.refresh_gauges().await;
        Ok(processed)
    }

    /// Run the type-specific side effects for an activity.
    ///
    /// Unknown activity types (and Undo of anything but a Follow) are not
    /// errors; the activity is simply recorded.
    async fn dispatch(&self, user: &User, activity: &Activity) -> Result<(), AppError> {
        match activity.activity_type.as_str() {
            TYPE_FOLLOW => self.handle_follow(user, activity).await,
            TYPE_UNDO if activity.object_type() == TYPE_FOLLOW => {
                self.handle_undo_follow(user, activity).await
            }
            other => {
                tracing::debug!(
                    activity_type = other,
                    activity_id = %activity.id,
                    "No side effect for activity type"
                );
                Ok(())
            }
        }
    }

    /// Follow: record the edge and send back an Accept.
    ///
    /// The follower's profile is fetched to resolve its inbox. The edge is
    /// inserted before the Accept goes out; a failed Accept re-runs through
    /// reconciliation, where the conflict-ignored insert makes the retry
    /// safe.
    async fn handle_follow(&self, user: &User, activity: &Activity) -> Result<(), AppError> {
        let follower_actor_id = activity.actor.as_str();
        let profile = self.client.fetch_actor(follower_actor_id).await?;

        if profile.inbox.is_empty() {
            return Err(AppError::RemoteFetch(format!(
                "Actor document for {} has no inbox",
                follower_actor_id
            )));
        }

        self.db
            .add_follower(&Follower {
                id: EntityId::new().0,
                user_id: user.id.clone(),
                follower_actor_id: follower_actor_id.to_string(),
                follower_inbox: profile.inbox.clone(),
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            username = %user.username,
            follower = follower_actor_id,
            "Recorded new follower"
        );

        let accept = self.builder.accept(&user.actor_id, activity)?;
        let private_key_pem = self.db.get_private_key_pem(&user.id).await?;
        let sender = Sender {
            actor_id: &user.actor_id,
            private_key_pem: private_key_pem.as_deref(),
        };

        self.client
            .send_activity(&accept, &sender, &profile.inbox)
            .await
    }

    /// Undo(Follow): drop the matching edge. Absent edges are fine.
    async fn handle_undo_follow(&self, user: &User, activity: &Activity) -> Result<(), AppError> {
        self.db.remove_follower(&user.id, &activity.actor).await?;
        tracing::info!(
            username = %user.username,
            follower = %activity.actor,
            "Removed follower"
        );
        Ok(())
    }

    async fn refresh_gauges(&self) {
        if let Ok(count) = self.db.count_followers().await {
            FOLLOWERS_TOTAL.set(count);
        }
        if let Ok(count) = self.db.count_unprocessed_activities().await {
            UNPROCESSED_ACTIVITIES.set(count);
        }
    }
}
