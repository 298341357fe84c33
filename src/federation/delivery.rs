//! Outbound fan-out
//!
//! Publishes a user's activities to every recorded follower inbox.

use std::sync::Arc;

use super::builder::{ActivityBuilder, CheckinPlace};
use super::client::{FederationClient, Sender};
use super::types::Activity;
use crate::data::{Database, User};
use crate::error::AppError;

/// Delivers locally authored activities to follower inboxes.
pub struct DeliveryService {
    db: Arc<Database>,
    client: FederationClient,
    builder: ActivityBuilder,
}

impl DeliveryService {
    pub fn new(db: Arc<Database>, client: FederationClient, base_url: &str) -> Self {
        Self {
            db,
            client,
            builder: ActivityBuilder::new(base_url),
        }
    }

    /// Publish a check-in to all of the user's followers.
    ///
    /// Deliveries run inbox by inbox; a follower whose server is down is
    /// skipped, the rest still get the activity. Returns the published
    /// envelope.
    pub async fn publish_checkin(
        &self,
        user: &User,
        content: &str,
        place: Option<&CheckinPlace>,
    ) -> Result<Activity, AppError> {
        let activity = self.builder.create_checkin(&user.actor_id, content, place);

        let private_key_pem = self.db.get_private_key_pem(&user.id).await?;
        let sender = Sender {
            actor_id: &user.actor_id,
            private_key_pem: private_key_pem.as_deref(),
        };

        let inboxes = self.db.get_follower_inboxes(&user.id).await?;
        let mut failed = 0usize;

        for inbox in &inboxes {
            match self.client.send_activity(&activity, &sender, inbox).await {
                Ok(()) => {}
                Err(err) if err.is_remote() => {
                    failed += 1;
                    tracing::warn!(inbox, error = %err, "Check-in delivery failed");
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            username = %user.username,
            delivered = inboxes.len() - failed,
            failed,
            "Published check-in"
        );

        Ok(activity)
    }
}
