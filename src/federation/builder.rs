//! Activity envelope construction
//!
//! Pure constructors for the outbound activity types. Each mints a fresh
//! activity ID under the local namespace and stamps the JSON-LD context and
//! a `published` timestamp; callers decide where the envelope goes.

use chrono::Utc;

use super::types::{
    default_context, Activity, ActivityObject, PUBLIC_COLLECTION, TYPE_ACCEPT, TYPE_CREATE,
    TYPE_FOLLOW, TYPE_NOTE, TYPE_PLACE, TYPE_UNDO,
};
use crate::data::EntityId;
use crate::error::AppError;

/// A check-in location embedded in a Note.
#[derive(Debug, Clone)]
pub struct CheckinPlace {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Builds activity envelopes under one instance's URI namespace.
#[derive(Debug, Clone)]
pub struct ActivityBuilder {
    base_url: String,
}

impl ActivityBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn new_activity_id(&self) -> String {
        format!("{}/activities/{}", self.base_url, EntityId::new().0)
    }

    fn envelope(&self, activity_type: &str, actor: &str, object: ActivityObject) -> Activity {
        Activity {
            context: Some(default_context()),
            id: self.new_activity_id(),
            activity_type: activity_type.to_string(),
            actor: actor.to_string(),
            object: Some(object),
            target: String::new(),
            published: Some(Utc::now()),
            to: Vec::new(),
            cc: Vec::new(),
        }
    }

    /// Create activity wrapping a check-in Note.
    ///
    /// The Note embeds a Place when a location is given. Addressed to the
    /// public collection and carbon-copied to the actor's followers.
    pub fn create_checkin(
        &self,
        actor_id: &str,
        content: &str,
        place: Option<&CheckinPlace>,
    ) -> Activity {
        let published = Utc::now();
        let mut note = serde_json::json!({
            "id": format!("{}/notes/{}", self.base_url, EntityId::new().0),
            "type": TYPE_NOTE,
            "attributedTo": actor_id,
            "content": content,
            "published": published,
            "to": [PUBLIC_COLLECTION],
            "cc": [format!("{}/followers", actor_id)],
        });

        if let Some(place) = place {
            note["location"] = serde_json::json!({
                "type": TYPE_PLACE,
                "name": place.name,
                "latitude": place.latitude,
                "longitude": place.longitude,
            });
        }

        let mut activity = self.envelope(TYPE_CREATE, actor_id, ActivityObject::Embedded(note));
        activity.published = Some(published);
        activity.to = vec![PUBLIC_COLLECTION.to_string()];
        activity.cc = vec![format!("{}/followers", actor_id)];
        activity
    }

    /// Follow a remote actor. The object is a bare reference URI.
    pub fn follow(&self, actor_id: &str, target_actor_id: &str) -> Activity {
        let mut activity = self.envelope(
            TYPE_FOLLOW,
            actor_id,
            ActivityObject::Reference(target_actor_id.to_string()),
        );
        activity.to = vec![target_actor_id.to_string()];
        activity
    }

    /// Accept an inbound Follow.
    ///
    /// The object embeds the original Follow so the remote server can match
    /// the acceptance to its request:
    /// `{id, type: "Follow", actor: <follower>, object: <local actor>}`.
    ///
    /// # Errors
    /// `AppError::Validation` when the given activity is not a Follow.
    pub fn accept(&self, actor_id: &str, follow: &Activity) -> Result<Activity, AppError> {
        if follow.activity_type != TYPE_FOLLOW {
            return Err(AppError::Validation(format!(
                "Cannot accept activity of type: {}",
                follow.activity_type
            )));
        }

        let embedded = serde_json::json!({
            "id": follow.id,
            "type": TYPE_FOLLOW,
            "actor": follow.actor,
            "object": actor_id,
        });

        let mut activity = self.envelope(TYPE_ACCEPT, actor_id, ActivityObject::Embedded(embedded));
        activity.to = vec![follow.actor.clone()];
        Ok(activity)
    }

    /// Undo a previously sent activity. The object embeds the full original
    /// document, bare references would leave the remote side guessing.
    pub fn undo(&self, actor_id: &str, original: &Activity) -> Result<Activity, AppError> {
        let embedded = serde_json::to_value(original)
            .map_err(|e| AppError::Validation(format!("Cannot embed activity: {}", e)))?;

        let mut activity = self.envelope(TYPE_UNDO, actor_id, ActivityObject::Embedded(embedded));
        activity.to = original.to.clone();
        Ok(activity)
    }
}
