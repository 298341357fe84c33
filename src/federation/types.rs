//! ActivityPub wire types
//!
//! Serde representations of the JSON documents exchanged with remote
//! servers: activity envelopes, actor profiles and the objects they embed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-LD context for outgoing documents.
pub const ACTIVITYSTREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

/// Security context carrying the publicKey vocabulary.
pub const SECURITY_CONTEXT: &str = "https://w3id.org/security/v1";

/// Public addressing collection.
pub const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

pub const TYPE_CREATE: &str = "Create";
pub const TYPE_FOLLOW: &str = "Follow";
pub const TYPE_ACCEPT: &str = "Accept";
pub const TYPE_UNDO: &str = "Undo";
pub const TYPE_PERSON: &str = "Person";
pub const TYPE_NOTE: &str = "Note";
pub const TYPE_PLACE: &str = "Place";

/// Context list attached to every outgoing envelope and actor document.
pub fn default_context() -> Value {
    serde_json::json!([
        ACTIVITYSTREAMS_CONTEXT,
        SECURITY_CONTEXT,
        {
            "manuallyApprovesFollowers": "as:manuallyApprovesFollowers",
        }
    ])
}

/// An activity envelope.
///
/// Both inbound and outbound activities use this shape. Fields absent on the
/// wire decode to their defaults; empty fields are skipped when encoding so
/// outgoing JSON carries no noise keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub actor: String,
    /// Absent objects are tolerated on inbound activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ActivityObject>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
}

impl Activity {
    /// Object URI, empty when the activity has no object.
    pub fn object_id(&self) -> &str {
        self.object.as_ref().map(ActivityObject::id).unwrap_or("")
    }

    /// Embedded object's type, empty for bare references or no object.
    pub fn object_type(&self) -> &str {
        self.object
            .as_ref()
            .map(ActivityObject::object_type)
            .unwrap_or("")
    }
}

/// The polymorphic `object` field of an activity.
///
/// The wire format allows either a bare URI string or a full embedded
/// document. The variant is decided at decode time by the JSON node kind;
/// consumers match on it instead of probing a dynamic value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityObject {
    /// Bare URI reference, e.g. a Follow's target actor.
    Reference(String),
    /// Embedded document, e.g. a Note or the Follow inside an Accept/Undo.
    Embedded(Value),
}

impl ActivityObject {
    /// Object URI: the string itself, or the embedded document's `id`.
    pub fn id(&self) -> &str {
        match self {
            ActivityObject::Reference(uri) => uri,
            ActivityObject::Embedded(doc) => {
                doc.get("id").and_then(Value::as_str).unwrap_or("")
            }
        }
    }

    /// Embedded document's `type`; empty for bare references.
    pub fn object_type(&self) -> &str {
        match self {
            ActivityObject::Reference(_) => "",
            ActivityObject::Embedded(doc) => {
                doc.get("type").and_then(Value::as_str).unwrap_or("")
            }
        }
    }
}

/// An actor profile document (local or remote).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "preferredUsername", default, skip_serializing_if = "String::is_empty")]
    pub preferred_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub inbox: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub outbox: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub following: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub followers: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub liked: String,
    #[serde(rename = "publicKey", default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Image>,
}

/// RSA public key block inside an actor document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKey {
    pub id: String,
    pub owner: String,
    #[serde(rename = "publicKeyPem")]
    pub public_key_pem: String,
}

/// Actor avatar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "mediaType", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub url: String,
}

/// A followers/following collection page as fetched from a remote server.
///
/// Servers disagree on `items` vs `orderedItems`; both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub items: Option<Vec<String>>,
    #[serde(rename = "orderedItems", default)]
    pub ordered_items: Option<Vec<String>>,
}
