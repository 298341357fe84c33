//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User (local actor)
// =============================================================================

/// A local user with a federated identity
///
/// The RSA key pair is generated once at registration. The private key is
/// deliberately not part of this struct; it has its own access path on
/// [`super::Database`] so profile rendering code never touches it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// ActivityPub actor URI (globally unique per host + username)
    pub actor_id: String,
    /// RSA public key (PEM format), empty until keys are generated
    pub public_key_pem: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stored activities
// =============================================================================

/// Persisted copy of an inbound activity
///
/// Append-only: rows are created on every inbound POST and never deleted or
/// edited. `activity_id` is unique and acts as the idempotency key.
/// `processed` transitions false to true exactly once.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredActivity {
    pub id: String,
    /// Wire-level activity ID (URI)
    pub activity_id: String,
    /// Local user whose inbox received the activity
    pub user_id: String,
    /// Actor URI
    pub actor: String,
    /// Activity type (Follow, Undo, ...)
    #[sqlx(rename = "type")]
    pub activity_type: String,
    /// Extracted object reference, empty when absent
    pub object_id: String,
    /// Extracted object type, empty when the object is a bare reference
    pub object_type: String,
    pub target: String,
    /// Raw JSON payload as received
    pub raw_content: Vec<u8>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Follower edges
// =============================================================================

/// A remote actor following a local user
///
/// Unique per (user_id, follower_actor_id). The inbox URI is stored for
/// outbound delivery fan-out.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follower {
    pub id: String,
    /// Local user being followed
    pub user_id: String,
    /// Remote follower actor URI
    pub follower_actor_id: String,
    /// Remote follower's inbox URI for delivery
    pub follower_inbox: String,
    pub created_at: DateTime<Utc>,
}
