//! SQLite database operations
//!
//! All database access goes through this module.

use std::path::Path;

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};

use super::models::{Follower, StoredActivity, User};
use crate::error::AppError;

const USER_COLUMNS: &str =
    "id, username, display_name, avatar_url, actor_id, public_key_pem, created_at, updated_at";

const ACTIVITY_COLUMNS: &str = "id, activity_id, user_id, actor, type, object_id, object_type, \
     target, raw_content, processed, created_at";

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to the SQLite database.
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user together with its private key material.
    ///
    /// The private key is write-only here; it can be read back only through
    /// [`Database::get_private_key_pem`].
    pub async fn insert_user(&self, user: &User, private_key_pem: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (id, username, display_name, avatar_url, actor_id, \
             private_key_pem, public_key_pem, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(&user.actor_id)
        .bind(private_key_pem)
        .bind(&user.public_key_pem)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_actor_id(&self, actor_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE actor_id = ?",
            USER_COLUMNS
        ))
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Fetch a user's private key PEM.
    ///
    /// Dedicated access path for signing code. Returns `None` when the user
    /// doesn't exist or holds no key (unsigned delivery is permitted).
    pub async fn get_private_key_pem(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let pem = sqlx::query_scalar::<_, String>(
            "SELECT private_key_pem FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pem.filter(|pem| !pem.is_empty()))
    }

    /// Replace a user's key pair.
    ///
    /// Used when keys are regenerated on profile update; the old key is
    /// invalidated by the overwrite.
    pub async fn update_user_keys(
        &self,
        user_id: &str,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET private_key_pem = ?, public_key_pem = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(private_key_pem)
        .bind(public_key_pem)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Stored activities
    // =========================================================================

    /// Persist an inbound activity with `processed = false`.
    ///
    /// Returns `false` when a row with the same `activity_id` already exists;
    /// duplicate deliveries are a no-op, not an error.
    pub async fn save_activity(&self, activity: &StoredActivity) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO activities (id, activity_id, user_id, actor, type, object_id, \
             object_type, target, raw_content, processed, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?) \
             ON CONFLICT (activity_id) DO NOTHING",
        )
        .bind(&activity.id)
        .bind(&activity.activity_id)
        .bind(&activity.user_id)
        .bind(&activity.actor)
        .bind(&activity.activity_type)
        .bind(&activity.object_id)
        .bind(&activity.object_type)
        .bind(&activity.target)
        .bind(&activity.raw_content)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_activity(&self, activity_id: &str) -> Result<Option<StoredActivity>, AppError> {
        let activity = sqlx::query_as::<_, StoredActivity>(&format!(
            "SELECT {} FROM activities WHERE activity_id = ?",
            ACTIVITY_COLUMNS
        ))
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(activity)
    }

    /// Everything delivered to a user's inbox, newest first.
    pub async fn get_inbox_activities(
        &self,
        user_id: &str,
    ) -> Result<Vec<StoredActivity>, AppError> {
        let activities = sqlx::query_as::<_, StoredActivity>(&format!(
            "SELECT {} FROM activities WHERE user_id = ? ORDER BY created_at DESC",
            ACTIVITY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }

    /// Fetch stored activities still awaiting dispatch, oldest first.
    pub async fn get_unprocessed_activities(
        &self,
        limit: i64,
    ) -> Result<Vec<StoredActivity>, AppError> {
        let activities = sqlx::query_as::<_, StoredActivity>(&format!(
            "SELECT {} FROM activities WHERE processed = 0 ORDER BY created_at ASC LIMIT ?",
            ACTIVITY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }

    /// Mark an activity as processed.
    ///
    /// One-way transition; nothing ever resets the flag.
    pub async fn mark_activity_processed(&self, activity_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE activities SET processed = 1 WHERE activity_id = ?")
            .bind(activity_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn count_unprocessed_activities(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM activities WHERE processed = 0",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Followers
    // =========================================================================

    /// Insert a follower edge.
    ///
    /// Conflict-safe: a duplicate (user_id, follower_actor_id) pair is
    /// ignored so concurrent duplicate Follows cannot fail.
    pub async fn add_follower(&self, follower: &Follower) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO followers (id, user_id, follower_actor_id, follower_inbox, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (user_id, follower_actor_id) DO NOTHING",
        )
        .bind(&follower.id)
        .bind(&follower.user_id)
        .bind(&follower.follower_actor_id)
        .bind(&follower.follower_inbox)
        .bind(follower.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a follower edge. Removing a non-existent edge is a no-op.
    pub async fn remove_follower(
        &self,
        user_id: &str,
        follower_actor_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM followers WHERE user_id = ? AND follower_actor_id = ?")
            .bind(user_id)
            .bind(follower_actor_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Inbox URIs of everyone following this user, for outbound fan-out.
    pub async fn get_follower_inboxes(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let inboxes = sqlx::query_scalar::<_, String>(
            "SELECT follower_inbox FROM followers WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(inboxes)
    }

    /// Actor URIs of everyone following this user, for the followers collection.
    pub async fn get_follower_actor_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let actor_ids = sqlx::query_scalar::<_, String>(
            "SELECT follower_actor_id FROM followers WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(actor_ids)
    }

    pub async fn count_followers(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM followers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
