//! Data layer
//!
//! SQLite persistence for users, stored activities and follower edges.

mod database;
mod models;

pub use database::Database;
pub use models::{EntityId, Follower, StoredActivity, User};
