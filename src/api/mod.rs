//! HTTP API handlers

pub mod activitypub;
pub mod metrics;
