//! ActivityPub federation
//!
//! Actor identity, activity construction, signed outbound delivery and
//! inbound inbox processing.

pub mod actor;
pub mod builder;
pub mod client;
pub mod delivery;
pub mod inbox;
pub mod signature;
pub mod types;

pub use builder::{ActivityBuilder, CheckinPlace};
pub use client::{FederationClient, Sender};
pub use delivery::DeliveryService;
pub use inbox::InboxProcessor;
pub use types::{Activity, ActivityObject, Person};
