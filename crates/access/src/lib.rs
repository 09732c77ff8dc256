//! Subscription-gate domain model and durable access store.
//!
//! Tracks, per user, the observed standing in each required channel, the
//! gate decision derived from those standings, and the handle of the last
//! rendered subscription prompt so it can be edited in place.

pub mod error;
pub mod gate;
pub mod record;
pub mod repo;

pub use {
    error::{Error, Result},
    record::{AccessRecord, ChannelStanding, ChannelStatus, PromptHandle, RequiredChannel, now_ms},
    repo::{AccessRepository, JsonAccessRepository},
};
