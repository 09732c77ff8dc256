//! The gate predicate: does a user's set of channel standings satisfy the
//! subscription requirement?

use std::collections::HashMap;

use crate::record::{ChannelStanding, ChannelStatus, RequiredChannel};

/// True iff every required channel is satisfied.
///
/// A channel counts as satisfied when its stored standing is `Member` or
/// `Requested`: a pending join request is accepted as provisional
/// satisfaction, because the bot cannot distinguish "requested and will be
/// approved" from "requested and stuck" and trusts the request signal.
///
/// Vacuously true for an empty required list. Standings for channels no
/// longer in the required list are ignored but not purged.
///
/// This is the sole predicate used both for rendering checkmarks and for
/// granting or revoking access.
#[must_use]
pub fn is_satisfied(channels: &HashMap<i64, ChannelStanding>, required: &[RequiredChannel]) -> bool {
    required.iter().all(|ch| {
        channel_satisfied(
            channels
                .get(&ch.id)
                .map_or(ChannelStatus::Absent, |s| s.status),
        )
    })
}

/// Whether a single channel's standing counts toward the gate. Shared by
/// the evaluator and the screen renderer's checkmarks.
#[must_use]
pub fn channel_satisfied(status: ChannelStatus) -> bool {
    match status {
        ChannelStatus::Member | ChannelStatus::Requested => true,
        ChannelStatus::Absent => false,
    }
}
