use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A channel the user must join (or request to join) before the gate opens.
///
/// Static configuration, never persisted with user records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredChannel {
    /// Telegram chat id of the channel (negative for channels/supergroups).
    pub id: i64,
    /// Human-readable name shown on the subscription screen.
    pub title: String,
    /// Invite link the button opens.
    pub join_url: String,
}

/// Observed standing of a user in one required channel.
///
/// `Absent` is the implicit state of any channel with no stored entry; it is
/// never written to the store. Removing a channel's entry is how a standing
/// returns to `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Confirmed member (including owner/admin) at the last membership poll.
    Member,
    /// A join request was observed; sticky until a confirmed membership
    /// replaces it.
    Requested,
    /// No signal for this channel yet.
    Absent,
}

/// A stored per-channel observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStanding {
    pub status: ChannelStatus,
    /// When this status was last observed (unix ms).
    pub observed_at: i64,
}

/// Reference to the most recently rendered subscription prompt, kept so the
/// screen can be edited in place instead of re-sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptHandle {
    pub chat_id: i64,
    pub message_id: i32,
    /// When the prompt was sent (unix ms).
    pub at: i64,
}

/// Durable per-user record of the gate decision and channel standings.
///
/// Created with defaults on first contact and never deleted. `granted` is
/// only demoted by an explicit gate failure during a confirm re-check,
/// never by passive decay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRecord {
    /// Whether the user currently passes the gate.
    pub granted: bool,
    /// When access was last granted (unix ms).
    pub granted_at: Option<i64>,
    /// Per-channel standings, keyed by channel chat id.
    pub channels: HashMap<i64, ChannelStanding>,
    /// Last rendered subscription prompt, if any.
    pub last_prompt: Option<PromptHandle>,
}

impl AccessRecord {
    /// Three-valued standing for a channel; `Absent` when nothing is stored.
    #[must_use]
    pub fn status_of(&self, channel_id: i64) -> ChannelStatus {
        self.channels
            .get(&channel_id)
            .map_or(ChannelStatus::Absent, |s| s.status)
    }

    /// Record a join request for a channel. Overwrites any prior standing.
    pub fn mark_requested(&mut self, channel_id: i64, now: i64) {
        self.channels.insert(
            channel_id,
            ChannelStanding {
                status: ChannelStatus::Requested,
                observed_at: now,
            },
        );
    }

    /// Record a confirmed membership. Overwrites any prior standing.
    pub fn mark_member(&mut self, channel_id: i64, now: i64) {
        self.channels.insert(
            channel_id,
            ChannelStanding {
                status: ChannelStatus::Member,
                observed_at: now,
            },
        );
    }

    /// Clear a previously confirmed membership after a `NotMember` poll.
    ///
    /// A `Requested` standing is left untouched: join requests are sticky
    /// once observed, since the membership poll cannot see pending requests.
    pub fn clear_member(&mut self, channel_id: i64) {
        if self.status_of(channel_id) == ChannelStatus::Member {
            self.channels.remove(&channel_id);
        }
    }

    /// Open the gate. Idempotent; leaves channel standings intact.
    pub fn grant(&mut self, now: i64) {
        self.granted = true;
        self.granted_at = Some(now);
    }

    /// Close the gate after a failed re-check.
    pub fn revoke(&mut self) {
        self.granted = false;
    }

    pub fn set_prompt(&mut self, handle: PromptHandle) {
        self.last_prompt = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_locked_and_empty() {
        let r = AccessRecord::default();
        assert!(!r.granted);
        assert!(r.granted_at.is_none());
        assert!(r.channels.is_empty());
        assert!(r.last_prompt.is_none());
        assert_eq!(r.status_of(-100), ChannelStatus::Absent);
    }

    #[test]
    fn requested_is_sticky_across_not_member() {
        let mut r = AccessRecord::default();
        r.mark_requested(-100, 1);
        r.clear_member(-100);
        assert_eq!(r.status_of(-100), ChannelStatus::Requested);
    }

    #[test]
    fn clear_member_removes_confirmed_membership() {
        let mut r = AccessRecord::default();
        r.mark_member(-100, 1);
        r.clear_member(-100);
        assert_eq!(r.status_of(-100), ChannelStatus::Absent);
    }

    #[test]
    fn grant_twice_is_idempotent_and_keeps_standings() {
        let mut r = AccessRecord::default();
        r.mark_member(-100, 1);
        r.grant(2);
        r.grant(3);
        assert!(r.granted);
        assert_eq!(r.granted_at, Some(3));
        assert_eq!(r.status_of(-100), ChannelStatus::Member);
    }

    #[test]
    fn serde_roundtrip_keeps_channel_keys() {
        let mut r = AccessRecord::default();
        r.mark_requested(-1003566642594, 42);
        r.set_prompt(PromptHandle {
            chat_id: 7,
            message_id: 99,
            at: 43,
        });
        let json = serde_json::to_string(&r).unwrap();
        let back: AccessRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status_of(-1003566642594), ChannelStatus::Requested);
        assert_eq!(back.last_prompt, r.last_prompt);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let r: AccessRecord = serde_json::from_str("{}").unwrap();
        assert!(!r.granted);
        assert!(r.channels.is_empty());
    }
}
