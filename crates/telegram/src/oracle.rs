//! Membership Oracle: asks Telegram whether a user belongs to a channel and
//! normalizes the answer to a two-valued result.

use std::collections::HashMap;

use {
    async_trait::async_trait,
    teloxide::{
        Bot,
        prelude::Requester,
        types::{ChatId, ChatMemberKind, UserId},
    },
    tracing::warn,
};

use cinegate_access::RequiredChannel;

/// Normalized outcome of one membership query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipResult {
    Member,
    NotMember,
}

/// Queries the channel-membership provider.
///
/// Infallible by contract: a failed query is `NotMember` (fail-closed,
/// errors never grant access). Implementations log the failure.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn check_membership(&self, channel_id: i64, user_id: u64) -> MembershipResult;
}

/// One membership query per required channel, issued concurrently; returns
/// when all complete. Each query carries its own fail-closed fallback, so
/// total latency is bounded only by the transport's per-call timeout.
pub async fn sync_all(
    oracle: &dyn MembershipOracle,
    required: &[RequiredChannel],
    user_id: u64,
) -> HashMap<i64, MembershipResult> {
    let checks = required
        .iter()
        .map(|ch| async move { (ch.id, oracle.check_membership(ch.id, user_id).await) });
    futures::future::join_all(checks).await.into_iter().collect()
}

/// Oracle backed by the Bot API's `getChatMember`.
pub struct TelegramOracle {
    bot: Bot,
}

impl TelegramOracle {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipOracle for TelegramOracle {
    async fn check_membership(&self, channel_id: i64, user_id: u64) -> MembershipResult {
        match self
            .bot
            .get_chat_member(ChatId(channel_id), UserId(user_id))
            .await
        {
            Ok(member) => classify(&member.kind),
            Err(e) => {
                warn!(
                    channel_id,
                    user_id,
                    error = %e,
                    "membership query failed, treating as not-member"
                );
                MembershipResult::NotMember
            },
        }
    }
}

/// Map provider-native statuses to the two-valued result.
///
/// A restricted user still counts as a member only while Telegram reports
/// them as a participant.
fn classify(kind: &ChatMemberKind) -> MembershipResult {
    match kind {
        ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_) | ChatMemberKind::Member => {
            MembershipResult::Member
        },
        ChatMemberKind::Restricted(r) if r.is_member => MembershipResult::Member,
        ChatMemberKind::Restricted(_) | ChatMemberKind::Left | ChatMemberKind::Banned(_) => {
            MembershipResult::NotMember
        },
    }
}

#[cfg(test)]
mod tests {
    use teloxide::types::ChatMember;

    use crate::testing::FixedOracle;

    use super::*;

    // Build ChatMember values from Bot API payloads so the mapping is tested
    // against the wire shapes teloxide actually parses.
    fn member_from(status_fields: &str) -> ChatMember {
        let json = format!(
            r#"{{"user":{{"id":1,"is_bot":false,"first_name":"t"}},{status_fields}}}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    fn restricted(is_member: bool) -> ChatMember {
        member_from(&format!(
            r#""status":"restricted","is_member":{is_member},
               "can_send_messages":true,"can_send_audios":true,
               "can_send_documents":true,"can_send_photos":true,
               "can_send_videos":true,"can_send_video_notes":true,
               "can_send_voice_notes":true,"can_send_polls":true,
               "can_send_other_messages":true,"can_add_web_page_previews":true,
               "can_change_info":false,"can_invite_users":true,
               "can_pin_messages":false,"can_manage_topics":false,
               "until_date":0"#
        ))
    }

    #[test]
    fn member_owner_and_admin_count_as_member() {
        for m in [
            member_from(r#""status":"member""#),
            member_from(r#""status":"creator","is_anonymous":false"#),
            member_from(
                r#""status":"administrator","can_be_edited":false,"is_anonymous":false,
                   "can_manage_chat":true,"can_delete_messages":true,
                   "can_manage_video_chats":true,"can_restrict_members":true,
                   "can_promote_members":false,"can_change_info":true,
                   "can_invite_users":true"#,
            ),
        ] {
            assert_eq!(classify(&m.kind), MembershipResult::Member);
        }
    }

    #[test]
    fn restricted_counts_only_while_still_participant() {
        assert_eq!(classify(&restricted(true).kind), MembershipResult::Member);
        assert_eq!(
            classify(&restricted(false).kind),
            MembershipResult::NotMember
        );
    }

    #[test]
    fn left_and_banned_are_not_members() {
        assert_eq!(
            classify(&member_from(r#""status":"left""#).kind),
            MembershipResult::NotMember
        );
        assert_eq!(
            classify(&member_from(r#""status":"kicked","until_date":0"#).kind),
            MembershipResult::NotMember
        );
    }

    #[tokio::test]
    async fn sync_all_covers_every_required_channel() {
        let required = vec![
            RequiredChannel {
                id: -1,
                title: "a".into(),
                join_url: "https://t.me/+a".into(),
            },
            RequiredChannel {
                id: -2,
                title: "b".into(),
                join_url: "https://t.me/+b".into(),
            },
        ];
        let oracle = FixedOracle(HashMap::from([(-1, MembershipResult::Member)]));

        let results = sync_all(&oracle, &required, 7).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[&-1], MembershipResult::Member);
        assert_eq!(results[&-2], MembershipResult::NotMember);
    }
}
