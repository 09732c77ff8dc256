//! Event Reconciler: bridges join-request events and explicit confirm
//! actions into access-store mutations.
//!
//! A join request only records a `Requested` standing and refreshes the
//! prompt; it never opens the gate by itself. Only a confirm action runs
//! the membership sync, evaluates the gate, and commits grant or revoke.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cinegate_access::{AccessRepository, RequiredChannel, gate, now_ms};

use crate::{
    error::Result,
    oracle::{self, MembershipOracle, MembershipResult},
    screen::SubscriptionScreen,
};

/// Outcome of a confirm action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The gate is satisfied; access is granted.
    Granted,
    /// At least one required channel is unsatisfied; access revoked and the
    /// screen re-rendered.
    Denied,
}

pub struct Reconciler {
    repo: Arc<dyn AccessRepository>,
    oracle: Arc<dyn MembershipOracle>,
    screen: Arc<SubscriptionScreen>,
    required: Arc<[RequiredChannel]>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        repo: Arc<dyn AccessRepository>,
        oracle: Arc<dyn MembershipOracle>,
        screen: Arc<SubscriptionScreen>,
        required: Arc<[RequiredChannel]>,
    ) -> Self {
        Self {
            repo,
            oracle,
            screen,
            required,
        }
    }

    fn is_tracked(&self, channel_id: i64) -> bool {
        self.required.iter().any(|ch| ch.id == channel_id)
    }

    /// Handle a join-request event for a channel.
    ///
    /// Never fails the caller: store and render problems are logged and
    /// swallowed so the event source is always acknowledged.
    pub async fn on_join_request(&self, user_id: u64, channel_id: i64) {
        if !self.is_tracked(channel_id) {
            debug!(user_id, channel_id, "join request for untracked channel, ignoring");
            return;
        }

        let mut record = match self.repo.get(user_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(user_id, error = %e, "failed to load record for join request");
                return;
            },
        };
        record.mark_requested(channel_id, now_ms());
        let prompt = record.last_prompt;
        if let Err(e) = self.repo.put(user_id, record).await {
            warn!(user_id, error = %e, "failed to store join request");
            return;
        }
        info!(user_id, channel_id, "join request recorded");

        // Refresh the prompt so the channel row gains its checkmark. No
        // prompt tracked means nothing to update.
        if let Some(handle) = prompt
            && let Err(e) = self.screen.show(user_id, handle.chat_id).await
        {
            warn!(user_id, error = %e, "failed to refresh prompt after join request");
        }
    }

    /// Handle an explicit confirm action from the subscription screen.
    ///
    /// Polls every required channel, merges the results into the stored
    /// standings, evaluates the gate, and commits the decision. `chat_id`
    /// and `message_id` point at the confirm button's own message so a
    /// denial can re-render exactly there.
    pub async fn on_confirm(
        &self,
        user_id: u64,
        chat_id: i64,
        message_id: i32,
    ) -> Result<ConfirmOutcome> {
        let results = oracle::sync_all(self.oracle.as_ref(), &self.required, user_id).await;

        let mut record = self.repo.get(user_id).await?;
        merge_results(&mut record, &self.required, &results);

        if gate::is_satisfied(&record.channels, &self.required) {
            record.grant(now_ms());
            self.repo.put(user_id, record).await?;
            info!(user_id, "gate satisfied, access granted");
            Ok(ConfirmOutcome::Granted)
        } else {
            record.revoke();
            self.repo.put(user_id, record).await?;
            info!(user_id, "gate not satisfied, access revoked");
            self.screen.show_at(user_id, chat_id, message_id).await?;
            Ok(ConfirmOutcome::Denied)
        }
    }

    /// Poll memberships and merge the results without touching the gate
    /// decision (used on `/start` as a best-effort refresh).
    pub async fn refresh_memberships(&self, user_id: u64) -> Result<()> {
        let results = oracle::sync_all(self.oracle.as_ref(), &self.required, user_id).await;
        let mut record = self.repo.get(user_id).await?;
        merge_results(&mut record, &self.required, &results);
        self.repo.put(user_id, record).await?;
        Ok(())
    }
}

/// Merge poll results into stored standings: a `Member` result overwrites
/// any prior standing; `NotMember` clears a confirmed membership but leaves
/// a `Requested` standing untouched.
fn merge_results(
    record: &mut cinegate_access::AccessRecord,
    required: &[RequiredChannel],
    results: &std::collections::HashMap<i64, MembershipResult>,
) {
    let now = now_ms();
    for ch in required {
        match results.get(&ch.id) {
            Some(MembershipResult::Member) => record.mark_member(ch.id, now),
            Some(MembershipResult::NotMember) | None => record.clear_member(ch.id),
        }
    }
}
