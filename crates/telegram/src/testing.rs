//! In-memory fakes shared by unit tests in this crate.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicI32, Ordering},
    },
};

use async_trait::async_trait;

use cinegate_access::{AccessRecord, AccessRepository, RequiredChannel};

use crate::{
    error::{Error, Result},
    oracle::{MembershipOracle, MembershipResult},
    screen::{PromptTransport, ScreenModel},
};

pub(crate) fn required_channels(ids: &[i64]) -> Vec<RequiredChannel> {
    ids.iter()
        .map(|id| RequiredChannel {
            id: *id,
            title: format!("channel {id}"),
            join_url: "https://t.me/+invite".into(),
        })
        .collect()
}

#[derive(Default)]
pub(crate) struct MemoryRepo {
    table: tokio::sync::Mutex<HashMap<u64, AccessRecord>>,
}

#[async_trait]
impl AccessRepository for MemoryRepo {
    async fn get(&self, user_id: u64) -> cinegate_access::Result<AccessRecord> {
        Ok(self
            .table
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put(&self, user_id: u64, record: AccessRecord) -> cinegate_access::Result<()> {
        self.table.lock().await.insert(user_id, record);
        Ok(())
    }

    async fn has_access(&self, user_id: u64) -> cinegate_access::Result<bool> {
        Ok(self
            .table
            .lock()
            .await
            .get(&user_id)
            .is_some_and(|r| r.granted))
    }
}

pub(crate) struct FixedOracle(pub HashMap<i64, MembershipResult>);

#[async_trait]
impl MembershipOracle for FixedOracle {
    async fn check_membership(&self, channel_id: i64, _user_id: u64) -> MembershipResult {
        self.0
            .get(&channel_id)
            .copied()
            .unwrap_or(MembershipResult::NotMember)
    }
}

/// Records every send/edit; message ids count up from 1000.
pub(crate) struct RecordingTransport {
    pub sent: Mutex<Vec<(i64, ScreenModel)>>,
    pub edits: Mutex<Vec<(i64, i32, ScreenModel)>>,
    pub fail_edits: AtomicBool,
    next_id: AtomicI32,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            fail_edits: AtomicBool::new(false),
            next_id: AtomicI32::new(1000),
        }
    }
}

#[async_trait]
impl PromptTransport for RecordingTransport {
    async fn send_screen(&self, chat_id: i64, screen: &ScreenModel) -> Result<i32> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push((chat_id, screen.clone()));
        Ok(id)
    }

    async fn edit_screen(&self, chat_id: i64, message_id: i32, screen: &ScreenModel) -> Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(Error::message("edit rejected"));
        }
        self.edits
            .lock()
            .unwrap()
            .push((chat_id, message_id, screen.clone()));
        Ok(())
    }
}
