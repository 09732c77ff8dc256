use std::{collections::HashMap, sync::Mutex};

use {teloxide::Bot, tokio_util::sync::CancellationToken};

use {cinegate_access::AccessRepository, cinegate_media::MediaCatalog};

use std::sync::Arc;

use crate::{config::BotConfig, reconciler::Reconciler, screen::SubscriptionScreen};

/// Runtime state shared by every update handler.
pub struct BotState {
    pub bot: Bot,
    pub config: BotConfig,
    /// Bot username (without `@`) for delivery captions.
    pub bot_username: Option<String>,
    pub repo: Arc<dyn AccessRepository>,
    pub catalog: Arc<dyn MediaCatalog>,
    pub screen: Arc<SubscriptionScreen>,
    pub reconciler: Reconciler,
    pub cancel: CancellationToken,
    /// Chat id → content code armed by `/add`, waiting for the admin's next
    /// upload (std::sync::Mutex because all operations are synchronous map
    /// lookups, never held across `.await` points).
    pub pending_uploads: Mutex<HashMap<i64, String>>,
}
