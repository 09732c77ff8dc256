//! Subscription screen: one row per required channel with a satisfied
//! marker, plus a confirm action.
//!
//! `show` keeps at most one live prompt per user: it edits the last
//! rendered prompt in place and only sends a fresh message (recording the
//! new handle) when the edit fails, so a stale prompt self-heals.

use std::sync::Arc;

use {
    async_trait::async_trait,
    teloxide::{
        ApiError, Bot, RequestError,
        payloads::{EditMessageTextSetters, SendMessageSetters},
        prelude::Requester,
        types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId},
    },
    tracing::debug,
};

use cinegate_access::{
    AccessRecord, AccessRepository, PromptHandle, RequiredChannel, gate, now_ms,
};

use crate::error::{Error, Result};

/// Callback payload carried by the confirm button.
pub const CONFIRM_CALLBACK: &str = "check_sub";

/// Text shown above the channel buttons while the gate is closed.
const LOCKED_TEXT: &str = "❌ Join the channels below before using the bot.";

/// One required channel as rendered on the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenRow {
    pub title: String,
    pub join_url: String,
    pub satisfied: bool,
}

/// UI state of the subscription prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenModel {
    pub text: String,
    pub rows: Vec<ScreenRow>,
}

impl ScreenModel {
    /// True when every row carries a checkmark.
    #[must_use]
    pub fn complete(&self) -> bool {
        self.rows.iter().all(|r| r.satisfied)
    }
}

/// Build the screen for a user's current record.
#[must_use]
pub fn render(record: &AccessRecord, required: &[RequiredChannel]) -> ScreenModel {
    let rows = required
        .iter()
        .map(|ch| ScreenRow {
            title: ch.title.clone(),
            join_url: ch.join_url.clone(),
            satisfied: gate::channel_satisfied(record.status_of(ch.id)),
        })
        .collect();
    ScreenModel {
        text: LOCKED_TEXT.to_string(),
        rows,
    }
}

/// Delivery seam for the rendered screen, so the edit-or-resend logic can
/// be driven without a live Bot API connection.
#[async_trait]
pub trait PromptTransport: Send + Sync {
    /// Send the screen as a new message; returns the new message id.
    async fn send_screen(&self, chat_id: i64, screen: &ScreenModel) -> Result<i32>;

    /// Update a previously sent screen in place.
    async fn edit_screen(&self, chat_id: i64, message_id: i32, screen: &ScreenModel) -> Result<()>;
}

/// `PromptTransport` over the Bot API with an inline keyboard.
pub struct TelegramPrompter {
    bot: Bot,
}

impl TelegramPrompter {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn keyboard(screen: &ScreenModel) -> Result<InlineKeyboardMarkup> {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for row in &screen.rows {
        let icon = if row.satisfied { "✅" } else { "❌" };
        let url: reqwest::Url = row
            .join_url
            .parse()
            .map_err(|e| Error::message(format!("invalid join url {}: {e}", row.join_url)))?;
        rows.push(vec![InlineKeyboardButton::url(
            format!("{icon} {}", row.title),
            url,
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "✅ Confirm",
        CONFIRM_CALLBACK,
    )]);
    Ok(InlineKeyboardMarkup::new(rows))
}

fn is_message_not_modified(e: &RequestError) -> bool {
    matches!(e, RequestError::Api(ApiError::MessageNotModified))
}

#[async_trait]
impl PromptTransport for TelegramPrompter {
    async fn send_screen(&self, chat_id: i64, screen: &ScreenModel) -> Result<i32> {
        let message = self
            .bot
            .send_message(ChatId(chat_id), &screen.text)
            .reply_markup(keyboard(screen)?)
            .await?;
        Ok(message.id.0)
    }

    async fn edit_screen(&self, chat_id: i64, message_id: i32, screen: &ScreenModel) -> Result<()> {
        let result = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), &screen.text)
            .reply_markup(keyboard(screen)?)
            .await;
        match result {
            Ok(_) => Ok(()),
            // Identical content is a successful no-op, not a stale prompt.
            Err(e) if is_message_not_modified(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Renders and delivers the subscription prompt for a user.
pub struct SubscriptionScreen {
    transport: Arc<dyn PromptTransport>,
    repo: Arc<dyn AccessRepository>,
    required: Arc<[RequiredChannel]>,
}

impl SubscriptionScreen {
    #[must_use]
    pub fn new(
        transport: Arc<dyn PromptTransport>,
        repo: Arc<dyn AccessRepository>,
        required: Arc<[RequiredChannel]>,
    ) -> Self {
        Self {
            transport,
            repo,
            required,
        }
    }

    /// Show the screen in `chat_id`, reusing the stored prompt when one
    /// exists.
    pub async fn show(&self, user_id: u64, chat_id: i64) -> Result<()> {
        let record = self.repo.get(user_id).await?;
        let target = record.last_prompt;
        self.show_inner(user_id, record, chat_id, target).await
    }

    /// Re-render at an explicit message (the confirm callback's own
    /// message), regardless of the stored handle.
    pub async fn show_at(&self, user_id: u64, chat_id: i64, message_id: i32) -> Result<()> {
        let record = self.repo.get(user_id).await?;
        let target = Some(PromptHandle {
            chat_id,
            message_id,
            at: now_ms(),
        });
        self.show_inner(user_id, record, chat_id, target).await
    }

    async fn show_inner(
        &self,
        user_id: u64,
        mut record: AccessRecord,
        chat_id: i64,
        target: Option<PromptHandle>,
    ) -> Result<()> {
        let screen = render(&record, &self.required);

        if let Some(handle) = target {
            match self
                .transport
                .edit_screen(handle.chat_id, handle.message_id, &screen)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(user_id, error = %e, "prompt edit failed, sending fresh");
                },
            }
        }

        let message_id = self.transport.send_screen(chat_id, &screen).await?;
        record.set_prompt(PromptHandle {
            chat_id,
            message_id,
            at: now_ms(),
        });
        self.repo.put(user_id, record).await?;
        Ok(())
    }
}
