//! Update handlers: messages (commands, admin uploads, content requests),
//! confirm callbacks, and join-request events.

use std::sync::Arc;

use {
    teloxide::{
        payloads::{AnswerCallbackQuerySetters, SendDocumentSetters, SendVideoSetters},
        prelude::*,
        types::{CallbackQuery, ChatJoinRequest, InputFile, MediaKind, Message, MessageId, MessageKind},
    },
    tracing::{debug, info, warn},
};

use crate::{reconciler::ConfirmOutcome, screen::CONFIRM_CALLBACK, state::BotState};

/// Reply once the gate is open.
pub const UNLOCKED_TEXT: &str = "🎬 Send me a movie code";

/// Handle one inbound message (called from the polling loop).
pub async fn handle_message(msg: Message, state: &Arc<BotState>) -> anyhow::Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let user_id = user.id.0;
    let chat_id = msg.chat.id.0;

    // An armed `/add` makes the admin's next upload a catalog entry.
    if let Some(file_id) = extract_upload_file_id(&msg) {
        if state.config.admin_id == Some(user_id) {
            let code = state
                .pending_uploads
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&chat_id);
            if let Some(code) = code {
                state.catalog.put(&code, &file_id).await?;
                info!(code, "catalog entry stored");
                state
                    .bot
                    .send_message(msg.chat.id, format!("✅ Saved!\nCode: {code}"))
                    .await?;
            }
        }
        return Ok(());
    }

    let Some(text) = msg.text() else {
        debug!(user_id, "ignoring non-text, non-upload message");
        return Ok(());
    };
    let text = text.trim();

    if let Some(rest) = text.strip_prefix('/') {
        return handle_command(rest, &msg, user_id, state).await;
    }

    // Plain text is a content request, gated on access.
    if !state.repo.has_access(user_id).await? {
        debug!(user_id, "locked user sent a message, showing subscription screen");
        state.screen.show(user_id, chat_id).await?;
        return Ok(());
    }

    deliver(state, msg.chat.id, text).await
}

async fn handle_command(
    rest: &str,
    msg: &Message,
    user_id: u64,
    state: &Arc<BotState>,
) -> anyhow::Result<()> {
    let mut parts = rest.split_whitespace();
    let cmd = parts.next().unwrap_or_default();
    let arg = parts.next();
    let is_admin = state.config.admin_id == Some(user_id);

    match cmd {
        "start" => {
            // Best-effort refresh so returning members see checkmarks
            // without tapping confirm first.
            if let Err(e) = state.reconciler.refresh_memberships(user_id).await {
                warn!(user_id, error = %e, "membership refresh on /start failed");
            }
            if state.repo.has_access(user_id).await? {
                state.bot.send_message(msg.chat.id, UNLOCKED_TEXT).await?;
            } else {
                state.screen.show(user_id, msg.chat.id.0).await?;
            }
        },
        "myid" => {
            state
                .bot
                .send_message(msg.chat.id, format!("Your id: {user_id}"))
                .await?;
        },
        "add" => {
            if !is_admin {
                state
                    .bot
                    .send_message(msg.chat.id, "❌ You are not an admin.")
                    .await?;
                return Ok(());
            }
            match arg {
                Some(code) if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) => {
                    state
                        .pending_uploads
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(msg.chat.id.0, code.to_string());
                    state
                        .bot
                        .send_message(
                            msg.chat.id,
                            format!("✅ Code accepted: {code}\nNow send the video or file"),
                        )
                        .await?;
                },
                _ => {
                    state
                        .bot
                        .send_message(msg.chat.id, "Usage: /add <numeric code>")
                        .await?;
                },
            }
        },
        "del" => {
            if !is_admin {
                state
                    .bot
                    .send_message(msg.chat.id, "❌ You are not an admin.")
                    .await?;
                return Ok(());
            }
            let Some(code) = arg else {
                state
                    .bot
                    .send_message(msg.chat.id, "Usage: /del <code>")
                    .await?;
                return Ok(());
            };
            if state.catalog.remove(code).await? {
                state
                    .bot
                    .send_message(msg.chat.id, format!("🗑️ Removed: {code}"))
                    .await?;
            } else {
                state
                    .bot
                    .send_message(msg.chat.id, "❌ No such code.")
                    .await?;
            }
        },
        "list" => {
            if !is_admin {
                return Ok(());
            }
            let codes = state.catalog.codes().await?;
            let reply = if codes.is_empty() {
                "No media stored yet.".to_string()
            } else {
                let lines: Vec<String> = codes.iter().map(|c| format!("• {c}")).collect();
                format!("🎬 Codes:\n{}", lines.join("\n"))
            };
            state.bot.send_message(msg.chat.id, reply).await?;
        },
        other => {
            debug!(user_id, command = other, "ignoring unknown command");
        },
    }
    Ok(())
}

/// Look up a content code and deliver the stored media.
async fn deliver(state: &Arc<BotState>, chat_id: ChatId, code: &str) -> anyhow::Result<()> {
    let Some(file_id) = state.catalog.get(code).await? else {
        state.bot.send_message(chat_id, "❌ No such code.").await?;
        return Ok(());
    };

    let caption = match &state.bot_username {
        Some(name) => format!("🎬 Code: {code}\n🤖 Our bot: @{name}"),
        None => format!("🎬 Code: {code}"),
    };

    let send = state
        .bot
        .send_video(chat_id, InputFile::file_id(file_id.clone()))
        .caption(&caption)
        .await;
    if let Err(e) = send {
        // The id may reference a non-video file; retry as a document.
        debug!(code, error = %e, "video send failed, retrying as document");
        state
            .bot
            .send_document(chat_id, InputFile::file_id(file_id))
            .caption(caption)
            .await?;
    }
    info!(code, chat_id = chat_id.0, "media delivered");
    Ok(())
}

/// Handle the confirm button press.
pub async fn handle_callback_query(
    query: CallbackQuery,
    state: &Arc<BotState>,
) -> anyhow::Result<()> {
    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    if data != CONFIRM_CALLBACK {
        // Dismiss the loading spinner for anything we don't recognize.
        let _ = state.bot.answer_callback_query(&query.id).await;
        return Ok(());
    }
    let Some(message) = query.message.as_ref() else {
        let _ = state.bot.answer_callback_query(&query.id).await;
        return Ok(());
    };
    let chat_id = message.chat().id.0;
    let message_id = message.id().0;
    let user_id = query.from.id.0;

    match state
        .reconciler
        .on_confirm(user_id, chat_id, message_id)
        .await?
    {
        ConfirmOutcome::Granted => {
            state.bot.answer_callback_query(&query.id).await?;
            // Replace the prompt with the unlock hint; send fresh when the
            // prompt is no longer editable.
            let edit = state
                .bot
                .edit_message_text(ChatId(chat_id), MessageId(message_id), UNLOCKED_TEXT)
                .await;
            if edit.is_err() {
                state
                    .bot
                    .send_message(ChatId(chat_id), UNLOCKED_TEXT)
                    .await?;
            }
        },
        ConfirmOutcome::Denied => {
            // The reconciler already re-rendered the screen.
            state
                .bot
                .answer_callback_query(&query.id)
                .text("❌ Not all channels joined yet!")
                .show_alert(true)
                .await?;
        },
    }
    Ok(())
}

/// Handle a join-request event for one of the tracked channels.
pub async fn handle_join_request(req: ChatJoinRequest, state: &Arc<BotState>) -> anyhow::Result<()> {
    state
        .reconciler
        .on_join_request(req.from.id.0, req.chat.id.0)
        .await;
    Ok(())
}

/// Extract the file id of an uploaded video or document.
fn extract_upload_file_id(msg: &Message) -> Option<String> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Video(v) => Some(v.video.file.id.clone()),
            MediaKind::Document(d) => Some(d.document.file.id.clone()),
            _ => None,
        },
        _ => None,
    }
}
