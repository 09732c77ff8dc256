use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use {
    cinegate_access::{AccessRepository, RequiredChannel},
    cinegate_media::MediaCatalog,
};

use crate::{
    config::BotConfig,
    handlers,
    oracle::TelegramOracle,
    reconciler::Reconciler,
    screen::{SubscriptionScreen, TelegramPrompter},
    state::BotState,
};

/// Start polling for updates.
///
/// Spawns a background task that processes updates until the returned
/// `CancellationToken` is cancelled.
pub async fn start_polling(
    config: BotConfig,
    repo: Arc<dyn AccessRepository>,
    catalog: Arc<dyn MediaCatalog>,
) -> anyhow::Result<CancellationToken> {
    // Build bot with a client timeout longer than the long-polling timeout
    // (30s) so the HTTP client doesn't abort the request before Telegram
    // responds.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(std::time::Duration::from_secs(45))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    // Verify credentials and learn the username used in delivery captions.
    let me = bot.get_me().await?;
    let bot_username = config.username.clone().or_else(|| me.username.clone());

    // Delete any existing webhook so long polling works.
    bot.delete_webhook().send().await?;

    // Register slash commands for autocomplete in Telegram clients.
    let commands = vec![
        BotCommand::new("start", "Check subscriptions and get started"),
        BotCommand::new("myid", "Show your numeric id"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(
        username = ?bot_username,
        channels = config.channels.len(),
        "telegram bot connected (webhook cleared)"
    );

    let cancel = CancellationToken::new();

    let required: Arc<[RequiredChannel]> = config.channels.clone().into();
    let prompter = Arc::new(TelegramPrompter::new(bot.clone()));
    let screen = Arc::new(SubscriptionScreen::new(
        prompter,
        Arc::clone(&repo),
        Arc::clone(&required),
    ));
    let oracle = Arc::new(TelegramOracle::new(bot.clone()));
    let reconciler = Reconciler::new(Arc::clone(&repo), oracle, Arc::clone(&screen), required);

    let state = Arc::new(BotState {
        bot: bot.clone(),
        config,
        bot_username,
        repo,
        catalog,
        screen,
        reconciler,
        cancel: cancel.clone(),
        pending_uploads: std::sync::Mutex::new(std::collections::HashMap::new()),
    });

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        info!("starting telegram manual polling loop");
        let mut offset: i32 = 0;

        loop {
            if cancel_clone.is_cancelled() {
                info!("telegram polling stopped");
                break;
            }

            let result = bot
                .get_updates()
                .offset(offset)
                .timeout(30)
                .allowed_updates(vec![
                    AllowedUpdate::Message,
                    AllowedUpdate::CallbackQuery,
                    AllowedUpdate::ChatJoinRequest,
                ])
                .await;

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) => {
                                debug!(chat_id = msg.chat.id.0, "received telegram message");
                                if let Err(e) = handlers::handle_message(msg, &state).await {
                                    error!(error = %e, "error handling telegram message");
                                }
                            },
                            UpdateKind::CallbackQuery(query) => {
                                debug!(
                                    callback_data = ?query.data,
                                    "received telegram callback query"
                                );
                                if let Err(e) = handlers::handle_callback_query(query, &state).await
                                {
                                    error!(error = %e, "error handling telegram callback query");
                                }
                            },
                            UpdateKind::ChatJoinRequest(req) => {
                                debug!(
                                    chat_id = req.chat.id.0,
                                    user_id = req.from.id.0,
                                    "received chat join request"
                                );
                                if let Err(e) = handlers::handle_join_request(req, &state).await {
                                    error!(error = %e, "error handling chat join request");
                                }
                            },
                            other => {
                                debug!("ignoring unexpected update: {other:?}");
                            },
                        }
                    }
                },
                Err(e) => {
                    // Another bot instance is running with the same token.
                    let is_conflict =
                        matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates));

                    if is_conflict {
                        warn!(
                            "telegram polling disabled: another instance is already running with this token"
                        );
                        cancel_clone.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                },
            }
        }
    });

    Ok(cancel)
}
