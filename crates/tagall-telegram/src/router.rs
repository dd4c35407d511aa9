use std::sync::Arc;

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tagall_core::{
    commands::CommandRouter,
    config::Config,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    /// Our own username, without `@`.
    pub bot_username: Option<String>,
    pub commands: Arc<CommandRouter>,
    pub messenger: Arc<dyn MessagingPort>,
}

pub async fn run_polling(cfg: Arc<Config>, commands: Arc<CommandRouter>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot
        .get_me()
        .await
        .context("get_me failed; check TELEGRAM_BOT_TOKEN")?;
    tracing::info!(bot = %me.username(), "tagall started");
    tracing::info!(members_file = %cfg.members_file.display(), "using members file");

    // Every reply goes through the throttling decorator so chunked broadcasts are
    // spaced out. The Telegram adapter still retries once on RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::from_config(&cfg),
    ));

    let state = Arc::new(AppState {
        bot_username: me.user.username.clone(),
        commands,
        messenger,
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
