use std::sync::Arc;

use teloxide::{prelude::*, types::Chat};

use tagall_core::{
    domain::{ChatId, ChatKind, Sender, UserId},
    messaging::types::IncomingCommand,
};

use crate::router::AppState;

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_group() {
        ChatKind::Group
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Private
    }
}

pub async fn handle_command(msg: &Message, text: &str, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let cmd = IncomingCommand {
        chat_id: ChatId(msg.chat.id.0),
        chat_kind: chat_kind(&msg.chat),
        sender: Sender {
            user_id: UserId(user.id.0 as i64),
            username: user.username.clone(),
            full_name: user.full_name(),
        },
        text: text.to_string(),
        bot_username: state.bot_username.clone(),
    };

    state.commands.respond(&cmd, state.messenger.as_ref()).await;
    Ok(())
}
