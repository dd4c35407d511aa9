//! Telegram update handlers.
//!
//! Only slash commands are handled; any other message is ignored so the bot
//! stays quiet in busy groups.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !is_command(text) {
        return Ok(());
    }
    commands::handle_command(&msg, text, state).await
}

fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_slash_text_is_a_command() {
        assert!(is_command("/tag"));
        assert!(is_command("  /list@TagAllBot"));
        assert!(!is_command("hello /tag"));
        assert!(!is_command(""));
    }
}
