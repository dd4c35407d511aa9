use crate::domain::{ChatId, ChatKind, Sender};

/// A slash command as received from the transport.
#[derive(Clone, Debug)]
pub struct IncomingCommand {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub sender: Sender,
    /// Full message text, including the leading `/command`.
    pub text: String,
    /// This bot's username, used to ignore `/cmd@OtherBot`.
    pub bot_username: Option<String>,
}
