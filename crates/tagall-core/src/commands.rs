//! Command routing: text in, HTML replies out.
//!
//! Transport adapters hand every slash command to [`CommandRouter::respond`];
//! registry and planner failures are turned into replies here and never escape.

use std::sync::Arc;

use crate::{
    broadcast::BroadcastPlanner,
    formatting::{escape_html, numbered_lines},
    messaging::{port::MessagingPort, types::IncomingCommand},
    registry::{Registry, RegistryError, RemoveTarget},
};

pub const HELP_TEXT: &str = "👋 Hi! I mention everyone in this chat.\n\n\
<b>Commands:</b>\n\
/tag - mention all members\n\
/list - show the member list\n\
/add @username - add a member by username\n\
/addid &lt;id&gt; &lt;name&gt; - add a member without a username\n\
/remove @username|id - remove a member\n\
/register - add yourself\n\
/setname &lt;name&gt; - change your display name\n\
/clear - remove everyone\n\
/help - show this message";

/// A slash command split into its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercase command name without the leading `/`.
    pub name: String,
    /// The `botname` of `/cmd@botname`, if present.
    pub addressee: Option<String>,
    /// Everything after the first whitespace, trimmed.
    pub args: String,
}

impl ParsedCommand {
    /// Whether this command is meant for the bot called `bot_username`.
    ///
    /// Unaddressed commands are for everyone; an unknown own name accepts all.
    pub fn is_for(&self, bot_username: Option<&str>) -> bool {
        match (&self.addressee, bot_username) {
            (Some(to), Some(me)) => to.eq_ignore_ascii_case(me.trim_start_matches('@')),
            _ => true,
        }
    }
}

/// Split `/cmd@botname arg1 ...` into a lowercase command name, addressee and args.
pub fn parse_command(text: &str) -> ParsedCommand {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let args = parts.next().unwrap_or("").trim().to_string();

    let mut head = first.trim_start_matches('/').splitn(2, '@');
    let name = head.next().unwrap_or("").to_lowercase();
    let addressee = head
        .next()
        .filter(|to| !to.is_empty())
        .map(str::to_string);

    ParsedCommand {
        name,
        addressee,
        args,
    }
}

pub struct CommandRouter {
    registry: Arc<Registry>,
    planner: BroadcastPlanner,
}

impl CommandRouter {
    pub fn new(registry: Arc<Registry>, planner: BroadcastPlanner) -> Self {
        Self { registry, planner }
    }

    /// Handle a command and send every reply, in order, through `messenger`.
    ///
    /// Pacing between replies is the messenger's job (see `ThrottledMessenger`).
    pub async fn respond(&self, cmd: &IncomingCommand, messenger: &dyn MessagingPort) {
        for reply in self.handle(cmd).await {
            if let Err(e) = messenger.send_html(cmd.chat_id, &reply).await {
                tracing::warn!(chat_id = cmd.chat_id.0, error = %e, "failed to send reply");
                // Later blocks would arrive out of context.
                break;
            }
        }
    }

    /// Compute the HTML replies for a command without sending them.
    pub async fn handle(&self, cmd: &IncomingCommand) -> Vec<String> {
        let parsed = parse_command(&cmd.text);
        if !parsed.is_for(cmd.bot_username.as_deref()) {
            tracing::debug!(
                chat_id = cmd.chat_id.0,
                addressee = ?parsed.addressee,
                "ignoring command for another bot"
            );
            return Vec::new();
        }
        let (name, arg) = (parsed.name, parsed.args);
        tracing::debug!(
            chat_id = cmd.chat_id.0,
            user_id = cmd.sender.user_id.0,
            command = %name,
            "handling command"
        );

        match name.as_str() {
            "start" | "help" => vec![HELP_TEXT.to_string()],
            "list" => vec![self.list()],
            "tag" => self.tag(cmd),
            "add" => vec![self.add(&arg).await],
            "addid" => vec![self.add_id(&arg).await],
            "remove" => vec![self.remove(&arg).await],
            "clear" => vec![self.clear().await],
            "register" => vec![self.register(cmd).await],
            "setname" => vec![self.set_name(cmd, &arg).await],
            _ => vec!["❌ Unknown command. Use /help for the list of commands.".to_string()],
        }
    }

    fn list(&self) -> String {
        let members = self.registry.members();
        if members.is_empty() {
            return "📋 The member list is empty!".to_string();
        }
        format!(
            "📋 Members ({}):\n\n{}",
            members.len(),
            numbered_lines(members.iter().map(|m| m.list_label()))
        )
    }

    fn tag(&self, cmd: &IncomingCommand) -> Vec<String> {
        let members = self.registry.members();
        if members.is_empty() {
            return vec!["❌ The member list is empty!".to_string()];
        }
        if !cmd.chat_kind.is_group() {
            return vec!["❌ This command only works in groups!".to_string()];
        }

        let blocks = self.planner.plan(&members);
        tracing::info!(
            chat_id = cmd.chat_id.0,
            members = members.len(),
            blocks = blocks.len(),
            "tagging everyone"
        );
        blocks
    }

    async fn add(&self, arg: &str) -> String {
        if arg.is_empty() {
            return "❌ Specify a username to add!\nExample: /add @username".to_string();
        }
        match self.registry.add_handle(arg).await {
            Ok(m) => format!("✅ Member {} added!", m.list_label()),
            Err(e) => error_reply(&e),
        }
    }

    async fn add_id(&self, arg: &str) -> String {
        let mut parts = arg.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").trim();
        let name = parts.next().unwrap_or("").trim();

        let Ok(user_id) = id.parse::<i64>() else {
            return "❌ Specify a numeric user id and a name!\nExample: /addid 123456789 Alex"
                .to_string();
        };
        match self.registry.add_id(user_id, name).await {
            Ok(m) => format!("✅ Member {} added!", m.list_label()),
            Err(e) => error_reply(&e),
        }
    }

    async fn remove(&self, arg: &str) -> String {
        if arg.is_empty() {
            return "❌ Specify a username or id to remove!\nExample: /remove @username"
                .to_string();
        }
        let result = match RemoveTarget::parse(arg) {
            Ok(target) => self.registry.remove(&target).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(m) => format!("✅ Member {} removed!", m.list_label()),
            Err(e) => error_reply(&e),
        }
    }

    async fn clear(&self) -> String {
        match self.registry.clear().await {
            Ok(_) => "✅ The member list has been cleared!".to_string(),
            Err(e) => error_reply(&e),
        }
    }

    async fn register(&self, cmd: &IncomingCommand) -> String {
        match self.registry.register_self(&cmd.sender).await {
            Ok(m) => format!("✅ You are registered as {}!", m.list_label()),
            Err(RegistryError::Duplicate(_)) => "❌ You are already registered!".to_string(),
            Err(e) => error_reply(&e),
        }
    }

    async fn set_name(&self, cmd: &IncomingCommand, arg: &str) -> String {
        if arg.is_empty() {
            return "❌ Specify a new name!\nExample: /setname Alex".to_string();
        }
        match self
            .registry
            .set_display_name(cmd.sender.user_id, arg)
            .await
        {
            Ok(_) => format!("✅ Your display name is now {}!", escape_html(arg)),
            Err(e) => error_reply(&e),
        }
    }
}

fn error_reply(e: &RegistryError) -> String {
    match e {
        RegistryError::NotFound(who) => {
            format!("❌ Member {} was not found in the list!", escape_html(who))
        }
        RegistryError::Duplicate(who) => {
            format!("❌ Member {} is already in the list!", escape_html(who))
        }
        RegistryError::MalformedInput(why) => format!("❌ Invalid input: {}", escape_html(why)),
        RegistryError::NotRegisteredById(_) => {
            "❌ You are not registered by id. Use /register first \
             (only members without a username can set a name)."
                .to_string()
        }
        RegistryError::Persistence(_) => {
            "❌ Failed to save the member list! The change may not have been applied.".to_string()
        }
    }
}
