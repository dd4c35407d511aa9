use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Hard Telegram limit for a single text message.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
/// Length at which a broadcast is split into chunks.
pub const DEFAULT_SAFE_LIMIT: usize = 4000;
/// Mentions per chunk once a broadcast is split.
pub const DEFAULT_TAG_GROUP_SIZE: usize = 50;
/// Minimum spacing between two sends to the same chat.
pub const DEFAULT_TAG_PACING_MS: u64 = 500;

/// Typed configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub members_file: PathBuf,

    // Telegram limits
    pub telegram_message_limit: usize,
    pub telegram_safe_limit: usize,

    // Broadcast
    pub tag_group_size: usize,
    pub tag_pacing: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| lookup("BOT_TOKEN").and_then(non_empty))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let members_file = lookup("MEMBERS_FILE")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("members.json"));

        let telegram_message_limit =
            parse_usize(lookup("TELEGRAM_MESSAGE_LIMIT")).unwrap_or(TELEGRAM_MESSAGE_LIMIT);
        // Never plan above what Telegram will accept.
        let telegram_safe_limit = parse_usize(lookup("TELEGRAM_SAFE_LIMIT"))
            .unwrap_or(DEFAULT_SAFE_LIMIT)
            .min(telegram_message_limit);

        let tag_group_size = parse_usize(lookup("TAG_GROUP_SIZE"))
            .unwrap_or(DEFAULT_TAG_GROUP_SIZE)
            .max(1);
        let tag_pacing = Duration::from_millis(
            parse_u64(lookup("TAG_PACING_MS")).unwrap_or(DEFAULT_TAG_PACING_MS),
        );

        Ok(Self {
            telegram_bot_token,
            members_file,
            telegram_message_limit,
            telegram_safe_limit,
            tag_group_size,
            tag_pacing,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_usize(v: Option<String>) -> Option<usize> {
    v.and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
