//! Mention-all planning: turn the member list into sendable text blocks.

use crate::{
    config::{Config, DEFAULT_SAFE_LIMIT, DEFAULT_TAG_GROUP_SIZE},
    member::Member,
};

pub const TAG_HEADER: &str = "👥 Tagging everyone:";

#[derive(Clone, Copy, Debug)]
pub struct BroadcastPlanner {
    /// Joined length (in chars) above which the broadcast is chunked.
    pub threshold: usize,
    /// Mentions per block once chunked.
    pub group_size: usize,
}

impl Default for BroadcastPlanner {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SAFE_LIMIT,
            group_size: DEFAULT_TAG_GROUP_SIZE,
        }
    }
}

impl BroadcastPlanner {
    pub fn new(threshold: usize, group_size: usize) -> Self {
        Self {
            threshold,
            group_size: group_size.max(1),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.telegram_safe_limit, cfg.tag_group_size)
    }

    /// Plan the blocks that mention every member, in registry order.
    ///
    /// A short broadcast is one block with a header line. A long one is split into
    /// fixed-size groups of mentions with no header; single tokens are never split.
    /// Sending the blocks (and pacing between them) is up to the caller.
    pub fn plan(&self, members: &[Member]) -> Vec<String> {
        let tokens: Vec<String> = members.iter().map(Member::mention_token).collect();
        let joined = tokens.join(" ");

        if joined.chars().count() <= self.threshold {
            return vec![format!("{TAG_HEADER}\n{joined}")];
        }

        tokens
            .chunks(self.group_size.max(1))
            .map(|group| group.join(" "))
            .collect()
    }
}
