//! Registry members.
//!
//! `Member` serializes directly as the current on-disk record shape:
//! `{"type": "username", "value": "@h"}` or `{"type": "id", "user_id": 1, "name": "N"}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::formatting::{escape_html, mention_link};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Member {
    /// Member with a public handle; `handle` always starts with `@`.
    #[serde(rename = "username")]
    Username {
        #[serde(rename = "value")]
        handle: String,
    },

    /// Member without a handle, mentioned through their numeric id.
    #[serde(rename = "id")]
    Identified {
        user_id: i64,
        #[serde(rename = "name")]
        display_name: String,
    },
}

impl Member {
    /// Username member with the `@` prefix added when missing.
    pub fn username(raw: &str) -> Self {
        Member::Username {
            handle: normalize_handle(raw),
        }
    }

    pub fn identified(user_id: i64, display_name: impl Into<String>) -> Self {
        Member::Identified {
            user_id,
            display_name: display_name.into(),
        }
    }

    pub fn handle(&self) -> Option<&str> {
        match self {
            Member::Username { handle } => Some(handle),
            Member::Identified { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Member::Username { .. } => None,
            Member::Identified { user_id, .. } => Some(*user_id),
        }
    }

    /// True when both members resolve to the same identity.
    pub fn same_identity(&self, other: &Member) -> bool {
        match (self, other) {
            (Member::Username { handle: a }, Member::Username { handle: b }) => a == b,
            (Member::Identified { user_id: a, .. }, Member::Identified { user_id: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }

    /// HTML token that notifies this member when sent.
    pub fn mention_token(&self) -> String {
        match self {
            Member::Username { handle } => escape_html(handle),
            Member::Identified {
                user_id,
                display_name,
            } => mention_link(*user_id, display_name),
        }
    }

    /// HTML label for listings; identified members are not pinged.
    pub fn list_label(&self) -> String {
        match self {
            Member::Username { handle } => escape_html(handle),
            Member::Identified {
                user_id,
                display_name,
            } => format!("{} (id {user_id})", escape_html(display_name)),
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Username { handle } => f.write_str(handle),
            Member::Identified {
                user_id,
                display_name,
            } => write!(f, "{display_name} (id {user_id})"),
        }
    }
}

pub fn normalize_handle(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('@') {
        raw.to_string()
    } else {
        format!("@{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_tagged_records() {
        assert_eq!(
            serde_json::to_value(Member::username("alice")).unwrap(),
            json!({"type": "username", "value": "@alice"})
        );
        assert_eq!(
            serde_json::to_value(Member::identified(7, "Bob")).unwrap(),
            json!({"type": "id", "user_id": 7, "name": "Bob"})
        );
    }

    #[test]
    fn identity_ignores_display_name_and_variant() {
        let a = Member::identified(1, "A");
        assert!(a.same_identity(&Member::identified(1, "renamed")));
        assert!(!a.same_identity(&Member::identified(2, "A")));
        assert!(!Member::username("@x").same_identity(&Member::username("@X")));
        assert!(!Member::username("@1").same_identity(&Member::identified(1, "@1")));
    }

    #[test]
    fn tokens_render_handles_and_links() {
        assert_eq!(Member::username("@a").mention_token(), "@a");
        assert_eq!(
            Member::identified(5, "Ann").mention_token(),
            "<a href=\"tg://user?id=5\">Ann</a>"
        );
        assert_eq!(Member::identified(5, "Ann").list_label(), "Ann (id 5)");
    }

    #[test]
    fn normalize_handle_adds_prefix_once() {
        assert_eq!(normalize_handle("user1"), "@user1");
        assert_eq!(normalize_handle(" @user1 "), "@user1");
    }
}
