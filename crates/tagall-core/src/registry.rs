//! Read-modify-write operations over the member registry.

use std::sync::OnceLock;

use regex::Regex;
use tokio::sync::Mutex;

use crate::{
    domain::{Sender, UserId},
    errors::Error,
    member::{normalize_handle, Member},
    store::MemberStore,
};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("member not found: {0}")]
    NotFound(String),

    #[error("member already registered: {0}")]
    Duplicate(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("user {0} is not registered by id")]
    NotRegisteredById(i64),

    #[error("failed to persist registry: {0}")]
    Persistence(#[from] Error),
}

/// Who to remove: a numeric user id or a handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveTarget {
    Id(i64),
    Handle(String),
}

impl RemoveTarget {
    pub fn parse(arg: &str) -> Result<Self, RegistryError> {
        let arg = arg.trim();
        if arg.is_empty() {
            return Err(RegistryError::MalformedInput(
                "a username or user id is required".to_string(),
            ));
        }
        if let Ok(id) = arg.parse::<i64>() {
            return Ok(RemoveTarget::Id(id));
        }
        Ok(RemoveTarget::Handle(normalize_handle(arg)))
    }

    fn matches(&self, member: &Member) -> bool {
        match self {
            RemoveTarget::Id(id) => member.user_id() == Some(*id),
            RemoveTarget::Handle(h) => member.handle() == Some(h.as_str()),
        }
    }

    /// A bare number may also be an all-digit handle added with `/add 12345`.
    fn handle_fallback(&self) -> Option<RemoveTarget> {
        match self {
            RemoveTarget::Id(id) => Some(RemoveTarget::Handle(format!("@{id}"))),
            RemoveTarget::Handle(_) => None,
        }
    }
}

impl std::fmt::Display for RemoveTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoveTarget::Id(id) => write!(f, "id {id}"),
            RemoveTarget::Handle(h) => f.write_str(h),
        }
    }
}

fn handle_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@[A-Za-z0-9_]{5,32}$").expect("valid regex"))
}

/// Registry service.
///
/// Every mutation runs load → mutate → save while holding `write_lock`, so
/// concurrent commands in this process are serialized. Separate processes sharing
/// the same file are not coordinated: the last save wins.
pub struct Registry {
    store: MemberStore,
    write_lock: Mutex<()>,
}

impl Registry {
    pub fn new(store: MemberStore) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn members(&self) -> Vec<Member> {
        self.store.load()
    }

    pub async fn add_handle(&self, raw: &str) -> Result<Member, RegistryError> {
        if raw.trim().is_empty() {
            return Err(RegistryError::MalformedInput(
                "a username is required".to_string(),
            ));
        }
        let member = Member::username(raw);
        let handle = member.to_string();
        if !handle_re().is_match(&handle) {
            return Err(RegistryError::MalformedInput(format!(
                "{handle} is not a valid username"
            )));
        }

        self.insert(member).await
    }

    pub async fn add_id(&self, user_id: i64, display_name: &str) -> Result<Member, RegistryError> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(RegistryError::MalformedInput(
                "a display name is required".to_string(),
            ));
        }
        self.insert(Member::identified(user_id, name)).await
    }

    pub async fn remove(&self, target: &RemoveTarget) -> Result<Member, RegistryError> {
        let removed = self
            .mutate(|members| {
                let idx = members
                    .iter()
                    .position(|m| target.matches(m))
                    .or_else(|| {
                        let fallback = target.handle_fallback()?;
                        members.iter().position(|m| fallback.matches(m))
                    })
                    .ok_or_else(|| RegistryError::NotFound(target.to_string()))?;
                Ok(members.remove(idx))
            })
            .await?;
        tracing::info!(member = %removed, "removed member");
        Ok(removed)
    }

    /// Empty the registry, returning how many members were dropped.
    pub async fn clear(&self) -> Result<usize, RegistryError> {
        let dropped = self
            .mutate(|members| {
                let n = members.len();
                members.clear();
                Ok(n)
            })
            .await?;
        tracing::info!(dropped, "cleared registry");
        Ok(dropped)
    }

    /// Register the command sender: by handle if they have one, by id otherwise.
    pub async fn register_self(&self, sender: &Sender) -> Result<Member, RegistryError> {
        let handle = sender
            .username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .map(normalize_handle);

        let member = match &handle {
            Some(h) => Member::username(h),
            None => {
                let name = sender.full_name.trim();
                let name = if name.is_empty() {
                    format!("user {}", sender.user_id.0)
                } else {
                    name.to_string()
                };
                Member::identified(sender.user_id.0, name)
            }
        };

        let user_id = sender.user_id.0;
        let added = self
            .mutate(|members| {
                let already = members.iter().any(|m| {
                    m.user_id() == Some(user_id)
                        || (handle.is_some() && m.handle() == handle.as_deref())
                });
                if already {
                    return Err(RegistryError::Duplicate(member.to_string()));
                }
                members.push(member.clone());
                Ok(member)
            })
            .await?;
        tracing::info!(member = %added, "self-registered member");
        Ok(added)
    }

    /// Rename the caller's id-based entry. Returns the previous name.
    pub async fn set_display_name(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<String, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::MalformedInput(
                "a display name is required".to_string(),
            ));
        }

        self.mutate(|members| {
            let entry = members.iter_mut().find_map(|m| match m {
                Member::Identified {
                    user_id: id,
                    display_name,
                } if *id == user_id.0 => Some(display_name),
                _ => None,
            });
            let Some(display_name) = entry else {
                return Err(RegistryError::NotRegisteredById(user_id.0));
            };
            Ok(std::mem::replace(display_name, name.to_string()))
        })
        .await
    }

    async fn insert(&self, member: Member) -> Result<Member, RegistryError> {
        let added = self
            .mutate(|members| {
                if members.iter().any(|m| m.same_identity(&member)) {
                    return Err(RegistryError::Duplicate(member.to_string()));
                }
                members.push(member.clone());
                Ok(member)
            })
            .await?;
        tracing::info!(member = %added, "added member");
        Ok(added)
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<Member>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let _guard = self.write_lock.lock().await;
        let mut members = self.store.load();
        let out = f(&mut members)?;
        if let Err(e) = self.store.save(&members) {
            tracing::error!(
                path = %self.store.path().display(),
                error = %e,
                "failed to save registry"
            );
            return Err(e.into());
        }
        Ok(out)
    }
}
