//! Granted and required privilege values.
//!
//! Evaluation (deciding whether a request may proceed) is the external
//! authorization policy's job; this module only stores the tuples the
//! policy consults and the mutations the event log records.

use std::collections::HashMap;

use agora_core::Timestamp;
use agora_core::id::ForumId;

/// What a privilege value governs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrivilegeKind {
    ThreadMessage,
    Thread,
    Tag,
    Category,
    ForumWide,
}

/// Where a privilege requirement or grant attaches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrivilegeTarget {
    ThreadMessage(ForumId),
    Thread(ForumId),
    Tag(ForumId),
    Category(ForumId),
    ForumWide,
}

impl PrivilegeTarget {
    pub fn kind(self) -> PrivilegeKind {
        match self {
            Self::ThreadMessage(_) => PrivilegeKind::ThreadMessage,
            Self::Thread(_) => PrivilegeKind::Thread,
            Self::Tag(_) => PrivilegeKind::Tag,
            Self::Category(_) => PrivilegeKind::Category,
            Self::ForumWide => PrivilegeKind::ForumWide,
        }
    }

    pub fn id(self) -> Option<ForumId> {
        match self {
            Self::ThreadMessage(id) | Self::Thread(id) | Self::Tag(id) | Self::Category(id) => {
                Some(id)
            }
            Self::ForumWide => None,
        }
    }

    fn key(self) -> (PrivilegeKind, ForumId) {
        (self.kind(), self.id().unwrap_or(ForumId::ZERO))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GrantedPrivilege {
    pub value: i16,
    pub granted_at: Timestamp,
    /// Unix seconds; 0 means the grant never expires.
    pub expires_at: i64,
}

impl GrantedPrivilege {
    pub fn in_effect_at(&self, now: Timestamp) -> bool {
        self.expires_at == 0 || now.as_secs() < self.expires_at
    }
}

/// (subject user → target → value, expires-at) tuples for the five target
/// kinds.
#[derive(Default)]
pub struct GrantedPrivilegeStore {
    entries: HashMap<(ForumId, (PrivilegeKind, ForumId)), GrantedPrivilege>,
}

impl GrantedPrivilegeStore {
    /// Duration ≤ 0 grants without expiry.
    pub fn assign(
        &mut self,
        user: ForumId,
        target: PrivilegeTarget,
        value: i16,
        granted_at: Timestamp,
        duration: i64,
    ) {
        let expires_at = if duration > 0 {
            granted_at.as_secs().saturating_add(duration)
        } else {
            0
        };
        self.entries.insert(
            (user, target.key()),
            GrantedPrivilege {
                value,
                granted_at,
                expires_at,
            },
        );
    }

    pub fn get(
        &self,
        user: ForumId,
        target: PrivilegeTarget,
        now: Timestamp,
    ) -> Option<&GrantedPrivilege> {
        self.entries
            .get(&(user, target.key()))
            .filter(|grant| grant.in_effect_at(now))
    }

    pub fn remove_for_user(&mut self, user: ForumId) {
        self.entries.retain(|(subject, _), _| *subject != user);
    }

    pub fn remove_for_target(&mut self, target: PrivilegeTarget) {
        let key = target.key();
        self.entries.retain(|(_, entry_target), _| *entry_target != key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Required privilege values (`of` governs which operation family, `on`
/// is the entity carrying the override) plus the forum-wide default
/// privilege levels.
#[derive(Default)]
pub struct RequiredPrivilegeStore {
    entries: HashMap<(PrivilegeKind, (PrivilegeKind, ForumId), u16), i16>,
    default_levels: HashMap<u16, (i16, i64)>,
}

impl RequiredPrivilegeStore {
    pub fn set(&mut self, of: PrivilegeKind, on: PrivilegeTarget, privilege: u16, value: i16) {
        self.entries.insert((of, on.key(), privilege), value);
    }

    pub fn get(&self, of: PrivilegeKind, on: PrivilegeTarget, privilege: u16) -> Option<i16> {
        self.entries.get(&(of, on.key(), privilege)).copied()
    }

    pub fn set_default_level(&mut self, duration_kind: u16, value: i16, duration: i64) {
        self.default_levels.insert(duration_kind, (value, duration));
    }

    pub fn default_level(&self, duration_kind: u16) -> Option<(i16, i64)> {
        self.default_levels.get(&duration_kind).copied()
    }

    pub fn remove_for_target(&mut self, target: PrivilegeTarget) {
        let key = target.key();
        self.entries.retain(|(_, on, _), _| *on != key);
    }
}
