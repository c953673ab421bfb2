//! The persisted event model.
//!
//! Every mutation of the forum state is recorded as one event blob:
//! a fixed header (type, version, context version), a fixed 41-byte
//! context (timestamp, performing user, ip) and a per-type payload.
//! Ordinal values are stable; new types may be appended but existing
//! ones are never renumbered.

use core::fmt;

use crate::id::ForumId;
use crate::wire::{BlobReader, BlobWriter, WireResult};
use crate::{IpAddress, Timestamp};

macro_rules! event_types {
    ($($name:ident = $ordinal:literal,)*) => {
        impl EventType {
            $(pub const $name: EventType = EventType($ordinal);)*

            pub const fn name(self) -> &'static str {
                match self.0 {
                    $($ordinal => stringify!($name),)*
                    _ => "UNKNOWN",
                }
            }
        }
    };
}

/// The on-disk event type tag.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventType(pub u32);

event_types! {
    UNKNOWN = 0,
    ADD_NEW_USER = 1,
    CHANGE_USER_NAME = 2,
    CHANGE_USER_INFO = 3,
    CHANGE_USER_TITLE = 4,
    CHANGE_USER_SIGNATURE = 5,
    CHANGE_USER_LOGO = 6,
    DELETE_USER = 7,
    ADD_NEW_DISCUSSION_THREAD = 8,
    CHANGE_DISCUSSION_THREAD_NAME = 9,
    CHANGE_DISCUSSION_THREAD_PIN_DISPLAY_ORDER = 10,
    DELETE_DISCUSSION_THREAD = 11,
    MERGE_DISCUSSION_THREADS = 12,
    SUBSCRIBE_TO_DISCUSSION_THREAD = 13,
    UNSUBSCRIBE_FROM_DISCUSSION_THREAD = 14,
    ADD_NEW_DISCUSSION_THREAD_MESSAGE = 15,
    CHANGE_DISCUSSION_THREAD_MESSAGE_CONTENT = 16,
    INCREMENT_DISCUSSION_THREAD_NUMBER_OF_VISITS = 17,
    MOVE_DISCUSSION_THREAD_MESSAGE = 18,
    DELETE_DISCUSSION_THREAD_MESSAGE = 19,
    DISCUSSION_THREAD_MESSAGE_UP_VOTE = 20,
    DISCUSSION_THREAD_MESSAGE_DOWN_VOTE = 21,
    DISCUSSION_THREAD_MESSAGE_RESET_VOTE = 22,
    ADD_COMMENT_TO_DISCUSSION_THREAD_MESSAGE = 23,
    SOLVE_DISCUSSION_THREAD_MESSAGE_COMMENT = 24,
    ADD_NEW_DISCUSSION_TAG = 25,
    CHANGE_DISCUSSION_TAG_NAME = 26,
    CHANGE_DISCUSSION_TAG_UI_BLOB = 27,
    DELETE_DISCUSSION_TAG = 28,
    ADD_DISCUSSION_TAG_TO_THREAD = 29,
    REMOVE_DISCUSSION_TAG_FROM_THREAD = 30,
    MERGE_DISCUSSION_TAGS = 31,
    ADD_NEW_DISCUSSION_CATEGORY = 32,
    CHANGE_DISCUSSION_CATEGORY_NAME = 33,
    CHANGE_DISCUSSION_CATEGORY_DESCRIPTION = 34,
    CHANGE_DISCUSSION_CATEGORY_DISPLAY_ORDER = 35,
    CHANGE_DISCUSSION_CATEGORY_PARENT = 36,
    DELETE_DISCUSSION_CATEGORY = 37,
    ADD_DISCUSSION_TAG_TO_CATEGORY = 38,
    REMOVE_DISCUSSION_TAG_FROM_CATEGORY = 39,
    CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_THREAD_MESSAGE = 40,
    CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_THREAD = 41,
    CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_TAG = 42,
    CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FORUM_WIDE = 43,
    CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FOR_THREAD = 44,
    CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FOR_TAG = 45,
    CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FORUM_WIDE = 46,
    CHANGE_DISCUSSION_TAG_REQUIRED_PRIVILEGE_FOR_TAG = 47,
    CHANGE_DISCUSSION_TAG_REQUIRED_PRIVILEGE_FORUM_WIDE = 48,
    CHANGE_DISCUSSION_CATEGORY_REQUIRED_PRIVILEGE_FOR_CATEGORY = 49,
    CHANGE_DISCUSSION_CATEGORY_REQUIRED_PRIVILEGE_FORUM_WIDE = 50,
    CHANGE_FORUM_WIDE_REQUIRED_PRIVILEGE = 51,
    CHANGE_FORUM_WIDE_DEFAULT_PRIVILEGE_LEVEL = 52,
    ASSIGN_DISCUSSION_THREAD_MESSAGE_PRIVILEGE = 53,
    ASSIGN_DISCUSSION_THREAD_PRIVILEGE = 54,
    ASSIGN_DISCUSSION_TAG_PRIVILEGE = 55,
    ASSIGN_DISCUSSION_CATEGORY_PRIVILEGE = 56,
    ASSIGN_FORUM_WIDE_PRIVILEGE = 57,
    QUOTE_USER_IN_DISCUSSION_THREAD_MESSAGE = 58,
    CHANGE_DISCUSSION_THREAD_MESSAGE_APPROVAL = 59,
    INCREMENT_USER_LATEST_VISITED_PAGE = 60,
    CHANGE_DISCUSSION_THREAD_APPROVAL = 61,
    SEND_PRIVATE_MESSAGE = 62,
    DELETE_PRIVATE_MESSAGE = 63,
    CHANGE_USER_ATTACHMENT_QUOTA = 64,
    ADD_NEW_ATTACHMENT = 65,
    CHANGE_ATTACHMENT_NAME = 66,
    CHANGE_ATTACHMENT_APPROVAL = 67,
    ADD_ATTACHMENT_TO_DISCUSSION_THREAD_MESSAGE = 68,
    REMOVE_ATTACHMENT_FROM_DISCUSSION_THREAD_MESSAGE = 69,
    DELETE_ATTACHMENT = 70,
    INCREMENT_ATTACHMENT_NUMBER_OF_GETS = 71,
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type EventVersion = u16;
pub type ContextVersion = u16;

/// The only context layout in use.
pub const CONTEXT_VERSION: ContextVersion = 1;

/// EventType (u32) + EventVersion (u16) + ContextVersion (u16).
pub const EVENT_HEADER_SIZE: usize = 8;

/// Timestamp (i64) + performing user id (16) + ip address (17).
pub const CONTEXT_SIZE: usize = 8 + ForumId::SIZE + IpAddress::SIZE;

/// The smallest well-formed payload: header plus context, no event data.
pub const MIN_PAYLOAD_SIZE: usize = EVENT_HEADER_SIZE + CONTEXT_SIZE;

/// Who did what, when, from where. Prefixed to every event payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub timestamp: Timestamp,
    pub performed_by: ForumId,
    pub ip: IpAddress,
}

impl EventContext {
    /// Used for events not caused by a request, e.g. coalesced visit
    /// counters emitted by the timer thread.
    pub const EMPTY: Self = Self {
        timestamp: Timestamp::ZERO,
        performed_by: ForumId::ZERO,
        ip: IpAddress::ZERO,
    };

    pub fn write_to(&self, writer: &mut BlobWriter) {
        writer.write_i64(self.timestamp.as_secs());
        writer.write_id(self.performed_by);
        writer.write_ip(self.ip);
    }

    pub fn read_from(reader: &mut BlobReader<'_>) -> WireResult<Self> {
        Ok(Self {
            timestamp: Timestamp::from_secs(reader.read_i64()?),
            performed_by: reader.read_id()?,
            ip: reader.read_ip()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn stable_ordinals() {
        assert_eq!(EventType::ADD_NEW_USER.0, 1);
        assert_eq!(EventType::SOLVE_DISCUSSION_THREAD_MESSAGE_COMMENT.0, 24);
        assert_eq!(EventType::MERGE_DISCUSSION_TAGS.0, 31);
        assert_eq!(EventType::ASSIGN_FORUM_WIDE_PRIVILEGE.0, 57);
        assert_eq!(EventType::INCREMENT_ATTACHMENT_NUMBER_OF_GETS.0, 71);
    }

    #[test_log::test]
    fn header_and_context_sizes() {
        assert_eq!(EVENT_HEADER_SIZE, 8);
        assert_eq!(CONTEXT_SIZE, 41);
        assert_eq!(MIN_PAYLOAD_SIZE, 49);
    }

    #[test_log::test]
    fn context_round_trip() {
        let ctx = EventContext {
            timestamp: Timestamp::from_secs(1_500_000_000),
            performed_by: ForumId::generate(),
            ip: "10.20.30.40".parse().expect("valid address"),
        };
        let mut writer = BlobWriter::with_capacity(CONTEXT_SIZE);
        ctx.write_to(&mut writer);
        let bytes = writer.into_vec();
        assert_eq!(bytes.len(), CONTEXT_SIZE);

        let mut reader = BlobReader::new(&bytes);
        assert_eq!(EventContext::read_from(&mut reader).expect("reads"), ctx);
        assert!(reader.is_empty());
    }
}
