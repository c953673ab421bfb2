//! Entity value types.
//!
//! Ids are minted at construction and never change. Every cross-entity
//! reference is a handle into the owning pool, never a pointer. Fields are
//! crate-private: all mutation goes through the [`EntityStore`], which is
//! what keeps every ordering index coherent around a change.
//!
//! [`EntityStore`]: crate::store::EntityStore

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use agora_core::Timestamp;
use agora_core::id::ForumId;

use crate::pool::{
    AttachmentHandle, CategoryHandle, CommentHandle, MessageHandle, PrivateMessageHandle,
    TagHandle, ThreadHandle, UserHandle,
};
use crate::sort_key::{CollatedString, SortKey};

pub mod privileges;

/// A vote received by a message author, kept as history on the user.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReceivedVote {
    pub voter: ForumId,
    pub at: Timestamp,
    pub up: bool,
}

pub struct User {
    pub(crate) id: ForumId,
    pub(crate) name: CollatedString,
    pub(crate) auth: String,
    pub(crate) info: String,
    pub(crate) title: String,
    pub(crate) signature: String,
    pub(crate) logo: Vec<u8>,
    pub(crate) attachment_quota: Option<u64>,
    pub(crate) created: Timestamp,
    pub(crate) last_seen: Timestamp,

    /// Owned threads, collation-ordered by name.
    pub(crate) threads: BTreeSet<(SortKey, ThreadHandle)>,
    pub(crate) thread_count: u32,
    /// Authored messages by creation time.
    pub(crate) messages: BTreeSet<(Timestamp, MessageHandle)>,
    pub(crate) message_count: u32,
    pub(crate) comments: BTreeSet<CommentHandle>,
    pub(crate) subscribed_threads: BTreeSet<ThreadHandle>,
    pub(crate) attachments: BTreeSet<AttachmentHandle>,
    /// Messages this user has voted on; the back reference that lets a
    /// user deletion retract their votes.
    pub(crate) voted_messages: HashSet<MessageHandle>,
    pub(crate) received_votes: VecDeque<ReceivedVote>,
    /// Messages in which this user was quoted.
    pub(crate) quoted_in: VecDeque<ForumId>,

    pub(crate) pm_inbox: BTreeSet<(Timestamp, PrivateMessageHandle)>,
    pub(crate) pm_outbox: BTreeSet<(Timestamp, PrivateMessageHandle)>,
    pub(crate) unread_private_messages: u32,
}

impl User {
    pub(crate) fn new(id: ForumId, name: CollatedString, auth: String, created: Timestamp) -> Self {
        Self {
            id,
            name,
            auth,
            info: String::new(),
            title: String::new(),
            signature: String::new(),
            logo: Vec::new(),
            attachment_quota: None,
            created,
            last_seen: created,
            threads: BTreeSet::new(),
            thread_count: 0,
            messages: BTreeSet::new(),
            message_count: 0,
            comments: BTreeSet::new(),
            subscribed_threads: BTreeSet::new(),
            attachments: BTreeSet::new(),
            voted_messages: HashSet::new(),
            received_votes: VecDeque::new(),
            quoted_in: VecDeque::new(),
            pm_inbox: BTreeSet::new(),
            pm_outbox: BTreeSet::new(),
            unread_private_messages: 0,
        }
    }

    pub fn id(&self) -> ForumId {
        self.id
    }
    pub fn name(&self) -> &CollatedString {
        &self.name
    }
    pub fn auth(&self) -> &str {
        &self.auth
    }
    pub fn info(&self) -> &str {
        &self.info
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn signature(&self) -> &str {
        &self.signature
    }
    pub fn logo(&self) -> &[u8] {
        &self.logo
    }
    pub fn attachment_quota(&self) -> Option<u64> {
        self.attachment_quota
    }
    pub fn created(&self) -> Timestamp {
        self.created
    }
    pub fn last_seen(&self) -> Timestamp {
        self.last_seen
    }
    pub fn thread_count(&self) -> u32 {
        self.thread_count
    }
    pub fn message_count(&self) -> u32 {
        self.message_count
    }
    pub fn threads(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.threads.iter().map(|(_, h)| *h)
    }
    pub fn messages(&self) -> impl Iterator<Item = MessageHandle> + '_ {
        self.messages.iter().map(|(_, h)| *h)
    }
    pub fn subscribed_threads(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.subscribed_threads.iter().copied()
    }
    pub fn received_votes(&self) -> impl Iterator<Item = &ReceivedVote> {
        self.received_votes.iter()
    }
    pub fn quoted_in(&self) -> impl Iterator<Item = ForumId> + '_ {
        self.quoted_in.iter().copied()
    }
    pub fn unread_private_messages(&self) -> u32 {
        self.unread_private_messages
    }
    pub fn pm_inbox(&self) -> impl Iterator<Item = PrivateMessageHandle> + '_ {
        self.pm_inbox.iter().map(|(_, h)| *h)
    }
    pub fn pm_outbox(&self) -> impl Iterator<Item = PrivateMessageHandle> + '_ {
        self.pm_outbox.iter().map(|(_, h)| *h)
    }
}

pub struct Thread {
    pub(crate) id: ForumId,
    pub(crate) name: CollatedString,
    pub(crate) created: Timestamp,
    pub(crate) created_by: UserHandle,
    pub(crate) last_updated: Timestamp,
    pub(crate) latest_message_created: Timestamp,
    pub(crate) approved: bool,
    /// 0 = not pinned; higher values list earlier.
    pub(crate) pin_display_order: u16,
    pub(crate) visit_count: u64,
    pub(crate) visitors_since_last_edit: HashSet<ForumId>,
    pub(crate) subscribers: BTreeSet<UserHandle>,
    /// Contained messages by creation time.
    pub(crate) messages: BTreeSet<(Timestamp, MessageHandle)>,
    pub(crate) message_count: u32,
    pub(crate) tags: BTreeSet<TagHandle>,
    pub(crate) categories: BTreeSet<CategoryHandle>,
}

impl Thread {
    pub(crate) fn new(
        id: ForumId,
        name: CollatedString,
        created_by: UserHandle,
        created: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            created,
            created_by,
            last_updated: created,
            latest_message_created: Timestamp::ZERO,
            approved: true,
            pin_display_order: 0,
            visit_count: 0,
            visitors_since_last_edit: HashSet::new(),
            subscribers: BTreeSet::new(),
            messages: BTreeSet::new(),
            message_count: 0,
            tags: BTreeSet::new(),
            categories: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> ForumId {
        self.id
    }
    pub fn name(&self) -> &CollatedString {
        &self.name
    }
    pub fn created(&self) -> Timestamp {
        self.created
    }
    pub fn created_by(&self) -> UserHandle {
        self.created_by
    }
    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }
    pub fn latest_message_created(&self) -> Timestamp {
        self.latest_message_created
    }
    pub fn approved(&self) -> bool {
        self.approved
    }
    pub fn pin_display_order(&self) -> u16 {
        self.pin_display_order
    }
    pub fn visit_count(&self) -> u64 {
        self.visit_count
    }
    pub fn message_count(&self) -> u32 {
        self.message_count
    }
    pub fn messages(&self) -> impl Iterator<Item = MessageHandle> + '_ {
        self.messages.iter().map(|(_, h)| *h)
    }
    pub fn subscribers(&self) -> impl Iterator<Item = UserHandle> + '_ {
        self.subscribers.iter().copied()
    }
    pub fn tags(&self) -> impl Iterator<Item = TagHandle> + '_ {
        self.tags.iter().copied()
    }
    pub fn categories(&self) -> impl Iterator<Item = CategoryHandle> + '_ {
        self.categories.iter().copied()
    }
}

/// Message body; historical content may live in the shared read-only map
/// instead of owned memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageContent {
    Owned(String),
    /// A span into the store's memory-mapped historical content file.
    Mapped { offset: u64, len: u32 },
}

pub struct Message {
    pub(crate) id: ForumId,
    pub(crate) created: Timestamp,
    pub(crate) created_by: UserHandle,
    pub(crate) parent_thread: ThreadHandle,
    pub(crate) content: MessageContent,
    pub(crate) last_updated: Option<Timestamp>,
    pub(crate) last_updated_reason: String,
    pub(crate) approved: bool,
    pub(crate) up_votes: HashMap<UserHandle, Timestamp>,
    pub(crate) down_votes: HashMap<UserHandle, Timestamp>,
    pub(crate) comments: BTreeSet<(Timestamp, CommentHandle)>,
    pub(crate) solved_comment_count: u32,
    pub(crate) attachments: BTreeSet<AttachmentHandle>,
}

impl Message {
    pub(crate) fn new(
        id: ForumId,
        parent_thread: ThreadHandle,
        created_by: UserHandle,
        content: MessageContent,
        created: Timestamp,
    ) -> Self {
        Self {
            id,
            created,
            created_by,
            parent_thread,
            content,
            last_updated: None,
            last_updated_reason: String::new(),
            approved: true,
            up_votes: HashMap::new(),
            down_votes: HashMap::new(),
            comments: BTreeSet::new(),
            solved_comment_count: 0,
            attachments: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> ForumId {
        self.id
    }
    pub fn created(&self) -> Timestamp {
        self.created
    }
    pub fn created_by(&self) -> UserHandle {
        self.created_by
    }
    pub fn parent_thread(&self) -> ThreadHandle {
        self.parent_thread
    }
    pub fn content(&self) -> &MessageContent {
        &self.content
    }
    pub fn last_updated(&self) -> Option<Timestamp> {
        self.last_updated
    }
    pub fn last_updated_reason(&self) -> &str {
        &self.last_updated_reason
    }
    pub fn approved(&self) -> bool {
        self.approved
    }
    pub fn up_vote_count(&self) -> usize {
        self.up_votes.len()
    }
    pub fn down_vote_count(&self) -> usize {
        self.down_votes.len()
    }
    pub fn comments(&self) -> impl Iterator<Item = CommentHandle> + '_ {
        self.comments.iter().map(|(_, h)| *h)
    }
    pub fn solved_comment_count(&self) -> u32 {
        self.solved_comment_count
    }
    pub fn attachments(&self) -> impl Iterator<Item = AttachmentHandle> + '_ {
        self.attachments.iter().copied()
    }
}

pub struct Comment {
    pub(crate) id: ForumId,
    pub(crate) created: Timestamp,
    pub(crate) created_by: UserHandle,
    pub(crate) message: MessageHandle,
    pub(crate) content: String,
    pub(crate) solved: bool,
}

impl Comment {
    pub(crate) fn new(
        id: ForumId,
        message: MessageHandle,
        created_by: UserHandle,
        content: String,
        created: Timestamp,
    ) -> Self {
        Self {
            id,
            created,
            created_by,
            message,
            content,
            solved: false,
        }
    }

    pub fn id(&self) -> ForumId {
        self.id
    }
    pub fn created(&self) -> Timestamp {
        self.created
    }
    pub fn created_by(&self) -> UserHandle {
        self.created_by
    }
    pub fn message(&self) -> MessageHandle {
        self.message
    }
    pub fn content(&self) -> &str {
        &self.content
    }
    pub fn solved(&self) -> bool {
        self.solved
    }
}

pub struct Tag {
    pub(crate) id: ForumId,
    pub(crate) name: CollatedString,
    pub(crate) created: Timestamp,
    pub(crate) ui_blob: Vec<u8>,
    pub(crate) threads: BTreeSet<(SortKey, ThreadHandle)>,
    pub(crate) thread_count: u32,
    pub(crate) message_count: u32,
    pub(crate) categories: BTreeSet<CategoryHandle>,
}

impl Tag {
    pub(crate) fn new(id: ForumId, name: CollatedString, created: Timestamp) -> Self {
        Self {
            id,
            name,
            created,
            ui_blob: Vec::new(),
            threads: BTreeSet::new(),
            thread_count: 0,
            message_count: 0,
            categories: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> ForumId {
        self.id
    }
    pub fn name(&self) -> &CollatedString {
        &self.name
    }
    pub fn created(&self) -> Timestamp {
        self.created
    }
    pub fn ui_blob(&self) -> &[u8] {
        &self.ui_blob
    }
    pub fn thread_count(&self) -> u32 {
        self.thread_count
    }
    pub fn message_count(&self) -> u32 {
        self.message_count
    }
    pub fn threads(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.threads.iter().map(|(_, h)| *h)
    }
    pub fn categories(&self) -> impl Iterator<Item = CategoryHandle> + '_ {
        self.categories.iter().copied()
    }
}

pub struct Category {
    pub(crate) id: ForumId,
    pub(crate) name: CollatedString,
    pub(crate) description: String,
    pub(crate) created: Timestamp,
    pub(crate) display_order: u16,
    pub(crate) parent: Option<CategoryHandle>,
    pub(crate) children: BTreeSet<CategoryHandle>,
    pub(crate) tags: BTreeSet<TagHandle>,
    pub(crate) threads: BTreeSet<(SortKey, ThreadHandle)>,
    pub(crate) thread_count: u32,
    pub(crate) message_count: u32,
}

impl Category {
    pub(crate) fn new(
        id: ForumId,
        name: CollatedString,
        parent: Option<CategoryHandle>,
        created: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            description: String::new(),
            created,
            display_order: 0,
            parent,
            children: BTreeSet::new(),
            tags: BTreeSet::new(),
            threads: BTreeSet::new(),
            thread_count: 0,
            message_count: 0,
        }
    }

    pub fn id(&self) -> ForumId {
        self.id
    }
    pub fn name(&self) -> &CollatedString {
        &self.name
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn created(&self) -> Timestamp {
        self.created
    }
    pub fn display_order(&self) -> u16 {
        self.display_order
    }
    pub fn parent(&self) -> Option<CategoryHandle> {
        self.parent
    }
    pub fn children(&self) -> impl Iterator<Item = CategoryHandle> + '_ {
        self.children.iter().copied()
    }
    pub fn tags(&self) -> impl Iterator<Item = TagHandle> + '_ {
        self.tags.iter().copied()
    }
    pub fn threads(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.threads.iter().map(|(_, h)| *h)
    }
    pub fn thread_count(&self) -> u32 {
        self.thread_count
    }
    pub fn message_count(&self) -> u32 {
        self.message_count
    }
}

pub struct PrivateMessage {
    pub(crate) id: ForumId,
    pub(crate) created: Timestamp,
    pub(crate) source: UserHandle,
    pub(crate) destination: UserHandle,
    pub(crate) content: String,
}

impl PrivateMessage {
    pub(crate) fn new(
        id: ForumId,
        source: UserHandle,
        destination: UserHandle,
        content: String,
        created: Timestamp,
    ) -> Self {
        Self {
            id,
            created,
            source,
            destination,
            content,
        }
    }

    pub fn id(&self) -> ForumId {
        self.id
    }
    pub fn created(&self) -> Timestamp {
        self.created
    }
    pub fn source(&self) -> UserHandle {
        self.source
    }
    pub fn destination(&self) -> UserHandle {
        self.destination
    }
    pub fn content(&self) -> &str {
        &self.content
    }
}

pub struct Attachment {
    pub(crate) id: ForumId,
    pub(crate) name: CollatedString,
    pub(crate) created: Timestamp,
    pub(crate) created_by: UserHandle,
    pub(crate) size: u64,
    pub(crate) approved: bool,
    pub(crate) nr_of_gets: u64,
    pub(crate) messages: BTreeSet<MessageHandle>,
}

impl Attachment {
    pub(crate) fn new(
        id: ForumId,
        name: CollatedString,
        created_by: UserHandle,
        size: u64,
        created: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            created,
            created_by,
            size,
            approved: true,
            nr_of_gets: 0,
            messages: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> ForumId {
        self.id
    }
    pub fn name(&self) -> &CollatedString {
        &self.name
    }
    pub fn created(&self) -> Timestamp {
        self.created
    }
    pub fn created_by(&self) -> UserHandle {
        self.created_by
    }
    pub fn size(&self) -> u64 {
        self.size
    }
    pub fn approved(&self) -> bool {
        self.approved
    }
    pub fn nr_of_gets(&self) -> u64 {
        self.nr_of_gets
    }
    pub fn messages(&self) -> impl Iterator<Item = MessageHandle> + '_ {
        self.messages.iter().copied()
    }
}
