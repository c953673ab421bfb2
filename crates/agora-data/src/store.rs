//! The entity collection root.
//!
//! Owns every pool, every index collection, the privilege stores and the
//! optional memory-mapped historical message content. All mutation goes
//! through here so that each ordering-relevant change runs its
//! prepare/commit index walk and every counter stays equal to the size of
//! the set it summarizes.
//!
//! Creation is split from index wiring (`create_*` then `insert_*`) so
//! startup replay can reconstruct entities with their original ids before
//! the orderings are rebuilt in bulk.

use std::collections::BTreeSet;

use agora_core::Timestamp;
use agora_core::id::ForumId;
use convi::ExpectInto as _;
use tracing::debug;

use crate::LOG_TARGET;
use crate::collections::{
    AttachmentCollection, CategoryCollection, CommentCollection, MessageCollection,
    PrivateMessageCollection, TagCollection, ThreadCollection, UserCollection,
};
use crate::entities::privileges::{
    GrantedPrivilegeStore, PrivilegeKind, PrivilegeTarget, RequiredPrivilegeStore,
};
use crate::entities::{
    Attachment, Category, Comment, Message, MessageContent, PrivateMessage, ReceivedVote, Tag,
    Thread, User,
};
use crate::pool::{
    AttachmentHandle, CategoryHandle, CommentHandle, MessageHandle, Pool, PrivateMessageHandle,
    TagHandle, ThreadHandle, UserHandle,
};
use crate::sort_key::CollatedString;

/// How many received-vote and quote history entries a user keeps.
const USER_HISTORY_LIMIT: usize = 64;

#[derive(Default)]
pub struct EntityStore {
    pub(crate) users: Pool<User>,
    pub(crate) threads: Pool<Thread>,
    pub(crate) messages: Pool<Message>,
    pub(crate) comments: Pool<Comment>,
    pub(crate) tags: Pool<Tag>,
    pub(crate) categories: Pool<Category>,
    pub(crate) private_messages: Pool<PrivateMessage>,
    pub(crate) attachments: Pool<Attachment>,

    pub(crate) user_index: UserCollection,
    pub(crate) thread_index: ThreadCollection,
    pub(crate) message_index: MessageCollection,
    pub(crate) comment_index: CommentCollection,
    pub(crate) tag_index: TagCollection,
    pub(crate) category_index: CategoryCollection,
    pub(crate) private_message_index: PrivateMessageCollection,
    pub(crate) attachment_index: AttachmentCollection,

    pub(crate) granted_privileges: GrantedPrivilegeStore,
    pub(crate) required_privileges: RequiredPrivilegeStore,

    message_content_map: Option<memmap2::Mmap>,
    batch_insert: bool,
}

/// Live entity counts, mostly for diagnostics and tests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntitiesCount {
    pub users: usize,
    pub threads: usize,
    pub messages: usize,
    pub comments: usize,
    pub tags: usize,
    pub categories: usize,
    pub private_messages: usize,
    pub attachments: usize,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> EntitiesCount {
        EntitiesCount {
            users: self.users.len(),
            threads: self.threads.len(),
            messages: self.messages.len(),
            comments: self.comments.len(),
            tags: self.tags.len(),
            categories: self.categories.len(),
            private_messages: self.private_messages.len(),
            attachments: self.attachments.len(),
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn user(&self, handle: UserHandle) -> Option<&User> {
        self.users.get(handle.index())
    }

    pub fn user_by_id(&self, id: ForumId) -> Option<(UserHandle, &User)> {
        let handle = self.user_index.get_by_id(id)?;
        Some((handle, self.users.get(handle.index())?))
    }

    pub fn thread(&self, handle: ThreadHandle) -> Option<&Thread> {
        self.threads.get(handle.index())
    }

    pub fn thread_by_id(&self, id: ForumId) -> Option<(ThreadHandle, &Thread)> {
        let handle = self.thread_index.get_by_id(id)?;
        Some((handle, self.threads.get(handle.index())?))
    }

    pub fn message(&self, handle: MessageHandle) -> Option<&Message> {
        self.messages.get(handle.index())
    }

    pub fn message_by_id(&self, id: ForumId) -> Option<(MessageHandle, &Message)> {
        let handle = self.message_index.get_by_id(id)?;
        Some((handle, self.messages.get(handle.index())?))
    }

    pub fn comment(&self, handle: CommentHandle) -> Option<&Comment> {
        self.comments.get(handle.index())
    }

    pub fn comment_by_id(&self, id: ForumId) -> Option<(CommentHandle, &Comment)> {
        let handle = self.comment_index.get_by_id(id)?;
        Some((handle, self.comments.get(handle.index())?))
    }

    pub fn tag(&self, handle: TagHandle) -> Option<&Tag> {
        self.tags.get(handle.index())
    }

    pub fn tag_by_id(&self, id: ForumId) -> Option<(TagHandle, &Tag)> {
        let handle = self.tag_index.get_by_id(id)?;
        Some((handle, self.tags.get(handle.index())?))
    }

    pub fn category(&self, handle: CategoryHandle) -> Option<&Category> {
        self.categories.get(handle.index())
    }

    pub fn category_by_id(&self, id: ForumId) -> Option<(CategoryHandle, &Category)> {
        let handle = self.category_index.get_by_id(id)?;
        Some((handle, self.categories.get(handle.index())?))
    }

    pub fn private_message(&self, handle: PrivateMessageHandle) -> Option<&PrivateMessage> {
        self.private_messages.get(handle.index())
    }

    pub fn private_message_by_id(
        &self,
        id: ForumId,
    ) -> Option<(PrivateMessageHandle, &PrivateMessage)> {
        let handle = self.private_message_index.get_by_id(id)?;
        Some((handle, self.private_messages.get(handle.index())?))
    }

    pub fn attachment(&self, handle: AttachmentHandle) -> Option<&Attachment> {
        self.attachments.get(handle.index())
    }

    pub fn attachment_by_id(&self, id: ForumId) -> Option<(AttachmentHandle, &Attachment)> {
        let handle = self.attachment_index.get_by_id(id)?;
        Some((handle, self.attachments.get(handle.index())?))
    }

    pub fn user_collection(&self) -> &UserCollection {
        &self.user_index
    }

    pub fn thread_collection(&self) -> &ThreadCollection {
        &self.thread_index
    }

    pub fn message_collection(&self) -> &MessageCollection {
        &self.message_index
    }

    pub fn tag_collection(&self) -> &TagCollection {
        &self.tag_index
    }

    pub fn category_collection(&self) -> &CategoryCollection {
        &self.category_index
    }

    pub fn attachment_collection(&self) -> &AttachmentCollection {
        &self.attachment_index
    }

    pub fn granted_privileges(&self) -> &GrantedPrivilegeStore {
        &self.granted_privileges
    }

    pub fn required_privileges(&self) -> &RequiredPrivilegeStore {
        &self.required_privileges
    }

    // ------------------------------------------------------------------
    // Historical message content map
    // ------------------------------------------------------------------

    pub fn attach_message_content_map(&mut self, map: memmap2::Mmap) {
        self.message_content_map = Some(map);
    }

    /// Resolves a message body, following mapped spans into the shared
    /// read-only region.
    pub fn message_content_str<'a>(&'a self, message: &'a Message) -> Option<&'a str> {
        match &message.content {
            MessageContent::Owned(s) => Some(s),
            MessageContent::Mapped { offset, len } => {
                let map = self.message_content_map.as_ref()?;
                let start = usize::try_from(*offset).ok()?;
                let end = start.checked_add(*len as usize)?;
                std::str::from_utf8(map.get(start..end)?).ok()
            }
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn create_user(
        &mut self,
        id: ForumId,
        name: CollatedString,
        auth: String,
        at: Timestamp,
    ) -> UserHandle {
        UserHandle::from(self.users.add(User::new(id, name, auth, at)))
    }

    pub fn insert_user(&mut self, handle: UserHandle) {
        let user = self.users.get(handle.index()).expect("Live handle");
        if self.batch_insert {
            self.user_index.insert_primary_only(handle, user);
        } else {
            self.user_index.insert(handle, user);
        }
    }

    pub fn change_user_name(&mut self, handle: UserHandle, name: CollatedString) {
        if !self.batch_insert {
            let user = self.users.get(handle.index()).expect("Live handle");
            self.user_index.prepare_update_name(user);
        }
        let user = self.users.get_mut(handle.index()).expect("Live handle");
        user.name = name;
        if !self.batch_insert {
            let user = self.users.get(handle.index()).expect("Live handle");
            self.user_index.commit_update_name(handle, user);
        }
    }

    pub fn change_user_info(&mut self, handle: UserHandle, info: String) {
        self.users.get_mut(handle.index()).expect("Live handle").info = info;
    }

    pub fn change_user_title(&mut self, handle: UserHandle, title: String) {
        self.users.get_mut(handle.index()).expect("Live handle").title = title;
    }

    pub fn change_user_signature(&mut self, handle: UserHandle, signature: String) {
        self.users
            .get_mut(handle.index())
            .expect("Live handle")
            .signature = signature;
    }

    pub fn change_user_logo(&mut self, handle: UserHandle, logo: Vec<u8>) {
        self.users.get_mut(handle.index()).expect("Live handle").logo = logo;
    }

    pub fn change_user_attachment_quota(&mut self, handle: UserHandle, quota: Option<u64>) {
        self.users
            .get_mut(handle.index())
            .expect("Live handle")
            .attachment_quota = quota;
    }

    pub fn update_user_last_seen(&mut self, handle: UserHandle, at: Timestamp) {
        if !self.batch_insert {
            let user = self.users.get(handle.index()).expect("Live handle");
            self.user_index.prepare_update_last_seen(handle, user);
        }
        self.users
            .get_mut(handle.index())
            .expect("Live handle")
            .last_seen = at;
        if !self.batch_insert {
            let user = self.users.get(handle.index()).expect("Live handle");
            self.user_index.commit_update_last_seen(handle, user);
        }
    }

    fn bump_user_thread_count(&mut self, handle: UserHandle, delta: i64) {
        if !self.batch_insert {
            let user = self.users.get(handle.index()).expect("Live handle");
            self.user_index.prepare_update_thread_count(handle, user);
        }
        let user = self.users.get_mut(handle.index()).expect("Live handle");
        user.thread_count = apply_delta(user.thread_count, delta);
        if !self.batch_insert {
            let user = self.users.get(handle.index()).expect("Live handle");
            self.user_index.commit_update_thread_count(handle, user);
        }
    }

    fn bump_user_message_count(&mut self, handle: UserHandle, delta: i64) {
        if !self.batch_insert {
            let user = self.users.get(handle.index()).expect("Live handle");
            self.user_index.prepare_update_message_count(handle, user);
        }
        let user = self.users.get_mut(handle.index()).expect("Live handle");
        user.message_count = apply_delta(user.message_count, delta);
        if !self.batch_insert {
            let user = self.users.get(handle.index()).expect("Live handle");
            self.user_index.commit_update_message_count(handle, user);
        }
    }

    /// Cascades per the deletion rules: retract votes, delete authored
    /// comments, drop subscriptions, delete authored messages, then
    /// authored threads, then attachments and private messages, and
    /// finally the privilege grants.
    pub fn delete_user(&mut self, handle: UserHandle) -> Box<User> {
        let user = self.users.get(handle.index()).expect("Live handle");
        let user_id = user.id;
        debug!(target: LOG_TARGET, user = %user_id, "Deleting user");

        let voted: Vec<MessageHandle> = user.voted_messages.iter().copied().collect();
        let comments: Vec<CommentHandle> = user.comments.iter().copied().collect();
        let subscribed: Vec<ThreadHandle> = user.subscribed_threads.iter().copied().collect();
        let messages: Vec<MessageHandle> = user.messages.iter().map(|(_, h)| *h).collect();
        let threads: Vec<ThreadHandle> = user.threads.iter().map(|(_, h)| *h).collect();
        let attachments: Vec<AttachmentHandle> = user.attachments.iter().copied().collect();
        let pms: BTreeSet<PrivateMessageHandle> = user
            .pm_inbox
            .iter()
            .chain(user.pm_outbox.iter())
            .map(|(_, h)| *h)
            .collect();

        for message in voted {
            self.retract_vote(message, handle);
        }
        for comment in comments {
            self.delete_comment_inner(comment, true);
        }
        for thread in subscribed {
            if let Some(thread) = self.threads.get_mut(thread.index()) {
                thread.subscribers.remove(&handle);
            }
        }
        for message in messages {
            self.delete_message_inner(message, CascadeSource::User);
        }
        for thread in threads {
            self.delete_thread_inner(thread, true);
        }
        for attachment in attachments {
            self.delete_attachment_inner(attachment, true);
        }
        for pm in pms {
            self.delete_private_message_inner(pm, Some(handle));
        }
        self.granted_privileges.remove_for_user(user_id);

        let user = self.users.get(handle.index()).expect("Live handle");
        self.user_index.erase(handle, user);
        self.users.remove(handle.index()).expect("Live handle")
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    pub fn create_thread(
        &mut self,
        id: ForumId,
        name: CollatedString,
        created_by: UserHandle,
        at: Timestamp,
    ) -> ThreadHandle {
        ThreadHandle::from(self.threads.add(Thread::new(id, name, created_by, at)))
    }

    pub fn insert_thread(&mut self, handle: ThreadHandle) {
        let thread = self.threads.get(handle.index()).expect("Live handle");
        let creator = thread.created_by;
        let key = thread.name.key().clone();
        if self.batch_insert {
            self.thread_index.insert_primary_only(handle, thread);
        } else {
            self.thread_index.insert(handle, thread);
        }
        self.users
            .get_mut(creator.index())
            .expect("Live handle")
            .threads
            .insert((key, handle));
        self.bump_user_thread_count(creator, 1);
    }

    /// Renames the thread everywhere its name participates in an ordering:
    /// the main name index, the creator's thread list and every tag and
    /// category thread set.
    pub fn change_thread_name(&mut self, handle: ThreadHandle, name: CollatedString) {
        let thread = self.threads.get(handle.index()).expect("Live handle");
        let old_key = thread.name.key().clone();
        let new_key = name.key().clone();
        let creator = thread.created_by;
        let tags: Vec<TagHandle> = thread.tags.iter().copied().collect();
        let categories: Vec<CategoryHandle> = thread.categories.iter().copied().collect();

        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index.prepare_update_name(thread);
        }
        self.users
            .get_mut(creator.index())
            .expect("Live handle")
            .threads
            .remove(&(old_key.clone(), handle));
        for tag in &tags {
            self.tags
                .get_mut(tag.index())
                .expect("Live handle")
                .threads
                .remove(&(old_key.clone(), handle));
        }
        for category in &categories {
            self.categories
                .get_mut(category.index())
                .expect("Live handle")
                .threads
                .remove(&(old_key.clone(), handle));
        }

        let thread = self.threads.get_mut(handle.index()).expect("Live handle");
        thread.name = name;
        thread.visitors_since_last_edit.clear();

        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index.commit_update_name(handle, thread);
        }
        self.users
            .get_mut(creator.index())
            .expect("Live handle")
            .threads
            .insert((new_key.clone(), handle));
        for tag in &tags {
            self.tags
                .get_mut(tag.index())
                .expect("Live handle")
                .threads
                .insert((new_key.clone(), handle));
        }
        for category in &categories {
            self.categories
                .get_mut(category.index())
                .expect("Live handle")
                .threads
                .insert((new_key.clone(), handle));
        }
    }

    pub fn change_thread_pin_display_order(&mut self, handle: ThreadHandle, order: u16) {
        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index.prepare_update_pin_display_order(handle, thread);
        }
        self.threads
            .get_mut(handle.index())
            .expect("Live handle")
            .pin_display_order = order;
        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index.commit_update_pin_display_order(handle, thread);
        }
    }

    pub fn change_thread_approval(&mut self, handle: ThreadHandle, approved: bool) {
        self.threads
            .get_mut(handle.index())
            .expect("Live handle")
            .approved = approved;
    }

    pub fn note_thread_updated(&mut self, handle: ThreadHandle, at: Timestamp) {
        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index.prepare_update_last_updated(handle, thread);
        }
        self.threads
            .get_mut(handle.index())
            .expect("Live handle")
            .last_updated = at;
        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index.commit_update_last_updated(handle, thread);
        }
    }

    fn set_thread_latest_message_created(&mut self, handle: ThreadHandle, at: Timestamp) {
        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index
                .prepare_update_latest_message_created(handle, thread);
        }
        self.threads
            .get_mut(handle.index())
            .expect("Live handle")
            .latest_message_created = at;
        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index
                .commit_update_latest_message_created(handle, thread);
        }
    }

    fn bump_thread_message_count(&mut self, handle: ThreadHandle, delta: i64) {
        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index.prepare_update_message_count(handle, thread);
        }
        let thread = self.threads.get_mut(handle.index()).expect("Live handle");
        thread.message_count = apply_delta(thread.message_count, delta);
        if !self.batch_insert {
            let thread = self.threads.get(handle.index()).expect("Live handle");
            self.thread_index.commit_update_message_count(handle, thread);
        }
    }

    /// Visit-count side effect of a thread read; `visitor` is tracked in
    /// the visitors-since-last-edit set up to the configured cap.
    pub fn note_thread_visited(&mut self, handle: ThreadHandle, visitor: ForumId, count: u64) {
        let cap = agora_core::config::global()
            .discussion_thread
            .max_users_in_visited_since_last_change;
        let Some(thread) = self.threads.get_mut(handle.index()) else {
            return;
        };
        thread.visit_count += count;
        if !visitor.is_zero() && thread.visitors_since_last_edit.len() < cap {
            thread.visitors_since_last_edit.insert(visitor);
        }
    }

    /// Returns false when the subscription already existed.
    pub fn subscribe_to_thread(&mut self, user: UserHandle, thread: ThreadHandle) -> bool {
        let newly = self
            .users
            .get_mut(user.index())
            .expect("Live handle")
            .subscribed_threads
            .insert(thread);
        self.threads
            .get_mut(thread.index())
            .expect("Live handle")
            .subscribers
            .insert(user);
        newly
    }

    pub fn unsubscribe_from_thread(&mut self, user: UserHandle, thread: ThreadHandle) -> bool {
        let removed = self
            .users
            .get_mut(user.index())
            .expect("Live handle")
            .subscribed_threads
            .remove(&thread);
        self.threads
            .get_mut(thread.index())
            .expect("Live handle")
            .subscribers
            .remove(&user);
        removed
    }

    pub fn delete_thread(&mut self, handle: ThreadHandle) -> Box<Thread> {
        self.delete_thread_inner(handle, false)
    }

    fn delete_thread_inner(&mut self, handle: ThreadHandle, skip_creator: bool) -> Box<Thread> {
        let thread = self.threads.get(handle.index()).expect("Live handle");
        debug!(target: LOG_TARGET, thread = %thread.id, "Deleting thread");
        let key = thread.name.key().clone();
        let creator = thread.created_by;
        let messages: Vec<MessageHandle> = thread.messages.iter().map(|(_, h)| *h).collect();
        let message_count = thread.message_count;
        let subscribers: Vec<UserHandle> = thread.subscribers.iter().copied().collect();
        let tags: Vec<TagHandle> = thread.tags.iter().copied().collect();
        let categories: Vec<CategoryHandle> = thread.categories.iter().copied().collect();

        // Contained messages go first; their tag/category/thread counter
        // upkeep is handled wholesale below.
        for message in messages {
            self.delete_message_inner(message, CascadeSource::Thread);
        }

        for tag in tags {
            let tag_entity = self.tags.get_mut(tag.index()).expect("Live handle");
            tag_entity.threads.remove(&(key.clone(), handle));
            self.bump_tag_thread_count(tag, -1);
            self.bump_tag_message_count(tag, -i64::from(message_count));
        }
        for category in categories {
            let category_entity = self
                .categories
                .get_mut(category.index())
                .expect("Live handle");
            category_entity.threads.remove(&(key.clone(), handle));
            self.bump_category_counts(category, -1, -i64::from(message_count));
        }
        for subscriber in subscribers {
            if let Some(user) = self.users.get_mut(subscriber.index()) {
                user.subscribed_threads.remove(&handle);
            }
        }
        if !skip_creator {
            self.users
                .get_mut(creator.index())
                .expect("Live handle")
                .threads
                .remove(&(key, handle));
            self.bump_user_thread_count(creator, -1);
        }

        let thread = self.threads.get(handle.index()).expect("Live handle");
        self.thread_index.erase(handle, thread);
        self.threads.remove(handle.index()).expect("Live handle")
    }

    /// Moves every message of `from` into `into`, unions the subscriber
    /// and tag associations (category links follow the tags), then
    /// deletes `from` without re-deleting its (now moved) messages.
    pub fn merge_threads(&mut self, from: ThreadHandle, into: ThreadHandle, at: Timestamp) {
        let from_thread = self.threads.get(from.index()).expect("Live handle");
        debug!(
            target: LOG_TARGET,
            from = %from_thread.id,
            "Merging threads"
        );
        let messages: Vec<MessageHandle> = from_thread.messages.iter().map(|(_, h)| *h).collect();
        let subscribers: Vec<UserHandle> = from_thread.subscribers.iter().copied().collect();
        let tags: Vec<TagHandle> = from_thread.tags.iter().copied().collect();

        // Tags first: the per-tag message counters stay exact while the
        // per-message moves below shift them from one thread to the other.
        for tag in tags {
            self.add_tag_to_thread(tag, into);
        }
        for message in messages {
            self.move_message(message, into, at);
        }
        for subscriber in subscribers {
            let user = self.users.get_mut(subscriber.index()).expect("Live handle");
            user.subscribed_threads.remove(&from);
            if user.subscribed_threads.insert(into) {
                self.threads
                    .get_mut(into.index())
                    .expect("Live handle")
                    .subscribers
                    .insert(subscriber);
            }
        }
        self.note_thread_updated(into, at);
        self.delete_thread(from);
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub fn create_message(
        &mut self,
        id: ForumId,
        thread: ThreadHandle,
        created_by: UserHandle,
        content: MessageContent,
        at: Timestamp,
    ) -> MessageHandle {
        MessageHandle::from(
            self.messages
                .add(Message::new(id, thread, created_by, content, at)),
        )
    }

    pub fn insert_message(&mut self, handle: MessageHandle) {
        let message = self.messages.get(handle.index()).expect("Live handle");
        let thread = message.parent_thread;
        let author = message.created_by;
        let created = message.created;
        if self.batch_insert {
            self.message_index.insert_primary_only(handle, message);
        } else {
            self.message_index.insert(handle, message);
        }

        self.threads
            .get_mut(thread.index())
            .expect("Live handle")
            .messages
            .insert((created, handle));
        self.bump_thread_message_count(thread, 1);
        let latest = self.threads.get(thread.index()).expect("Live handle");
        if latest.latest_message_created < created {
            self.set_thread_latest_message_created(thread, created);
        }
        self.note_thread_updated(thread, created);
        self.threads
            .get_mut(thread.index())
            .expect("Live handle")
            .visitors_since_last_edit
            .clear();

        self.users
            .get_mut(author.index())
            .expect("Live handle")
            .messages
            .insert((created, handle));
        self.bump_user_message_count(author, 1);

        let tags: Vec<TagHandle> = self
            .threads
            .get(thread.index())
            .expect("Live handle")
            .tags
            .iter()
            .copied()
            .collect();
        for tag in tags {
            self.bump_tag_message_count(tag, 1);
        }
        let categories: Vec<CategoryHandle> = self
            .threads
            .get(thread.index())
            .expect("Live handle")
            .categories
            .iter()
            .copied()
            .collect();
        for category in categories {
            self.bump_category_counts(category, 0, 1);
        }
    }

    pub fn change_message_content(
        &mut self,
        handle: MessageHandle,
        content: MessageContent,
        reason: String,
        at: Timestamp,
    ) {
        let message = self.messages.get_mut(handle.index()).expect("Live handle");
        message.content = content;
        message.last_updated = Some(at);
        message.last_updated_reason = reason;
        let thread = message.parent_thread;
        self.note_thread_updated(thread, at);
    }

    pub fn change_message_approval(&mut self, handle: MessageHandle, approved: bool) {
        self.messages
            .get_mut(handle.index())
            .expect("Live handle")
            .approved = approved;
    }

    fn move_message_into_thread(&mut self, handle: MessageHandle, into: ThreadHandle) {
        let message = self.messages.get(handle.index()).expect("Live handle");
        let from = message.parent_thread;
        let created = message.created;
        if from == into {
            return;
        }

        self.threads
            .get_mut(from.index())
            .expect("Live handle")
            .messages
            .remove(&(created, handle));
        self.bump_thread_message_count(from, -1);
        self.recompute_thread_latest_message(from);

        self.messages
            .get_mut(handle.index())
            .expect("Live handle")
            .parent_thread = into;
        self.threads
            .get_mut(into.index())
            .expect("Live handle")
            .messages
            .insert((created, handle));
        self.bump_thread_message_count(into, 1);
        let into_thread = self.threads.get(into.index()).expect("Live handle");
        if into_thread.latest_message_created < created {
            self.set_thread_latest_message_created(into, created);
        }
    }

    /// Moving between threads also shifts the per-tag and per-category
    /// message counters of both sides.
    pub fn move_message(&mut self, handle: MessageHandle, into: ThreadHandle, at: Timestamp) {
        let message = self.messages.get(handle.index()).expect("Live handle");
        let from = message.parent_thread;
        if from == into {
            return;
        }

        let from_tags: Vec<TagHandle> = self
            .threads
            .get(from.index())
            .expect("Live handle")
            .tags
            .iter()
            .copied()
            .collect();
        for tag in from_tags {
            self.bump_tag_message_count(tag, -1);
        }
        let from_categories: Vec<CategoryHandle> = self
            .threads
            .get(from.index())
            .expect("Live handle")
            .categories
            .iter()
            .copied()
            .collect();
        for category in from_categories {
            self.bump_category_counts(category, 0, -1);
        }

        self.move_message_into_thread(handle, into);

        let into_tags: Vec<TagHandle> = self
            .threads
            .get(into.index())
            .expect("Live handle")
            .tags
            .iter()
            .copied()
            .collect();
        for tag in into_tags {
            self.bump_tag_message_count(tag, 1);
        }
        let into_categories: Vec<CategoryHandle> = self
            .threads
            .get(into.index())
            .expect("Live handle")
            .categories
            .iter()
            .copied()
            .collect();
        for category in into_categories {
            self.bump_category_counts(category, 0, 1);
        }
        self.note_thread_updated(from, at);
        self.note_thread_updated(into, at);
    }

    fn recompute_thread_latest_message(&mut self, handle: ThreadHandle) {
        let latest = self
            .threads
            .get(handle.index())
            .expect("Live handle")
            .messages
            .iter()
            .next_back()
            .map(|(at, _)| *at)
            .unwrap_or(Timestamp::ZERO);
        self.set_thread_latest_message_created(handle, latest);
    }

    /// Returns false when the user already voted the same way.
    pub fn vote_message(
        &mut self,
        handle: MessageHandle,
        voter: UserHandle,
        at: Timestamp,
        up: bool,
    ) -> bool {
        let voter_id = self.users.get(voter.index()).expect("Live handle").id;
        let message = self.messages.get_mut(handle.index()).expect("Live handle");
        if message.up_votes.contains_key(&voter) || message.down_votes.contains_key(&voter) {
            return false;
        }
        if up {
            message.up_votes.insert(voter, at);
        } else {
            message.down_votes.insert(voter, at);
        }
        let author = message.created_by;
        self.users
            .get_mut(voter.index())
            .expect("Live handle")
            .voted_messages
            .insert(handle);
        let author_entity = self.users.get_mut(author.index()).expect("Live handle");
        author_entity.received_votes.push_back(ReceivedVote {
            voter: voter_id,
            at,
            up,
        });
        if author_entity.received_votes.len() > USER_HISTORY_LIMIT {
            author_entity.received_votes.pop_front();
        }
        true
    }

    /// Returns the timestamp of the vote being reset, if there was one.
    pub fn reset_vote(&mut self, handle: MessageHandle, voter: UserHandle) -> Option<Timestamp> {
        let message = self.messages.get_mut(handle.index()).expect("Live handle");
        let at = message
            .up_votes
            .remove(&voter)
            .or_else(|| message.down_votes.remove(&voter))?;
        self.users
            .get_mut(voter.index())
            .expect("Live handle")
            .voted_messages
            .remove(&handle);
        Some(at)
    }

    fn retract_vote(&mut self, handle: MessageHandle, voter: UserHandle) {
        if let Some(message) = self.messages.get_mut(handle.index()) {
            message.up_votes.remove(&voter);
            message.down_votes.remove(&voter);
        }
    }

    pub fn record_quote(&mut self, quoted: UserHandle, message_id: ForumId) {
        let user = self.users.get_mut(quoted.index()).expect("Live handle");
        user.quoted_in.push_back(message_id);
        if user.quoted_in.len() > USER_HISTORY_LIMIT {
            user.quoted_in.pop_front();
        }
    }

    pub fn delete_message(&mut self, handle: MessageHandle) -> Box<Message> {
        self.delete_message_inner(handle, CascadeSource::None)
    }

    fn delete_message_inner(&mut self, handle: MessageHandle, source: CascadeSource) -> Box<Message> {
        let message = self.messages.get(handle.index()).expect("Live handle");
        let thread = message.parent_thread;
        let author = message.created_by;
        let created = message.created;
        let comments: Vec<CommentHandle> = message.comments.iter().map(|(_, h)| *h).collect();
        let voters: Vec<UserHandle> = message
            .up_votes
            .keys()
            .chain(message.down_votes.keys())
            .copied()
            .collect();
        let attachments: Vec<AttachmentHandle> = message.attachments.iter().copied().collect();

        for comment in comments {
            self.delete_comment_inner(comment, false);
        }
        for voter in voters {
            if let Some(user) = self.users.get_mut(voter.index()) {
                user.voted_messages.remove(&handle);
            }
        }
        for attachment in attachments {
            if let Some(attachment) = self.attachments.get_mut(attachment.index()) {
                attachment.messages.remove(&handle);
            }
        }

        if source != CascadeSource::Thread {
            self.threads
                .get_mut(thread.index())
                .expect("Live handle")
                .messages
                .remove(&(created, handle));
            self.bump_thread_message_count(thread, -1);
            self.recompute_thread_latest_message(thread);

            let tags: Vec<TagHandle> = self
                .threads
                .get(thread.index())
                .expect("Live handle")
                .tags
                .iter()
                .copied()
                .collect();
            for tag in tags {
                self.bump_tag_message_count(tag, -1);
            }
            let categories: Vec<CategoryHandle> = self
                .threads
                .get(thread.index())
                .expect("Live handle")
                .categories
                .iter()
                .copied()
                .collect();
            for category in categories {
                self.bump_category_counts(category, 0, -1);
            }
        }
        if source != CascadeSource::User {
            self.users
                .get_mut(author.index())
                .expect("Live handle")
                .messages
                .remove(&(created, handle));
            self.bump_user_message_count(author, -1);
        }

        let message = self.messages.get(handle.index()).expect("Live handle");
        self.message_index.erase(handle, message);
        self.messages.remove(handle.index()).expect("Live handle")
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    pub fn create_comment(
        &mut self,
        id: ForumId,
        message: MessageHandle,
        created_by: UserHandle,
        content: String,
        at: Timestamp,
    ) -> CommentHandle {
        CommentHandle::from(
            self.comments
                .add(Comment::new(id, message, created_by, content, at)),
        )
    }

    pub fn insert_comment(&mut self, handle: CommentHandle) {
        let comment = self.comments.get(handle.index()).expect("Live handle");
        let message = comment.message;
        let author = comment.created_by;
        let created = comment.created;
        if self.batch_insert {
            self.comment_index.insert_primary_only(handle, comment);
        } else {
            self.comment_index.insert(handle, comment);
        }
        self.messages
            .get_mut(message.index())
            .expect("Live handle")
            .comments
            .insert((created, handle));
        self.users
            .get_mut(author.index())
            .expect("Live handle")
            .comments
            .insert(handle);
    }

    /// One-way transition; returns false if the comment was already
    /// solved.
    pub fn solve_comment(&mut self, handle: CommentHandle) -> bool {
        let comment = self.comments.get_mut(handle.index()).expect("Live handle");
        if comment.solved {
            return false;
        }
        comment.solved = true;
        let message = comment.message;
        self.messages
            .get_mut(message.index())
            .expect("Live handle")
            .solved_comment_count += 1;
        true
    }

    fn delete_comment_inner(&mut self, handle: CommentHandle, skip_author: bool) {
        let comment = self.comments.get(handle.index()).expect("Live handle");
        let message = comment.message;
        let author = comment.created_by;
        let created = comment.created;
        let solved = comment.solved;

        if let Some(message) = self.messages.get_mut(message.index()) {
            message.comments.remove(&(created, handle));
            if solved {
                message.solved_comment_count -= 1;
            }
        }
        if !skip_author {
            if let Some(user) = self.users.get_mut(author.index()) {
                user.comments.remove(&handle);
            }
        }
        let comment = self.comments.get(handle.index()).expect("Live handle");
        self.comment_index.erase(handle, comment);
        self.comments.remove(handle.index());
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    pub fn create_tag(&mut self, id: ForumId, name: CollatedString, at: Timestamp) -> TagHandle {
        TagHandle::from(self.tags.add(Tag::new(id, name, at)))
    }

    pub fn insert_tag(&mut self, handle: TagHandle) {
        let tag = self.tags.get(handle.index()).expect("Live handle");
        if self.batch_insert {
            self.tag_index.insert_primary_only(handle, tag);
        } else {
            self.tag_index.insert(handle, tag);
        }
    }

    pub fn change_tag_name(&mut self, handle: TagHandle, name: CollatedString) {
        if !self.batch_insert {
            let tag = self.tags.get(handle.index()).expect("Live handle");
            self.tag_index.prepare_update_name(tag);
        }
        self.tags.get_mut(handle.index()).expect("Live handle").name = name;
        if !self.batch_insert {
            let tag = self.tags.get(handle.index()).expect("Live handle");
            self.tag_index.commit_update_name(handle, tag);
        }
    }

    pub fn change_tag_ui_blob(&mut self, handle: TagHandle, blob: Vec<u8>) {
        self.tags
            .get_mut(handle.index())
            .expect("Live handle")
            .ui_blob = blob;
    }

    fn bump_tag_thread_count(&mut self, handle: TagHandle, delta: i64) {
        if !self.batch_insert {
            let tag = self.tags.get(handle.index()).expect("Live handle");
            self.tag_index.prepare_update_thread_count(handle, tag);
        }
        let tag = self.tags.get_mut(handle.index()).expect("Live handle");
        tag.thread_count = apply_delta(tag.thread_count, delta);
        if !self.batch_insert {
            let tag = self.tags.get(handle.index()).expect("Live handle");
            self.tag_index.commit_update_thread_count(handle, tag);
        }
    }

    fn bump_tag_message_count(&mut self, handle: TagHandle, delta: i64) {
        if !self.batch_insert {
            let tag = self.tags.get(handle.index()).expect("Live handle");
            self.tag_index.prepare_update_message_count(handle, tag);
        }
        let tag = self.tags.get_mut(handle.index()).expect("Live handle");
        tag.message_count = apply_delta(tag.message_count, delta);
        if !self.batch_insert {
            let tag = self.tags.get(handle.index()).expect("Live handle");
            self.tag_index.commit_update_message_count(handle, tag);
        }
    }

    /// Returns false if the thread already carried the tag. Categories
    /// referencing the tag transitively gain the thread.
    pub fn add_tag_to_thread(&mut self, tag: TagHandle, thread: ThreadHandle) -> bool {
        let thread_entity = self.threads.get_mut(thread.index()).expect("Live handle");
        if !thread_entity.tags.insert(tag) {
            return false;
        }
        let key = thread_entity.name.key().clone();
        let message_count = thread_entity.message_count;

        self.tags
            .get_mut(tag.index())
            .expect("Live handle")
            .threads
            .insert((key, thread));
        self.bump_tag_thread_count(tag, 1);
        self.bump_tag_message_count(tag, i64::from(message_count));

        let categories: Vec<CategoryHandle> = self
            .tags
            .get(tag.index())
            .expect("Live handle")
            .categories
            .iter()
            .copied()
            .collect();
        for category in categories {
            self.link_thread_to_category(category, thread);
        }
        true
    }

    /// Returns false if the thread did not carry the tag.
    pub fn remove_tag_from_thread(&mut self, tag: TagHandle, thread: ThreadHandle) -> bool {
        let thread_entity = self.threads.get_mut(thread.index()).expect("Live handle");
        if !thread_entity.tags.remove(&tag) {
            return false;
        }
        let key = thread_entity.name.key().clone();
        let message_count = thread_entity.message_count;

        self.tags
            .get_mut(tag.index())
            .expect("Live handle")
            .threads
            .remove(&(key, thread));
        self.bump_tag_thread_count(tag, -1);
        self.bump_tag_message_count(tag, -i64::from(message_count));

        let categories: Vec<CategoryHandle> = self
            .tags
            .get(tag.index())
            .expect("Live handle")
            .categories
            .iter()
            .copied()
            .collect();
        for category in categories {
            self.unlink_thread_from_category_if_unreachable(category, thread);
        }
        true
    }

    /// Retags every thread of `from` with `into`, moves category
    /// memberships, then deletes `from` (which by then owns nothing).
    pub fn merge_tags(&mut self, from: TagHandle, into: TagHandle) {
        let from_tag = self.tags.get(from.index()).expect("Live handle");
        debug!(target: LOG_TARGET, tag = %from_tag.id, "Merging tags");
        let threads: Vec<ThreadHandle> = from_tag.threads.iter().map(|(_, h)| *h).collect();
        let categories: Vec<CategoryHandle> = from_tag.categories.iter().copied().collect();

        for thread in threads {
            self.remove_tag_from_thread(from, thread);
            self.add_tag_to_thread(into, thread);
        }
        for category in categories {
            self.remove_tag_from_category(from, category);
            self.add_tag_to_category(into, category);
        }
        self.delete_tag(from);
    }

    pub fn delete_tag(&mut self, handle: TagHandle) -> Box<Tag> {
        let tag = self.tags.get(handle.index()).expect("Live handle");
        debug!(target: LOG_TARGET, tag = %tag.id, "Deleting tag");
        let tag_id = tag.id;
        let threads: Vec<ThreadHandle> = tag.threads.iter().map(|(_, h)| *h).collect();
        let categories: Vec<CategoryHandle> = tag.categories.iter().copied().collect();

        for thread in threads {
            self.remove_tag_from_thread(handle, thread);
        }
        for category in categories {
            self.remove_tag_from_category(handle, category);
        }
        self.granted_privileges
            .remove_for_target(PrivilegeTarget::Tag(tag_id));
        self.required_privileges
            .remove_for_target(PrivilegeTarget::Tag(tag_id));

        let tag = self.tags.get(handle.index()).expect("Live handle");
        self.tag_index.erase(handle, tag);
        self.tags.remove(handle.index()).expect("Live handle")
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    pub fn create_category(
        &mut self,
        id: ForumId,
        name: CollatedString,
        parent: Option<CategoryHandle>,
        at: Timestamp,
    ) -> CategoryHandle {
        CategoryHandle::from(self.categories.add(Category::new(id, name, parent, at)))
    }

    pub fn insert_category(&mut self, handle: CategoryHandle) {
        let category = self.categories.get(handle.index()).expect("Live handle");
        let parent = category.parent;
        if self.batch_insert {
            self.category_index.insert_primary_only(handle, category);
        } else {
            self.category_index.insert(handle, category);
        }
        if let Some(parent) = parent {
            self.categories
                .get_mut(parent.index())
                .expect("Live handle")
                .children
                .insert(handle);
        }
    }

    pub fn change_category_name(&mut self, handle: CategoryHandle, name: CollatedString) {
        if !self.batch_insert {
            let category = self.categories.get(handle.index()).expect("Live handle");
            self.category_index.prepare_update_name(category);
        }
        self.categories
            .get_mut(handle.index())
            .expect("Live handle")
            .name = name;
        if !self.batch_insert {
            let category = self.categories.get(handle.index()).expect("Live handle");
            self.category_index.commit_update_name(handle, category);
        }
    }

    pub fn change_category_description(&mut self, handle: CategoryHandle, description: String) {
        self.categories
            .get_mut(handle.index())
            .expect("Live handle")
            .description = description;
    }

    pub fn change_category_display_order(&mut self, handle: CategoryHandle, order: u16) {
        if !self.batch_insert {
            let category = self.categories.get(handle.index()).expect("Live handle");
            self.category_index.prepare_update_display_order(handle, category);
        }
        self.categories
            .get_mut(handle.index())
            .expect("Live handle")
            .display_order = order;
        if !self.batch_insert {
            let category = self.categories.get(handle.index()).expect("Live handle");
            self.category_index.commit_update_display_order(handle, category);
        }
    }

    /// True when making `candidate_parent` the parent of `category` would
    /// close a cycle (the candidate is the category itself or one of its
    /// descendants).
    pub fn category_parent_would_cycle(
        &self,
        category: CategoryHandle,
        candidate_parent: CategoryHandle,
    ) -> bool {
        let mut cursor = Some(candidate_parent);
        while let Some(current) = cursor {
            if current == category {
                return true;
            }
            cursor = self
                .categories
                .get(current.index())
                .and_then(|c| c.parent);
        }
        false
    }

    /// Caller must have rejected cyclic assignments already.
    pub fn change_category_parent(
        &mut self,
        handle: CategoryHandle,
        new_parent: Option<CategoryHandle>,
    ) {
        let old_parent = self
            .categories
            .get(handle.index())
            .expect("Live handle")
            .parent;
        if old_parent == new_parent {
            return;
        }

        if !self.batch_insert {
            let category = self.categories.get(handle.index()).expect("Live handle");
            self.category_index.prepare_update_parent(handle, category);
        }
        if let Some(old_parent) = old_parent {
            self.categories
                .get_mut(old_parent.index())
                .expect("Live handle")
                .children
                .remove(&handle);
        }
        self.categories
            .get_mut(handle.index())
            .expect("Live handle")
            .parent = new_parent;
        if let Some(new_parent) = new_parent {
            self.categories
                .get_mut(new_parent.index())
                .expect("Live handle")
                .children
                .insert(handle);
        }
        if !self.batch_insert {
            let category = self.categories.get(handle.index()).expect("Live handle");
            self.category_index.commit_update_parent(handle, category);
        }
    }

    fn bump_category_counts(
        &mut self,
        handle: CategoryHandle,
        thread_delta: i64,
        message_delta: i64,
    ) {
        if !self.batch_insert && message_delta != 0 {
            let category = self.categories.get(handle.index()).expect("Live handle");
            self.category_index.prepare_update_message_count(handle, category);
        }
        let category = self
            .categories
            .get_mut(handle.index())
            .expect("Live handle");
        category.thread_count = apply_delta(category.thread_count, thread_delta);
        category.message_count = apply_delta(category.message_count, message_delta);
        if !self.batch_insert && message_delta != 0 {
            let category = self.categories.get(handle.index()).expect("Live handle");
            self.category_index.commit_update_message_count(handle, category);
        }
    }

    fn link_thread_to_category(&mut self, category: CategoryHandle, thread: ThreadHandle) {
        let thread_entity = self.threads.get_mut(thread.index()).expect("Live handle");
        if !thread_entity.categories.insert(category) {
            return;
        }
        let key = thread_entity.name.key().clone();
        let message_count = thread_entity.message_count;
        self.categories
            .get_mut(category.index())
            .expect("Live handle")
            .threads
            .insert((key, thread));
        self.bump_category_counts(category, 1, i64::from(message_count));
    }

    /// A thread stays linked to a category as long as any of its tags is
    /// in the category.
    fn unlink_thread_from_category_if_unreachable(
        &mut self,
        category: CategoryHandle,
        thread: ThreadHandle,
    ) {
        let thread_entity = self.threads.get(thread.index()).expect("Live handle");
        let category_entity = self.categories.get(category.index()).expect("Live handle");
        let still_reachable = thread_entity
            .tags
            .iter()
            .any(|tag| category_entity.tags.contains(tag));
        if still_reachable {
            return;
        }
        let key = thread_entity.name.key().clone();
        let message_count = thread_entity.message_count;
        self.threads
            .get_mut(thread.index())
            .expect("Live handle")
            .categories
            .remove(&category);
        self.categories
            .get_mut(category.index())
            .expect("Live handle")
            .threads
            .remove(&(key, thread));
        self.bump_category_counts(category, -1, -i64::from(message_count));
    }

    /// Returns false if the category already referenced the tag.
    pub fn add_tag_to_category(&mut self, tag: TagHandle, category: CategoryHandle) -> bool {
        let category_entity = self
            .categories
            .get_mut(category.index())
            .expect("Live handle");
        if !category_entity.tags.insert(tag) {
            return false;
        }
        self.tags
            .get_mut(tag.index())
            .expect("Live handle")
            .categories
            .insert(category);

        let threads: Vec<ThreadHandle> = self
            .tags
            .get(tag.index())
            .expect("Live handle")
            .threads
            .iter()
            .map(|(_, h)| *h)
            .collect();
        for thread in threads {
            self.link_thread_to_category(category, thread);
        }
        true
    }

    /// Returns false if the category did not reference the tag.
    pub fn remove_tag_from_category(&mut self, tag: TagHandle, category: CategoryHandle) -> bool {
        let category_entity = self
            .categories
            .get_mut(category.index())
            .expect("Live handle");
        if !category_entity.tags.remove(&tag) {
            return false;
        }
        self.tags
            .get_mut(tag.index())
            .expect("Live handle")
            .categories
            .remove(&category);

        let threads: Vec<ThreadHandle> = self
            .tags
            .get(tag.index())
            .expect("Live handle")
            .threads
            .iter()
            .map(|(_, h)| *h)
            .collect();
        for thread in threads {
            self.unlink_thread_from_category_if_unreachable(category, thread);
        }
        true
    }

    /// Children are reparented to the deleted category's parent.
    pub fn delete_category(&mut self, handle: CategoryHandle) -> Box<Category> {
        let category = self.categories.get(handle.index()).expect("Live handle");
        debug!(target: LOG_TARGET, category = %category.id, "Deleting category");
        let category_id = category.id;
        let parent = category.parent;
        let children: Vec<CategoryHandle> = category.children.iter().copied().collect();
        let tags: Vec<TagHandle> = category.tags.iter().copied().collect();
        let threads: Vec<ThreadHandle> = category.threads.iter().map(|(_, h)| *h).collect();

        for tag in tags {
            self.tags
                .get_mut(tag.index())
                .expect("Live handle")
                .categories
                .remove(&handle);
        }
        for thread in threads {
            self.threads
                .get_mut(thread.index())
                .expect("Live handle")
                .categories
                .remove(&handle);
        }
        for child in children {
            self.change_category_parent(child, parent);
        }
        if let Some(parent) = parent {
            self.categories
                .get_mut(parent.index())
                .expect("Live handle")
                .children
                .remove(&handle);
        }
        self.granted_privileges
            .remove_for_target(PrivilegeTarget::Category(category_id));
        self.required_privileges
            .remove_for_target(PrivilegeTarget::Category(category_id));

        let category = self.categories.get(handle.index()).expect("Live handle");
        self.category_index.erase(handle, category);
        self.categories.remove(handle.index()).expect("Live handle")
    }

    // ------------------------------------------------------------------
    // Private messages
    // ------------------------------------------------------------------

    pub fn create_private_message(
        &mut self,
        id: ForumId,
        source: UserHandle,
        destination: UserHandle,
        content: String,
        at: Timestamp,
    ) -> PrivateMessageHandle {
        PrivateMessageHandle::from(self.private_messages.add(PrivateMessage::new(
            id,
            source,
            destination,
            content,
            at,
        )))
    }

    pub fn insert_private_message(&mut self, handle: PrivateMessageHandle) {
        let pm = self
            .private_messages
            .get(handle.index())
            .expect("Live handle");
        let (source, destination, created) = (pm.source, pm.destination, pm.created);
        if self.batch_insert {
            self.private_message_index.insert_primary_only(handle, pm);
        } else {
            self.private_message_index.insert(handle, pm);
        }
        self.users
            .get_mut(source.index())
            .expect("Live handle")
            .pm_outbox
            .insert((created, handle));
        let destination_entity = self
            .users
            .get_mut(destination.index())
            .expect("Live handle");
        destination_entity.pm_inbox.insert((created, handle));
        destination_entity.unread_private_messages += 1;
    }

    pub fn delete_private_message(&mut self, handle: PrivateMessageHandle) {
        self.delete_private_message_inner(handle, None);
    }

    fn delete_private_message_inner(
        &mut self,
        handle: PrivateMessageHandle,
        skip_user: Option<UserHandle>,
    ) {
        let pm = self
            .private_messages
            .get(handle.index())
            .expect("Live handle");
        let (source, destination, created) = (pm.source, pm.destination, pm.created);

        if Some(source) != skip_user {
            if let Some(user) = self.users.get_mut(source.index()) {
                user.pm_outbox.remove(&(created, handle));
            }
        }
        if Some(destination) != skip_user {
            if let Some(user) = self.users.get_mut(destination.index()) {
                user.pm_inbox.remove(&(created, handle));
                user.unread_private_messages = user.unread_private_messages.saturating_sub(1);
            }
        }
        let pm = self
            .private_messages
            .get(handle.index())
            .expect("Live handle");
        self.private_message_index.erase(handle, pm);
        self.private_messages.remove(handle.index());
    }

    // ------------------------------------------------------------------
    // Attachments
    // ------------------------------------------------------------------

    pub fn create_attachment(
        &mut self,
        id: ForumId,
        name: CollatedString,
        created_by: UserHandle,
        size: u64,
        at: Timestamp,
    ) -> AttachmentHandle {
        AttachmentHandle::from(
            self.attachments
                .add(Attachment::new(id, name, created_by, size, at)),
        )
    }

    pub fn insert_attachment(&mut self, handle: AttachmentHandle) {
        let attachment = self.attachments.get(handle.index()).expect("Live handle");
        let owner = attachment.created_by;
        if self.batch_insert {
            self.attachment_index.insert_primary_only(handle, attachment);
        } else {
            self.attachment_index.insert(handle, attachment);
        }
        self.users
            .get_mut(owner.index())
            .expect("Live handle")
            .attachments
            .insert(handle);
    }

    pub fn change_attachment_name(&mut self, handle: AttachmentHandle, name: CollatedString) {
        if !self.batch_insert {
            let attachment = self.attachments.get(handle.index()).expect("Live handle");
            self.attachment_index.prepare_update_name(handle, attachment);
        }
        self.attachments
            .get_mut(handle.index())
            .expect("Live handle")
            .name = name;
        if !self.batch_insert {
            let attachment = self.attachments.get(handle.index()).expect("Live handle");
            self.attachment_index.commit_update_name(handle, attachment);
        }
    }

    pub fn change_attachment_approval(&mut self, handle: AttachmentHandle, approved: bool) {
        if !self.batch_insert {
            let attachment = self.attachments.get(handle.index()).expect("Live handle");
            self.attachment_index.prepare_update_approval(handle, attachment);
        }
        self.attachments
            .get_mut(handle.index())
            .expect("Live handle")
            .approved = approved;
        if !self.batch_insert {
            let attachment = self.attachments.get(handle.index()).expect("Live handle");
            self.attachment_index.commit_update_approval(handle, attachment);
        }
    }

    pub fn increment_attachment_gets(&mut self, handle: AttachmentHandle, count: u64) {
        if let Some(attachment) = self.attachments.get_mut(handle.index()) {
            attachment.nr_of_gets += count;
        }
    }

    /// Returns false if the pair was already linked.
    pub fn add_attachment_to_message(
        &mut self,
        attachment: AttachmentHandle,
        message: MessageHandle,
    ) -> bool {
        let newly = self
            .attachments
            .get_mut(attachment.index())
            .expect("Live handle")
            .messages
            .insert(message);
        self.messages
            .get_mut(message.index())
            .expect("Live handle")
            .attachments
            .insert(attachment);
        newly
    }

    pub fn remove_attachment_from_message(
        &mut self,
        attachment: AttachmentHandle,
        message: MessageHandle,
    ) -> bool {
        let removed = self
            .attachments
            .get_mut(attachment.index())
            .expect("Live handle")
            .messages
            .remove(&message);
        self.messages
            .get_mut(message.index())
            .expect("Live handle")
            .attachments
            .remove(&attachment);
        removed
    }

    pub fn delete_attachment(&mut self, handle: AttachmentHandle) -> Box<Attachment> {
        self.delete_attachment_inner(handle, false)
    }

    fn delete_attachment_inner(
        &mut self,
        handle: AttachmentHandle,
        skip_owner: bool,
    ) -> Box<Attachment> {
        let attachment = self.attachments.get(handle.index()).expect("Live handle");
        let owner = attachment.created_by;
        let messages: Vec<MessageHandle> = attachment.messages.iter().copied().collect();

        for message in messages {
            if let Some(message) = self.messages.get_mut(message.index()) {
                message.attachments.remove(&handle);
            }
        }
        if !skip_owner {
            if let Some(user) = self.users.get_mut(owner.index()) {
                user.attachments.remove(&handle);
            }
        }
        let attachment = self.attachments.get(handle.index()).expect("Live handle");
        self.attachment_index.erase(handle, attachment);
        self.attachments.remove(handle.index()).expect("Live handle")
    }

    // ------------------------------------------------------------------
    // Privileges
    // ------------------------------------------------------------------

    pub fn assign_privilege(
        &mut self,
        user: ForumId,
        target: PrivilegeTarget,
        value: i16,
        at: Timestamp,
        duration: i64,
    ) {
        self.granted_privileges.assign(user, target, value, at, duration);
    }

    pub fn set_required_privilege(
        &mut self,
        of: PrivilegeKind,
        on: PrivilegeTarget,
        privilege: u16,
        value: i16,
    ) {
        self.required_privileges.set(of, on, privilege, value);
    }

    pub fn set_forum_wide_default_privilege_level(
        &mut self,
        duration_kind: u16,
        value: i16,
        duration: i64,
    ) {
        self.required_privileges
            .set_default_level(duration_kind, value, duration);
    }

    // ------------------------------------------------------------------
    // Batch insertion
    // ------------------------------------------------------------------

    pub fn batch_insert_in_progress(&self) -> bool {
        self.batch_insert
    }

    /// Defers every secondary-ordering maintenance until
    /// [`stop_batch_insert`](Self::stop_batch_insert).
    pub fn start_batch_insert(&mut self) {
        debug!(target: LOG_TARGET, "Starting batch insert");
        self.batch_insert = true;
    }

    /// Recomputes counters and rebuilds every ordering, fanned out across
    /// entity kinds.
    pub fn stop_batch_insert(&mut self) {
        debug!(target: LOG_TARGET, "Stopping batch insert");
        self.batch_insert = false;

        // Counter recompute must precede the rebuild so count-keyed
        // orderings see final values.
        let thread_counts: Vec<(ThreadHandle, u32)> = self
            .threads
            .iter()
            .map(|(index, thread)| (ThreadHandle::from(index), thread.messages.len().expect_into()))
            .collect();
        for (handle, count) in thread_counts {
            self.threads
                .get_mut(handle.index())
                .expect("Live handle")
                .message_count = count;
            self.recompute_thread_latest_message_unindexed(handle);
        }
        let user_counts: Vec<(UserHandle, u32, u32)> = self
            .users
            .iter()
            .map(|(index, user)| {
                (
                    UserHandle::from(index),
                    user.threads.len().expect_into(),
                    user.messages.len().expect_into(),
                )
            })
            .collect();
        for (handle, threads, messages) in user_counts {
            let user = self.users.get_mut(handle.index()).expect("Live handle");
            user.thread_count = threads;
            user.message_count = messages;
        }
        let tag_counts: Vec<(TagHandle, u32, u32)> = self
            .tags
            .iter()
            .map(|(index, tag)| {
                let threads: u32 = tag.threads.len().expect_into();
                let messages: u32 = tag
                    .threads
                    .iter()
                    .filter_map(|(_, h)| self.threads.get(h.index()))
                    .map(|t| t.message_count)
                    .sum();
                (TagHandle::from(index), threads, messages)
            })
            .collect();
        for (handle, threads, messages) in tag_counts {
            let tag = self.tags.get_mut(handle.index()).expect("Live handle");
            tag.thread_count = threads;
            tag.message_count = messages;
        }
        let category_counts: Vec<(CategoryHandle, u32, u32)> = self
            .categories
            .iter()
            .map(|(index, category)| {
                let threads: u32 = category.threads.len().expect_into();
                let messages: u32 = category
                    .threads
                    .iter()
                    .filter_map(|(_, h)| self.threads.get(h.index()))
                    .map(|t| t.message_count)
                    .sum();
                (CategoryHandle::from(index), threads, messages)
            })
            .collect();
        for (handle, threads, messages) in category_counts {
            let category = self
                .categories
                .get_mut(handle.index())
                .expect("Live handle");
            category.thread_count = threads;
            category.message_count = messages;
        }

        let Self {
            users,
            threads,
            messages,
            comments,
            tags,
            categories,
            private_messages,
            attachments,
            user_index,
            thread_index,
            message_index,
            comment_index,
            tag_index,
            category_index,
            private_message_index,
            attachment_index,
            ..
        } = self;

        std::thread::scope(|scope| {
            scope.spawn(|| user_index.rebuild(users.iter().map(|(i, u)| (UserHandle::from(i), u))));
            scope.spawn(|| {
                thread_index.rebuild(threads.iter().map(|(i, t)| (ThreadHandle::from(i), t)))
            });
            scope.spawn(|| {
                message_index.rebuild(messages.iter().map(|(i, m)| (MessageHandle::from(i), m)))
            });
            scope.spawn(|| {
                comment_index.rebuild(comments.iter().map(|(i, c)| (CommentHandle::from(i), c)))
            });
            scope.spawn(|| tag_index.rebuild(tags.iter().map(|(i, t)| (TagHandle::from(i), t))));
            scope.spawn(|| {
                category_index
                    .rebuild(categories.iter().map(|(i, c)| (CategoryHandle::from(i), c)))
            });
            scope.spawn(|| {
                private_message_index.rebuild(
                    private_messages
                        .iter()
                        .map(|(i, m)| (PrivateMessageHandle::from(i), m)),
                )
            });
            scope.spawn(|| {
                attachment_index
                    .rebuild(attachments.iter().map(|(i, a)| (AttachmentHandle::from(i), a)))
            });
        });
    }

    fn recompute_thread_latest_message_unindexed(&mut self, handle: ThreadHandle) {
        let thread = self.threads.get_mut(handle.index()).expect("Live handle");
        thread.latest_message_created = thread
            .messages
            .iter()
            .next_back()
            .map(|(at, _)| *at)
            .unwrap_or(Timestamp::ZERO);
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum CascadeSource {
    None,
    Thread,
    User,
}

fn apply_delta(value: u32, delta: i64) -> u32 {
    u32::try_from(i64::from(value) + delta).unwrap_or(0)
}

#[cfg(test)]
mod tests;
