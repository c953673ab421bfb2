//! Per-kind multi-index collections.
//!
//! Every collection keeps exactly one entry per live handle in each of
//! its orderings. Ordering-relevant attribute changes go through the
//! matching `prepare_update_*` / `commit_update_*` pair: the handle is
//! removed from the affected ordering keyed by the old value, the entity
//! is mutated, and the handle is reinserted keyed by the new value, so an
//! inconsistent ordering state is never observable.
//!
//! During batch insertion (startup replay) only the primary id index is
//! maintained; `rebuild` reconstructs every secondary ordering from the
//! pool in one pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use agora_core::Timestamp;
use agora_core::id::ForumId;

use crate::entities::{
    Attachment, Category, Comment, Message, PrivateMessage, Tag, Thread, User,
};
use crate::pool::{
    AttachmentHandle, CategoryHandle, CommentHandle, MessageHandle, PrivateMessageHandle,
    TagHandle, ThreadHandle, UserHandle,
};
use crate::sort_key::SortKey;

#[derive(Default)]
pub struct UserCollection {
    by_id: HashMap<ForumId, UserHandle>,
    by_auth: HashMap<String, UserHandle>,
    by_name: BTreeMap<SortKey, UserHandle>,
    by_created: BTreeSet<(Timestamp, UserHandle)>,
    by_last_seen: BTreeSet<(Timestamp, UserHandle)>,
    by_thread_count: BTreeSet<(u32, UserHandle)>,
    by_message_count: BTreeSet<(u32, UserHandle)>,
}

impl UserCollection {
    pub fn insert(&mut self, handle: UserHandle, user: &User) {
        self.by_id.insert(user.id, handle);
        self.by_auth.insert(user.auth.clone(), handle);
        self.by_name.insert(user.name.key().clone(), handle);
        self.by_created.insert((user.created, handle));
        self.by_last_seen.insert((user.last_seen, handle));
        self.by_thread_count.insert((user.thread_count, handle));
        self.by_message_count.insert((user.message_count, handle));
    }

    pub fn insert_primary_only(&mut self, handle: UserHandle, user: &User) {
        self.by_id.insert(user.id, handle);
    }

    pub fn erase(&mut self, handle: UserHandle, user: &User) {
        self.by_id.remove(&user.id);
        self.by_auth.remove(&user.auth);
        self.by_name.remove(user.name.key());
        self.by_created.remove(&(user.created, handle));
        self.by_last_seen.remove(&(user.last_seen, handle));
        self.by_thread_count.remove(&(user.thread_count, handle));
        self.by_message_count.remove(&(user.message_count, handle));
    }

    pub fn rebuild<'a>(&mut self, entries: impl Iterator<Item = (UserHandle, &'a User)>) {
        *self = Self::default();
        for (handle, user) in entries {
            self.insert(handle, user);
        }
    }

    pub fn get_by_id(&self, id: ForumId) -> Option<UserHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn get_by_auth(&self, auth: &str) -> Option<UserHandle> {
        self.by_auth.get(auth).copied()
    }

    pub fn get_by_name(&self, key: &SortKey) -> Option<UserHandle> {
        self.by_name.get(key).copied()
    }

    /// Zero-based position of the lower bound of `key` in the name
    /// ordering; the paging primitive behind search-by-name.
    pub fn lower_bound_rank(&self, key: &SortKey) -> usize {
        self.by_name.range(..key.clone()).count()
    }

    pub fn iter_by_name(&self) -> impl Iterator<Item = UserHandle> + '_ {
        self.by_name.values().copied()
    }

    pub fn iter_by_created(&self) -> impl Iterator<Item = UserHandle> + '_ {
        self.by_created.iter().map(|(_, h)| *h)
    }

    pub fn iter_by_last_seen_desc(&self) -> impl Iterator<Item = UserHandle> + '_ {
        self.by_last_seen.iter().rev().map(|(_, h)| *h)
    }

    pub fn iter_by_thread_count_desc(&self) -> impl Iterator<Item = UserHandle> + '_ {
        self.by_thread_count.iter().rev().map(|(_, h)| *h)
    }

    pub fn iter_by_message_count_desc(&self) -> impl Iterator<Item = UserHandle> + '_ {
        self.by_message_count.iter().rev().map(|(_, h)| *h)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn prepare_update_name(&mut self, user: &User) {
        self.by_name.remove(user.name.key());
    }

    pub fn commit_update_name(&mut self, handle: UserHandle, user: &User) {
        self.by_name.insert(user.name.key().clone(), handle);
    }

    pub fn prepare_update_auth(&mut self, user: &User) {
        self.by_auth.remove(&user.auth);
    }

    pub fn commit_update_auth(&mut self, handle: UserHandle, user: &User) {
        self.by_auth.insert(user.auth.clone(), handle);
    }

    pub fn prepare_update_last_seen(&mut self, handle: UserHandle, user: &User) {
        self.by_last_seen.remove(&(user.last_seen, handle));
    }

    pub fn commit_update_last_seen(&mut self, handle: UserHandle, user: &User) {
        self.by_last_seen.insert((user.last_seen, handle));
    }

    pub fn prepare_update_thread_count(&mut self, handle: UserHandle, user: &User) {
        self.by_thread_count.remove(&(user.thread_count, handle));
    }

    pub fn commit_update_thread_count(&mut self, handle: UserHandle, user: &User) {
        self.by_thread_count.insert((user.thread_count, handle));
    }

    pub fn prepare_update_message_count(&mut self, handle: UserHandle, user: &User) {
        self.by_message_count.remove(&(user.message_count, handle));
    }

    pub fn commit_update_message_count(&mut self, handle: UserHandle, user: &User) {
        self.by_message_count.insert((user.message_count, handle));
    }
}

#[derive(Default)]
pub struct ThreadCollection {
    by_id: HashMap<ForumId, ThreadHandle>,
    by_name: BTreeMap<SortKey, ThreadHandle>,
    by_created: BTreeSet<(Timestamp, ThreadHandle)>,
    by_last_updated: BTreeSet<(Timestamp, ThreadHandle)>,
    by_latest_message_created: BTreeSet<(Timestamp, ThreadHandle)>,
    by_message_count: BTreeSet<(u32, ThreadHandle)>,
    /// Pinned subset only (pin order > 0); higher orders list first.
    by_pin_display_order: BTreeSet<(u16, ThreadHandle)>,
}

impl ThreadCollection {
    pub fn insert(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_id.insert(thread.id, handle);
        self.by_name.insert(thread.name.key().clone(), handle);
        self.by_created.insert((thread.created, handle));
        self.by_last_updated.insert((thread.last_updated, handle));
        self.by_latest_message_created
            .insert((thread.latest_message_created, handle));
        self.by_message_count.insert((thread.message_count, handle));
        if thread.pin_display_order > 0 {
            self.by_pin_display_order
                .insert((thread.pin_display_order, handle));
        }
    }

    pub fn insert_primary_only(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_id.insert(thread.id, handle);
    }

    pub fn erase(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_id.remove(&thread.id);
        self.by_name.remove(thread.name.key());
        self.by_created.remove(&(thread.created, handle));
        self.by_last_updated.remove(&(thread.last_updated, handle));
        self.by_latest_message_created
            .remove(&(thread.latest_message_created, handle));
        self.by_message_count.remove(&(thread.message_count, handle));
        self.by_pin_display_order
            .remove(&(thread.pin_display_order, handle));
    }

    pub fn rebuild<'a>(&mut self, entries: impl Iterator<Item = (ThreadHandle, &'a Thread)>) {
        *self = Self::default();
        for (handle, thread) in entries {
            self.insert(handle, thread);
        }
    }

    pub fn get_by_id(&self, id: ForumId) -> Option<ThreadHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn get_by_name(&self, key: &SortKey) -> Option<ThreadHandle> {
        self.by_name.get(key).copied()
    }

    pub fn lower_bound_rank(&self, key: &SortKey) -> usize {
        self.by_name.range(..key.clone()).count()
    }

    pub fn iter_by_name(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.by_name.values().copied()
    }

    pub fn iter_by_created(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.by_created.iter().map(|(_, h)| *h)
    }

    pub fn iter_by_last_updated_desc(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.by_last_updated.iter().rev().map(|(_, h)| *h)
    }

    pub fn iter_by_latest_message_created_desc(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.by_latest_message_created.iter().rev().map(|(_, h)| *h)
    }

    pub fn iter_by_message_count_desc(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.by_message_count.iter().rev().map(|(_, h)| *h)
    }

    pub fn iter_pinned_desc(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.by_pin_display_order.iter().rev().map(|(_, h)| *h)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn prepare_update_name(&mut self, thread: &Thread) {
        self.by_name.remove(thread.name.key());
    }

    pub fn commit_update_name(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_name.insert(thread.name.key().clone(), handle);
    }

    pub fn prepare_update_last_updated(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_last_updated.remove(&(thread.last_updated, handle));
    }

    pub fn commit_update_last_updated(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_last_updated.insert((thread.last_updated, handle));
    }

    pub fn prepare_update_latest_message_created(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_latest_message_created
            .remove(&(thread.latest_message_created, handle));
    }

    pub fn commit_update_latest_message_created(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_latest_message_created
            .insert((thread.latest_message_created, handle));
    }

    pub fn prepare_update_message_count(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_message_count.remove(&(thread.message_count, handle));
    }

    pub fn commit_update_message_count(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_message_count.insert((thread.message_count, handle));
    }

    pub fn prepare_update_pin_display_order(&mut self, handle: ThreadHandle, thread: &Thread) {
        self.by_pin_display_order
            .remove(&(thread.pin_display_order, handle));
    }

    pub fn commit_update_pin_display_order(&mut self, handle: ThreadHandle, thread: &Thread) {
        if thread.pin_display_order > 0 {
            self.by_pin_display_order
                .insert((thread.pin_display_order, handle));
        }
    }
}

#[derive(Default)]
pub struct MessageCollection {
    by_id: HashMap<ForumId, MessageHandle>,
    /// The global latest-messages feed.
    by_created: BTreeSet<(Timestamp, MessageHandle)>,
}

impl MessageCollection {
    pub fn insert(&mut self, handle: MessageHandle, message: &Message) {
        self.by_id.insert(message.id, handle);
        self.by_created.insert((message.created, handle));
    }

    pub fn insert_primary_only(&mut self, handle: MessageHandle, message: &Message) {
        self.by_id.insert(message.id, handle);
    }

    pub fn erase(&mut self, handle: MessageHandle, message: &Message) {
        self.by_id.remove(&message.id);
        self.by_created.remove(&(message.created, handle));
    }

    pub fn rebuild<'a>(&mut self, entries: impl Iterator<Item = (MessageHandle, &'a Message)>) {
        *self = Self::default();
        for (handle, message) in entries {
            self.insert(handle, message);
        }
    }

    pub fn get_by_id(&self, id: ForumId) -> Option<MessageHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn iter_by_created_desc(&self) -> impl Iterator<Item = MessageHandle> + '_ {
        self.by_created.iter().rev().map(|(_, h)| *h)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Default)]
pub struct CommentCollection {
    by_id: HashMap<ForumId, CommentHandle>,
    by_created: BTreeSet<(Timestamp, CommentHandle)>,
}

impl CommentCollection {
    pub fn insert(&mut self, handle: CommentHandle, comment: &Comment) {
        self.by_id.insert(comment.id, handle);
        self.by_created.insert((comment.created, handle));
    }

    pub fn insert_primary_only(&mut self, handle: CommentHandle, comment: &Comment) {
        self.by_id.insert(comment.id, handle);
    }

    pub fn erase(&mut self, handle: CommentHandle, comment: &Comment) {
        self.by_id.remove(&comment.id);
        self.by_created.remove(&(comment.created, handle));
    }

    pub fn rebuild<'a>(&mut self, entries: impl Iterator<Item = (CommentHandle, &'a Comment)>) {
        *self = Self::default();
        for (handle, comment) in entries {
            self.insert(handle, comment);
        }
    }

    pub fn get_by_id(&self, id: ForumId) -> Option<CommentHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Default)]
pub struct TagCollection {
    by_id: HashMap<ForumId, TagHandle>,
    by_name: BTreeMap<SortKey, TagHandle>,
    by_thread_count: BTreeSet<(u32, TagHandle)>,
    by_message_count: BTreeSet<(u32, TagHandle)>,
}

impl TagCollection {
    pub fn insert(&mut self, handle: TagHandle, tag: &Tag) {
        self.by_id.insert(tag.id, handle);
        self.by_name.insert(tag.name.key().clone(), handle);
        self.by_thread_count.insert((tag.thread_count, handle));
        self.by_message_count.insert((tag.message_count, handle));
    }

    pub fn insert_primary_only(&mut self, handle: TagHandle, tag: &Tag) {
        self.by_id.insert(tag.id, handle);
    }

    pub fn erase(&mut self, handle: TagHandle, tag: &Tag) {
        self.by_id.remove(&tag.id);
        self.by_name.remove(tag.name.key());
        self.by_thread_count.remove(&(tag.thread_count, handle));
        self.by_message_count.remove(&(tag.message_count, handle));
    }

    pub fn rebuild<'a>(&mut self, entries: impl Iterator<Item = (TagHandle, &'a Tag)>) {
        *self = Self::default();
        for (handle, tag) in entries {
            self.insert(handle, tag);
        }
    }

    pub fn get_by_id(&self, id: ForumId) -> Option<TagHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn get_by_name(&self, key: &SortKey) -> Option<TagHandle> {
        self.by_name.get(key).copied()
    }

    pub fn iter_by_name(&self) -> impl Iterator<Item = TagHandle> + '_ {
        self.by_name.values().copied()
    }

    pub fn iter_by_thread_count_desc(&self) -> impl Iterator<Item = TagHandle> + '_ {
        self.by_thread_count.iter().rev().map(|(_, h)| *h)
    }

    pub fn iter_by_message_count_desc(&self) -> impl Iterator<Item = TagHandle> + '_ {
        self.by_message_count.iter().rev().map(|(_, h)| *h)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn prepare_update_name(&mut self, tag: &Tag) {
        self.by_name.remove(tag.name.key());
    }

    pub fn commit_update_name(&mut self, handle: TagHandle, tag: &Tag) {
        self.by_name.insert(tag.name.key().clone(), handle);
    }

    pub fn prepare_update_thread_count(&mut self, handle: TagHandle, tag: &Tag) {
        self.by_thread_count.remove(&(tag.thread_count, handle));
    }

    pub fn commit_update_thread_count(&mut self, handle: TagHandle, tag: &Tag) {
        self.by_thread_count.insert((tag.thread_count, handle));
    }

    pub fn prepare_update_message_count(&mut self, handle: TagHandle, tag: &Tag) {
        self.by_message_count.remove(&(tag.message_count, handle));
    }

    pub fn commit_update_message_count(&mut self, handle: TagHandle, tag: &Tag) {
        self.by_message_count.insert((tag.message_count, handle));
    }
}

#[derive(Default)]
pub struct CategoryCollection {
    by_id: HashMap<ForumId, CategoryHandle>,
    /// Unique among siblings: keyed by (parent, name).
    by_name: BTreeMap<(Option<CategoryHandle>, SortKey), CategoryHandle>,
    /// Keyed by (parent, display order); root categories first.
    by_display_order: BTreeSet<(Option<CategoryHandle>, u16, CategoryHandle)>,
    by_message_count: BTreeSet<(u32, CategoryHandle)>,
}

impl CategoryCollection {
    pub fn insert(&mut self, handle: CategoryHandle, category: &Category) {
        self.by_id.insert(category.id, handle);
        self.by_name
            .insert((category.parent, category.name.key().clone()), handle);
        self.by_display_order
            .insert((category.parent, category.display_order, handle));
        self.by_message_count
            .insert((category.message_count, handle));
    }

    pub fn insert_primary_only(&mut self, handle: CategoryHandle, category: &Category) {
        self.by_id.insert(category.id, handle);
    }

    pub fn erase(&mut self, handle: CategoryHandle, category: &Category) {
        self.by_id.remove(&category.id);
        self.by_name
            .remove(&(category.parent, category.name.key().clone()));
        self.by_display_order
            .remove(&(category.parent, category.display_order, handle));
        self.by_message_count
            .remove(&(category.message_count, handle));
    }

    pub fn rebuild<'a>(&mut self, entries: impl Iterator<Item = (CategoryHandle, &'a Category)>) {
        *self = Self::default();
        for (handle, category) in entries {
            self.insert(handle, category);
        }
    }

    pub fn get_by_id(&self, id: ForumId) -> Option<CategoryHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn get_by_name(
        &self,
        parent: Option<CategoryHandle>,
        key: &SortKey,
    ) -> Option<CategoryHandle> {
        self.by_name.get(&(parent, key.clone())).copied()
    }

    pub fn iter_children_by_display_order(
        &self,
        parent: Option<CategoryHandle>,
    ) -> impl Iterator<Item = CategoryHandle> + '_ {
        self.by_display_order
            .range((parent, 0, CategoryHandle::from(0))..)
            .take_while(move |(p, _, _)| *p == parent)
            .map(|(_, _, h)| *h)
    }

    pub fn iter_by_message_count_desc(&self) -> impl Iterator<Item = CategoryHandle> + '_ {
        self.by_message_count.iter().rev().map(|(_, h)| *h)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn prepare_update_name(&mut self, category: &Category) {
        self.by_name
            .remove(&(category.parent, category.name.key().clone()));
    }

    pub fn commit_update_name(&mut self, handle: CategoryHandle, category: &Category) {
        self.by_name
            .insert((category.parent, category.name.key().clone()), handle);
    }

    pub fn prepare_update_display_order(&mut self, handle: CategoryHandle, category: &Category) {
        self.by_display_order
            .remove(&(category.parent, category.display_order, handle));
    }

    pub fn commit_update_display_order(&mut self, handle: CategoryHandle, category: &Category) {
        self.by_display_order
            .insert((category.parent, category.display_order, handle));
    }

    /// Parent changes move both the sibling-name and display orderings.
    pub fn prepare_update_parent(&mut self, handle: CategoryHandle, category: &Category) {
        self.prepare_update_name(category);
        self.prepare_update_display_order(handle, category);
    }

    pub fn commit_update_parent(&mut self, handle: CategoryHandle, category: &Category) {
        self.commit_update_name(handle, category);
        self.commit_update_display_order(handle, category);
    }

    pub fn prepare_update_message_count(&mut self, handle: CategoryHandle, category: &Category) {
        self.by_message_count
            .remove(&(category.message_count, handle));
    }

    pub fn commit_update_message_count(&mut self, handle: CategoryHandle, category: &Category) {
        self.by_message_count
            .insert((category.message_count, handle));
    }
}

#[derive(Default)]
pub struct AttachmentCollection {
    by_id: HashMap<ForumId, AttachmentHandle>,
    by_created: BTreeSet<(Timestamp, AttachmentHandle)>,
    by_name: BTreeSet<(SortKey, AttachmentHandle)>,
    by_size: BTreeSet<(u64, AttachmentHandle)>,
    by_approval: BTreeSet<(bool, AttachmentHandle)>,
}

impl AttachmentCollection {
    pub fn insert(&mut self, handle: AttachmentHandle, attachment: &Attachment) {
        self.by_id.insert(attachment.id, handle);
        self.by_created.insert((attachment.created, handle));
        self.by_name
            .insert((attachment.name.key().clone(), handle));
        self.by_size.insert((attachment.size, handle));
        self.by_approval.insert((attachment.approved, handle));
    }

    pub fn insert_primary_only(&mut self, handle: AttachmentHandle, attachment: &Attachment) {
        self.by_id.insert(attachment.id, handle);
    }

    pub fn erase(&mut self, handle: AttachmentHandle, attachment: &Attachment) {
        self.by_id.remove(&attachment.id);
        self.by_created.remove(&(attachment.created, handle));
        self.by_name
            .remove(&(attachment.name.key().clone(), handle));
        self.by_size.remove(&(attachment.size, handle));
        self.by_approval.remove(&(attachment.approved, handle));
    }

    pub fn rebuild<'a>(
        &mut self,
        entries: impl Iterator<Item = (AttachmentHandle, &'a Attachment)>,
    ) {
        *self = Self::default();
        for (handle, attachment) in entries {
            self.insert(handle, attachment);
        }
    }

    pub fn get_by_id(&self, id: ForumId) -> Option<AttachmentHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn iter_by_created_desc(&self) -> impl Iterator<Item = AttachmentHandle> + '_ {
        self.by_created.iter().rev().map(|(_, h)| *h)
    }

    pub fn iter_by_name(&self) -> impl Iterator<Item = AttachmentHandle> + '_ {
        self.by_name.iter().map(|(_, h)| *h)
    }

    pub fn iter_by_size_desc(&self) -> impl Iterator<Item = AttachmentHandle> + '_ {
        self.by_size.iter().rev().map(|(_, h)| *h)
    }

    pub fn iter_unapproved(&self) -> impl Iterator<Item = AttachmentHandle> + '_ {
        self.by_approval
            .range((false, AttachmentHandle::from(0))..(true, AttachmentHandle::from(0)))
            .map(|(_, h)| *h)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn prepare_update_name(&mut self, handle: AttachmentHandle, attachment: &Attachment) {
        self.by_name
            .remove(&(attachment.name.key().clone(), handle));
    }

    pub fn commit_update_name(&mut self, handle: AttachmentHandle, attachment: &Attachment) {
        self.by_name
            .insert((attachment.name.key().clone(), handle));
    }

    pub fn prepare_update_approval(&mut self, handle: AttachmentHandle, attachment: &Attachment) {
        self.by_approval.remove(&(attachment.approved, handle));
    }

    pub fn commit_update_approval(&mut self, handle: AttachmentHandle, attachment: &Attachment) {
        self.by_approval.insert((attachment.approved, handle));
    }
}

/// Global private-message index; the per-user inbox/outbox orderings live
/// on the user entities.
#[derive(Default)]
pub struct PrivateMessageCollection {
    by_id: HashMap<ForumId, PrivateMessageHandle>,
}

impl PrivateMessageCollection {
    pub fn insert(&mut self, handle: PrivateMessageHandle, message: &PrivateMessage) {
        self.by_id.insert(message.id, handle);
    }

    pub fn insert_primary_only(&mut self, handle: PrivateMessageHandle, message: &PrivateMessage) {
        self.by_id.insert(message.id, handle);
    }

    pub fn erase(&mut self, _handle: PrivateMessageHandle, message: &PrivateMessage) {
        self.by_id.remove(&message.id);
    }

    pub fn rebuild<'a>(
        &mut self,
        entries: impl Iterator<Item = (PrivateMessageHandle, &'a PrivateMessage)>,
    ) {
        *self = Self::default();
        for (handle, message) in entries {
            self.insert(handle, message);
        }
    }

    pub fn get_by_id(&self, id: ForumId) -> Option<PrivateMessageHandle> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
