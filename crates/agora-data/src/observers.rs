//! Mutation and read signals.
//!
//! Each repository operation invokes the matching method on every
//! registered listener after the mutation has succeeded, synchronously
//! and while still inside the write closure. Listeners must not block
//! (the persistence listener only encodes a blob and enqueues it). A
//! future metrics counter or search indexer registers the same way.

use std::sync::Arc;

use agora_core::{IpAddress, Timestamp};
use agora_core::id::ForumId;

use crate::entities::privileges::{PrivilegeKind, PrivilegeTarget};
use crate::entities::{Attachment, Category, Comment, Message, PrivateMessage, Tag, Thread, User};

/// Who performed the operation being observed.
#[derive(Copy, Clone, Debug)]
pub struct ObserverContext {
    pub timestamp: Timestamp,
    pub performed_by: ForumId,
    pub ip: IpAddress,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UserChange {
    Name,
    Info,
    Title,
    Signature,
    Logo,
    AttachmentQuota,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThreadChange {
    Name,
    PinDisplayOrder,
    Approval,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TagChange {
    Name,
    UiBlob,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CategoryChange {
    Name,
    Description,
    DisplayOrder,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttachmentChange {
    Name,
    Approval,
}

#[allow(unused_variables)]
pub trait WriteObserver: Send + Sync {
    fn on_add_new_user(&self, ctx: &ObserverContext, user: &User) {}
    fn on_change_user(&self, ctx: &ObserverContext, user: &User, change: UserChange) {}
    fn on_delete_user(&self, ctx: &ObserverContext, user_id: ForumId) {}

    fn on_add_new_discussion_thread(&self, ctx: &ObserverContext, thread: &Thread) {}
    fn on_change_discussion_thread(&self, ctx: &ObserverContext, thread: &Thread, change: ThreadChange) {}
    fn on_delete_discussion_thread(&self, ctx: &ObserverContext, thread_id: ForumId) {}
    fn on_merge_discussion_threads(&self, ctx: &ObserverContext, from_id: ForumId, into_id: ForumId) {}
    fn on_subscribe_to_discussion_thread(&self, ctx: &ObserverContext, thread_id: ForumId) {}
    fn on_unsubscribe_from_discussion_thread(&self, ctx: &ObserverContext, thread_id: ForumId) {}

    fn on_add_new_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        message: &Message,
        thread_id: ForumId,
        content: &str,
    ) {
    }
    fn on_change_discussion_thread_message_content(
        &self,
        ctx: &ObserverContext,
        message_id: ForumId,
        content: &str,
        reason: &str,
    ) {
    }
    fn on_change_discussion_thread_message_approval(
        &self,
        ctx: &ObserverContext,
        message: &Message,
    ) {
    }
    fn on_move_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        message_id: ForumId,
        into_thread_id: ForumId,
    ) {
    }
    fn on_delete_discussion_thread_message(&self, ctx: &ObserverContext, message_id: ForumId) {}
    fn on_discussion_thread_message_up_vote(&self, ctx: &ObserverContext, message_id: ForumId) {}
    fn on_discussion_thread_message_down_vote(&self, ctx: &ObserverContext, message_id: ForumId) {}
    fn on_discussion_thread_message_reset_vote(&self, ctx: &ObserverContext, message_id: ForumId) {}
    fn on_quote_user_in_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        message_id: ForumId,
        quoted_user_id: ForumId,
    ) {
    }

    fn on_add_comment_to_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        comment: &Comment,
        message_id: ForumId,
    ) {
    }
    fn on_solve_discussion_thread_message_comment(
        &self,
        ctx: &ObserverContext,
        comment_id: ForumId,
    ) {
    }

    fn on_add_new_discussion_tag(&self, ctx: &ObserverContext, tag: &Tag) {}
    fn on_change_discussion_tag(&self, ctx: &ObserverContext, tag: &Tag, change: TagChange) {}
    fn on_delete_discussion_tag(&self, ctx: &ObserverContext, tag_id: ForumId) {}
    fn on_add_discussion_tag_to_thread(
        &self,
        ctx: &ObserverContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) {
    }
    fn on_remove_discussion_tag_from_thread(
        &self,
        ctx: &ObserverContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) {
    }
    fn on_merge_discussion_tags(&self, ctx: &ObserverContext, from_id: ForumId, into_id: ForumId) {}

    fn on_add_new_discussion_category(
        &self,
        ctx: &ObserverContext,
        category: &Category,
        parent_id: Option<ForumId>,
    ) {
    }
    fn on_change_discussion_category(
        &self,
        ctx: &ObserverContext,
        category: &Category,
        change: CategoryChange,
    ) {
    }
    fn on_change_discussion_category_parent(
        &self,
        ctx: &ObserverContext,
        category: &Category,
        parent_id: Option<ForumId>,
    ) {
    }
    fn on_delete_discussion_category(&self, ctx: &ObserverContext, category_id: ForumId) {}
    fn on_add_discussion_tag_to_category(
        &self,
        ctx: &ObserverContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) {
    }
    fn on_remove_discussion_tag_from_category(
        &self,
        ctx: &ObserverContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) {
    }

    fn on_send_private_message(
        &self,
        ctx: &ObserverContext,
        message: &PrivateMessage,
        destination_id: ForumId,
    ) {
    }
    fn on_delete_private_message(&self, ctx: &ObserverContext, message_id: ForumId) {}

    fn on_change_user_attachment_quota(&self, ctx: &ObserverContext, user_id: ForumId, quota: u64) {}
    fn on_add_new_attachment(&self, ctx: &ObserverContext, attachment: &Attachment) {}
    fn on_change_attachment(
        &self,
        ctx: &ObserverContext,
        attachment: &Attachment,
        change: AttachmentChange,
    ) {
    }
    fn on_delete_attachment(&self, ctx: &ObserverContext, attachment_id: ForumId) {}
    fn on_add_attachment_to_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) {
    }
    fn on_remove_attachment_from_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) {
    }

    fn on_change_required_privilege(
        &self,
        ctx: &ObserverContext,
        of: PrivilegeKind,
        on: PrivilegeTarget,
        privilege: u16,
        value: i16,
    ) {
    }
    fn on_change_forum_wide_default_privilege_level(
        &self,
        ctx: &ObserverContext,
        duration_kind: u16,
        value: i16,
        duration: i64,
    ) {
    }
    fn on_assign_privilege(
        &self,
        ctx: &ObserverContext,
        target: PrivilegeTarget,
        user_id: ForumId,
        value: i16,
        duration: i64,
    ) {
    }
}

#[allow(unused_variables)]
pub trait ReadObserver: Send + Sync {
    fn on_get_discussion_thread_by_id(&self, thread_id: ForumId) {}
    fn on_get_attachment(&self, attachment_id: ForumId) {}
}

#[derive(Clone, Default)]
pub struct ObserverRegistry {
    write: Vec<Arc<dyn WriteObserver>>,
    read: Vec<Arc<dyn ReadObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_write(&mut self, observer: Arc<dyn WriteObserver>) {
        self.write.push(observer);
    }

    pub fn subscribe_read(&mut self, observer: Arc<dyn ReadObserver>) {
        self.read.push(observer);
    }

    pub fn write(&self) -> impl Iterator<Item = &Arc<dyn WriteObserver>> {
        self.write.iter()
    }

    pub fn read(&self) -> impl Iterator<Item = &Arc<dyn ReadObserver>> {
        self.read.iter()
    }
}
