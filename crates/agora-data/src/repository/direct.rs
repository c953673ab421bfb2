//! Direct-write interface: the replay target.
//!
//! No validation beyond structural checks, no authorization, no observer
//! emission. Ids and timestamps come from the caller (the log), so
//! replayed state is byte-for-byte the state that produced the events.

use agora_core::event::EventContext;
use agora_core::id::ForumId;

use super::{MemoryRepository, StatusCode};
use crate::entities::MessageContent;
use crate::entities::privileges::{PrivilegeKind, PrivilegeTarget};
use crate::sort_key::CollatedString;

pub trait DirectWriteRepository {
    fn direct_add_new_user(
        &self,
        ctx: &EventContext,
        id: ForumId,
        auth: &str,
        name: &str,
    ) -> StatusCode;
    fn direct_change_user_name(&self, ctx: &EventContext, id: ForumId, name: &str) -> StatusCode;
    fn direct_change_user_info(&self, ctx: &EventContext, id: ForumId, info: &str) -> StatusCode;
    fn direct_change_user_title(&self, ctx: &EventContext, id: ForumId, title: &str) -> StatusCode;
    fn direct_change_user_signature(
        &self,
        ctx: &EventContext,
        id: ForumId,
        signature: &str,
    ) -> StatusCode;
    fn direct_change_user_logo(&self, ctx: &EventContext, id: ForumId, logo: &[u8]) -> StatusCode;
    fn direct_delete_user(&self, ctx: &EventContext, id: ForumId) -> StatusCode;

    fn direct_add_new_discussion_thread(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode;
    fn direct_change_discussion_thread_name(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode;
    fn direct_change_discussion_thread_pin_display_order(
        &self,
        ctx: &EventContext,
        id: ForumId,
        order: u16,
    ) -> StatusCode;
    fn direct_change_discussion_thread_approval(
        &self,
        ctx: &EventContext,
        id: ForumId,
        approved: bool,
    ) -> StatusCode;
    fn direct_delete_discussion_thread(&self, ctx: &EventContext, id: ForumId) -> StatusCode;
    fn direct_merge_discussion_threads(
        &self,
        ctx: &EventContext,
        from_id: ForumId,
        into_id: ForumId,
    ) -> StatusCode;
    fn direct_subscribe_to_discussion_thread(
        &self,
        ctx: &EventContext,
        thread_id: ForumId,
    ) -> StatusCode;
    fn direct_unsubscribe_from_discussion_thread(
        &self,
        ctx: &EventContext,
        thread_id: ForumId,
    ) -> StatusCode;
    fn direct_increment_discussion_thread_number_of_visits(
        &self,
        ctx: &EventContext,
        thread_id: ForumId,
        count: u32,
    ) -> StatusCode;

    fn direct_add_new_discussion_thread_message(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
        thread_id: ForumId,
        content: &str,
    ) -> StatusCode;
    fn direct_change_discussion_thread_message_content(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
        content: &str,
        reason: &str,
    ) -> StatusCode;
    fn direct_change_discussion_thread_message_approval(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
        approved: bool,
    ) -> StatusCode;
    fn direct_move_discussion_thread_message(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
        into_thread_id: ForumId,
    ) -> StatusCode;
    fn direct_delete_discussion_thread_message(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
    ) -> StatusCode;
    fn direct_discussion_thread_message_up_vote(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
    ) -> StatusCode;
    fn direct_discussion_thread_message_down_vote(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
    ) -> StatusCode;
    fn direct_discussion_thread_message_reset_vote(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
    ) -> StatusCode;
    fn direct_quote_user_in_discussion_thread_message(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
        quoted_user_id: ForumId,
    ) -> StatusCode;

    fn direct_add_comment_to_discussion_thread_message(
        &self,
        ctx: &EventContext,
        comment_id: ForumId,
        message_id: ForumId,
        content: &str,
    ) -> StatusCode;
    fn direct_solve_discussion_thread_message_comment(
        &self,
        ctx: &EventContext,
        comment_id: ForumId,
    ) -> StatusCode;

    fn direct_add_new_discussion_tag(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode;
    fn direct_change_discussion_tag_name(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode;
    fn direct_change_discussion_tag_ui_blob(
        &self,
        ctx: &EventContext,
        id: ForumId,
        blob: &[u8],
    ) -> StatusCode;
    fn direct_delete_discussion_tag(&self, ctx: &EventContext, id: ForumId) -> StatusCode;
    fn direct_add_discussion_tag_to_thread(
        &self,
        ctx: &EventContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) -> StatusCode;
    fn direct_remove_discussion_tag_from_thread(
        &self,
        ctx: &EventContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) -> StatusCode;
    fn direct_merge_discussion_tags(
        &self,
        ctx: &EventContext,
        from_id: ForumId,
        into_id: ForumId,
    ) -> StatusCode;

    fn direct_add_new_discussion_category(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
        parent_id: Option<ForumId>,
    ) -> StatusCode;
    fn direct_change_discussion_category_name(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode;
    fn direct_change_discussion_category_description(
        &self,
        ctx: &EventContext,
        id: ForumId,
        description: &str,
    ) -> StatusCode;
    fn direct_change_discussion_category_display_order(
        &self,
        ctx: &EventContext,
        id: ForumId,
        display_order: u16,
    ) -> StatusCode;
    fn direct_change_discussion_category_parent(
        &self,
        ctx: &EventContext,
        id: ForumId,
        parent_id: Option<ForumId>,
    ) -> StatusCode;
    fn direct_delete_discussion_category(&self, ctx: &EventContext, id: ForumId) -> StatusCode;
    fn direct_add_discussion_tag_to_category(
        &self,
        ctx: &EventContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) -> StatusCode;
    fn direct_remove_discussion_tag_from_category(
        &self,
        ctx: &EventContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) -> StatusCode;

    fn direct_send_private_message(
        &self,
        ctx: &EventContext,
        id: ForumId,
        destination_id: ForumId,
        content: &str,
    ) -> StatusCode;
    fn direct_delete_private_message(&self, ctx: &EventContext, id: ForumId) -> StatusCode;

    fn direct_change_user_attachment_quota(
        &self,
        ctx: &EventContext,
        user_id: ForumId,
        quota: u64,
    ) -> StatusCode;
    fn direct_add_new_attachment(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
        size: u64,
    ) -> StatusCode;
    fn direct_change_attachment_name(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode;
    fn direct_change_attachment_approval(
        &self,
        ctx: &EventContext,
        id: ForumId,
        approved: bool,
    ) -> StatusCode;
    fn direct_delete_attachment(&self, ctx: &EventContext, id: ForumId) -> StatusCode;
    fn direct_add_attachment_to_discussion_thread_message(
        &self,
        ctx: &EventContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) -> StatusCode;
    fn direct_remove_attachment_from_discussion_thread_message(
        &self,
        ctx: &EventContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) -> StatusCode;
    fn direct_increment_attachment_number_of_gets(
        &self,
        ctx: &EventContext,
        id: ForumId,
        count: u32,
    ) -> StatusCode;

    fn direct_change_required_privilege(
        &self,
        ctx: &EventContext,
        of: PrivilegeKind,
        on: PrivilegeTarget,
        privilege: u16,
        value: i16,
    ) -> StatusCode;
    fn direct_change_forum_wide_default_privilege_level(
        &self,
        ctx: &EventContext,
        duration_kind: u16,
        value: i16,
        duration: i64,
    ) -> StatusCode;
    fn direct_assign_privilege(
        &self,
        ctx: &EventContext,
        target: PrivilegeTarget,
        user_id: ForumId,
        value: i16,
        duration: i64,
    ) -> StatusCode;

    /// Brackets bulk replay; orderings and counters are rebuilt at stop.
    fn direct_start_batch_insert(&self);
    fn direct_stop_batch_insert(&self);
}

impl DirectWriteRepository for MemoryRepository {
    fn direct_add_new_user(
        &self,
        ctx: &EventContext,
        id: ForumId,
        auth: &str,
        name: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            if store.user_by_id(id).is_some() {
                return StatusCode::AlreadyExists;
            }
            let handle = store.create_user(
                id,
                CollatedString::from(name),
                auth.to_owned(),
                ctx.timestamp,
            );
            store.insert_user(handle);
            StatusCode::Ok
        })
    }

    fn direct_change_user_name(&self, _ctx: &EventContext, id: ForumId, name: &str) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.user_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_user_name(handle, CollatedString::from(name));
            StatusCode::Ok
        })
    }

    fn direct_change_user_info(&self, _ctx: &EventContext, id: ForumId, info: &str) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.user_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_user_info(handle, info.to_owned());
            StatusCode::Ok
        })
    }

    fn direct_change_user_title(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        title: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.user_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_user_title(handle, title.to_owned());
            StatusCode::Ok
        })
    }

    fn direct_change_user_signature(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        signature: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.user_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_user_signature(handle, signature.to_owned());
            StatusCode::Ok
        })
    }

    fn direct_change_user_logo(&self, _ctx: &EventContext, id: ForumId, logo: &[u8]) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.user_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_user_logo(handle, logo.to_vec());
            StatusCode::Ok
        })
    }

    fn direct_delete_user(&self, _ctx: &EventContext, id: ForumId) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.user_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.delete_user(handle);
            StatusCode::Ok
        })
    }

    fn direct_add_new_discussion_thread(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            if store.thread_by_id(id).is_some() {
                return StatusCode::AlreadyExists;
            }
            let Some((creator, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let handle = store.create_thread(id, CollatedString::from(name), creator, ctx.timestamp);
            store.insert_thread(handle);
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_thread_name(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.thread_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_thread_name(handle, CollatedString::from(name));
            store.note_thread_updated(handle, ctx.timestamp);
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_thread_pin_display_order(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        order: u16,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.thread_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_thread_pin_display_order(handle, order);
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_thread_approval(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        approved: bool,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.thread_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_thread_approval(handle, approved);
            StatusCode::Ok
        })
    }

    fn direct_delete_discussion_thread(&self, _ctx: &EventContext, id: ForumId) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.thread_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.delete_thread(handle);
            StatusCode::Ok
        })
    }

    fn direct_merge_discussion_threads(
        &self,
        ctx: &EventContext,
        from_id: ForumId,
        into_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((from, _)) = store.thread_by_id(from_id) else {
                return StatusCode::NotFound;
            };
            let Some((into, _)) = store.thread_by_id(into_id) else {
                return StatusCode::NotFound;
            };
            store.merge_threads(from, into, ctx.timestamp);
            StatusCode::Ok
        })
    }

    fn direct_subscribe_to_discussion_thread(
        &self,
        ctx: &EventContext,
        thread_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((user, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return StatusCode::NotFound;
            };
            if store.subscribe_to_thread(user, thread) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_unsubscribe_from_discussion_thread(
        &self,
        ctx: &EventContext,
        thread_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((user, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return StatusCode::NotFound;
            };
            if store.unsubscribe_from_thread(user, thread) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_increment_discussion_thread_number_of_visits(
        &self,
        _ctx: &EventContext,
        thread_id: ForumId,
        count: u32,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.thread_by_id(thread_id) else {
                return StatusCode::NotFound;
            };
            store.note_thread_visited(handle, ForumId::ZERO, u64::from(count));
            StatusCode::Ok
        })
    }

    fn direct_add_new_discussion_thread_message(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
        thread_id: ForumId,
        content: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            if store.message_by_id(message_id).is_some() {
                return StatusCode::AlreadyExists;
            }
            let Some((author, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return StatusCode::NotFound;
            };
            let handle = store.create_message(
                message_id,
                thread,
                author,
                MessageContent::Owned(content.to_owned()),
                ctx.timestamp,
            );
            store.insert_message(handle);
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_thread_message_content(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
        content: &str,
        reason: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            store.change_message_content(
                handle,
                MessageContent::Owned(content.to_owned()),
                reason.to_owned(),
                ctx.timestamp,
            );
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_thread_message_approval(
        &self,
        _ctx: &EventContext,
        message_id: ForumId,
        approved: bool,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            store.change_message_approval(handle, approved);
            StatusCode::Ok
        })
    }

    fn direct_move_discussion_thread_message(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
        into_thread_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            let Some((into, _)) = store.thread_by_id(into_thread_id) else {
                return StatusCode::NotFound;
            };
            store.move_message(handle, into, ctx.timestamp);
            StatusCode::Ok
        })
    }

    fn direct_delete_discussion_thread_message(
        &self,
        _ctx: &EventContext,
        message_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            store.delete_message(handle);
            StatusCode::Ok
        })
    }

    fn direct_discussion_thread_message_up_vote(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
    ) -> StatusCode {
        self.direct_vote(ctx, message_id, true)
    }

    fn direct_discussion_thread_message_down_vote(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
    ) -> StatusCode {
        self.direct_vote(ctx, message_id, false)
    }

    fn direct_discussion_thread_message_reset_vote(
        &self,
        ctx: &EventContext,
        message_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((voter, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let Some((handle, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            if store.reset_vote(handle, voter).is_some() {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_quote_user_in_discussion_thread_message(
        &self,
        _ctx: &EventContext,
        message_id: ForumId,
        quoted_user_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((quoted, _)) = store.user_by_id(quoted_user_id) else {
                return StatusCode::NotFound;
            };
            store.record_quote(quoted, message_id);
            StatusCode::Ok
        })
    }

    fn direct_add_comment_to_discussion_thread_message(
        &self,
        ctx: &EventContext,
        comment_id: ForumId,
        message_id: ForumId,
        content: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            if store.comment_by_id(comment_id).is_some() {
                return StatusCode::AlreadyExists;
            }
            let Some((author, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let Some((message, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            let handle =
                store.create_comment(comment_id, message, author, content.to_owned(), ctx.timestamp);
            store.insert_comment(handle);
            StatusCode::Ok
        })
    }

    fn direct_solve_discussion_thread_message_comment(
        &self,
        _ctx: &EventContext,
        comment_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.comment_by_id(comment_id) else {
                return StatusCode::NotFound;
            };
            if store.solve_comment(handle) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_add_new_discussion_tag(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            if store.tag_by_id(id).is_some() {
                return StatusCode::AlreadyExists;
            }
            let handle = store.create_tag(id, CollatedString::from(name), ctx.timestamp);
            store.insert_tag(handle);
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_tag_name(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.tag_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_tag_name(handle, CollatedString::from(name));
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_tag_ui_blob(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        blob: &[u8],
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.tag_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_tag_ui_blob(handle, blob.to_vec());
            StatusCode::Ok
        })
    }

    fn direct_delete_discussion_tag(&self, _ctx: &EventContext, id: ForumId) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.tag_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.delete_tag(handle);
            StatusCode::Ok
        })
    }

    fn direct_add_discussion_tag_to_thread(
        &self,
        _ctx: &EventContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((tag, _)) = store.tag_by_id(tag_id) else {
                return StatusCode::NotFound;
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return StatusCode::NotFound;
            };
            if store.add_tag_to_thread(tag, thread) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_remove_discussion_tag_from_thread(
        &self,
        _ctx: &EventContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((tag, _)) = store.tag_by_id(tag_id) else {
                return StatusCode::NotFound;
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return StatusCode::NotFound;
            };
            if store.remove_tag_from_thread(tag, thread) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_merge_discussion_tags(
        &self,
        _ctx: &EventContext,
        from_id: ForumId,
        into_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((from, _)) = store.tag_by_id(from_id) else {
                return StatusCode::NotFound;
            };
            let Some((into, _)) = store.tag_by_id(into_id) else {
                return StatusCode::NotFound;
            };
            store.merge_tags(from, into);
            StatusCode::Ok
        })
    }

    fn direct_add_new_discussion_category(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
        parent_id: Option<ForumId>,
    ) -> StatusCode {
        self.store().write(|store| {
            if store.category_by_id(id).is_some() {
                return StatusCode::AlreadyExists;
            }
            let parent = match parent_id {
                None => None,
                Some(parent_id) => match store.category_by_id(parent_id) {
                    Some((handle, _)) => Some(handle),
                    None => return StatusCode::NotFound,
                },
            };
            let handle = store.create_category(id, CollatedString::from(name), parent, ctx.timestamp);
            store.insert_category(handle);
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_category_name(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.category_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_category_name(handle, CollatedString::from(name));
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_category_description(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        description: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.category_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_category_description(handle, description.to_owned());
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_category_display_order(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        display_order: u16,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.category_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_category_display_order(handle, display_order);
            StatusCode::Ok
        })
    }

    fn direct_change_discussion_category_parent(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        parent_id: Option<ForumId>,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.category_by_id(id) else {
                return StatusCode::NotFound;
            };
            let parent = match parent_id {
                None => None,
                Some(parent_id) => match store.category_by_id(parent_id) {
                    Some((parent, _)) => Some(parent),
                    None => return StatusCode::NotFound,
                },
            };
            if let Some(parent) = parent {
                if store.category_parent_would_cycle(handle, parent) {
                    return StatusCode::CircularReferenceNotAllowed;
                }
            }
            store.change_category_parent(handle, parent);
            StatusCode::Ok
        })
    }

    fn direct_delete_discussion_category(&self, _ctx: &EventContext, id: ForumId) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.category_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.delete_category(handle);
            StatusCode::Ok
        })
    }

    fn direct_add_discussion_tag_to_category(
        &self,
        _ctx: &EventContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((tag, _)) = store.tag_by_id(tag_id) else {
                return StatusCode::NotFound;
            };
            let Some((category, _)) = store.category_by_id(category_id) else {
                return StatusCode::NotFound;
            };
            if store.add_tag_to_category(tag, category) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_remove_discussion_tag_from_category(
        &self,
        _ctx: &EventContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((tag, _)) = store.tag_by_id(tag_id) else {
                return StatusCode::NotFound;
            };
            let Some((category, _)) = store.category_by_id(category_id) else {
                return StatusCode::NotFound;
            };
            if store.remove_tag_from_category(tag, category) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_send_private_message(
        &self,
        ctx: &EventContext,
        id: ForumId,
        destination_id: ForumId,
        content: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            if store.private_message_by_id(id).is_some() {
                return StatusCode::AlreadyExists;
            }
            let Some((source, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let Some((destination, _)) = store.user_by_id(destination_id) else {
                return StatusCode::NotFound;
            };
            let handle = store.create_private_message(
                id,
                source,
                destination,
                content.to_owned(),
                ctx.timestamp,
            );
            store.insert_private_message(handle);
            StatusCode::Ok
        })
    }

    fn direct_delete_private_message(&self, _ctx: &EventContext, id: ForumId) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.private_message_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.delete_private_message(handle);
            StatusCode::Ok
        })
    }

    fn direct_change_user_attachment_quota(
        &self,
        _ctx: &EventContext,
        user_id: ForumId,
        quota: u64,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.user_by_id(user_id) else {
                return StatusCode::NotFound;
            };
            store.change_user_attachment_quota(handle, Some(quota));
            StatusCode::Ok
        })
    }

    fn direct_add_new_attachment(
        &self,
        ctx: &EventContext,
        id: ForumId,
        name: &str,
        size: u64,
    ) -> StatusCode {
        self.store().write(|store| {
            if store.attachment_by_id(id).is_some() {
                return StatusCode::AlreadyExists;
            }
            let Some((owner, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let handle =
                store.create_attachment(id, CollatedString::from(name), owner, size, ctx.timestamp);
            store.insert_attachment(handle);
            StatusCode::Ok
        })
    }

    fn direct_change_attachment_name(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        name: &str,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.attachment_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_attachment_name(handle, CollatedString::from(name));
            StatusCode::Ok
        })
    }

    fn direct_change_attachment_approval(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        approved: bool,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.attachment_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.change_attachment_approval(handle, approved);
            StatusCode::Ok
        })
    }

    fn direct_delete_attachment(&self, _ctx: &EventContext, id: ForumId) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.attachment_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.delete_attachment(handle);
            StatusCode::Ok
        })
    }

    fn direct_add_attachment_to_discussion_thread_message(
        &self,
        _ctx: &EventContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((attachment, _)) = store.attachment_by_id(attachment_id) else {
                return StatusCode::NotFound;
            };
            let Some((message, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            if store.add_attachment_to_message(attachment, message) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_remove_attachment_from_discussion_thread_message(
        &self,
        _ctx: &EventContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((attachment, _)) = store.attachment_by_id(attachment_id) else {
                return StatusCode::NotFound;
            };
            let Some((message, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            if store.remove_attachment_from_message(attachment, message) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }

    fn direct_increment_attachment_number_of_gets(
        &self,
        _ctx: &EventContext,
        id: ForumId,
        count: u32,
    ) -> StatusCode {
        self.store().write(|store| {
            let Some((handle, _)) = store.attachment_by_id(id) else {
                return StatusCode::NotFound;
            };
            store.increment_attachment_gets(handle, u64::from(count));
            StatusCode::Ok
        })
    }

    fn direct_change_required_privilege(
        &self,
        _ctx: &EventContext,
        of: PrivilegeKind,
        on: PrivilegeTarget,
        privilege: u16,
        value: i16,
    ) -> StatusCode {
        self.store().write(|store| {
            store.set_required_privilege(of, on, privilege, value);
            StatusCode::Ok
        })
    }

    fn direct_change_forum_wide_default_privilege_level(
        &self,
        _ctx: &EventContext,
        duration_kind: u16,
        value: i16,
        duration: i64,
    ) -> StatusCode {
        self.store().write(|store| {
            store.set_forum_wide_default_privilege_level(duration_kind, value, duration);
            StatusCode::Ok
        })
    }

    fn direct_assign_privilege(
        &self,
        ctx: &EventContext,
        target: PrivilegeTarget,
        user_id: ForumId,
        value: i16,
        duration: i64,
    ) -> StatusCode {
        self.store().write(|store| {
            store.assign_privilege(user_id, target, value, ctx.timestamp, duration);
            StatusCode::Ok
        })
    }

    fn direct_start_batch_insert(&self) {
        self.store().write(|store| store.start_batch_insert());
    }

    fn direct_stop_batch_insert(&self) {
        self.store().write(|store| store.stop_batch_insert());
    }
}

impl MemoryRepository {
    fn direct_vote(&self, ctx: &EventContext, message_id: ForumId, up: bool) -> StatusCode {
        self.store().write(|store| {
            let Some((voter, _)) = store.user_by_id(ctx.performed_by) else {
                return StatusCode::NotFound;
            };
            let Some((handle, _)) = store.message_by_id(message_id) else {
                return StatusCode::NotFound;
            };
            if store.vote_message(handle, voter, ctx.timestamp, up) {
                StatusCode::Ok
            } else {
                StatusCode::NoEffect
            }
        })
    }
}
