//! The persistence observer: one listener on every mutation signal.
//!
//! Each signal is encoded into a single exactly-sized buffer (event
//! header, context, event data) and enqueued; the writer thread does the
//! rest. Thread visits and attachment downloads are not written per
//! read: a timer thread drains per-id counters every 30 seconds and
//! emits one increment event per entity, with an empty context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use agora_core::event::{
    CONTEXT_SIZE, CONTEXT_VERSION, EVENT_HEADER_SIZE, EventContext, EventType, EventVersion,
};
use agora_core::id::ForumId;
use agora_core::wire::{BlobWriter, lp_size};
use agora_data::entities::privileges::{PrivilegeKind, PrivilegeTarget};
use agora_data::entities::{Attachment, Category, Comment, Message, PrivateMessage, Tag, Thread, User};
use agora_data::observers::{
    AttachmentChange, CategoryChange, ObserverContext, ReadObserver, TagChange, ThreadChange,
    UserChange, WriteObserver,
};
use tracing::debug;

use crate::LOG_TARGET;
use crate::pipeline::{Blob, EventPipeline};

const EVENT_VERSION_1: EventVersion = 1;
const COUNTER_FLUSH_EVERY: u32 = 30;
const TIMER_CHECK_INTERVAL: Duration = Duration::from_secs(1);

fn event_context(ctx: &ObserverContext) -> EventContext {
    EventContext {
        timestamp: ctx.timestamp,
        performed_by: ctx.performed_by,
        ip: ctx.ip,
    }
}

struct Inner {
    pipeline: Arc<EventPipeline>,
    thread_visits: Mutex<HashMap<ForumId, u32>>,
    attachment_gets: Mutex<HashMap<ForumId, u32>>,
}

impl Inner {
    fn record(
        &self,
        event_type: EventType,
        ctx: &EventContext,
        data_size: usize,
        write_data: impl FnOnce(&mut BlobWriter),
    ) {
        let total = EVENT_HEADER_SIZE + CONTEXT_SIZE + data_size;
        let mut writer = BlobWriter::with_capacity(total);
        writer.write_u32(event_type.0);
        writer.write_u16(EVENT_VERSION_1);
        writer.write_u16(CONTEXT_VERSION);
        ctx.write_to(&mut writer);
        write_data(&mut writer);
        debug_assert_eq!(writer.len(), total);
        self.pipeline.enqueue(Blob::from_vec(writer.into_vec()));
    }

    fn record_id(&self, event_type: EventType, ctx: &EventContext, id: ForumId) {
        self.record(event_type, ctx, ForumId::SIZE, |w| w.write_id(id));
    }

    fn record_two_ids(&self, event_type: EventType, ctx: &EventContext, a: ForumId, b: ForumId) {
        self.record(event_type, ctx, 2 * ForumId::SIZE, |w| {
            w.write_id(a);
            w.write_id(b);
        });
    }

    fn record_id_lp(&self, event_type: EventType, ctx: &EventContext, id: ForumId, bytes: &[u8]) {
        self.record(event_type, ctx, ForumId::SIZE + lp_size(bytes.len()), |w| {
            w.write_id(id);
            w.write_lp_bytes(bytes);
        });
    }

    fn record_id_u8(&self, event_type: EventType, ctx: &EventContext, id: ForumId, value: u8) {
        self.record(event_type, ctx, ForumId::SIZE + 1, |w| {
            w.write_id(id);
            w.write_u8(value);
        });
    }

    fn record_id_u16(&self, event_type: EventType, ctx: &EventContext, id: ForumId, value: u16) {
        self.record(event_type, ctx, ForumId::SIZE + 2, |w| {
            w.write_id(id);
            w.write_u16(value);
        });
    }

    fn flush_counters(&self) {
        let visits: Vec<(ForumId, u32)> = {
            let mut map = self.thread_visits.lock().expect("Locking failed");
            map.drain().collect()
        };
        for (thread_id, count) in visits {
            self.record(
                EventType::INCREMENT_DISCUSSION_THREAD_NUMBER_OF_VISITS,
                &EventContext::EMPTY,
                ForumId::SIZE + 4,
                |w| {
                    w.write_id(thread_id);
                    w.write_u32(count);
                },
            );
        }
        let gets: Vec<(ForumId, u32)> = {
            let mut map = self.attachment_gets.lock().expect("Locking failed");
            map.drain().collect()
        };
        for (attachment_id, count) in gets {
            self.record(
                EventType::INCREMENT_ATTACHMENT_NUMBER_OF_GETS,
                &EventContext::EMPTY,
                ForumId::SIZE + 4,
                |w| {
                    w.write_id(attachment_id);
                    w.write_u32(count);
                },
            );
        }
    }
}

pub struct PersistenceObserver {
    inner: Arc<Inner>,
    stop: Arc<AtomicBool>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceObserver {
    pub fn new(pipeline: Arc<EventPipeline>) -> Arc<Self> {
        let inner = Arc::new(Inner {
            pipeline,
            thread_visits: Mutex::new(HashMap::new()),
            attachment_gets: Mutex::new(HashMap::new()),
        });
        let stop = Arc::new(AtomicBool::new(false));

        let timer_inner = inner.clone();
        let timer_stop = stop.clone();
        let timer = std::thread::Builder::new()
            .name("visit-coalescer".into())
            .spawn(move || {
                let mut ticks = 0u32;
                while !timer_stop.load(Ordering::Acquire) {
                    std::thread::sleep(TIMER_CHECK_INTERVAL);
                    ticks += 1;
                    if ticks >= COUNTER_FLUSH_EVERY {
                        timer_inner.flush_counters();
                        ticks = 0;
                    }
                }
            })
            .expect("Spawning thread failed");

        Arc::new(Self {
            inner,
            stop,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Stops the timer thread and emits any still-coalesced counters.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(timer) = self.timer.lock().expect("Locking failed").take() {
            timer.join().expect("Timer thread panicked");
            self.inner.flush_counters();
            debug!(target: LOG_TARGET, "Persistence observer stopped");
        }
    }
}

impl Drop for PersistenceObserver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl WriteObserver for PersistenceObserver {
    fn on_add_new_user(&self, ctx: &ObserverContext, user: &User) {
        let ctx = event_context(ctx);
        let auth = user.auth().as_bytes();
        let name = user.name().as_str().as_bytes();
        self.inner.record(
            EventType::ADD_NEW_USER,
            &ctx,
            ForumId::SIZE + lp_size(auth.len()) + lp_size(name.len()),
            |w| {
                w.write_id(user.id());
                w.write_lp_bytes(auth);
                w.write_lp_bytes(name);
            },
        );
    }

    fn on_change_user(&self, ctx: &ObserverContext, user: &User, change: UserChange) {
        let ctx = event_context(ctx);
        match change {
            UserChange::Name => self.inner.record_id_lp(
                EventType::CHANGE_USER_NAME,
                &ctx,
                user.id(),
                user.name().as_str().as_bytes(),
            ),
            UserChange::Info => self.inner.record_id_lp(
                EventType::CHANGE_USER_INFO,
                &ctx,
                user.id(),
                user.info().as_bytes(),
            ),
            UserChange::Title => self.inner.record_id_lp(
                EventType::CHANGE_USER_TITLE,
                &ctx,
                user.id(),
                user.title().as_bytes(),
            ),
            UserChange::Signature => self.inner.record_id_lp(
                EventType::CHANGE_USER_SIGNATURE,
                &ctx,
                user.id(),
                user.signature().as_bytes(),
            ),
            UserChange::Logo => self.inner.record_id_lp(
                EventType::CHANGE_USER_LOGO,
                &ctx,
                user.id(),
                user.logo(),
            ),
            // The quota carries its own payload shape; see
            // on_change_user_attachment_quota.
            UserChange::AttachmentQuota => {}
        }
    }

    fn on_delete_user(&self, ctx: &ObserverContext, user_id: ForumId) {
        self.inner
            .record_id(EventType::DELETE_USER, &event_context(ctx), user_id);
    }

    fn on_add_new_discussion_thread(&self, ctx: &ObserverContext, thread: &Thread) {
        self.inner.record_id_lp(
            EventType::ADD_NEW_DISCUSSION_THREAD,
            &event_context(ctx),
            thread.id(),
            thread.name().as_str().as_bytes(),
        );
    }

    fn on_change_discussion_thread(
        &self,
        ctx: &ObserverContext,
        thread: &Thread,
        change: ThreadChange,
    ) {
        let ctx = event_context(ctx);
        match change {
            ThreadChange::Name => self.inner.record_id_lp(
                EventType::CHANGE_DISCUSSION_THREAD_NAME,
                &ctx,
                thread.id(),
                thread.name().as_str().as_bytes(),
            ),
            ThreadChange::PinDisplayOrder => self.inner.record_id_u16(
                EventType::CHANGE_DISCUSSION_THREAD_PIN_DISPLAY_ORDER,
                &ctx,
                thread.id(),
                thread.pin_display_order(),
            ),
            ThreadChange::Approval => self.inner.record_id_u8(
                EventType::CHANGE_DISCUSSION_THREAD_APPROVAL,
                &ctx,
                thread.id(),
                u8::from(thread.approved()),
            ),
        }
    }

    fn on_delete_discussion_thread(&self, ctx: &ObserverContext, thread_id: ForumId) {
        self.inner.record_id(
            EventType::DELETE_DISCUSSION_THREAD,
            &event_context(ctx),
            thread_id,
        );
    }

    fn on_merge_discussion_threads(
        &self,
        ctx: &ObserverContext,
        from_id: ForumId,
        into_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::MERGE_DISCUSSION_THREADS,
            &event_context(ctx),
            from_id,
            into_id,
        );
    }

    fn on_subscribe_to_discussion_thread(&self, ctx: &ObserverContext, thread_id: ForumId) {
        self.inner.record_id(
            EventType::SUBSCRIBE_TO_DISCUSSION_THREAD,
            &event_context(ctx),
            thread_id,
        );
    }

    fn on_unsubscribe_from_discussion_thread(&self, ctx: &ObserverContext, thread_id: ForumId) {
        self.inner.record_id(
            EventType::UNSUBSCRIBE_FROM_DISCUSSION_THREAD,
            &event_context(ctx),
            thread_id,
        );
    }

    fn on_add_new_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        message: &Message,
        thread_id: ForumId,
        content: &str,
    ) {
        let content = content.as_bytes();
        self.inner.record(
            EventType::ADD_NEW_DISCUSSION_THREAD_MESSAGE,
            &event_context(ctx),
            2 * ForumId::SIZE + lp_size(content.len()),
            |w| {
                w.write_id(message.id());
                w.write_id(thread_id);
                w.write_lp_bytes(content);
            },
        );
    }

    fn on_change_discussion_thread_message_content(
        &self,
        ctx: &ObserverContext,
        message_id: ForumId,
        content: &str,
        reason: &str,
    ) {
        let content = content.as_bytes();
        let reason = reason.as_bytes();
        self.inner.record(
            EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_CONTENT,
            &event_context(ctx),
            ForumId::SIZE + lp_size(content.len()) + lp_size(reason.len()),
            |w| {
                w.write_id(message_id);
                w.write_lp_bytes(content);
                w.write_lp_bytes(reason);
            },
        );
    }

    fn on_change_discussion_thread_message_approval(
        &self,
        ctx: &ObserverContext,
        message: &Message,
    ) {
        self.inner.record_id_u8(
            EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_APPROVAL,
            &event_context(ctx),
            message.id(),
            u8::from(message.approved()),
        );
    }

    fn on_move_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        message_id: ForumId,
        into_thread_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::MOVE_DISCUSSION_THREAD_MESSAGE,
            &event_context(ctx),
            message_id,
            into_thread_id,
        );
    }

    fn on_delete_discussion_thread_message(&self, ctx: &ObserverContext, message_id: ForumId) {
        self.inner.record_id(
            EventType::DELETE_DISCUSSION_THREAD_MESSAGE,
            &event_context(ctx),
            message_id,
        );
    }

    fn on_discussion_thread_message_up_vote(&self, ctx: &ObserverContext, message_id: ForumId) {
        self.inner.record_id(
            EventType::DISCUSSION_THREAD_MESSAGE_UP_VOTE,
            &event_context(ctx),
            message_id,
        );
    }

    fn on_discussion_thread_message_down_vote(&self, ctx: &ObserverContext, message_id: ForumId) {
        self.inner.record_id(
            EventType::DISCUSSION_THREAD_MESSAGE_DOWN_VOTE,
            &event_context(ctx),
            message_id,
        );
    }

    fn on_discussion_thread_message_reset_vote(&self, ctx: &ObserverContext, message_id: ForumId) {
        self.inner.record_id(
            EventType::DISCUSSION_THREAD_MESSAGE_RESET_VOTE,
            &event_context(ctx),
            message_id,
        );
    }

    fn on_quote_user_in_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        message_id: ForumId,
        quoted_user_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::QUOTE_USER_IN_DISCUSSION_THREAD_MESSAGE,
            &event_context(ctx),
            message_id,
            quoted_user_id,
        );
    }

    fn on_add_comment_to_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        comment: &Comment,
        message_id: ForumId,
    ) {
        let content = comment.content().as_bytes();
        self.inner.record(
            EventType::ADD_COMMENT_TO_DISCUSSION_THREAD_MESSAGE,
            &event_context(ctx),
            2 * ForumId::SIZE + lp_size(content.len()),
            |w| {
                w.write_id(comment.id());
                w.write_id(message_id);
                w.write_lp_bytes(content);
            },
        );
    }

    fn on_solve_discussion_thread_message_comment(
        &self,
        ctx: &ObserverContext,
        comment_id: ForumId,
    ) {
        self.inner.record_id(
            EventType::SOLVE_DISCUSSION_THREAD_MESSAGE_COMMENT,
            &event_context(ctx),
            comment_id,
        );
    }

    fn on_add_new_discussion_tag(&self, ctx: &ObserverContext, tag: &Tag) {
        self.inner.record_id_lp(
            EventType::ADD_NEW_DISCUSSION_TAG,
            &event_context(ctx),
            tag.id(),
            tag.name().as_str().as_bytes(),
        );
    }

    fn on_change_discussion_tag(&self, ctx: &ObserverContext, tag: &Tag, change: TagChange) {
        let ctx = event_context(ctx);
        match change {
            TagChange::Name => self.inner.record_id_lp(
                EventType::CHANGE_DISCUSSION_TAG_NAME,
                &ctx,
                tag.id(),
                tag.name().as_str().as_bytes(),
            ),
            TagChange::UiBlob => self.inner.record_id_lp(
                EventType::CHANGE_DISCUSSION_TAG_UI_BLOB,
                &ctx,
                tag.id(),
                tag.ui_blob(),
            ),
        }
    }

    fn on_delete_discussion_tag(&self, ctx: &ObserverContext, tag_id: ForumId) {
        self.inner
            .record_id(EventType::DELETE_DISCUSSION_TAG, &event_context(ctx), tag_id);
    }

    fn on_add_discussion_tag_to_thread(
        &self,
        ctx: &ObserverContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::ADD_DISCUSSION_TAG_TO_THREAD,
            &event_context(ctx),
            tag_id,
            thread_id,
        );
    }

    fn on_remove_discussion_tag_from_thread(
        &self,
        ctx: &ObserverContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::REMOVE_DISCUSSION_TAG_FROM_THREAD,
            &event_context(ctx),
            tag_id,
            thread_id,
        );
    }

    fn on_merge_discussion_tags(&self, ctx: &ObserverContext, from_id: ForumId, into_id: ForumId) {
        self.inner.record_two_ids(
            EventType::MERGE_DISCUSSION_TAGS,
            &event_context(ctx),
            from_id,
            into_id,
        );
    }

    fn on_add_new_discussion_category(
        &self,
        ctx: &ObserverContext,
        category: &Category,
        parent_id: Option<ForumId>,
    ) {
        let name = category.name().as_str().as_bytes();
        self.inner.record(
            EventType::ADD_NEW_DISCUSSION_CATEGORY,
            &event_context(ctx),
            2 * ForumId::SIZE + lp_size(name.len()),
            |w| {
                w.write_id(category.id());
                w.write_lp_bytes(name);
                w.write_id(parent_id.unwrap_or(ForumId::ZERO));
            },
        );
    }

    fn on_change_discussion_category(
        &self,
        ctx: &ObserverContext,
        category: &Category,
        change: CategoryChange,
    ) {
        let ctx = event_context(ctx);
        match change {
            CategoryChange::Name => self.inner.record_id_lp(
                EventType::CHANGE_DISCUSSION_CATEGORY_NAME,
                &ctx,
                category.id(),
                category.name().as_str().as_bytes(),
            ),
            CategoryChange::Description => self.inner.record_id_lp(
                EventType::CHANGE_DISCUSSION_CATEGORY_DESCRIPTION,
                &ctx,
                category.id(),
                category.description().as_bytes(),
            ),
            CategoryChange::DisplayOrder => self.inner.record_id_u16(
                EventType::CHANGE_DISCUSSION_CATEGORY_DISPLAY_ORDER,
                &ctx,
                category.id(),
                category.display_order(),
            ),
        }
    }

    fn on_change_discussion_category_parent(
        &self,
        ctx: &ObserverContext,
        category: &Category,
        parent_id: Option<ForumId>,
    ) {
        self.inner.record_two_ids(
            EventType::CHANGE_DISCUSSION_CATEGORY_PARENT,
            &event_context(ctx),
            category.id(),
            parent_id.unwrap_or(ForumId::ZERO),
        );
    }

    fn on_delete_discussion_category(&self, ctx: &ObserverContext, category_id: ForumId) {
        self.inner.record_id(
            EventType::DELETE_DISCUSSION_CATEGORY,
            &event_context(ctx),
            category_id,
        );
    }

    fn on_add_discussion_tag_to_category(
        &self,
        ctx: &ObserverContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::ADD_DISCUSSION_TAG_TO_CATEGORY,
            &event_context(ctx),
            tag_id,
            category_id,
        );
    }

    fn on_remove_discussion_tag_from_category(
        &self,
        ctx: &ObserverContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::REMOVE_DISCUSSION_TAG_FROM_CATEGORY,
            &event_context(ctx),
            tag_id,
            category_id,
        );
    }

    fn on_send_private_message(
        &self,
        ctx: &ObserverContext,
        message: &PrivateMessage,
        destination_id: ForumId,
    ) {
        let content = message.content().as_bytes();
        self.inner.record(
            EventType::SEND_PRIVATE_MESSAGE,
            &event_context(ctx),
            2 * ForumId::SIZE + lp_size(content.len()),
            |w| {
                w.write_id(message.id());
                w.write_id(destination_id);
                w.write_lp_bytes(content);
            },
        );
    }

    fn on_delete_private_message(&self, ctx: &ObserverContext, message_id: ForumId) {
        self.inner.record_id(
            EventType::DELETE_PRIVATE_MESSAGE,
            &event_context(ctx),
            message_id,
        );
    }

    fn on_change_user_attachment_quota(
        &self,
        ctx: &ObserverContext,
        user_id: ForumId,
        quota: u64,
    ) {
        self.inner.record(
            EventType::CHANGE_USER_ATTACHMENT_QUOTA,
            &event_context(ctx),
            ForumId::SIZE + 8,
            |w| {
                w.write_id(user_id);
                w.write_u64(quota);
            },
        );
    }

    fn on_add_new_attachment(&self, ctx: &ObserverContext, attachment: &Attachment) {
        let name = attachment.name().as_str().as_bytes();
        self.inner.record(
            EventType::ADD_NEW_ATTACHMENT,
            &event_context(ctx),
            ForumId::SIZE + 8 + lp_size(name.len()),
            |w| {
                w.write_id(attachment.id());
                w.write_u64(attachment.size());
                w.write_lp_bytes(name);
            },
        );
    }

    fn on_change_attachment(
        &self,
        ctx: &ObserverContext,
        attachment: &Attachment,
        change: AttachmentChange,
    ) {
        let ctx = event_context(ctx);
        match change {
            AttachmentChange::Name => self.inner.record_id_lp(
                EventType::CHANGE_ATTACHMENT_NAME,
                &ctx,
                attachment.id(),
                attachment.name().as_str().as_bytes(),
            ),
            AttachmentChange::Approval => self.inner.record_id_u8(
                EventType::CHANGE_ATTACHMENT_APPROVAL,
                &ctx,
                attachment.id(),
                u8::from(attachment.approved()),
            ),
        }
    }

    fn on_delete_attachment(&self, ctx: &ObserverContext, attachment_id: ForumId) {
        self.inner
            .record_id(EventType::DELETE_ATTACHMENT, &event_context(ctx), attachment_id);
    }

    fn on_add_attachment_to_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::ADD_ATTACHMENT_TO_DISCUSSION_THREAD_MESSAGE,
            &event_context(ctx),
            attachment_id,
            message_id,
        );
    }

    fn on_remove_attachment_from_discussion_thread_message(
        &self,
        ctx: &ObserverContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) {
        self.inner.record_two_ids(
            EventType::REMOVE_ATTACHMENT_FROM_DISCUSSION_THREAD_MESSAGE,
            &event_context(ctx),
            attachment_id,
            message_id,
        );
    }

    fn on_change_required_privilege(
        &self,
        ctx: &ObserverContext,
        of: PrivilegeKind,
        on: PrivilegeTarget,
        privilege: u16,
        value: i16,
    ) {
        let Some(event_type) = required_privilege_event(of, on) else {
            return;
        };
        let target_id = on.id();
        let data_size = target_id.map_or(0, |_| ForumId::SIZE) + 2 + 2;
        self.inner.record(event_type, &event_context(ctx), data_size, |w| {
            if let Some(target_id) = target_id {
                w.write_id(target_id);
            }
            w.write_u16(privilege);
            w.write_i16(value);
        });
    }

    fn on_change_forum_wide_default_privilege_level(
        &self,
        ctx: &ObserverContext,
        duration_kind: u16,
        value: i16,
        duration: i64,
    ) {
        self.inner.record(
            EventType::CHANGE_FORUM_WIDE_DEFAULT_PRIVILEGE_LEVEL,
            &event_context(ctx),
            2 + 2 + 8,
            |w| {
                w.write_u16(duration_kind);
                w.write_i16(value);
                w.write_i64(duration);
            },
        );
    }

    fn on_assign_privilege(
        &self,
        ctx: &ObserverContext,
        target: PrivilegeTarget,
        user_id: ForumId,
        value: i16,
        duration: i64,
    ) {
        let event_type = match target {
            PrivilegeTarget::ThreadMessage(_) => {
                EventType::ASSIGN_DISCUSSION_THREAD_MESSAGE_PRIVILEGE
            }
            PrivilegeTarget::Thread(_) => EventType::ASSIGN_DISCUSSION_THREAD_PRIVILEGE,
            PrivilegeTarget::Tag(_) => EventType::ASSIGN_DISCUSSION_TAG_PRIVILEGE,
            PrivilegeTarget::Category(_) => EventType::ASSIGN_DISCUSSION_CATEGORY_PRIVILEGE,
            PrivilegeTarget::ForumWide => EventType::ASSIGN_FORUM_WIDE_PRIVILEGE,
        };
        let target_id = target.id();
        let data_size = target_id.map_or(0, |_| ForumId::SIZE) + ForumId::SIZE + 2 + 8;
        self.inner.record(event_type, &event_context(ctx), data_size, |w| {
            if let Some(target_id) = target_id {
                w.write_id(target_id);
            }
            w.write_id(user_id);
            w.write_i16(value);
            w.write_i64(duration);
        });
    }
}

fn required_privilege_event(of: PrivilegeKind, on: PrivilegeTarget) -> Option<EventType> {
    use PrivilegeKind as K;
    use PrivilegeTarget as T;
    Some(match (of, on) {
        (K::ThreadMessage, T::ThreadMessage(_)) => {
            EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_THREAD_MESSAGE
        }
        (K::ThreadMessage, T::Thread(_)) => {
            EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_THREAD
        }
        (K::ThreadMessage, T::Tag(_)) => {
            EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_TAG
        }
        (K::ThreadMessage, T::ForumWide) => {
            EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FORUM_WIDE
        }
        (K::Thread, T::Thread(_)) => {
            EventType::CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FOR_THREAD
        }
        (K::Thread, T::Tag(_)) => EventType::CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FOR_TAG,
        (K::Thread, T::ForumWide) => {
            EventType::CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FORUM_WIDE
        }
        (K::Tag, T::Tag(_)) => EventType::CHANGE_DISCUSSION_TAG_REQUIRED_PRIVILEGE_FOR_TAG,
        (K::Tag, T::ForumWide) => EventType::CHANGE_DISCUSSION_TAG_REQUIRED_PRIVILEGE_FORUM_WIDE,
        (K::Category, T::Category(_)) => {
            EventType::CHANGE_DISCUSSION_CATEGORY_REQUIRED_PRIVILEGE_FOR_CATEGORY
        }
        (K::Category, T::ForumWide) => {
            EventType::CHANGE_DISCUSSION_CATEGORY_REQUIRED_PRIVILEGE_FORUM_WIDE
        }
        (K::ForumWide, T::ForumWide) => EventType::CHANGE_FORUM_WIDE_REQUIRED_PRIVILEGE,
        _ => return None,
    })
}

impl ReadObserver for PersistenceObserver {
    fn on_get_discussion_thread_by_id(&self, thread_id: ForumId) {
        *self
            .inner
            .thread_visits
            .lock()
            .expect("Locking failed")
            .entry(thread_id)
            .or_insert(0) += 1;
    }

    fn on_get_attachment(&self, attachment_id: ForumId) {
        *self
            .inner
            .attachment_gets
            .lock()
            .expect("Locking failed")
            .entry(attachment_id)
            .or_insert(0) += 1;
    }
}
