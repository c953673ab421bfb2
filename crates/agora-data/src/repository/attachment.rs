//! Attachment operations.
//!
//! The core stores attachment metadata only; the byte payload lives in
//! external storage addressed by the attachment id.

use agora_core::id::ForumId;
use agora_core::{Timestamp, config};

use super::{
    AddedEntity, MemoryRepository, RepoResult, RequestContext, StatusCode, page_slice,
    validate_name,
};
use crate::authorization::AuthorizedOperation;
use crate::entities::Attachment;
use crate::observers::AttachmentChange;
use crate::sort_key::CollatedString;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetrieveAttachmentsBy {
    Created,
    Name,
    Size,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentSummary {
    pub id: ForumId,
    pub name: String,
    pub created: Timestamp,
    pub created_by: ForumId,
    pub size: u64,
    pub approved: bool,
    pub nr_of_gets: u64,
    pub message_count: usize,
}

fn summarize(store: &crate::store::EntityStore, attachment: &Attachment) -> AttachmentSummary {
    AttachmentSummary {
        id: attachment.id(),
        name: attachment.name().as_str().to_owned(),
        created: attachment.created(),
        created_by: store
            .user(attachment.created_by())
            .map(|u| u.id())
            .unwrap_or(ForumId::ZERO),
        size: attachment.size(),
        approved: attachment.approved(),
        nr_of_gets: attachment.nr_of_gets(),
        message_count: attachment.messages().count(),
    }
}

impl MemoryRepository {
    /// Fails with NOT_ALLOWED when the upload would exceed the user's
    /// attachment quota.
    pub fn add_new_attachment(
        &self,
        ctx: &RequestContext,
        name: &str,
        size: u64,
    ) -> RepoResult<AddedEntity> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let name = validate_name(
            name,
            config.discussion_tag.min_name_length,
            config.discussion_tag.max_name_length,
        )?;

        let id = ForumId::generate();
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::AddAttachment, ctx, None)?;
            let Some((owner, user)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            if let Some(quota) = user.attachment_quota() {
                let used: u64 = user
                    .attachments
                    .iter()
                    .filter_map(|h| store.attachment(*h))
                    .map(|a| a.size())
                    .sum();
                if used + size > quota {
                    return Err(StatusCode::NotAllowed);
                }
            }
            let handle =
                store.create_attachment(id, CollatedString::new(name), owner, size, ctx.timestamp);
            store.insert_attachment(handle);
            let octx = ctx.observer();
            let attachment = store.attachment(handle).expect("Just inserted");
            for observer in self.observers().write() {
                observer.on_add_new_attachment(&octx, attachment);
            }
            Ok(AddedEntity {
                id,
                created: ctx.timestamp,
            })
        })
    }

    pub fn change_attachment_name(
        &self,
        ctx: &RequestContext,
        attachment_id: ForumId,
        new_name: &str,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let new_name = validate_name(
            new_name,
            config.discussion_tag.min_name_length,
            config.discussion_tag.max_name_length,
        )?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeAttachment,
                ctx,
                Some(attachment_id),
            )?;
            let Some((handle, attachment)) = store.attachment_by_id(attachment_id) else {
                return Err(StatusCode::NotFound);
            };
            if attachment.name().as_str() == new_name {
                return Err(StatusCode::NoEffect);
            }
            store.change_attachment_name(handle, CollatedString::new(new_name));
            let octx = ctx.observer();
            let attachment = store.attachment(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_attachment(&octx, attachment, AttachmentChange::Name);
            }
            Ok(())
        })
    }

    pub fn change_attachment_approval(
        &self,
        ctx: &RequestContext,
        attachment_id: ForumId,
        approved: bool,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeAttachment,
                ctx,
                Some(attachment_id),
            )?;
            let Some((handle, attachment)) = store.attachment_by_id(attachment_id) else {
                return Err(StatusCode::NotFound);
            };
            if attachment.approved() == approved {
                return Err(StatusCode::NoEffect);
            }
            store.change_attachment_approval(handle, approved);
            let octx = ctx.observer();
            let attachment = store.attachment(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_attachment(&octx, attachment, AttachmentChange::Approval);
            }
            Ok(())
        })
    }

    pub fn delete_attachment(
        &self,
        ctx: &RequestContext,
        attachment_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::DeleteAttachment,
                ctx,
                Some(attachment_id),
            )?;
            let Some((handle, _)) = store.attachment_by_id(attachment_id) else {
                return Err(StatusCode::NotFound);
            };
            store.delete_attachment(handle);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_delete_attachment(&octx, attachment_id);
            }
            Ok(())
        })
    }

    pub fn add_attachment_to_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeAttachment,
                ctx,
                Some(attachment_id),
            )?;
            let Some((attachment, _)) = store.attachment_by_id(attachment_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((message, _)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.add_attachment_to_message(attachment, message) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_add_attachment_to_discussion_thread_message(
                    &octx,
                    attachment_id,
                    message_id,
                );
            }
            Ok(())
        })
    }

    pub fn remove_attachment_from_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        attachment_id: ForumId,
        message_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeAttachment,
                ctx,
                Some(attachment_id),
            )?;
            let Some((attachment, _)) = store.attachment_by_id(attachment_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((message, _)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.remove_attachment_from_message(attachment, message) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_remove_attachment_from_discussion_thread_message(
                    &octx,
                    attachment_id,
                    message_id,
                );
            }
            Ok(())
        })
    }

    /// Fetching an attachment counts as a get; the read observers feed
    /// the coalesced counter events.
    pub fn get_attachment_by_id(
        &self,
        ctx: &RequestContext,
        attachment_id: ForumId,
    ) -> RepoResult<AttachmentSummary> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, Some(attachment_id))?;
            let Some((_, attachment)) = store.attachment_by_id(attachment_id) else {
                return Err(StatusCode::NotFound);
            };
            let summary = summarize(store, attachment);
            self.store().defer(move |store| {
                if let Some((handle, _)) = store.attachment_by_id(attachment_id) {
                    store.increment_attachment_gets(handle, 1);
                }
            });
            for observer in self.observers().read() {
                observer.on_get_attachment(attachment_id);
            }
            Ok(summary)
        })
    }

    pub fn get_attachments(
        &self,
        ctx: &RequestContext,
        by: RetrieveAttachmentsBy,
        page: usize,
    ) -> RepoResult<Vec<AttachmentSummary>> {
        let page_size = config::global().user.max_users_per_page;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            let attachments = store.attachment_collection();
            let handles = match by {
                RetrieveAttachmentsBy::Created => {
                    page_slice(attachments.iter_by_created_desc(), page, page_size)
                }
                RetrieveAttachmentsBy::Name => {
                    page_slice(attachments.iter_by_name(), page, page_size)
                }
                RetrieveAttachmentsBy::Size => {
                    page_slice(attachments.iter_by_size_desc(), page, page_size)
                }
            };
            Ok(handles
                .into_iter()
                .filter_map(|h| store.attachment(h))
                .map(|a| summarize(store, a))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{ctx_as, ctx_at, test_repo};

    #[test_log::test]
    fn attachment_lifecycle() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let thread = repo.add_new_discussion_thread(&actx, "hello").expect("adds");
        let message = repo
            .add_new_discussion_thread_message(&actx, thread.id, "see attached file")
            .expect("adds");

        let attachment = repo
            .add_new_attachment(&actx, "diagram.png", 1024)
            .expect("adds");
        repo.add_attachment_to_discussion_thread_message(&actx, attachment.id, message.id)
            .expect("links");
        assert_eq!(
            repo.add_attachment_to_discussion_thread_message(&actx, attachment.id, message.id),
            Err(StatusCode::NoEffect)
        );

        let summary = repo
            .get_attachment_by_id(&ctx_at(120), attachment.id)
            .expect("reads");
        assert_eq!(summary.size, 1024);
        assert_eq!(summary.message_count, 1);

        // The get above was counted after the read lock dropped
        let summary = repo
            .get_attachment_by_id(&ctx_at(121), attachment.id)
            .expect("reads");
        assert_eq!(summary.nr_of_gets, 1);

        repo.delete_attachment(&actx, attachment.id).expect("deletes");
        assert_eq!(
            repo.get_attachment_by_id(&ctx_at(122), attachment.id),
            Err(StatusCode::NotFound)
        );
        let messages = repo
            .get_discussion_thread_messages(&ctx_at(123), thread.id, 0)
            .expect("reads");
        assert_eq!(messages.len(), 1);
    }

    #[test_log::test]
    fn quota_is_enforced() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        repo.change_user_attachment_quota(&actx, alice.id, 1000)
            .expect("changes");

        repo.add_new_attachment(&actx, "small.txt", 800).expect("adds");
        assert_eq!(
            repo.add_new_attachment(&actx, "big.bin", 300),
            Err(StatusCode::NotAllowed)
        );
    }
}
