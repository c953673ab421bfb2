//! Private-message operations.

use agora_core::id::ForumId;
use agora_core::{Timestamp, config};

use super::{
    AddedEntity, MemoryRepository, RepoResult, RequestContext, StatusCode, page_slice,
    validate_text,
};
use crate::authorization::AuthorizedOperation;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateMessageSummary {
    pub id: ForumId,
    pub source_id: ForumId,
    pub destination_id: ForumId,
    pub created: Timestamp,
    pub content: String,
}

impl MemoryRepository {
    pub fn send_private_message(
        &self,
        ctx: &RequestContext,
        destination_id: ForumId,
        content: &str,
    ) -> RepoResult<AddedEntity> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let content = validate_text(
            content,
            config.discussion_thread_message.min_content_length,
            config.discussion_thread_message.max_content_length,
        )?;
        if destination_id == ctx.performed_by {
            return Err(StatusCode::InvalidParameters);
        }

        let id = ForumId::generate();
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::SendPrivateMessage,
                ctx,
                Some(destination_id),
            )?;
            let Some((source, _)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let Some((destination, _)) = store.user_by_id(destination_id) else {
                return Err(StatusCode::NotFound);
            };
            let handle =
                store.create_private_message(id, source, destination, content, ctx.timestamp);
            store.insert_private_message(handle);
            let octx = ctx.observer();
            let message = store.private_message(handle).expect("Just inserted");
            for observer in self.observers().write() {
                observer.on_send_private_message(&octx, message, destination_id);
            }
            Ok(AddedEntity {
                id,
                created: ctx.timestamp,
            })
        })
    }

    /// Only an endpoint of the message may delete it.
    pub fn delete_private_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::DeletePrivateMessage,
                ctx,
                Some(message_id),
            )?;
            let Some((handle, message)) = store.private_message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            let is_endpoint = [message.source(), message.destination()]
                .into_iter()
                .filter_map(|h| store.user(h))
                .any(|u| u.id() == ctx.performed_by);
            if !is_endpoint {
                return Err(StatusCode::NotAllowed);
            }
            store.delete_private_message(handle);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_delete_private_message(&octx, message_id);
            }
            Ok(())
        })
    }

    pub fn get_private_messages_received(
        &self,
        ctx: &RequestContext,
        page: usize,
    ) -> RepoResult<Vec<PrivateMessageSummary>> {
        self.get_private_messages(ctx, page, true)
    }

    pub fn get_private_messages_sent(
        &self,
        ctx: &RequestContext,
        page: usize,
    ) -> RepoResult<Vec<PrivateMessageSummary>> {
        self.get_private_messages(ctx, page, false)
    }

    fn get_private_messages(
        &self,
        ctx: &RequestContext,
        page: usize,
        received: bool,
    ) -> RepoResult<Vec<PrivateMessageSummary>> {
        let page_size = config::global().discussion_thread_message.max_messages_per_page;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            let Some((_, user)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let handles: Vec<_> = if received {
                page_slice(user.pm_inbox(), page, page_size)
            } else {
                page_slice(user.pm_outbox(), page, page_size)
            };
            Ok(handles
                .into_iter()
                .filter_map(|h| store.private_message(h))
                .map(|m| PrivateMessageSummary {
                    id: m.id(),
                    source_id: store
                        .user(m.source())
                        .map(|u| u.id())
                        .unwrap_or(ForumId::ZERO),
                    destination_id: store
                        .user(m.destination())
                        .map(|u| u.id())
                        .unwrap_or(ForumId::ZERO),
                    created: m.created(),
                    content: m.content().to_owned(),
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{ctx_as, ctx_at, test_repo};

    #[test_log::test]
    fn send_and_delete() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let bob = repo.add_new_user(&ctx_at(101), "bob", "b1").expect("adds");

        assert_eq!(
            repo.send_private_message(&ctx_as(alice.id, 110), alice.id, "note to self"),
            Err(StatusCode::InvalidParameters)
        );
        let pm = repo
            .send_private_message(&ctx_as(alice.id, 110), bob.id, "hello bob!")
            .expect("sends");

        let inbox = repo
            .get_private_messages_received(&ctx_as(bob.id, 120), 0)
            .expect("reads");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].content, "hello bob!");
        assert_eq!(inbox[0].source_id, alice.id);
        let outbox = repo
            .get_private_messages_sent(&ctx_as(alice.id, 120), 0)
            .expect("reads");
        assert_eq!(outbox.len(), 1);

        // A third party cannot delete the exchange
        let carol = repo.add_new_user(&ctx_at(121), "carol", "c1").expect("adds");
        assert_eq!(
            repo.delete_private_message(&ctx_as(carol.id, 122), pm.id),
            Err(StatusCode::NotAllowed)
        );
        repo.delete_private_message(&ctx_as(bob.id, 123), pm.id)
            .expect("deletes");
        assert!(
            repo.get_private_messages_received(&ctx_as(bob.id, 124), 0)
                .expect("reads")
                .is_empty()
        );
    }
}
