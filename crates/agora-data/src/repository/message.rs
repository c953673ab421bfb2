//! Thread-message, vote and comment operations.

use agora_core::id::ForumId;
use agora_core::{Timestamp, config};

use super::{
    AddedEntity, MemoryRepository, RepoResult, RequestContext, StatusCode, page_slice,
    validate_text,
};
use crate::authorization::AuthorizedOperation;
use crate::entities::{Message, MessageContent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: ForumId,
    pub thread_id: ForumId,
    pub created_by: ForumId,
    pub created: Timestamp,
    pub content: String,
    pub last_updated: Option<Timestamp>,
    pub last_updated_reason: String,
    pub approved: bool,
    pub up_votes: usize,
    pub down_votes: usize,
    pub comment_count: usize,
    pub solved_comment_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentSummary {
    pub id: ForumId,
    pub message_id: ForumId,
    pub created_by: ForumId,
    pub created: Timestamp,
    pub content: String,
    pub solved: bool,
}

fn summarize(store: &crate::store::EntityStore, message: &Message) -> MessageSummary {
    MessageSummary {
        id: message.id(),
        thread_id: store
            .thread(message.parent_thread())
            .map(|t| t.id())
            .unwrap_or(ForumId::ZERO),
        created_by: store
            .user(message.created_by())
            .map(|u| u.id())
            .unwrap_or(ForumId::ZERO),
        created: message.created(),
        content: store
            .message_content_str(message)
            .unwrap_or_default()
            .to_owned(),
        last_updated: message.last_updated(),
        last_updated_reason: message.last_updated_reason().to_owned(),
        approved: message.approved(),
        up_votes: message.up_vote_count(),
        down_votes: message.down_vote_count(),
        comment_count: message.comments().count(),
        solved_comment_count: message.solved_comment_count(),
    }
}

impl MemoryRepository {
    pub fn add_new_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
        content: &str,
    ) -> RepoResult<AddedEntity> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let content = validate_text(
            content,
            config.discussion_thread_message.min_content_length,
            config.discussion_thread_message.max_content_length,
        )?;

        let id = ForumId::generate();
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::AddNewDiscussionThreadMessage,
                ctx,
                Some(thread_id),
            )?;
            let Some((author, _)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };

            let handle = store.create_message(
                id,
                thread,
                author,
                MessageContent::Owned(content.clone()),
                ctx.timestamp,
            );
            store.insert_message(handle);

            let octx = ctx.observer();
            let message = store.message(handle).expect("Just inserted");
            for observer in self.observers().write() {
                observer.on_add_new_discussion_thread_message(&octx, message, thread_id, &content);
            }
            Ok(AddedEntity {
                id,
                created: ctx.timestamp,
            })
        })
    }

    pub fn change_discussion_thread_message_content(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
        content: &str,
        reason: &str,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let content = validate_text(
            content,
            config.discussion_thread_message.min_content_length,
            config.discussion_thread_message.max_content_length,
        )?;
        let reason = validate_text(
            reason,
            config.discussion_thread_message.min_change_reason_length,
            config.discussion_thread_message.max_change_reason_length,
        )?;

        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionThreadMessage,
                ctx,
                Some(message_id),
            )?;
            let Some((handle, _)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            store.change_message_content(
                handle,
                MessageContent::Owned(content.clone()),
                reason.clone(),
                ctx.timestamp,
            );
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_change_discussion_thread_message_content(
                    &octx, message_id, &content, &reason,
                );
            }
            Ok(())
        })
    }

    pub fn change_discussion_thread_message_approval(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
        approved: bool,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionThreadMessage,
                ctx,
                Some(message_id),
            )?;
            let Some((handle, message)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            if message.approved() == approved {
                return Err(StatusCode::NoEffect);
            }
            store.change_message_approval(handle, approved);
            let octx = ctx.observer();
            let message = store.message(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_thread_message_approval(&octx, message);
            }
            Ok(())
        })
    }

    pub fn move_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
        into_thread_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::MoveDiscussionThreadMessage,
                ctx,
                Some(message_id),
            )?;
            let Some((handle, message)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((into, _)) = store.thread_by_id(into_thread_id) else {
                return Err(StatusCode::NotFound);
            };
            if message.parent_thread() == into {
                return Err(StatusCode::NoEffect);
            }
            store.move_message(handle, into, ctx.timestamp);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_move_discussion_thread_message(&octx, message_id, into_thread_id);
            }
            Ok(())
        })
    }

    pub fn delete_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::DeleteDiscussionThreadMessage,
                ctx,
                Some(message_id),
            )?;
            let Some((handle, _)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            store.delete_message(handle);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_delete_discussion_thread_message(&octx, message_id);
            }
            Ok(())
        })
    }

    pub fn up_vote_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
    ) -> RepoResult<()> {
        self.vote_discussion_thread_message(ctx, message_id, true)
    }

    pub fn down_vote_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
    ) -> RepoResult<()> {
        self.vote_discussion_thread_message(ctx, message_id, false)
    }

    fn vote_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
        up: bool,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::VoteDiscussionThreadMessage,
                ctx,
                Some(message_id),
            )?;
            let Some((voter, _)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let Some((handle, message)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            // Voting on your own message is meaningless
            if message.created_by() == voter {
                return Err(StatusCode::NotAllowed);
            }
            if !store.vote_message(handle, voter, ctx.timestamp, up) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                if up {
                    observer.on_discussion_thread_message_up_vote(&octx, message_id);
                } else {
                    observer.on_discussion_thread_message_down_vote(&octx, message_id);
                }
            }
            Ok(())
        })
    }

    /// Undoing a vote is only allowed within the configured window of
    /// casting it.
    pub fn reset_vote_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        let expires = config::global().user.reset_vote_expires_in_seconds;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::VoteDiscussionThreadMessage,
                ctx,
                Some(message_id),
            )?;
            let Some((voter, _)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let Some((handle, message)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            let voted_at = message
                .up_votes
                .get(&voter)
                .or_else(|| message.down_votes.get(&voter))
                .copied();
            let Some(voted_at) = voted_at else {
                return Err(StatusCode::NoEffect);
            };
            if ctx.timestamp.seconds_since(voted_at) > expires {
                return Err(StatusCode::NotAllowed);
            }
            store.reset_vote(handle, voter);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_discussion_thread_message_reset_vote(&octx, message_id);
            }
            Ok(())
        })
    }

    /// Records that `quoted_user` was quoted in the message and persists
    /// the fact to the event log.
    pub fn quote_user_in_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
        quoted_user_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionThreadMessage,
                ctx,
                Some(message_id),
            )?;
            if store.message_by_id(message_id).is_none() {
                return Err(StatusCode::NotFound);
            }
            let Some((quoted, _)) = store.user_by_id(quoted_user_id) else {
                return Err(StatusCode::NotFound);
            };
            store.record_quote(quoted, message_id);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_quote_user_in_discussion_thread_message(
                    &octx,
                    message_id,
                    quoted_user_id,
                );
            }
            Ok(())
        })
    }

    pub fn add_comment_to_discussion_thread_message(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
        content: &str,
    ) -> RepoResult<AddedEntity> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let content = validate_text(
            content,
            config.discussion_thread_message.min_comment_length,
            config.discussion_thread_message.max_comment_length,
        )?;

        let id = ForumId::generate();
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::AddCommentToDiscussionThreadMessage,
                ctx,
                Some(message_id),
            )?;
            let Some((author, _)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let Some((message, _)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            let handle = store.create_comment(id, message, author, content, ctx.timestamp);
            store.insert_comment(handle);
            let octx = ctx.observer();
            let comment = store.comment(handle).expect("Just inserted");
            for observer in self.observers().write() {
                observer.on_add_comment_to_discussion_thread_message(&octx, comment, message_id);
            }
            Ok(AddedEntity {
                id,
                created: ctx.timestamp,
            })
        })
    }

    pub fn solve_discussion_thread_message_comment(
        &self,
        ctx: &RequestContext,
        comment_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::SolveDiscussionThreadMessageComment,
                ctx,
                Some(comment_id),
            )?;
            let Some((handle, _)) = store.comment_by_id(comment_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.solve_comment(handle) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_solve_discussion_thread_message_comment(&octx, comment_id);
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_discussion_thread_messages(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
        page: usize,
    ) -> RepoResult<Vec<MessageSummary>> {
        let page_size = config::global().discussion_thread_message.max_messages_per_page;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, Some(thread_id))?;
            self.note_last_seen(ctx, store);
            let Some((_, thread)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            let see_unapproved = self
                .authorize(
                    store,
                    AuthorizedOperation::ViewUnapprovedDiscussionThreadMessages,
                    ctx,
                    Some(thread_id),
                )
                .is_ok();
            Ok(page_slice(
                thread
                    .messages()
                    .filter_map(|h| store.message(h))
                    .filter(|m| see_unapproved || m.approved()),
                page,
                page_size,
            )
            .into_iter()
            .map(|m| summarize(store, m))
            .collect())
        })
    }

    /// The global latest-messages feed.
    pub fn get_latest_discussion_thread_messages(
        &self,
        ctx: &RequestContext,
        page: usize,
    ) -> RepoResult<Vec<MessageSummary>> {
        let page_size = config::global().discussion_thread_message.max_messages_per_page;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            Ok(page_slice(
                store
                    .message_collection()
                    .iter_by_created_desc()
                    .filter_map(|h| store.message(h))
                    .filter(|m| m.approved()),
                page,
                page_size,
            )
            .into_iter()
            .map(|m| summarize(store, m))
            .collect())
        })
    }

    pub fn get_discussion_thread_message_comments(
        &self,
        ctx: &RequestContext,
        message_id: ForumId,
        page: usize,
    ) -> RepoResult<Vec<CommentSummary>> {
        let page_size = config::global()
            .discussion_thread_message
            .max_message_comments_per_page;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, Some(message_id))?;
            let Some((_, message)) = store.message_by_id(message_id) else {
                return Err(StatusCode::NotFound);
            };
            Ok(page_slice(
                message.comments().filter_map(|h| store.comment(h)),
                page,
                page_size,
            )
            .into_iter()
            .map(|c| CommentSummary {
                id: c.id(),
                message_id,
                created_by: store
                    .user(c.created_by())
                    .map(|u| u.id())
                    .unwrap_or(ForumId::ZERO),
                created: c.created(),
                content: c.content().to_owned(),
                solved: c.solved(),
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
    fn message_counters_follow_the_scenario() {
        let (repo, observer) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let thread = repo.add_new_discussion_thread(&actx, "hello").expect("adds");
        repo.add_new_discussion_thread_message(&actx, thread.id, "first message")
            .expect("adds");
        repo.add_new_discussion_thread_message(&ctx_as(alice.id, 111), thread.id, "second message")
            .expect("adds");

        let summary = repo
            .get_discussion_thread_by_id(&ctx_at(112), thread.id)
            .expect("reads");
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.latest_message_created, Timestamp::from_secs(111));
        assert_eq!(
            repo.get_user_by_id(&ctx_at(112), alice.id)
                .expect("reads")
                .summary
                .message_count,
            2
        );
        assert_eq!(
            observer.take(),
            [
                "add_new_user",
                "add_new_discussion_thread",
                "add_new_discussion_thread_message",
                "add_new_discussion_thread_message"
            ]
        );
    }

    #[test_log::test]
    fn content_bounds_are_validated() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let thread = repo.add_new_discussion_thread(&actx, "hello").expect("adds");

        assert_eq!(
            repo.add_new_discussion_thread_message(&actx, thread.id, "hi"),
            Err(StatusCode::ValueTooShort)
        );
    }

    #[test_log::test]
    fn votes_and_reset_window() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let bob = repo.add_new_user(&ctx_at(101), "bob", "b1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let thread = repo.add_new_discussion_thread(&actx, "hello").expect("adds");
        let message = repo
            .add_new_discussion_thread_message(&actx, thread.id, "vote on this")
            .expect("adds");

        assert_eq!(
            repo.up_vote_discussion_thread_message(&actx, message.id),
            Err(StatusCode::NotAllowed),
            "own messages cannot be voted on"
        );
        repo.up_vote_discussion_thread_message(&ctx_as(bob.id, 120), message.id)
            .expect("votes");
        assert_eq!(
            repo.up_vote_discussion_thread_message(&ctx_as(bob.id, 121), message.id),
            Err(StatusCode::NoEffect)
        );

        // Reset long after the window closed
        let expires = agora_core::config::global().user.reset_vote_expires_in_seconds;
        assert_eq!(
            repo.reset_vote_discussion_thread_message(
                &ctx_as(bob.id, 120 + expires + 1),
                message.id
            ),
            Err(StatusCode::NotAllowed)
        );
        repo.reset_vote_discussion_thread_message(&ctx_as(bob.id, 130), message.id)
            .expect("resets");
    }

    #[test_log::test]
    fn comments_solve_once() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let thread = repo.add_new_discussion_thread(&actx, "hello").expect("adds");
        let message = repo
            .add_new_discussion_thread_message(&actx, thread.id, "needs review")
            .expect("adds");
        let comment = repo
            .add_comment_to_discussion_thread_message(&actx, message.id, "typo in line 2")
            .expect("adds");

        repo.solve_discussion_thread_message_comment(&actx, comment.id)
            .expect("solves");
        assert_eq!(
            repo.solve_discussion_thread_message_comment(&actx, comment.id),
            Err(StatusCode::NoEffect)
        );

        let messages = repo
            .get_discussion_thread_messages(&ctx_at(120), thread.id, 0)
            .expect("reads");
        assert_eq!(messages[0].solved_comment_count, 1);
        assert_eq!(messages[0].comment_count, 1);
    }

    #[test_log::test]
    fn move_message_between_threads() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let t1 = repo.add_new_discussion_thread(&actx, "first").expect("adds");
        let t2 = repo.add_new_discussion_thread(&actx, "second").expect("adds");
        let message = repo
            .add_new_discussion_thread_message(&actx, t1.id, "moving message")
            .expect("adds");

        repo.move_discussion_thread_message(&ctx_as(alice.id, 120), message.id, t2.id)
            .expect("moves");
        assert_eq!(
            repo.move_discussion_thread_message(&ctx_as(alice.id, 121), message.id, t2.id),
            Err(StatusCode::NoEffect)
        );

        let messages = repo
            .get_discussion_thread_messages(&ctx_at(122), t2.id, 0)
            .expect("reads");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].thread_id, t2.id);
    }
}
