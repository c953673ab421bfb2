//! Discussion-thread operations.

use agora_core::id::ForumId;
use agora_core::{Timestamp, config};

use super::{
    AddedEntity, MemoryRepository, RepoResult, RequestContext, StatusCode, page_slice,
    validate_name,
};
use crate::authorization::AuthorizedOperation;
use crate::entities::Thread;
use crate::observers::ThreadChange;
use crate::sort_key::{CollatedString, SortKey};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetrieveThreadsBy {
    Name,
    Created,
    LastUpdated,
    LatestMessageCreated,
    MessageCount,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadSummary {
    pub id: ForumId,
    pub name: String,
    pub created: Timestamp,
    pub created_by: ForumId,
    pub last_updated: Timestamp,
    pub latest_message_created: Timestamp,
    pub message_count: u32,
    pub visit_count: u64,
    pub pin_display_order: u16,
    pub approved: bool,
    pub subscriber_count: usize,
}

fn summarize(store: &crate::store::EntityStore, thread: &Thread) -> ThreadSummary {
    ThreadSummary {
        id: thread.id(),
        name: thread.name().as_str().to_owned(),
        created: thread.created(),
        created_by: store
            .user(thread.created_by())
            .map(|u| u.id())
            .unwrap_or(ForumId::ZERO),
        last_updated: thread.last_updated(),
        latest_message_created: thread.latest_message_created(),
        message_count: thread.message_count(),
        visit_count: thread.visit_count(),
        pin_display_order: thread.pin_display_order(),
        approved: thread.approved(),
        subscriber_count: thread.subscribers().count(),
    }
}

impl MemoryRepository {
    pub fn add_new_discussion_thread(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> RepoResult<AddedEntity> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let name = validate_name(
            name,
            config.discussion_thread.min_name_length,
            config.discussion_thread.max_name_length,
        )?;

        let id = ForumId::generate();
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::AddNewDiscussionThread, ctx, None)?;
            let Some((creator, _)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let key = SortKey::of(&name);
            if store.thread_collection().get_by_name(&key).is_some() {
                return Err(StatusCode::AlreadyExists);
            }

            let handle = store.create_thread(id, CollatedString::new(name), creator, ctx.timestamp);
            store.insert_thread(handle);

            let octx = ctx.observer();
            let thread = store.thread(handle).expect("Just inserted");
            for observer in self.observers().write() {
                observer.on_add_new_discussion_thread(&octx, thread);
            }
            Ok(AddedEntity {
                id,
                created: ctx.timestamp,
            })
        })
    }

    pub fn change_discussion_thread_name(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
        new_name: &str,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let new_name = validate_name(
            new_name,
            config.discussion_thread.min_name_length,
            config.discussion_thread.max_name_length,
        )?;

        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionThread,
                ctx,
                Some(thread_id),
            )?;
            let Some((handle, thread)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            let key = SortKey::of(&new_name);
            if let Some(existing) = store.thread_collection().get_by_name(&key) {
                if existing != handle {
                    return Err(StatusCode::AlreadyExists);
                }
            }
            if thread.name().as_str() == new_name {
                return Err(StatusCode::NoEffect);
            }

            store.change_thread_name(handle, CollatedString::new(new_name));
            store.note_thread_updated(handle, ctx.timestamp);
            let octx = ctx.observer();
            let thread = store.thread(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_thread(&octx, thread, ThreadChange::Name);
            }
            Ok(())
        })
    }

    pub fn change_discussion_thread_pin_display_order(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
        order: u16,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionThread,
                ctx,
                Some(thread_id),
            )?;
            let Some((handle, _)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            store.change_thread_pin_display_order(handle, order);
            let octx = ctx.observer();
            let thread = store.thread(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_thread(&octx, thread, ThreadChange::PinDisplayOrder);
            }
            Ok(())
        })
    }

    pub fn change_discussion_thread_approval(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
        approved: bool,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionThread,
                ctx,
                Some(thread_id),
            )?;
            let Some((handle, thread)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            if thread.approved() == approved {
                return Err(StatusCode::NoEffect);
            }
            store.change_thread_approval(handle, approved);
            let octx = ctx.observer();
            let thread = store.thread(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_thread(&octx, thread, ThreadChange::Approval);
            }
            Ok(())
        })
    }

    pub fn delete_discussion_thread(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::DeleteDiscussionThread,
                ctx,
                Some(thread_id),
            )?;
            let Some((handle, _)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            store.delete_thread(handle);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_delete_discussion_thread(&octx, thread_id);
            }
            Ok(())
        })
    }

    pub fn merge_discussion_threads(
        &self,
        ctx: &RequestContext,
        from_id: ForumId,
        into_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        if from_id == into_id {
            return Err(StatusCode::InvalidParameters);
        }
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::MergeDiscussionThreads,
                ctx,
                Some(from_id),
            )?;
            let Some((from, _)) = store.thread_by_id(from_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((into, _)) = store.thread_by_id(into_id) else {
                return Err(StatusCode::NotFound);
            };
            store.merge_threads(from, into, ctx.timestamp);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_merge_discussion_threads(&octx, from_id, into_id);
            }
            Ok(())
        })
    }

    pub fn subscribe_to_discussion_thread(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::SubscribeToDiscussionThread,
                ctx,
                Some(thread_id),
            )?;
            let Some((user, _)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.subscribe_to_thread(user, thread) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_subscribe_to_discussion_thread(&octx, thread_id);
            }
            Ok(())
        })
    }

    pub fn unsubscribe_from_discussion_thread(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::SubscribeToDiscussionThread,
                ctx,
                Some(thread_id),
            )?;
            let Some((user, _)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.unsubscribe_from_thread(user, thread) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_unsubscribe_from_discussion_thread(&octx, thread_id);
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Reading a thread counts as a visit: the in-memory counter is
    /// bumped after the shared lock drops and the read observers get the
    /// signal that feeds the coalesced visit events.
    pub fn get_discussion_thread_by_id(
        &self,
        ctx: &RequestContext,
        thread_id: ForumId,
    ) -> RepoResult<ThreadSummary> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, Some(thread_id))?;
            self.note_last_seen(ctx, store);
            let Some((_, thread)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            if !thread.approved() {
                self.authorize(
                    store,
                    AuthorizedOperation::ViewUnapprovedDiscussionThreads,
                    ctx,
                    Some(thread_id),
                )?;
            }
            let summary = summarize(store, thread);

            let visitor = ctx.performed_by;
            self.store().defer(move |store| {
                if let Some((handle, _)) = store.thread_by_id(thread_id) {
                    store.note_thread_visited(handle, visitor, 1);
                }
            });
            for observer in self.observers().read() {
                observer.on_get_discussion_thread_by_id(thread_id);
            }
            Ok(summary)
        })
    }

    pub fn get_discussion_threads(
        &self,
        ctx: &RequestContext,
        by: RetrieveThreadsBy,
        page: usize,
    ) -> RepoResult<Vec<ThreadSummary>> {
        let page_size = config::global().discussion_thread.max_threads_per_page;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            let see_unapproved = self
                .authorize(
                    store,
                    AuthorizedOperation::ViewUnapprovedDiscussionThreads,
                    ctx,
                    None,
                )
                .is_ok();
            let threads = store.thread_collection();
            let visible = |h: &crate::pool::ThreadHandle| {
                store
                    .thread(*h)
                    .is_some_and(|t| see_unapproved || t.approved())
            };
            let handles = match by {
                RetrieveThreadsBy::Name => {
                    page_slice(threads.iter_by_name().filter(visible), page, page_size)
                }
                RetrieveThreadsBy::Created => {
                    page_slice(threads.iter_by_created().filter(visible), page, page_size)
                }
                RetrieveThreadsBy::LastUpdated => page_slice(
                    threads.iter_by_last_updated_desc().filter(visible),
                    page,
                    page_size,
                ),
                RetrieveThreadsBy::LatestMessageCreated => page_slice(
                    threads.iter_by_latest_message_created_desc().filter(visible),
                    page,
                    page_size,
                ),
                RetrieveThreadsBy::MessageCount => page_slice(
                    threads.iter_by_message_count_desc().filter(visible),
                    page,
                    page_size,
                ),
            };
            Ok(handles
                .into_iter()
                .filter_map(|h| store.thread(h))
                .map(|t| summarize(store, t))
                .collect())
        })
    }

    /// Pinned threads, highest display order first.
    pub fn get_pinned_discussion_threads(
        &self,
        ctx: &RequestContext,
    ) -> RepoResult<Vec<ThreadSummary>> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            Ok(store
                .thread_collection()
                .iter_pinned_desc()
                .filter_map(|h| store.thread(h))
                .filter(|t| t.approved())
                .map(|t| summarize(store, t))
                .collect())
        })
    }

    pub fn get_subscribed_discussion_threads(
        &self,
        ctx: &RequestContext,
    ) -> RepoResult<Vec<ThreadSummary>> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            let Some((_, user)) = store.user_by_id(ctx.performed_by) else {
                return Err(StatusCode::NotFound);
            };
            Ok(user
                .subscribed_threads()
                .filter_map(|h| store.thread(h))
                .map(|t| summarize(store, t))
                .collect())
        })
    }

    pub fn search_discussion_threads_by_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> RepoResult<usize> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            Ok(store
                .thread_collection()
                .lower_bound_rank(&SortKey::of(name)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{ctx_as, ctx_at, test_repo};

    #[test_log::test]
    fn thread_lifecycle() {
        let (repo, observer) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);

        let thread = repo
            .add_new_discussion_thread(&actx, "first thread")
            .expect("adds");
        observer.take();

        repo.change_discussion_thread_name(&ctx_as(alice.id, 111), thread.id, "renamed thread")
            .expect("renames");
        let summary = repo
            .get_discussion_thread_by_id(&ctx_at(112), thread.id)
            .expect("reads");
        assert_eq!(summary.name, "renamed thread");
        assert_eq!(summary.created_by, alice.id);
        assert_eq!(summary.last_updated, Timestamp::from_secs(111));

        repo.delete_discussion_thread(&ctx_at(113), thread.id)
            .expect("deletes");
        assert_eq!(
            repo.get_discussion_thread_by_id(&ctx_at(114), thread.id),
            Err(StatusCode::NotFound)
        );
    }

    #[test_log::test]
    fn merge_requires_distinct_existing_threads() {
        let (repo, observer) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let t1 = repo.add_new_discussion_thread(&actx, "first").expect("adds");
        let t2 = repo.add_new_discussion_thread(&actx, "second").expect("adds");
        repo.add_new_discussion_thread_message(&actx, t1.id, "message one")
            .expect("adds");
        repo.add_new_discussion_thread_message(&actx, t2.id, "message two")
            .expect("adds");
        observer.take();

        assert_eq!(
            repo.merge_discussion_threads(&actx, t1.id, t1.id),
            Err(StatusCode::InvalidParameters)
        );
        assert_eq!(
            repo.merge_discussion_threads(&actx, t1.id, ForumId::generate()),
            Err(StatusCode::NotFound)
        );

        repo.merge_discussion_threads(&ctx_as(alice.id, 120), t1.id, t2.id)
            .expect("merges");
        assert_eq!(observer.take(), ["merge_discussion_threads"]);
        assert_eq!(
            repo.get_discussion_thread_by_id(&ctx_at(121), t1.id),
            Err(StatusCode::NotFound)
        );
        let merged = repo
            .get_discussion_thread_by_id(&ctx_at(122), t2.id)
            .expect("reads");
        assert_eq!(merged.message_count, 2);
    }

    #[test_log::test]
    fn visits_accumulate_after_reads() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let thread = repo
            .add_new_discussion_thread(&ctx_as(alice.id, 110), "a thread")
            .expect("adds");

        for at in 0..3 {
            repo.get_discussion_thread_by_id(&ctx_at(120 + at), thread.id)
                .expect("reads");
        }
        let summary = repo
            .get_discussion_thread_by_id(&ctx_at(130), thread.id)
            .expect("reads");
        assert_eq!(summary.visit_count, 3);
    }

    #[test_log::test]
    fn unapproved_threads_are_hidden_from_listings() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let thread = repo.add_new_discussion_thread(&actx, "hidden").expect("adds");
        repo.add_new_discussion_thread(&actx, "visible").expect("adds");

        repo.change_discussion_thread_approval(&actx, thread.id, false)
            .expect("changes");

        // With AllowAll authorization the listing still includes it; a
        // real policy filters by the approved flag carried here
        let all = repo
            .get_discussion_threads(&ctx_at(120), RetrieveThreadsBy::Name, 0)
            .expect("reads");
        assert_eq!(all.len(), 2);

        let visible: Vec<_> = all.iter().filter(|t| t.approved).collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "visible");
    }

    #[test_log::test]
    fn subscriptions_round_trip() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let thread = repo
            .add_new_discussion_thread(&ctx_as(alice.id, 110), "a thread")
            .expect("adds");

        let actx = ctx_as(alice.id, 120);
        repo.subscribe_to_discussion_thread(&actx, thread.id)
            .expect("subscribes");
        assert_eq!(
            repo.subscribe_to_discussion_thread(&actx, thread.id),
            Err(StatusCode::NoEffect)
        );
        assert_eq!(
            repo.get_subscribed_discussion_threads(&actx)
                .expect("reads")
                .len(),
            1
        );
        repo.unsubscribe_from_discussion_thread(&actx, thread.id)
            .expect("unsubscribes");
        assert!(
            repo.get_subscribed_discussion_threads(&actx)
                .expect("reads")
                .is_empty()
        );
    }
}
