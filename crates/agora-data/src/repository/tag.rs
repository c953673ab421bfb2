//! Discussion-tag operations.

use agora_core::id::ForumId;
use agora_core::{Timestamp, config};

use super::{
    AddedEntity, MemoryRepository, RepoResult, RequestContext, StatusCode, page_slice,
    validate_name,
};
use crate::authorization::AuthorizedOperation;
use crate::entities::Tag;
use crate::observers::TagChange;
use crate::sort_key::{CollatedString, SortKey};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetrieveTagsBy {
    Name,
    ThreadCount,
    MessageCount,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSummary {
    pub id: ForumId,
    pub name: String,
    pub created: Timestamp,
    pub thread_count: u32,
    pub message_count: u32,
}

fn summarize(tag: &Tag) -> TagSummary {
    TagSummary {
        id: tag.id(),
        name: tag.name().as_str().to_owned(),
        created: tag.created(),
        thread_count: tag.thread_count(),
        message_count: tag.message_count(),
    }
}

impl MemoryRepository {
    pub fn add_new_discussion_tag(
        &self,
        ctx: &RequestContext,
        name: &str,
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
            self.authorize(store, AuthorizedOperation::AddNewDiscussionTag, ctx, None)?;
            let key = SortKey::of(&name);
            if store.tag_collection().get_by_name(&key).is_some() {
                return Err(StatusCode::AlreadyExists);
            }
            let handle = store.create_tag(id, CollatedString::new(name), ctx.timestamp);
            store.insert_tag(handle);
            let octx = ctx.observer();
            let tag = store.tag(handle).expect("Just inserted");
            for observer in self.observers().write() {
                observer.on_add_new_discussion_tag(&octx, tag);
            }
            Ok(AddedEntity {
                id,
                created: ctx.timestamp,
            })
        })
    }

    pub fn change_discussion_tag_name(
        &self,
        ctx: &RequestContext,
        tag_id: ForumId,
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
            self.authorize(store, AuthorizedOperation::ChangeDiscussionTag, ctx, Some(tag_id))?;
            let Some((handle, tag)) = store.tag_by_id(tag_id) else {
                return Err(StatusCode::NotFound);
            };
            let key = SortKey::of(&new_name);
            if let Some(existing) = store.tag_collection().get_by_name(&key) {
                if existing != handle {
                    return Err(StatusCode::AlreadyExists);
                }
            }
            if tag.name().as_str() == new_name {
                return Err(StatusCode::NoEffect);
            }
            store.change_tag_name(handle, CollatedString::new(new_name));
            let octx = ctx.observer();
            let tag = store.tag(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_tag(&octx, tag, TagChange::Name);
            }
            Ok(())
        })
    }

    /// The ui blob is opaque to the core; only its size is validated.
    pub fn change_discussion_tag_ui_blob(
        &self,
        ctx: &RequestContext,
        tag_id: ForumId,
        blob: &[u8],
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        if blob.len() > config::global().discussion_tag.max_ui_blob_size {
            return Err(StatusCode::ValueTooLong);
        }
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::ChangeDiscussionTag, ctx, Some(tag_id))?;
            let Some((handle, _)) = store.tag_by_id(tag_id) else {
                return Err(StatusCode::NotFound);
            };
            store.change_tag_ui_blob(handle, blob.to_vec());
            let octx = ctx.observer();
            let tag = store.tag(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_tag(&octx, tag, TagChange::UiBlob);
            }
            Ok(())
        })
    }

    pub fn delete_discussion_tag(&self, ctx: &RequestContext, tag_id: ForumId) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::DeleteDiscussionTag, ctx, Some(tag_id))?;
            let Some((handle, _)) = store.tag_by_id(tag_id) else {
                return Err(StatusCode::NotFound);
            };
            store.delete_tag(handle);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_delete_discussion_tag(&octx, tag_id);
            }
            Ok(())
        })
    }

    pub fn add_discussion_tag_to_thread(
        &self,
        ctx: &RequestContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::AddDiscussionTagToThread,
                ctx,
                Some(thread_id),
            )?;
            let Some((tag, _)) = store.tag_by_id(tag_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.add_tag_to_thread(tag, thread) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_add_discussion_tag_to_thread(&octx, tag_id, thread_id);
            }
            Ok(())
        })
    }

    pub fn remove_discussion_tag_from_thread(
        &self,
        ctx: &RequestContext,
        tag_id: ForumId,
        thread_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::AddDiscussionTagToThread,
                ctx,
                Some(thread_id),
            )?;
            let Some((tag, _)) = store.tag_by_id(tag_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((thread, _)) = store.thread_by_id(thread_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.remove_tag_from_thread(tag, thread) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_remove_discussion_tag_from_thread(&octx, tag_id, thread_id);
            }
            Ok(())
        })
    }

    pub fn merge_discussion_tags(
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
            self.authorize(store, AuthorizedOperation::MergeDiscussionTags, ctx, Some(from_id))?;
            let Some((from, _)) = store.tag_by_id(from_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((into, _)) = store.tag_by_id(into_id) else {
                return Err(StatusCode::NotFound);
            };
            store.merge_tags(from, into);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_merge_discussion_tags(&octx, from_id, into_id);
            }
            Ok(())
        })
    }

    pub fn get_discussion_tags(
        &self,
        ctx: &RequestContext,
        by: RetrieveTagsBy,
        page: usize,
    ) -> RepoResult<Vec<TagSummary>> {
        // Tags share the thread page size; they are listed together
        let page_size = config::global().discussion_thread.max_threads_per_page;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            let tags = store.tag_collection();
            let handles = match by {
                RetrieveTagsBy::Name => page_slice(tags.iter_by_name(), page, page_size),
                RetrieveTagsBy::ThreadCount => {
                    page_slice(tags.iter_by_thread_count_desc(), page, page_size)
                }
                RetrieveTagsBy::MessageCount => {
                    page_slice(tags.iter_by_message_count_desc(), page, page_size)
                }
            };
            Ok(handles
                .into_iter()
                .filter_map(|h| store.tag(h))
                .map(summarize)
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{ctx_as, ctx_at, test_repo};

    #[test_log::test]
    fn tag_crud_and_counters() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let tag = repo.add_new_discussion_tag(&actx, "news").expect("adds");
        assert_eq!(
            repo.add_new_discussion_tag(&actx, "News"),
            Err(StatusCode::AlreadyExists)
        );

        let thread = repo.add_new_discussion_thread(&actx, "hello").expect("adds");
        repo.add_new_discussion_thread_message(&actx, thread.id, "first message")
            .expect("adds");
        repo.add_discussion_tag_to_thread(&actx, tag.id, thread.id)
            .expect("links");
        assert_eq!(
            repo.add_discussion_tag_to_thread(&actx, tag.id, thread.id),
            Err(StatusCode::NoEffect)
        );

        let tags = repo
            .get_discussion_tags(&ctx_at(120), RetrieveTagsBy::Name, 0)
            .expect("reads");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].thread_count, 1);
        assert_eq!(tags[0].message_count, 1);

        // New message on the tagged thread bumps the tag counter
        repo.add_new_discussion_thread_message(&ctx_as(alice.id, 121), thread.id, "another message")
            .expect("adds");
        let tags = repo
            .get_discussion_tags(&ctx_at(122), RetrieveTagsBy::MessageCount, 0)
            .expect("reads");
        assert_eq!(tags[0].message_count, 2);
    }

    #[test_log::test]
    fn merge_tags_via_facade() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let old = repo.add_new_discussion_tag(&actx, "old name").expect("adds");
        let new = repo.add_new_discussion_tag(&actx, "new name").expect("adds");
        let thread = repo.add_new_discussion_thread(&actx, "hello").expect("adds");
        repo.add_discussion_tag_to_thread(&actx, old.id, thread.id)
            .expect("links");

        repo.merge_discussion_tags(&actx, old.id, new.id).expect("merges");
        let tags = repo
            .get_discussion_tags(&ctx_at(120), RetrieveTagsBy::Name, 0)
            .expect("reads");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, new.id);
        assert_eq!(tags[0].thread_count, 1);
    }
}
