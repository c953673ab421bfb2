//! Discussion-category operations.

use agora_core::config;
use agora_core::id::ForumId;

use super::{
    AddedEntity, MemoryRepository, RepoResult, RequestContext, StatusCode, validate_name,
    validate_text,
};
use crate::authorization::AuthorizedOperation;
use crate::entities::Category;
use crate::observers::CategoryChange;
use crate::pool::CategoryHandle;
use crate::sort_key::{CollatedString, SortKey};
use crate::store::EntityStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategorySummary {
    pub id: ForumId,
    pub name: String,
    pub description: String,
    pub display_order: u16,
    pub parent_id: Option<ForumId>,
    pub thread_count: u32,
    pub message_count: u32,
    pub child_count: usize,
    pub tag_count: usize,
}

fn summarize(store: &EntityStore, category: &Category) -> CategorySummary {
    CategorySummary {
        id: category.id(),
        name: category.name().as_str().to_owned(),
        description: category.description().to_owned(),
        display_order: category.display_order(),
        parent_id: category
            .parent()
            .and_then(|h| store.category(h))
            .map(|c| c.id()),
        thread_count: category.thread_count(),
        message_count: category.message_count(),
        child_count: category.children().count(),
        tag_count: category.tags().count(),
    }
}

fn resolve_parent(
    store: &EntityStore,
    parent_id: Option<ForumId>,
) -> RepoResult<Option<CategoryHandle>> {
    match parent_id {
        None => Ok(None),
        Some(id) => match store.category_by_id(id) {
            Some((handle, _)) => Ok(Some(handle)),
            None => Err(StatusCode::NotFound),
        },
    }
}

impl MemoryRepository {
    pub fn add_new_discussion_category(
        &self,
        ctx: &RequestContext,
        name: &str,
        parent_id: Option<ForumId>,
    ) -> RepoResult<AddedEntity> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let name = validate_name(
            name,
            config.discussion_category.min_name_length,
            config.discussion_category.max_name_length,
        )?;

        let id = ForumId::generate();
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::AddNewDiscussionCategory, ctx, None)?;
            let parent = resolve_parent(store, parent_id)?;
            let key = SortKey::of(&name);
            if store.category_collection().get_by_name(parent, &key).is_some() {
                return Err(StatusCode::AlreadyExists);
            }
            let handle = store.create_category(id, CollatedString::new(name), parent, ctx.timestamp);
            store.insert_category(handle);
            let octx = ctx.observer();
            let category = store.category(handle).expect("Just inserted");
            for observer in self.observers().write() {
                observer.on_add_new_discussion_category(&octx, category, parent_id);
            }
            Ok(AddedEntity {
                id,
                created: ctx.timestamp,
            })
        })
    }

    pub fn change_discussion_category_name(
        &self,
        ctx: &RequestContext,
        category_id: ForumId,
        new_name: &str,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let new_name = validate_name(
            new_name,
            config.discussion_category.min_name_length,
            config.discussion_category.max_name_length,
        )?;

        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionCategory,
                ctx,
                Some(category_id),
            )?;
            let Some((handle, category)) = store.category_by_id(category_id) else {
                return Err(StatusCode::NotFound);
            };
            let key = SortKey::of(&new_name);
            if let Some(existing) = store
                .category_collection()
                .get_by_name(category.parent(), &key)
            {
                if existing != handle {
                    return Err(StatusCode::AlreadyExists);
                }
            }
            if category.name().as_str() == new_name {
                return Err(StatusCode::NoEffect);
            }
            store.change_category_name(handle, CollatedString::new(new_name));
            let octx = ctx.observer();
            let category = store.category(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_category(&octx, category, CategoryChange::Name);
            }
            Ok(())
        })
    }

    pub fn change_discussion_category_description(
        &self,
        ctx: &RequestContext,
        category_id: ForumId,
        description: &str,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        let description = validate_text(
            description,
            0,
            config::global().discussion_category.max_description_length,
        )?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionCategory,
                ctx,
                Some(category_id),
            )?;
            let Some((handle, _)) = store.category_by_id(category_id) else {
                return Err(StatusCode::NotFound);
            };
            store.change_category_description(handle, description);
            let octx = ctx.observer();
            let category = store.category(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_category(&octx, category, CategoryChange::Description);
            }
            Ok(())
        })
    }

    pub fn change_discussion_category_display_order(
        &self,
        ctx: &RequestContext,
        category_id: ForumId,
        display_order: u16,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionCategory,
                ctx,
                Some(category_id),
            )?;
            let Some((handle, _)) = store.category_by_id(category_id) else {
                return Err(StatusCode::NotFound);
            };
            store.change_category_display_order(handle, display_order);
            let octx = ctx.observer();
            let category = store.category(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer
                    .on_change_discussion_category(&octx, category, CategoryChange::DisplayOrder);
            }
            Ok(())
        })
    }

    /// Rejects self-parenting as invalid and any assignment that would
    /// close an ancestry cycle.
    pub fn change_discussion_category_parent(
        &self,
        ctx: &RequestContext,
        category_id: ForumId,
        new_parent_id: Option<ForumId>,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        if new_parent_id == Some(category_id) {
            return Err(StatusCode::InvalidParameters);
        }
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::ChangeDiscussionCategory,
                ctx,
                Some(category_id),
            )?;
            let Some((handle, category)) = store.category_by_id(category_id) else {
                return Err(StatusCode::NotFound);
            };
            let new_parent = resolve_parent(store, new_parent_id)?;
            if category.parent() == new_parent {
                return Err(StatusCode::NoEffect);
            }
            if let Some(new_parent) = new_parent {
                if store.category_parent_would_cycle(handle, new_parent) {
                    return Err(StatusCode::CircularReferenceNotAllowed);
                }
            }
            // The name must stay unique among the new siblings
            if store
                .category_collection()
                .get_by_name(new_parent, category.name().key())
                .is_some()
            {
                return Err(StatusCode::AlreadyExists);
            }
            store.change_category_parent(handle, new_parent);
            let octx = ctx.observer();
            let category = store.category(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_discussion_category_parent(&octx, category, new_parent_id);
            }
            Ok(())
        })
    }

    pub fn delete_discussion_category(
        &self,
        ctx: &RequestContext,
        category_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::DeleteDiscussionCategory,
                ctx,
                Some(category_id),
            )?;
            let Some((handle, _)) = store.category_by_id(category_id) else {
                return Err(StatusCode::NotFound);
            };
            store.delete_category(handle);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_delete_discussion_category(&octx, category_id);
            }
            Ok(())
        })
    }

    pub fn add_discussion_tag_to_category(
        &self,
        ctx: &RequestContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::AddDiscussionTagToCategory,
                ctx,
                Some(category_id),
            )?;
            let Some((tag, _)) = store.tag_by_id(tag_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((category, _)) = store.category_by_id(category_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.add_tag_to_category(tag, category) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_add_discussion_tag_to_category(&octx, tag_id, category_id);
            }
            Ok(())
        })
    }

    pub fn remove_discussion_tag_from_category(
        &self,
        ctx: &RequestContext,
        tag_id: ForumId,
        category_id: ForumId,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(
                store,
                AuthorizedOperation::AddDiscussionTagToCategory,
                ctx,
                Some(category_id),
            )?;
            let Some((tag, _)) = store.tag_by_id(tag_id) else {
                return Err(StatusCode::NotFound);
            };
            let Some((category, _)) = store.category_by_id(category_id) else {
                return Err(StatusCode::NotFound);
            };
            if !store.remove_tag_from_category(tag, category) {
                return Err(StatusCode::NoEffect);
            }
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_remove_discussion_tag_from_category(&octx, tag_id, category_id);
            }
            Ok(())
        })
    }

    /// Children of `parent_id` (roots when `None`), in display order.
    pub fn get_discussion_categories(
        &self,
        ctx: &RequestContext,
        parent_id: Option<ForumId>,
    ) -> RepoResult<Vec<CategorySummary>> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            let parent = resolve_parent(store, parent_id)?;
            Ok(store
                .category_collection()
                .iter_children_by_display_order(parent)
                .filter_map(|h| store.category(h))
                .map(|c| summarize(store, c))
                .collect())
        })
    }

    pub fn get_discussion_category_by_id(
        &self,
        ctx: &RequestContext,
        category_id: ForumId,
    ) -> RepoResult<CategorySummary> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, Some(category_id))?;
            let Some((_, category)) = store.category_by_id(category_id) else {
                return Err(StatusCode::NotFound);
            };
            Ok(summarize(store, category))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{ctx_as, ctx_at, test_repo};

    #[test_log::test]
    fn sibling_names_are_unique_but_cousins_may_collide() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);

        let root_a = repo
            .add_new_discussion_category(&actx, "left", None)
            .expect("adds");
        let root_b = repo
            .add_new_discussion_category(&actx, "right", None)
            .expect("adds");
        repo.add_new_discussion_category(&actx, "general", Some(root_a.id))
            .expect("adds");
        // Same name under a different parent is fine
        repo.add_new_discussion_category(&actx, "general", Some(root_b.id))
            .expect("adds");
        assert_eq!(
            repo.add_new_discussion_category(&actx, "General", Some(root_a.id)),
            Err(StatusCode::AlreadyExists)
        );
    }

    #[test_log::test]
    fn parent_cycles_are_rejected() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);

        let root = repo
            .add_new_discussion_category(&actx, "root", None)
            .expect("adds");
        let child = repo
            .add_new_discussion_category(&actx, "child", Some(root.id))
            .expect("adds");
        let grandchild = repo
            .add_new_discussion_category(&actx, "grandchild", Some(child.id))
            .expect("adds");

        assert_eq!(
            repo.change_discussion_category_parent(&actx, root.id, Some(root.id)),
            Err(StatusCode::InvalidParameters)
        );
        assert_eq!(
            repo.change_discussion_category_parent(&actx, root.id, Some(grandchild.id)),
            Err(StatusCode::CircularReferenceNotAllowed)
        );
        repo.change_discussion_category_parent(&actx, grandchild.id, Some(root.id))
            .expect("reparents");
        assert_eq!(
            repo.get_discussion_categories(&ctx_at(120), Some(root.id))
                .expect("reads")
                .len(),
            2
        );
    }

    #[test_log::test]
    fn categories_count_messages_through_tags() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);

        let category = repo
            .add_new_discussion_category(&actx, "front page", None)
            .expect("adds");
        let tag = repo.add_new_discussion_tag(&actx, "news").expect("adds");
        let thread = repo.add_new_discussion_thread(&actx, "hello").expect("adds");
        repo.add_new_discussion_thread_message(&actx, thread.id, "first message")
            .expect("adds");
        repo.add_discussion_tag_to_thread(&actx, tag.id, thread.id)
            .expect("links");
        repo.add_discussion_tag_to_category(&actx, tag.id, category.id)
            .expect("links");

        let summary = repo
            .get_discussion_category_by_id(&ctx_at(120), category.id)
            .expect("reads");
        assert_eq!(summary.thread_count, 1);
        assert_eq!(summary.message_count, 1);

        repo.remove_discussion_tag_from_category(&actx, tag.id, category.id)
            .expect("unlinks");
        let summary = repo
            .get_discussion_category_by_id(&ctx_at(121), category.id)
            .expect("reads");
        assert_eq!(summary.thread_count, 0);
        assert_eq!(summary.message_count, 0);
    }
}
