//! User operations.

use agora_core::id::ForumId;
use agora_core::{Timestamp, config};

use super::{
    AddedEntity, MemoryRepository, RepoResult, RequestContext, StatusCode, page_slice,
    validate_name, validate_text,
};
use crate::authorization::AuthorizedOperation;
use crate::entities::User;
use crate::entities::privileges::PrivilegeTarget;
use crate::observers::UserChange;
use crate::sort_key::{CollatedString, SortKey};

/// The privilege value granted to the very first user.
const BOOTSTRAP_PRIVILEGE_VALUE: i16 = i16::MAX;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetrieveUsersBy {
    Name,
    Created,
    LastSeen,
    ThreadCount,
    MessageCount,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSummary {
    pub id: ForumId,
    pub name: String,
    pub title: String,
    pub created: Timestamp,
    pub last_seen: Timestamp,
    pub thread_count: u32,
    pub message_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDetails {
    pub summary: UserSummary,
    pub info: String,
    pub signature: String,
    pub has_logo: bool,
    pub attachment_quota: Option<u64>,
    pub unread_private_messages: u32,
}

fn summarize(user: &User) -> UserSummary {
    UserSummary {
        id: user.id(),
        name: user.name().as_str().to_owned(),
        title: user.title().to_owned(),
        created: user.created(),
        last_seen: user.last_seen(),
        thread_count: user.thread_count(),
        message_count: user.message_count(),
    }
}

fn details(user: &User) -> UserDetails {
    UserDetails {
        summary: summarize(user),
        info: user.info().to_owned(),
        signature: user.signature().to_owned(),
        has_logo: !user.logo().is_empty(),
        attachment_quota: user.attachment_quota(),
        unread_private_messages: user.unread_private_messages(),
    }
}

impl MemoryRepository {
    pub fn add_new_user(
        &self,
        ctx: &RequestContext,
        name: &str,
        auth: &str,
    ) -> RepoResult<AddedEntity> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let name = validate_name(name, config.user.min_name_length, config.user.max_name_length)?;
        if auth.is_empty() {
            return Err(StatusCode::InvalidParameters);
        }

        let id = ForumId::generate();
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::AddNewUser, ctx, None)?;
            let key = SortKey::of(&name);
            if store.user_collection().get_by_name(&key).is_some() {
                return Err(StatusCode::AlreadyExists);
            }
            if store.user_collection().get_by_auth(auth).is_some() {
                return Err(StatusCode::UserWithSameAuthAlreadyExists);
            }

            let first_user = store.user_collection().is_empty();
            let handle = store.create_user(
                id,
                CollatedString::new(name.clone()),
                auth.to_owned(),
                ctx.timestamp,
            );
            store.insert_user(handle);
            if first_user {
                // Bootstrap rule: only the 0 → 1 transition grants the
                // forum-wide privileges; replay goes through the direct
                // interface and never takes this branch.
                store.assign_privilege(
                    id,
                    PrivilegeTarget::ForumWide,
                    BOOTSTRAP_PRIVILEGE_VALUE,
                    ctx.timestamp,
                    0,
                );
            }

            let octx = ctx.observer();
            let user = store.user(handle).expect("Just inserted");
            for observer in self.observers().write() {
                observer.on_add_new_user(&octx, user);
            }
            if first_user {
                // The grant is logged as an ordinary assignment so replay
                // reproduces it without re-running the bootstrap rule.
                for observer in self.observers().write() {
                    observer.on_assign_privilege(
                        &octx,
                        PrivilegeTarget::ForumWide,
                        id,
                        BOOTSTRAP_PRIVILEGE_VALUE,
                        0,
                    );
                }
            }
            Ok(AddedEntity {
                id,
                created: ctx.timestamp,
            })
        })
    }

    pub fn change_user_name(
        &self,
        ctx: &RequestContext,
        user_id: ForumId,
        new_name: &str,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        let config = config::global();
        let new_name =
            validate_name(new_name, config.user.min_name_length, config.user.max_name_length)?;

        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::ChangeUser, ctx, Some(user_id))?;
            let Some((handle, user)) = store.user_by_id(user_id) else {
                return Err(StatusCode::NotFound);
            };
            let key = SortKey::of(&new_name);
            if let Some(existing) = store.user_collection().get_by_name(&key) {
                if existing != handle {
                    return Err(StatusCode::AlreadyExists);
                }
            }
            if user.name().as_str() == new_name {
                return Err(StatusCode::NoEffect);
            }

            store.change_user_name(handle, CollatedString::new(new_name));
            let octx = ctx.observer();
            let user = store.user(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_user(&octx, user, UserChange::Name);
            }
            Ok(())
        })
    }

    pub fn change_user_info(
        &self,
        ctx: &RequestContext,
        user_id: ForumId,
        info: &str,
    ) -> RepoResult<()> {
        let config = config::global();
        self.change_user_text_attribute(
            ctx,
            user_id,
            info,
            config.user.min_info_length,
            config.user.max_info_length,
            UserChange::Info,
        )
    }

    pub fn change_user_title(
        &self,
        ctx: &RequestContext,
        user_id: ForumId,
        title: &str,
    ) -> RepoResult<()> {
        let config = config::global();
        self.change_user_text_attribute(
            ctx,
            user_id,
            title,
            config.user.min_title_length,
            config.user.max_title_length,
            UserChange::Title,
        )
    }

    pub fn change_user_signature(
        &self,
        ctx: &RequestContext,
        user_id: ForumId,
        signature: &str,
    ) -> RepoResult<()> {
        let config = config::global();
        self.change_user_text_attribute(
            ctx,
            user_id,
            signature,
            config.user.min_signature_length,
            config.user.max_signature_length,
            UserChange::Signature,
        )
    }

    fn change_user_text_attribute(
        &self,
        ctx: &RequestContext,
        user_id: ForumId,
        value: &str,
        min: usize,
        max: usize,
        change: UserChange,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        let value = validate_text(value, min, max)?;

        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::ChangeUser, ctx, Some(user_id))?;
            let Some((handle, _)) = store.user_by_id(user_id) else {
                return Err(StatusCode::NotFound);
            };
            match change {
                UserChange::Info => store.change_user_info(handle, value),
                UserChange::Title => store.change_user_title(handle, value),
                UserChange::Signature => store.change_user_signature(handle, value),
                _ => unreachable!("Only text attributes route here"),
            }
            let octx = ctx.observer();
            let user = store.user(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_user(&octx, user, change);
            }
            Ok(())
        })
    }

    pub fn change_user_logo(
        &self,
        ctx: &RequestContext,
        user_id: ForumId,
        logo: &[u8],
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        if logo.len() > config::global().user.max_logo_binary_size {
            return Err(StatusCode::ValueTooLong);
        }

        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::ChangeUser, ctx, Some(user_id))?;
            let Some((handle, _)) = store.user_by_id(user_id) else {
                return Err(StatusCode::NotFound);
            };
            store.change_user_logo(handle, logo.to_vec());
            let octx = ctx.observer();
            let user = store.user(handle).expect("Live handle");
            for observer in self.observers().write() {
                observer.on_change_user(&octx, user, UserChange::Logo);
            }
            Ok(())
        })
    }

    pub fn change_user_attachment_quota(
        &self,
        ctx: &RequestContext,
        user_id: ForumId,
        quota: u64,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::ChangeUser, ctx, Some(user_id))?;
            let Some((handle, _)) = store.user_by_id(user_id) else {
                return Err(StatusCode::NotFound);
            };
            store.change_user_attachment_quota(handle, Some(quota));
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_change_user_attachment_quota(&octx, user_id, quota);
            }
            Ok(())
        })
    }

    /// Deletes the user and everything the cascade takes with it; the
    /// per-entity deletion events are emitted in dependency order
    /// (messages before threads) so replay converges on the same state.
    pub fn delete_user(&self, ctx: &RequestContext, user_id: ForumId) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::DeleteUser, ctx, Some(user_id))?;
            let Some((handle, user)) = store.user_by_id(user_id) else {
                return Err(StatusCode::NotFound);
            };
            let message_ids: Vec<ForumId> = user
                .messages()
                .filter_map(|h| store.message(h))
                .map(|m| m.id())
                .collect();
            let thread_ids: Vec<ForumId> = user
                .threads()
                .filter_map(|h| store.thread(h))
                .map(|t| t.id())
                .collect();

            store.delete_user(handle);

            let octx = ctx.observer();
            for observer in self.observers().write() {
                for message_id in &message_ids {
                    observer.on_delete_discussion_thread_message(&octx, *message_id);
                }
                for thread_id in &thread_ids {
                    observer.on_delete_discussion_thread(&octx, *thread_id);
                }
                observer.on_delete_user(&octx, user_id);
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_users(
        &self,
        ctx: &RequestContext,
        by: RetrieveUsersBy,
        page: usize,
    ) -> RepoResult<Vec<UserSummary>> {
        let page_size = config::global().user.max_users_per_page;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            let users = store.user_collection();
            let result = match by {
                RetrieveUsersBy::Name => page_slice(users.iter_by_name(), page, page_size),
                RetrieveUsersBy::Created => page_slice(users.iter_by_created(), page, page_size),
                RetrieveUsersBy::LastSeen => {
                    page_slice(users.iter_by_last_seen_desc(), page, page_size)
                }
                RetrieveUsersBy::ThreadCount => {
                    page_slice(users.iter_by_thread_count_desc(), page, page_size)
                }
                RetrieveUsersBy::MessageCount => {
                    page_slice(users.iter_by_message_count_desc(), page, page_size)
                }
            };
            Ok(result
                .into_iter()
                .filter_map(|h| store.user(h))
                .map(summarize)
                .collect())
        })
    }

    /// Users whose last activity falls within the configured online
    /// window.
    pub fn get_online_users(&self, ctx: &RequestContext) -> RepoResult<Vec<UserSummary>> {
        let cutoff = config::global().user.online_users_interval_seconds;
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            Ok(store
                .user_collection()
                .iter_by_last_seen_desc()
                .filter_map(|h| store.user(h))
                .take_while(|user| ctx.timestamp.seconds_since(user.last_seen()) <= cutoff)
                .map(summarize)
                .collect())
        })
    }

    pub fn get_user_by_id(&self, ctx: &RequestContext, user_id: ForumId) -> RepoResult<UserDetails> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, Some(user_id))?;
            self.note_last_seen(ctx, store);
            let Some((_, user)) = store.user_by_id(user_id) else {
                return Err(StatusCode::NotFound);
            };
            Ok(details(user))
        })
    }

    pub fn get_user_by_name(&self, ctx: &RequestContext, name: &str) -> RepoResult<UserDetails> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            self.note_last_seen(ctx, store);
            let key = SortKey::of(name);
            let Some(handle) = store.user_collection().get_by_name(&key) else {
                return Err(StatusCode::NotFound);
            };
            Ok(details(store.user(handle).expect("Indexed handle")))
        })
    }

    /// Rank of the lower bound of `name` in the name ordering; the
    /// offset from which a name-search page starts.
    pub fn search_users_by_name(&self, ctx: &RequestContext, name: &str) -> RepoResult<usize> {
        self.store().read(|store| {
            self.authorize(store, AuthorizedOperation::GetEntities, ctx, None)?;
            Ok(store.user_collection().lower_bound_rank(&SortKey::of(name)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{ctx_as, ctx_at, test_repo};

    #[test_log::test]
    fn add_user_succeeds_and_emits() {
        let (repo, observer) = test_repo();
        let added = repo
            .add_new_user(&ctx_at(100), "alice", "a1")
            .expect("adds");
        assert_eq!(added.created, Timestamp::from_secs(100));
        assert_eq!(observer.take(), ["add_new_user"]);

        let users = repo
            .get_users(&ctx_at(101), RetrieveUsersBy::Name, 0)
            .expect("reads");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "alice");
        assert_eq!(users[0].id, added.id);
    }

    #[test_log::test]
    fn collation_equal_name_is_rejected_without_event() {
        let (repo, observer) = test_repo();
        repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        observer.take();

        let result = repo.add_new_user(&ctx_at(101), "Alice", "a2");
        assert_eq!(result, Err(StatusCode::AlreadyExists));
        assert!(observer.take().is_empty());
        assert_eq!(
            repo.get_users(&ctx_at(102), RetrieveUsersBy::Name, 0)
                .expect("reads")
                .len(),
            1
        );
    }

    #[test_log::test]
    fn duplicate_auth_has_its_own_status() {
        let (repo, _) = test_repo();
        repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        assert_eq!(
            repo.add_new_user(&ctx_at(101), "bob", "a1"),
            Err(StatusCode::UserWithSameAuthAlreadyExists)
        );
    }

    #[test_log::test]
    fn name_length_boundaries() {
        let (repo, _) = test_repo();
        let max = agora_core::config::global().user.max_name_length;

        let at_limit = "a".repeat(max);
        assert!(repo.add_new_user(&ctx_at(100), &at_limit, "x1").is_ok());

        let over_limit = "a".repeat(max + 1);
        assert_eq!(
            repo.add_new_user(&ctx_at(101), &over_limit, "x2"),
            Err(StatusCode::ValueTooLong)
        );
        assert_eq!(
            repo.add_new_user(&ctx_at(102), "ab", "x3"),
            Err(StatusCode::ValueTooShort)
        );
    }

    #[test_log::test]
    fn missing_user_reads_return_not_found() {
        let (repo, _) = test_repo();
        assert_eq!(
            repo.get_user_by_id(&ctx_at(100), ForumId::generate()),
            Err(StatusCode::NotFound)
        );
        assert_eq!(
            repo.get_user_by_name(&ctx_at(100), "nobody"),
            Err(StatusCode::NotFound)
        );
    }

    #[test_log::test]
    fn rename_rejects_collisions_and_no_ops() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        repo.add_new_user(&ctx_at(101), "bob", "b1").expect("adds");

        assert_eq!(
            repo.change_user_name(&ctx_at(102), alice.id, "BOB"),
            Err(StatusCode::AlreadyExists)
        );
        assert_eq!(
            repo.change_user_name(&ctx_at(103), alice.id, "alice"),
            Err(StatusCode::NoEffect)
        );
        repo.change_user_name(&ctx_at(104), alice.id, "alicia")
            .expect("renames");
        assert_eq!(
            repo.get_user_by_name(&ctx_at(105), "Alicia")
                .expect("reads")
                .summary
                .id,
            alice.id
        );
    }

    #[test_log::test]
    fn delete_user_emits_cascade_in_dependency_order() {
        let (repo, observer) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let thread = repo
            .add_new_discussion_thread(&actx, "hello world")
            .expect("adds");
        repo.add_new_discussion_thread_message(&actx, thread.id, "some interesting content")
            .expect("adds");
        observer.take();

        repo.delete_user(&ctx_at(120), alice.id).expect("deletes");
        assert_eq!(
            observer.take(),
            [
                "delete_discussion_thread_message",
                "delete_discussion_thread",
                "delete_user"
            ]
        );
    }

    #[test_log::test]
    fn first_user_gets_forum_wide_privileges_once() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let bob = repo.add_new_user(&ctx_at(101), "bob", "b1").expect("adds");

        repo.store().read(|store| {
            use crate::entities::privileges::PrivilegeTarget;
            assert!(
                store
                    .granted_privileges()
                    .get(alice.id, PrivilegeTarget::ForumWide, Timestamp::from_secs(102))
                    .is_some()
            );
            assert!(
                store
                    .granted_privileges()
                    .get(bob.id, PrivilegeTarget::ForumWide, Timestamp::from_secs(102))
                    .is_none()
            );
        });
    }

    #[test_log::test]
    fn last_seen_updates_are_throttled() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");

        // Within the precision window nothing is written
        repo.get_users(&ctx_as(alice.id, 150), RetrieveUsersBy::Name, 0)
            .expect("reads");
        assert_eq!(
            repo.get_user_by_id(&ctx_at(151), alice.id)
                .expect("reads")
                .summary
                .last_seen,
            Timestamp::from_secs(100)
        );

        // Past it the deferred update runs after the read lock drops
        let precision = agora_core::config::global().user.last_seen_update_precision;
        repo.get_users(
            &ctx_as(alice.id, 100 + precision),
            RetrieveUsersBy::Name,
            0,
        )
        .expect("reads");
        assert_eq!(
            repo.get_user_by_id(&ctx_at(500), alice.id)
                .expect("reads")
                .summary
                .last_seen,
            Timestamp::from_secs(100 + precision)
        );
    }
}
