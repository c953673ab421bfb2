//! Privilege mutations.
//!
//! `of` is the operation family a requirement governs, `on` the entity
//! carrying the override. Only the combinations the event format defines
//! are accepted (e.g. a thread-message requirement may sit on a message,
//! thread, tag or forum-wide, but never on a category).

use agora_core::id::ForumId;

use super::{MemoryRepository, RepoResult, RequestContext, StatusCode};
use crate::authorization::AuthorizedOperation;
use crate::entities::privileges::{PrivilegeKind, PrivilegeTarget};

fn valid_requirement_scope(of: PrivilegeKind, on: PrivilegeTarget) -> bool {
    use PrivilegeKind as K;
    use PrivilegeTarget as T;
    matches!(
        (of, on),
        (K::ThreadMessage, T::ThreadMessage(_))
            | (K::ThreadMessage, T::Thread(_))
            | (K::ThreadMessage, T::Tag(_))
            | (K::ThreadMessage, T::ForumWide)
            | (K::Thread, T::Thread(_))
            | (K::Thread, T::Tag(_))
            | (K::Thread, T::ForumWide)
            | (K::Tag, T::Tag(_))
            | (K::Tag, T::ForumWide)
            | (K::Category, T::Category(_))
            | (K::Category, T::ForumWide)
            | (K::ForumWide, T::ForumWide)
    )
}

impl MemoryRepository {
    fn target_exists(store: &crate::store::EntityStore, target: PrivilegeTarget) -> bool {
        match target {
            PrivilegeTarget::ThreadMessage(id) => store.message_by_id(id).is_some(),
            PrivilegeTarget::Thread(id) => store.thread_by_id(id).is_some(),
            PrivilegeTarget::Tag(id) => store.tag_by_id(id).is_some(),
            PrivilegeTarget::Category(id) => store.category_by_id(id).is_some(),
            PrivilegeTarget::ForumWide => true,
        }
    }

    pub fn change_required_privilege(
        &self,
        ctx: &RequestContext,
        of: PrivilegeKind,
        on: PrivilegeTarget,
        privilege: u16,
        value: i16,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        if !valid_requirement_scope(of, on) {
            return Err(StatusCode::InvalidParameters);
        }
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::AdjustPrivilege, ctx, on.id())?;
            if !Self::target_exists(store, on) {
                return Err(StatusCode::NotFound);
            }
            store.set_required_privilege(of, on, privilege, value);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_change_required_privilege(&octx, of, on, privilege, value);
            }
            Ok(())
        })
    }

    pub fn change_forum_wide_default_privilege_level(
        &self,
        ctx: &RequestContext,
        duration_kind: u16,
        value: i16,
        duration: i64,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::AdjustPrivilege, ctx, None)?;
            store.set_forum_wide_default_privilege_level(duration_kind, value, duration);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_change_forum_wide_default_privilege_level(
                    &octx,
                    duration_kind,
                    value,
                    duration,
                );
            }
            Ok(())
        })
    }

    /// Duration ≤ 0 assigns without expiry.
    pub fn assign_privilege(
        &self,
        ctx: &RequestContext,
        target: PrivilegeTarget,
        user_id: ForumId,
        value: i16,
        duration: i64,
    ) -> RepoResult<()> {
        self.check_commands_enabled(ctx)?;
        self.store().write(|store| {
            self.authorize(store, AuthorizedOperation::AdjustPrivilege, ctx, target.id())?;
            if store.user_by_id(user_id).is_none() {
                return Err(StatusCode::NotFound);
            }
            if !Self::target_exists(store, target) {
                return Err(StatusCode::NotFound);
            }
            store.assign_privilege(user_id, target, value, ctx.timestamp, duration);
            let octx = ctx.observer();
            for observer in self.observers().write() {
                observer.on_assign_privilege(&octx, target, user_id, value, duration);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use agora_core::Timestamp;

    use super::*;
    use crate::repository::test_support::{ctx_as, ctx_at, test_repo};

    #[test_log::test]
    fn requirement_scopes_are_validated() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let actx = ctx_as(alice.id, 110);
        let category = repo
            .add_new_discussion_category(&actx, "general", None)
            .expect("adds");

        // A thread-message requirement cannot sit on a category
        assert_eq!(
            repo.change_required_privilege(
                &actx,
                PrivilegeKind::ThreadMessage,
                PrivilegeTarget::Category(category.id),
                1,
                5,
            ),
            Err(StatusCode::InvalidParameters)
        );
        repo.change_required_privilege(
            &actx,
            PrivilegeKind::Category,
            PrivilegeTarget::Category(category.id),
            1,
            5,
        )
        .expect("changes");

        repo.store().read(|store| {
            assert_eq!(
                store.required_privileges().get(
                    PrivilegeKind::Category,
                    PrivilegeTarget::Category(category.id),
                    1
                ),
                Some(5)
            );
        });
    }

    #[test_log::test]
    fn assignments_expire_by_duration() {
        let (repo, _) = test_repo();
        let alice = repo.add_new_user(&ctx_at(100), "alice", "a1").expect("adds");
        let bob = repo.add_new_user(&ctx_at(101), "bob", "b1").expect("adds");
        let actx = ctx_as(alice.id, 110);

        repo.assign_privilege(&actx, PrivilegeTarget::ForumWide, bob.id, 3, 60)
            .expect("assigns");
        repo.store().read(|store| {
            assert!(
                store
                    .granted_privileges()
                    .get(bob.id, PrivilegeTarget::ForumWide, Timestamp::from_secs(150))
                    .is_some()
            );
            assert!(
                store
                    .granted_privileges()
                    .get(bob.id, PrivilegeTarget::ForumWide, Timestamp::from_secs(200))
                    .is_none()
            );
        });
    }
}
