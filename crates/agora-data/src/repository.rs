//! The repository façade.
//!
//! Each operation validates its inputs against the configuration bounds,
//! consults authorization, performs the mutation or read under the
//! shared guard, emits the matching observer signal after a successful
//! mutation, and returns a typed status. Failed operations emit nothing.
//!
//! The parallel direct-write interface (see [`direct`]) skips validation,
//! authorization and observers, and accepts caller-supplied ids and
//! timestamps; it exists for log replay.

pub mod attachment;
pub mod category;
pub mod direct;
pub mod message;
pub mod private_message;
pub mod privileges;
pub mod tag;
pub mod thread;
pub mod user;

use std::sync::Arc;

use agora_core::id::ForumId;
use agora_core::{IpAddress, Timestamp, config};
use unicode_normalization::{UnicodeNormalization as _, is_nfc};

use snafu::Snafu;

use crate::authorization::{Authorization, AuthorizedOperation};
use crate::guard::ResourceGuard;
use crate::observers::{ObserverContext, ObserverRegistry, ReadObserver, WriteObserver};
use crate::store::EntityStore;

/// Outcome taxonomy shared by every operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Snafu)]
pub enum StatusCode {
    #[snafu(display("Ok"))]
    Ok,
    #[snafu(display("Invalid parameters"))]
    InvalidParameters,
    #[snafu(display("Value too short"))]
    ValueTooShort,
    #[snafu(display("Value too long"))]
    ValueTooLong,
    #[snafu(display("Already exists"))]
    AlreadyExists,
    #[snafu(display("Not found"))]
    NotFound,
    #[snafu(display("No effect"))]
    NoEffect,
    #[snafu(display("Not allowed"))]
    NotAllowed,
    #[snafu(display("Circular reference not allowed"))]
    CircularReferenceNotAllowed,
    #[snafu(display("Not updated since last check"))]
    NotUpdatedSinceLastCheck,
    #[snafu(display("A user with the same auth already exists"))]
    UserWithSameAuthAlreadyExists,
}

pub type RepoResult<T> = std::result::Result<T, StatusCode>;

/// Who is performing the current request.
#[derive(Copy, Clone, Debug)]
pub struct RequestContext {
    pub performed_by: ForumId,
    pub ip: IpAddress,
    pub timestamp: Timestamp,
}

impl RequestContext {
    pub fn new(performed_by: ForumId, ip: IpAddress) -> Self {
        Self {
            performed_by,
            ip,
            timestamp: Timestamp::now(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(ForumId::ZERO, IpAddress::ZERO)
    }

    pub(crate) fn observer(&self) -> ObserverContext {
        ObserverContext {
            timestamp: self.timestamp,
            performed_by: self.performed_by,
            ip: self.ip,
        }
    }
}

/// Result sink for creations: the minted id and creation time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AddedEntity {
    pub id: ForumId,
    pub created: Timestamp,
}

pub struct MemoryRepository {
    store: Arc<ResourceGuard<EntityStore>>,
    authorization: Arc<dyn Authorization>,
    observers: ObserverRegistry,
}

impl MemoryRepository {
    pub fn new(authorization: Arc<dyn Authorization>) -> Self {
        Self {
            store: Arc::new(ResourceGuard::new(EntityStore::new())),
            authorization,
            observers: ObserverRegistry::new(),
        }
    }

    pub fn subscribe_write_observer(&mut self, observer: Arc<dyn WriteObserver>) {
        self.observers.subscribe_write(observer);
    }

    pub fn subscribe_read_observer(&mut self, observer: Arc<dyn ReadObserver>) {
        self.observers.subscribe_read(observer);
    }

    pub fn store(&self) -> &Arc<ResourceGuard<EntityStore>> {
        &self.store
    }

    pub(crate) fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    /// NOT_ALLOWED when mutations are globally muted, or muted for
    /// anonymous requests.
    pub(crate) fn check_commands_enabled(&self, ctx: &RequestContext) -> RepoResult<()> {
        let config = config::global();
        if config.service.disable_commands {
            return Err(StatusCode::NotAllowed);
        }
        if config.service.disable_commands_for_anonymous_users && ctx.performed_by.is_zero() {
            return Err(StatusCode::NotAllowed);
        }
        Ok(())
    }

    pub(crate) fn authorize(
        &self,
        store: &EntityStore,
        operation: AuthorizedOperation,
        ctx: &RequestContext,
        target: Option<ForumId>,
    ) -> RepoResult<()> {
        if self
            .authorization
            .check(operation, ctx.performed_by, target, store)
        {
            Ok(())
        } else {
            Err(StatusCode::NotAllowed)
        }
    }

    /// Last-seen side effect of an authenticated read. Runs as a
    /// deferred write after the shared lock is released, and only when
    /// the configured precision interval has elapsed.
    pub(crate) fn note_last_seen(&self, ctx: &RequestContext, store: &EntityStore) {
        if ctx.performed_by.is_zero() {
            return;
        }
        let precision = config::global().user.last_seen_update_precision;
        let Some((_, user)) = store.user_by_id(ctx.performed_by) else {
            return;
        };
        if ctx.timestamp.seconds_since(user.last_seen()) < precision {
            return;
        }
        let user_id = ctx.performed_by;
        let at = ctx.timestamp;
        self.store.defer(move |store| {
            if let Some((handle, user)) = store.user_by_id(user_id) {
                if at.seconds_since(user.last_seen()) >= precision {
                    store.update_user_last_seen(handle, at);
                }
            }
        });
    }
}

/// NFC-normalizes and checks the code-point count against the configured
/// bounds.
pub(crate) fn validate_text(value: &str, min: usize, max: usize) -> RepoResult<String> {
    let normalized: String = if is_nfc(value) {
        value.to_owned()
    } else {
        value.nfc().collect()
    };
    let count = normalized.chars().count();
    if count < min {
        return Err(StatusCode::ValueTooShort);
    }
    if count > max {
        return Err(StatusCode::ValueTooLong);
    }
    Ok(normalized)
}

/// Names additionally may not be blank-edged or carry control
/// characters.
pub(crate) fn validate_name(value: &str, min: usize, max: usize) -> RepoResult<String> {
    if value.chars().any(char::is_control) {
        return Err(StatusCode::InvalidParameters);
    }
    if value != value.trim() {
        return Err(StatusCode::InvalidParameters);
    }
    validate_text(value, min, max)
}

pub(crate) fn page_slice<T>(
    items: impl Iterator<Item = T>,
    page: usize,
    page_size: usize,
) -> Vec<T> {
    items.skip(page * page_size).take(page_size).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::authorization::AllowAll;
    use crate::observers::{ObserverContext, WriteObserver};
    use crate::entities::{Message, Thread, User};

    /// Records the names of emitted write events, in order.
    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub(crate) events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        pub(crate) fn take(&self) -> Vec<String> {
            std::mem::take(&mut self.events.lock().expect("Locking failed"))
        }

        fn push(&self, name: &str) {
            self.events.lock().expect("Locking failed").push(name.into());
        }
    }

    impl WriteObserver for RecordingObserver {
        fn on_add_new_user(&self, _ctx: &ObserverContext, _user: &User) {
            self.push("add_new_user");
        }
        fn on_delete_user(&self, _ctx: &ObserverContext, _user_id: agora_core::id::ForumId) {
            self.push("delete_user");
        }
        fn on_add_new_discussion_thread(&self, _ctx: &ObserverContext, _thread: &Thread) {
            self.push("add_new_discussion_thread");
        }
        fn on_delete_discussion_thread(
            &self,
            _ctx: &ObserverContext,
            _thread_id: agora_core::id::ForumId,
        ) {
            self.push("delete_discussion_thread");
        }
        fn on_merge_discussion_threads(
            &self,
            _ctx: &ObserverContext,
            _from: agora_core::id::ForumId,
            _into: agora_core::id::ForumId,
        ) {
            self.push("merge_discussion_threads");
        }
        fn on_add_new_discussion_thread_message(
            &self,
            _ctx: &ObserverContext,
            _message: &Message,
            _thread_id: agora_core::id::ForumId,
            _content: &str,
        ) {
            self.push("add_new_discussion_thread_message");
        }
        fn on_delete_discussion_thread_message(
            &self,
            _ctx: &ObserverContext,
            _message_id: agora_core::id::ForumId,
        ) {
            self.push("delete_discussion_thread_message");
        }
    }

    pub(crate) fn test_repo() -> (MemoryRepository, Arc<RecordingObserver>) {
        let mut repo = MemoryRepository::new(Arc::new(AllowAll));
        let observer = Arc::new(RecordingObserver::default());
        repo.subscribe_write_observer(observer.clone());
        (repo, observer)
    }

    pub(crate) fn ctx_at(secs: i64) -> RequestContext {
        RequestContext {
            performed_by: agora_core::id::ForumId::ZERO,
            ip: agora_core::IpAddress::ZERO,
            timestamp: Timestamp::from_secs(secs),
        }
    }

    pub(crate) fn ctx_as(user: agora_core::id::ForumId, secs: i64) -> RequestContext {
        RequestContext {
            performed_by: user,
            ip: agora_core::IpAddress::ZERO,
            timestamp: Timestamp::from_secs(secs),
        }
    }
}
