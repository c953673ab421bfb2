//! Authorization seam.
//!
//! The policy evaluator lives outside this crate; repositories only ask
//! it yes/no per operation before mutating. It receives the store so it
//! can consult the granted/required privilege tuples.

use agora_core::id::ForumId;

use crate::store::EntityStore;

/// Operations the repository façade asks permission for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AuthorizedOperation {
    AddNewUser,
    ChangeUser,
    DeleteUser,

    AddNewDiscussionThread,
    ChangeDiscussionThread,
    DeleteDiscussionThread,
    MergeDiscussionThreads,
    SubscribeToDiscussionThread,
    ViewUnapprovedDiscussionThreads,

    AddNewDiscussionThreadMessage,
    ChangeDiscussionThreadMessage,
    MoveDiscussionThreadMessage,
    DeleteDiscussionThreadMessage,
    VoteDiscussionThreadMessage,
    ViewUnapprovedDiscussionThreadMessages,

    AddCommentToDiscussionThreadMessage,
    SolveDiscussionThreadMessageComment,

    AddNewDiscussionTag,
    ChangeDiscussionTag,
    DeleteDiscussionTag,
    MergeDiscussionTags,
    AddDiscussionTagToThread,

    AddNewDiscussionCategory,
    ChangeDiscussionCategory,
    DeleteDiscussionCategory,
    AddDiscussionTagToCategory,

    SendPrivateMessage,
    DeletePrivateMessage,

    AddAttachment,
    ChangeAttachment,
    DeleteAttachment,

    AdjustPrivilege,

    GetEntities,
}

pub trait Authorization: Send + Sync {
    /// `target` is the id of the entity being acted on, when there is
    /// one.
    fn check(
        &self,
        operation: AuthorizedOperation,
        performed_by: ForumId,
        target: Option<ForumId>,
        store: &EntityStore,
    ) -> bool;
}

/// Permits everything; the default wiring for tests and for embedders
/// that enforce policy at an outer layer.
pub struct AllowAll;

impl Authorization for AllowAll {
    fn check(
        &self,
        _operation: AuthorizedOperation,
        _performed_by: ForumId,
        _target: Option<ForumId>,
        _store: &EntityStore,
    ) -> bool {
        true
    }
}
