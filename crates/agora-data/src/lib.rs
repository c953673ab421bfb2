//! In-memory forum state: entities, multi-index collections, the entity
//! store root, and the repository façade the service layer calls into.
//!
//! The whole state sits behind one reader/writer guard; durability is the
//! job of the persistence crate, which observes every mutation through
//! the [`observers`] traits and replays the log through the
//! [`repository::direct`] interface on startup.

pub mod authorization;
pub mod collections;
pub mod entities;
pub mod guard;
pub mod observers;
pub mod pool;
pub mod repository;
pub mod sort_key;
pub mod store;

pub(crate) const LOG_TARGET: &str = "agora::data";

pub use repository::{MemoryRepository, RepoResult, RequestContext, StatusCode};
