//! Configuration consumed by the store and the persistence layer.
//!
//! Loading is the embedding service's job; this module only defines the
//! value types, their defaults and the process-wide snapshot cell. Readers
//! take one [`Arc`] per operation so a concurrent [`set_global`] can never
//! tear their view.

use std::sync::{Arc, LazyLock, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserConfig {
    pub min_name_length: usize,
    pub max_name_length: usize,
    pub min_info_length: usize,
    pub max_info_length: usize,
    pub min_title_length: usize,
    pub max_title_length: usize,
    pub min_signature_length: usize,
    pub max_signature_length: usize,
    pub last_seen_update_precision: i64,
    pub max_users_per_page: usize,
    pub online_users_interval_seconds: i64,
    pub max_logo_binary_size: usize,
    pub max_logo_width: u32,
    pub max_logo_height: u32,
    pub reset_vote_expires_in_seconds: i64,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            min_name_length: 3,
            max_name_length: 20,
            min_info_length: 0,
            max_info_length: 1024,
            min_title_length: 0,
            max_title_length: 64,
            min_signature_length: 0,
            max_signature_length: 256,
            last_seen_update_precision: 300,
            max_users_per_page: 20,
            online_users_interval_seconds: 15 * 60,
            max_logo_binary_size: 32768,
            max_logo_width: 128,
            max_logo_height: 128,
            reset_vote_expires_in_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscussionThreadConfig {
    pub min_name_length: usize,
    pub max_name_length: usize,
    pub max_users_in_visited_since_last_change: usize,
    pub max_threads_per_page: usize,
}

impl Default for DiscussionThreadConfig {
    fn default() -> Self {
        Self {
            min_name_length: 3,
            max_name_length: 128,
            max_users_in_visited_since_last_change: 1024,
            max_threads_per_page: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscussionThreadMessageConfig {
    pub min_content_length: usize,
    pub max_content_length: usize,
    pub min_change_reason_length: usize,
    pub max_change_reason_length: usize,
    pub max_messages_per_page: usize,
    pub min_comment_length: usize,
    pub max_comment_length: usize,
    pub max_message_comments_per_page: usize,
}

impl Default for DiscussionThreadMessageConfig {
    fn default() -> Self {
        Self {
            min_content_length: 5,
            max_content_length: 65535,
            min_change_reason_length: 0,
            max_change_reason_length: 64,
            max_messages_per_page: 20,
            min_comment_length: 3,
            max_comment_length: 1024,
            max_message_comments_per_page: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscussionTagConfig {
    pub min_name_length: usize,
    pub max_name_length: usize,
    pub max_ui_blob_size: usize,
}

impl Default for DiscussionTagConfig {
    fn default() -> Self {
        Self {
            min_name_length: 2,
            max_name_length: 128,
            max_ui_blob_size: 10000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscussionCategoryConfig {
    pub min_name_length: usize,
    pub max_name_length: usize,
    pub max_description_length: usize,
}

impl Default for DiscussionCategoryConfig {
    fn default() -> Self {
        Self {
            min_name_length: 2,
            max_name_length: 128,
            max_description_length: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Rejects every mutation with NOT_ALLOWED when set.
    pub disable_commands: bool,
    pub disable_commands_for_anonymous_users: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            disable_commands: false,
            disable_commands_for_anonymous_users: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistenceConfig {
    /// Folder scanned (recursively) for event files to replay on startup.
    pub input_folder: String,
    /// Folder receiving newly appended event files.
    pub output_folder: String,
    /// Optional read-only file historical message content is mapped from.
    pub messages_file: String,
    pub validate_checksum: bool,
    pub create_new_output_file_every_seconds: i64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            input_folder: String::new(),
            output_folder: String::new(),
            messages_file: String::new(),
            validate_checksum: true,
            create_new_output_file_every_seconds: 3600 * 24,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForumConfig {
    pub user: UserConfig,
    pub discussion_thread: DiscussionThreadConfig,
    pub discussion_thread_message: DiscussionThreadMessageConfig,
    pub discussion_tag: DiscussionTagConfig,
    pub discussion_category: DiscussionCategoryConfig,
    pub service: ServiceConfig,
    pub persistence: PersistenceConfig,
}

static GLOBAL: LazyLock<RwLock<Arc<ForumConfig>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ForumConfig::default())));

/// The current configuration snapshot.
///
/// Operations load this once and keep the `Arc` for their whole duration;
/// old snapshots stay valid for in-flight readers after a swap.
pub fn global() -> Arc<ForumConfig> {
    GLOBAL.read().expect("Locking failed").clone()
}

/// Publishes a new immutable configuration value.
pub fn set_global(config: ForumConfig) {
    *GLOBAL.write().expect("Locking failed") = Arc::new(config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn defaults_match_documented_values() {
        let config = ForumConfig::default();
        assert_eq!(config.user.min_name_length, 3);
        assert_eq!(config.user.max_name_length, 20);
        assert_eq!(config.user.last_seen_update_precision, 300);
        assert_eq!(config.discussion_thread.max_threads_per_page, 25);
        assert_eq!(config.discussion_thread_message.max_content_length, 65535);
        assert_eq!(config.discussion_tag.max_ui_blob_size, 10000);
        assert_eq!(config.persistence.create_new_output_file_every_seconds, 86400);
        assert!(config.persistence.validate_checksum);
    }

    #[test_log::test]
    fn partial_json_fills_in_defaults() {
        let config: ForumConfig =
            serde_json::from_str(r#"{"user": {"maxNameLength": 30}}"#).expect("parses");
        assert_eq!(config.user.max_name_length, 30);
        assert_eq!(config.user.min_name_length, 3);
        assert_eq!(config.discussion_category.max_description_length, 1024);
    }

    #[test_log::test]
    fn snapshot_swap_does_not_affect_held_arcs() {
        let before = global();
        let mut changed = ForumConfig::default();
        changed.user.max_name_length = 99;
        set_global(changed);
        assert_eq!(before.user.max_name_length, ForumConfig::default().user.max_name_length);
        assert_eq!(global().user.max_name_length, 99);
        set_global(ForumConfig::default());
    }
}
