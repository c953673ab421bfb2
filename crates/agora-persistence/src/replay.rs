//! Startup replay of the event log.
//!
//! Event files are enumerated recursively, filtered by name, sorted by
//! their unix-seconds suffix and memory-mapped in turn. Framing is
//! validated strictly: the first bad magic, short blob or checksum
//! mismatch stops replay, because running on partial state would
//! silently diverge from the log. Each valid frame dispatches by
//! (event type, version) to the direct-write repository interface,
//! preserving original ids and timestamps. The whole run sits inside
//! `start_batch_insert` / `stop_batch_insert`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use agora_core::event::{CONTEXT_VERSION, EVENT_HEADER_SIZE, EventContext, EventType};
use agora_core::frame::{FRAME_PREFIX_SIZE, MAGIC_PREFIX, crc32, padding_required};
use agora_core::id::ForumId;
use agora_core::wire::{BlobReader, WireError, WireResult};
use agora_data::entities::privileges::{PrivilegeKind, PrivilegeTarget};
use agora_data::repository::StatusCode;
use agora_data::repository::direct::DirectWriteRepository;
use regex::Regex;
use snafu::{Location, ResultExt as _, Snafu};
use tracing::{error, info, warn};

use crate::LOG_TARGET;

static EVENT_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^forum-(\d+)\.events$").expect("Valid regex"));

#[derive(Debug, Snafu)]
pub enum ReplayError {
    #[snafu(display("Could not read {}", path.display()))]
    Io {
        source: std::io::Error,
        path: PathBuf,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid magic prefix in {} at offset {offset}", path.display()))]
    InvalidMagic { path: PathBuf, offset: usize },
    #[snafu(display("Blob of {size} bytes in {} at offset {offset} is smaller than an event header", path.display()))]
    BlobTooSmall {
        path: PathBuf,
        offset: usize,
        size: u32,
    },
    #[snafu(display("Frame in {} at offset {offset} runs past the end of the file", path.display()))]
    TruncatedFrame { path: PathBuf, offset: usize },
    #[snafu(display(
        "Checksum mismatch in {} at offset {offset}: stored {stored:08x}, computed {computed:08x}",
        path.display()
    ))]
    ChecksumMismatch {
        path: PathBuf,
        offset: usize,
        stored: u32,
        computed: u32,
    },
    #[snafu(display("Malformed event data in {} at offset {offset}", path.display()))]
    MalformedEvent {
        source: WireError,
        path: PathBuf,
        offset: usize,
    },
    #[snafu(display(
        "Unsupported event in {} at offset {offset}: type {event_type}, version {event_version}, context version {context_version}",
        path.display()
    ))]
    UnsupportedEvent {
        path: PathBuf,
        offset: usize,
        event_type: u32,
        event_version: u16,
        context_version: u16,
    },
}

pub type ReplayResult<T> = std::result::Result<T, ReplayError>;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub files: usize,
    pub frames: usize,
    /// Frames whose dispatch returned a non-OK status (e.g. a cascade
    /// already removed the entity); logged, not fatal.
    pub ineffective: usize,
}

pub struct EventReplayer {
    input_folder: PathBuf,
    validate_checksum: bool,
}

impl EventReplayer {
    pub fn new(input_folder: impl Into<PathBuf>, validate_checksum: bool) -> Self {
        Self {
            input_folder: input_folder.into(),
            validate_checksum,
        }
    }

    /// Wires the input folder and checksum policy from the current
    /// configuration snapshot.
    pub fn from_config() -> Self {
        let config = agora_core::config::global();
        Self::new(
            &config.persistence.input_folder,
            config.persistence.validate_checksum,
        )
    }

    pub fn replay(
        &self,
        repository: &(impl DirectWriteRepository + ?Sized),
    ) -> ReplayResult<ReplayStats> {
        let files = self.collect_event_files()?;
        let mut stats = ReplayStats::default();

        repository.direct_start_batch_insert();
        let result = self.replay_files(&files, repository, &mut stats);
        repository.direct_stop_batch_insert();
        result?;

        info!(
            target: LOG_TARGET,
            files = stats.files,
            frames = stats.frames,
            ineffective = stats.ineffective,
            "Replay finished"
        );
        Ok(stats)
    }

    /// Replay failure means lost durability or corrupted state; there is
    /// no partial recovery.
    pub fn replay_or_abort(
        &self,
        repository: &(impl DirectWriteRepository + ?Sized),
    ) -> ReplayStats {
        match self.replay(repository) {
            Ok(stats) => stats,
            Err(err) => {
                error!(target: LOG_TARGET, %err, "Replaying the event log failed");
                std::process::abort();
            }
        }
    }

    fn replay_files(
        &self,
        files: &[PathBuf],
        repository: &(impl DirectWriteRepository + ?Sized),
        stats: &mut ReplayStats,
    ) -> ReplayResult<()> {
        for path in files {
            self.replay_file(path, repository, stats)?;
            stats.files += 1;
        }
        Ok(())
    }

    fn collect_event_files(&self) -> ReplayResult<Vec<PathBuf>> {
        let mut found: Vec<(u64, PathBuf)> = Vec::new();
        if !self.input_folder.as_os_str().is_empty() && self.input_folder.is_dir() {
            let mut pending = vec![self.input_folder.clone()];
            while let Some(dir) = pending.pop() {
                let entries = std::fs::read_dir(&dir).context(IoSnafu { path: dir.clone() })?;
                for entry in entries {
                    let entry = entry.context(IoSnafu { path: dir.clone() })?;
                    let path = entry.path();
                    if path.is_dir() {
                        pending.push(path);
                        continue;
                    }
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    if let Some(captures) = EVENT_FILE_NAME.captures(name) {
                        if let Ok(seconds) = captures[1].parse::<u64>() {
                            found.push((seconds, path));
                        }
                    }
                }
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    fn replay_file(
        &self,
        path: &Path,
        repository: &(impl DirectWriteRepository + ?Sized),
        stats: &mut ReplayStats,
    ) -> ReplayResult<()> {
        let file = std::fs::File::open(path).context(IoSnafu { path })?;
        let len = file.metadata().context(IoSnafu { path })?.len();
        if len == 0 {
            return Ok(());
        }
        // Read-only view; event files are only ever appended to.
        let map = unsafe { memmap2::Mmap::map(&file) }.context(IoSnafu { path })?;
        let data: &[u8] = &map;

        let mut offset = 0usize;
        while offset < data.len() {
            if data.len() - offset < FRAME_PREFIX_SIZE {
                return TruncatedFrameSnafu { path, offset }.fail();
            }
            let magic = u64::from_le_bytes(
                data[offset..offset + 8].try_into().expect("Fixed size"),
            );
            if magic != MAGIC_PREFIX {
                return InvalidMagicSnafu { path, offset }.fail();
            }
            let size = u32::from_le_bytes(
                data[offset + 8..offset + 12].try_into().expect("Fixed size"),
            );
            let stored_crc = u32::from_le_bytes(
                data[offset + 12..offset + 16].try_into().expect("Fixed size"),
            );
            if (size as usize) < EVENT_HEADER_SIZE {
                return BlobTooSmallSnafu { path, offset, size }.fail();
            }
            let payload_start = offset + FRAME_PREFIX_SIZE;
            let payload_end = payload_start + size as usize;
            if payload_end > data.len() {
                return TruncatedFrameSnafu { path, offset }.fail();
            }
            let payload = &data[payload_start..payload_end];
            if self.validate_checksum {
                let computed = crc32(payload);
                if computed != stored_crc {
                    return ChecksumMismatchSnafu {
                        path,
                        offset,
                        stored: stored_crc,
                        computed,
                    }
                    .fail();
                }
            }

            let status = dispatch(repository, payload).map_err(|err| match err {
                DispatchError::Wire { source } => ReplayError::MalformedEvent {
                    source,
                    path: path.to_path_buf(),
                    offset,
                },
                DispatchError::Unsupported {
                    event_type,
                    event_version,
                    context_version,
                } => ReplayError::UnsupportedEvent {
                    path: path.to_path_buf(),
                    offset,
                    event_type,
                    event_version,
                    context_version,
                },
            })?;
            stats.frames += 1;
            if status != StatusCode::Ok {
                stats.ineffective += 1;
                warn!(
                    target: LOG_TARGET,
                    ?status,
                    offset,
                    file = %path.display(),
                    "Replayed event had no effect"
                );
            }

            offset = payload_end + padding_required(size as usize);
        }
        Ok(())
    }
}

enum DispatchError {
    Wire {
        source: WireError,
    },
    Unsupported {
        event_type: u32,
        event_version: u16,
        context_version: u16,
    },
}

impl From<WireError> for DispatchError {
    fn from(source: WireError) -> Self {
        Self::Wire { source }
    }
}

fn optional_id(id: ForumId) -> Option<ForumId> {
    if id.is_zero() { None } else { Some(id) }
}

fn dispatch(
    repository: &(impl DirectWriteRepository + ?Sized),
    payload: &[u8],
) -> Result<StatusCode, DispatchError> {
    let mut reader = BlobReader::new(payload);
    let raw_type = reader.read_u32()?;
    let event_version = reader.read_u16()?;
    let context_version = reader.read_u16()?;
    if event_version != 1 || context_version != CONTEXT_VERSION {
        return Err(DispatchError::Unsupported {
            event_type: raw_type,
            event_version,
            context_version,
        });
    }
    let ctx = EventContext::read_from(&mut reader)?;
    let event_type = EventType(raw_type);
    let r = &mut reader;

    let status = match event_type {
        EventType::ADD_NEW_USER => {
            let id = r.read_id()?;
            let auth = r.read_lp_str()?;
            let name = r.read_lp_str()?;
            repository.direct_add_new_user(&ctx, id, auth, name)
        }
        EventType::CHANGE_USER_NAME => {
            let id = r.read_id()?;
            repository.direct_change_user_name(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_USER_INFO => {
            let id = r.read_id()?;
            repository.direct_change_user_info(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_USER_TITLE => {
            let id = r.read_id()?;
            repository.direct_change_user_title(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_USER_SIGNATURE => {
            let id = r.read_id()?;
            repository.direct_change_user_signature(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_USER_LOGO => {
            let id = r.read_id()?;
            repository.direct_change_user_logo(&ctx, id, r.read_lp_bytes()?)
        }
        EventType::DELETE_USER => repository.direct_delete_user(&ctx, r.read_id()?),

        EventType::ADD_NEW_DISCUSSION_THREAD => {
            let id = r.read_id()?;
            repository.direct_add_new_discussion_thread(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_DISCUSSION_THREAD_NAME => {
            let id = r.read_id()?;
            repository.direct_change_discussion_thread_name(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_DISCUSSION_THREAD_PIN_DISPLAY_ORDER => {
            let id = r.read_id()?;
            repository.direct_change_discussion_thread_pin_display_order(&ctx, id, r.read_u16()?)
        }
        EventType::CHANGE_DISCUSSION_THREAD_APPROVAL => {
            let id = r.read_id()?;
            repository.direct_change_discussion_thread_approval(&ctx, id, r.read_u8()? != 0)
        }
        EventType::DELETE_DISCUSSION_THREAD => {
            repository.direct_delete_discussion_thread(&ctx, r.read_id()?)
        }
        EventType::MERGE_DISCUSSION_THREADS => {
            let from = r.read_id()?;
            repository.direct_merge_discussion_threads(&ctx, from, r.read_id()?)
        }
        EventType::SUBSCRIBE_TO_DISCUSSION_THREAD => {
            repository.direct_subscribe_to_discussion_thread(&ctx, r.read_id()?)
        }
        EventType::UNSUBSCRIBE_FROM_DISCUSSION_THREAD => {
            repository.direct_unsubscribe_from_discussion_thread(&ctx, r.read_id()?)
        }
        EventType::INCREMENT_DISCUSSION_THREAD_NUMBER_OF_VISITS => {
            let id = r.read_id()?;
            repository.direct_increment_discussion_thread_number_of_visits(&ctx, id, r.read_u32()?)
        }

        EventType::ADD_NEW_DISCUSSION_THREAD_MESSAGE => {
            let message_id = r.read_id()?;
            let thread_id = r.read_id()?;
            repository.direct_add_new_discussion_thread_message(
                &ctx,
                message_id,
                thread_id,
                r.read_lp_str()?,
            )
        }
        EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_CONTENT => {
            let id = r.read_id()?;
            let content = r.read_lp_str()?;
            let reason = r.read_lp_str()?;
            repository.direct_change_discussion_thread_message_content(&ctx, id, content, reason)
        }
        EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_APPROVAL => {
            let id = r.read_id()?;
            repository.direct_change_discussion_thread_message_approval(&ctx, id, r.read_u8()? != 0)
        }
        EventType::MOVE_DISCUSSION_THREAD_MESSAGE => {
            let id = r.read_id()?;
            repository.direct_move_discussion_thread_message(&ctx, id, r.read_id()?)
        }
        EventType::DELETE_DISCUSSION_THREAD_MESSAGE => {
            repository.direct_delete_discussion_thread_message(&ctx, r.read_id()?)
        }
        EventType::DISCUSSION_THREAD_MESSAGE_UP_VOTE => {
            repository.direct_discussion_thread_message_up_vote(&ctx, r.read_id()?)
        }
        EventType::DISCUSSION_THREAD_MESSAGE_DOWN_VOTE => {
            repository.direct_discussion_thread_message_down_vote(&ctx, r.read_id()?)
        }
        EventType::DISCUSSION_THREAD_MESSAGE_RESET_VOTE => {
            repository.direct_discussion_thread_message_reset_vote(&ctx, r.read_id()?)
        }
        EventType::QUOTE_USER_IN_DISCUSSION_THREAD_MESSAGE => {
            let message_id = r.read_id()?;
            repository.direct_quote_user_in_discussion_thread_message(
                &ctx,
                message_id,
                r.read_id()?,
            )
        }

        EventType::ADD_COMMENT_TO_DISCUSSION_THREAD_MESSAGE => {
            let comment_id = r.read_id()?;
            let message_id = r.read_id()?;
            repository.direct_add_comment_to_discussion_thread_message(
                &ctx,
                comment_id,
                message_id,
                r.read_lp_str()?,
            )
        }
        EventType::SOLVE_DISCUSSION_THREAD_MESSAGE_COMMENT => {
            repository.direct_solve_discussion_thread_message_comment(&ctx, r.read_id()?)
        }

        EventType::ADD_NEW_DISCUSSION_TAG => {
            let id = r.read_id()?;
            repository.direct_add_new_discussion_tag(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_DISCUSSION_TAG_NAME => {
            let id = r.read_id()?;
            repository.direct_change_discussion_tag_name(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_DISCUSSION_TAG_UI_BLOB => {
            let id = r.read_id()?;
            repository.direct_change_discussion_tag_ui_blob(&ctx, id, r.read_lp_bytes()?)
        }
        EventType::DELETE_DISCUSSION_TAG => {
            repository.direct_delete_discussion_tag(&ctx, r.read_id()?)
        }
        EventType::ADD_DISCUSSION_TAG_TO_THREAD => {
            let tag_id = r.read_id()?;
            repository.direct_add_discussion_tag_to_thread(&ctx, tag_id, r.read_id()?)
        }
        EventType::REMOVE_DISCUSSION_TAG_FROM_THREAD => {
            let tag_id = r.read_id()?;
            repository.direct_remove_discussion_tag_from_thread(&ctx, tag_id, r.read_id()?)
        }
        EventType::MERGE_DISCUSSION_TAGS => {
            let from = r.read_id()?;
            repository.direct_merge_discussion_tags(&ctx, from, r.read_id()?)
        }

        EventType::ADD_NEW_DISCUSSION_CATEGORY => {
            let id = r.read_id()?;
            let name = r.read_lp_str()?;
            let parent = optional_id(r.read_id()?);
            repository.direct_add_new_discussion_category(&ctx, id, name, parent)
        }
        EventType::CHANGE_DISCUSSION_CATEGORY_NAME => {
            let id = r.read_id()?;
            repository.direct_change_discussion_category_name(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_DISCUSSION_CATEGORY_DESCRIPTION => {
            let id = r.read_id()?;
            repository.direct_change_discussion_category_description(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_DISCUSSION_CATEGORY_DISPLAY_ORDER => {
            let id = r.read_id()?;
            repository.direct_change_discussion_category_display_order(&ctx, id, r.read_u16()?)
        }
        EventType::CHANGE_DISCUSSION_CATEGORY_PARENT => {
            let id = r.read_id()?;
            let parent = optional_id(r.read_id()?);
            repository.direct_change_discussion_category_parent(&ctx, id, parent)
        }
        EventType::DELETE_DISCUSSION_CATEGORY => {
            repository.direct_delete_discussion_category(&ctx, r.read_id()?)
        }
        EventType::ADD_DISCUSSION_TAG_TO_CATEGORY => {
            let tag_id = r.read_id()?;
            repository.direct_add_discussion_tag_to_category(&ctx, tag_id, r.read_id()?)
        }
        EventType::REMOVE_DISCUSSION_TAG_FROM_CATEGORY => {
            let tag_id = r.read_id()?;
            repository.direct_remove_discussion_tag_from_category(&ctx, tag_id, r.read_id()?)
        }

        EventType::SEND_PRIVATE_MESSAGE => {
            let id = r.read_id()?;
            let destination = r.read_id()?;
            repository.direct_send_private_message(&ctx, id, destination, r.read_lp_str()?)
        }
        EventType::DELETE_PRIVATE_MESSAGE => {
            repository.direct_delete_private_message(&ctx, r.read_id()?)
        }

        EventType::CHANGE_USER_ATTACHMENT_QUOTA => {
            let id = r.read_id()?;
            repository.direct_change_user_attachment_quota(&ctx, id, r.read_u64()?)
        }
        EventType::ADD_NEW_ATTACHMENT => {
            let id = r.read_id()?;
            let size = r.read_u64()?;
            repository.direct_add_new_attachment(&ctx, id, r.read_lp_str()?, size)
        }
        EventType::CHANGE_ATTACHMENT_NAME => {
            let id = r.read_id()?;
            repository.direct_change_attachment_name(&ctx, id, r.read_lp_str()?)
        }
        EventType::CHANGE_ATTACHMENT_APPROVAL => {
            let id = r.read_id()?;
            repository.direct_change_attachment_approval(&ctx, id, r.read_u8()? != 0)
        }
        EventType::DELETE_ATTACHMENT => repository.direct_delete_attachment(&ctx, r.read_id()?),
        EventType::ADD_ATTACHMENT_TO_DISCUSSION_THREAD_MESSAGE => {
            let attachment_id = r.read_id()?;
            repository.direct_add_attachment_to_discussion_thread_message(
                &ctx,
                attachment_id,
                r.read_id()?,
            )
        }
        EventType::REMOVE_ATTACHMENT_FROM_DISCUSSION_THREAD_MESSAGE => {
            let attachment_id = r.read_id()?;
            repository.direct_remove_attachment_from_discussion_thread_message(
                &ctx,
                attachment_id,
                r.read_id()?,
            )
        }
        EventType::INCREMENT_ATTACHMENT_NUMBER_OF_GETS => {
            let id = r.read_id()?;
            repository.direct_increment_attachment_number_of_gets(&ctx, id, r.read_u32()?)
        }

        EventType::CHANGE_FORUM_WIDE_DEFAULT_PRIVILEGE_LEVEL => {
            let duration_kind = r.read_u16()?;
            let value = r.read_i16()?;
            let duration = r.read_i64()?;
            repository.direct_change_forum_wide_default_privilege_level(
                &ctx,
                duration_kind,
                value,
                duration,
            )
        }

        other => {
            if let Some((of, on)) = read_required_privilege_scope(other, r)? {
                let privilege = r.read_u16()?;
                let value = r.read_i16()?;
                repository.direct_change_required_privilege(&ctx, of, on, privilege, value)
            } else if let Some(target) = read_assign_target(other, r)? {
                let user_id = r.read_id()?;
                let value = r.read_i16()?;
                let duration = r.read_i64()?;
                repository.direct_assign_privilege(&ctx, target, user_id, value, duration)
            } else {
                return Err(DispatchError::Unsupported {
                    event_type: raw_type,
                    event_version,
                    context_version,
                });
            }
        }
    };
    Ok(status)
}

fn read_required_privilege_scope(
    event_type: EventType,
    r: &mut BlobReader<'_>,
) -> WireResult<Option<(PrivilegeKind, PrivilegeTarget)>> {
    use PrivilegeKind as K;
    use PrivilegeTarget as T;
    Ok(Some(match event_type {
        EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_THREAD_MESSAGE => {
            (K::ThreadMessage, T::ThreadMessage(r.read_id()?))
        }
        EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_THREAD => {
            (K::ThreadMessage, T::Thread(r.read_id()?))
        }
        EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FOR_TAG => {
            (K::ThreadMessage, T::Tag(r.read_id()?))
        }
        EventType::CHANGE_DISCUSSION_THREAD_MESSAGE_REQUIRED_PRIVILEGE_FORUM_WIDE => {
            (K::ThreadMessage, T::ForumWide)
        }
        EventType::CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FOR_THREAD => {
            (K::Thread, T::Thread(r.read_id()?))
        }
        EventType::CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FOR_TAG => {
            (K::Thread, T::Tag(r.read_id()?))
        }
        EventType::CHANGE_DISCUSSION_THREAD_REQUIRED_PRIVILEGE_FORUM_WIDE => {
            (K::Thread, T::ForumWide)
        }
        EventType::CHANGE_DISCUSSION_TAG_REQUIRED_PRIVILEGE_FOR_TAG => {
            (K::Tag, T::Tag(r.read_id()?))
        }
        EventType::CHANGE_DISCUSSION_TAG_REQUIRED_PRIVILEGE_FORUM_WIDE => (K::Tag, T::ForumWide),
        EventType::CHANGE_DISCUSSION_CATEGORY_REQUIRED_PRIVILEGE_FOR_CATEGORY => {
            (K::Category, T::Category(r.read_id()?))
        }
        EventType::CHANGE_DISCUSSION_CATEGORY_REQUIRED_PRIVILEGE_FORUM_WIDE => {
            (K::Category, T::ForumWide)
        }
        EventType::CHANGE_FORUM_WIDE_REQUIRED_PRIVILEGE => (K::ForumWide, T::ForumWide),
        _ => return Ok(None),
    }))
}

fn read_assign_target(
    event_type: EventType,
    r: &mut BlobReader<'_>,
) -> WireResult<Option<PrivilegeTarget>> {
    Ok(Some(match event_type {
        EventType::ASSIGN_DISCUSSION_THREAD_MESSAGE_PRIVILEGE => {
            PrivilegeTarget::ThreadMessage(r.read_id()?)
        }
        EventType::ASSIGN_DISCUSSION_THREAD_PRIVILEGE => PrivilegeTarget::Thread(r.read_id()?),
        EventType::ASSIGN_DISCUSSION_TAG_PRIVILEGE => PrivilegeTarget::Tag(r.read_id()?),
        EventType::ASSIGN_DISCUSSION_CATEGORY_PRIVILEGE => PrivilegeTarget::Category(r.read_id()?),
        EventType::ASSIGN_FORUM_WIDE_PRIVILEGE => PrivilegeTarget::ForumWide,
        _ => return Ok(None),
    }))
}
