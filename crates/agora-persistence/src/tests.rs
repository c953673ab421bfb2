use std::path::Path;
use std::sync::Arc;

use agora_core::frame::{FRAME_PREFIX_SIZE, MAGIC_PREFIX, crc32, padding_required};
use agora_core::id::ForumId;
use agora_core::{IpAddress, Timestamp};
use agora_data::authorization::AllowAll;
use agora_data::entities::privileges::PrivilegeTarget;
use agora_data::repository::direct::DirectWriteRepository as _;
use agora_data::repository::thread::RetrieveThreadsBy;
use agora_data::{MemoryRepository, RequestContext, StatusCode};
use tempfile::TempDir;
use tracing::info;

use crate::Persistence;
use crate::pipeline::EventPipeline;
use crate::replay::{EventReplayer, ReplayError};

fn temp_persistence(capacity: usize) -> (TempDir, MemoryRepository, Persistence) {
    let dir = tempfile::tempdir().expect("temp dir");
    let persistence =
        Persistence::start(dir.path(), 3600 * 24, capacity).expect("valid output folder");
    let mut repo = MemoryRepository::new(Arc::new(AllowAll));
    persistence.attach(&mut repo);
    (dir, repo, persistence)
}

fn ctx(performed_by: ForumId, secs: i64) -> RequestContext {
    RequestContext {
        performed_by,
        ip: "1.2.3.4".parse().expect("valid address"),
        timestamp: Timestamp::from_secs(secs),
    }
}

/// All frame payloads under `dir`, files in suffix order, frames in file
/// order. Validates framing on the way.
fn read_frames(dir: &Path) -> Vec<Vec<u8>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .expect("reads dir")
        .map(|entry| entry.expect("reads entry").path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut payloads = Vec::new();
    for file in files {
        let bytes = std::fs::read(&file).expect("reads file");
        assert_eq!(bytes.len() % 8, 0, "files end 8-byte-aligned");
        let mut offset = 0;
        while offset < bytes.len() {
            assert_eq!(
                &bytes[offset..offset + 8],
                &MAGIC_PREFIX.to_le_bytes(),
                "magic prefix at offset {offset}"
            );
            let size = u32::from_le_bytes(bytes[offset + 8..offset + 12].try_into().unwrap())
                as usize;
            let stored_crc =
                u32::from_le_bytes(bytes[offset + 12..offset + 16].try_into().unwrap());
            let payload = &bytes[offset + FRAME_PREFIX_SIZE..offset + FRAME_PREFIX_SIZE + size];
            assert_eq!(stored_crc, crc32(payload), "crc at offset {offset}");
            let padding = padding_required(size);
            let padding_bytes = &bytes[offset + FRAME_PREFIX_SIZE + size
                ..offset + FRAME_PREFIX_SIZE + size + padding];
            assert!(padding_bytes.iter().all(|b| *b == 0), "zero padding");
            payloads.push(payload.to_vec());
            offset += FRAME_PREFIX_SIZE + size + padding;
        }
    }
    payloads
}

fn event_type_of(payload: &[u8]) -> u32 {
    u32::from_le_bytes(payload[..4].try_into().unwrap())
}

#[test_log::test]
fn add_user_frame_has_the_documented_layout() {
    let (dir, repo, persistence) = temp_persistence(EventPipeline::DEFAULT_CAPACITY);

    let added = repo
        .add_new_user(&ctx(ForumId::ZERO, 1000), "alice", "a1")
        .expect("adds");
    persistence.shutdown();

    let frames = read_frames(dir.path());
    // The first user also triggers the logged bootstrap assignment
    assert_eq!(frames.len(), 2);
    let payload = &frames[0];

    // Header: type 1, event version 1, context version 1
    assert_eq!(event_type_of(payload), 1);
    assert_eq!(&payload[4..6], &1u16.to_le_bytes());
    assert_eq!(&payload[6..8], &1u16.to_le_bytes());
    // Context: timestamp, performing user (anonymous), ip
    assert_eq!(&payload[8..16], &1000i64.to_le_bytes());
    assert_eq!(&payload[16..32], ForumId::ZERO.as_slice());
    let ip: IpAddress = "1.2.3.4".parse().expect("valid address");
    assert_eq!(&payload[32..49], &ip.to_bytes());
    // Event data: id ∥ lp(auth) ∥ lp(name)
    assert_eq!(&payload[49..65], added.id.as_slice());
    assert_eq!(&payload[65..69], &2u32.to_le_bytes());
    assert_eq!(&payload[69..71], b"a1");
    assert_eq!(&payload[71..75], &5u32.to_le_bytes());
    assert_eq!(&payload[75..80], b"alice");
    assert_eq!(payload.len(), 80);

    assert_eq!(event_type_of(&frames[1]), 57, "bootstrap assignment");
}

#[test_log::test]
fn failed_operations_emit_no_events() {
    let (dir, repo, persistence) = temp_persistence(EventPipeline::DEFAULT_CAPACITY);

    repo.add_new_user(&ctx(ForumId::ZERO, 1000), "alice", "a1")
        .expect("adds");
    assert_eq!(
        repo.add_new_user(&ctx(ForumId::ZERO, 1001), "Alice", "a2"),
        Err(StatusCode::AlreadyExists)
    );
    persistence.shutdown();

    let frames = read_frames(dir.path());
    assert_eq!(frames.len(), 2, "add + bootstrap assignment only");
}

#[test_log::test]
fn round_trip_replay_restores_state() {
    let (dir, repo, persistence) = temp_persistence(EventPipeline::DEFAULT_CAPACITY);

    let alice = repo
        .add_new_user(&ctx(ForumId::ZERO, 100), "alice", "a1")
        .expect("adds");
    let bob = repo
        .add_new_user(&ctx(ForumId::ZERO, 101), "bob", "b1")
        .expect("adds");

    let t1 = repo
        .add_new_discussion_thread(&ctx(alice.id, 110), "hello world")
        .expect("adds");
    let t2 = repo
        .add_new_discussion_thread(&ctx(alice.id, 111), "second topic")
        .expect("adds");
    let m1 = repo
        .add_new_discussion_thread_message(&ctx(alice.id, 120), t1.id, "first message content")
        .expect("adds");
    let m2 = repo
        .add_new_discussion_thread_message(&ctx(bob.id, 121), t1.id, "second message content")
        .expect("adds");
    let m3 = repo
        .add_new_discussion_thread_message(&ctx(bob.id, 122), t2.id, "third message content")
        .expect("adds");

    repo.change_user_info(&ctx(alice.id, 125), alice.id, "about alice")
        .expect("changes");
    repo.change_discussion_thread_message_content(
        &ctx(bob.id, 130),
        m2.id,
        "edited message content",
        "typo fix",
    )
    .expect("changes");

    let tag = repo
        .add_new_discussion_tag(&ctx(alice.id, 140), "news")
        .expect("adds");
    repo.add_discussion_tag_to_thread(&ctx(alice.id, 141), tag.id, t1.id)
        .expect("links");
    let category = repo
        .add_new_discussion_category(&ctx(alice.id, 142), "front page", None)
        .expect("adds");
    repo.add_discussion_tag_to_category(&ctx(alice.id, 143), tag.id, category.id)
        .expect("links");

    repo.up_vote_discussion_thread_message(&ctx(bob.id, 150), m1.id)
        .expect("votes");
    let comment = repo
        .add_comment_to_discussion_thread_message(&ctx(bob.id, 151), m1.id, "nice observation")
        .expect("adds");
    repo.solve_discussion_thread_message_comment(&ctx(alice.id, 152), comment.id)
        .expect("solves");
    repo.subscribe_to_discussion_thread(&ctx(bob.id, 153), t1.id)
        .expect("subscribes");

    repo.send_private_message(&ctx(alice.id, 160), bob.id, "hello bob, in private")
        .expect("sends");
    let attachment = repo
        .add_new_attachment(&ctx(bob.id, 161), "diagram.png", 2048)
        .expect("adds");
    repo.add_attachment_to_discussion_thread_message(&ctx(bob.id, 162), attachment.id, m2.id)
        .expect("links");
    repo.assign_privilege(
        &ctx(alice.id, 163),
        PrivilegeTarget::Thread(t1.id),
        bob.id,
        5,
        0,
    )
    .expect("assigns");

    // Visits coalesce until shutdown
    for at in 0..3 {
        repo.get_discussion_thread_by_id(&ctx(ForumId::ZERO, 170 + at), t1.id)
            .expect("reads");
    }

    repo.merge_discussion_threads(&ctx(alice.id, 180), t2.id, t1.id)
        .expect("merges");
    repo.delete_discussion_thread_message(&ctx(alice.id, 181), m3.id)
        .expect("deletes");

    persistence.shutdown();
    info!(frames = read_frames(dir.path()).len(), "Events written");

    // Replay into a fresh repository
    let replayed = MemoryRepository::new(Arc::new(AllowAll));
    let replayer = EventReplayer::new(dir.path(), true);
    let stats = replayer.replay(&replayed).expect("replays");
    assert!(stats.frames > 0);
    assert_eq!(stats.ineffective, 0);

    let qctx = ctx(ForumId::ZERO, 1000);

    // Entity counts line up
    let (original_counts, original_privileges) =
        repo.store().read(|s| (s.counts(), s.granted_privileges().len()));
    let (replayed_counts, replayed_privileges) = replayed
        .store()
        .read(|s| (s.counts(), s.granted_privileges().len()));
    assert_eq!(replayed_counts, original_counts);
    assert_eq!(replayed_privileges, original_privileges);

    // Users keep ids, attributes and counters
    let alice_details = replayed.get_user_by_id(&qctx, alice.id).expect("reads");
    assert_eq!(alice_details.summary.name, "alice");
    assert_eq!(alice_details.summary.created, Timestamp::from_secs(100));
    assert_eq!(alice_details.info, "about alice");
    let bob_details = replayed.get_user_by_id(&qctx, bob.id).expect("reads");
    assert_eq!(bob_details.summary.message_count, 1);

    // The merged thread carries everything
    assert_eq!(
        replayed.get_discussion_thread_by_id(&qctx, t2.id),
        Err(StatusCode::NotFound)
    );
    let thread = replayed
        .get_discussion_thread_by_id(&qctx, t1.id)
        .expect("reads");
    assert_eq!(thread.name, "hello world");
    assert_eq!(thread.message_count, 2);
    assert_eq!(thread.subscriber_count, 1);
    assert_eq!(thread.visit_count, 3);

    let messages = replayed
        .get_discussion_thread_messages(&qctx, t1.id, 0)
        .expect("reads");
    assert_eq!(messages.len(), 2);
    let m1_replayed = messages.iter().find(|m| m.id == m1.id).expect("m1");
    assert_eq!(m1_replayed.content, "first message content");
    assert_eq!(m1_replayed.up_votes, 1);
    assert_eq!(m1_replayed.solved_comment_count, 1);
    assert_eq!(m1_replayed.comment_count, 1);
    let m2_replayed = messages.iter().find(|m| m.id == m2.id).expect("m2");
    assert_eq!(m2_replayed.content, "edited message content");
    assert_eq!(m2_replayed.last_updated_reason, "typo fix");
    assert_eq!(m2_replayed.created, Timestamp::from_secs(121));

    // Tag and category counters reflect the merge and deletion
    let category_summary = replayed
        .get_discussion_category_by_id(&qctx, category.id)
        .expect("reads");
    assert_eq!(category_summary.thread_count, 1);
    assert_eq!(category_summary.message_count, 2);

    // Private messages, attachments and grants survive
    let inbox = replayed
        .get_private_messages_received(&ctx(bob.id, 1000), 0)
        .expect("reads");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].content, "hello bob, in private");
    let attachment_summary = replayed
        .get_attachment_by_id(&qctx, attachment.id)
        .expect("reads");
    assert_eq!(attachment_summary.size, 2048);
    assert_eq!(attachment_summary.message_count, 1);
    replayed.store().read(|store| {
        assert!(
            store
                .granted_privileges()
                .get(bob.id, PrivilegeTarget::Thread(t1.id), Timestamp::from_secs(200))
                .is_some()
        );
        assert!(
            store
                .granted_privileges()
                .get(alice.id, PrivilegeTarget::ForumWide, Timestamp::from_secs(200))
                .is_some(),
            "bootstrap grant is replayed from its logged assignment"
        );
    });
}

#[test_log::test]
fn small_queue_preserves_count_and_order() {
    let (dir, repo, persistence) = temp_persistence(8);

    let alice = repo
        .add_new_user(&ctx(ForumId::ZERO, 100), "alice", "a1")
        .expect("adds");
    for i in 0..199 {
        repo.change_user_info(&ctx(alice.id, 101 + i), alice.id, &format!("info {i:04}"))
            .expect("changes");
    }
    persistence.shutdown();

    let frames = read_frames(dir.path());
    assert_eq!(frames.len(), 1 + 1 + 199);

    // CHANGE_USER_INFO frames arrive in mutation order
    let mut expected = 0;
    for payload in &frames {
        if event_type_of(payload) != 3 {
            continue;
        }
        let text = std::str::from_utf8(&payload[69..payload.len()]).expect("utf-8");
        assert_eq!(text, format!("info {expected:04}"));
        expected += 1;
    }
    assert_eq!(expected, 199);
}

#[test_log::test]
fn replay_is_strict_about_magic_and_checksum() {
    let (dir, repo, persistence) = temp_persistence(EventPipeline::DEFAULT_CAPACITY);
    repo.add_new_user(&ctx(ForumId::ZERO, 100), "alice", "a1")
        .expect("adds");
    persistence.shutdown();

    let file = std::fs::read_dir(dir.path())
        .expect("reads dir")
        .map(|e| e.expect("entry").path())
        .find(|p| p.is_file())
        .expect("one event file");
    let original = std::fs::read(&file).expect("reads");

    // Flip a payload byte (inside the auth string, so the lenient pass
    // below still dispatches): checksum validation must reject it
    let mut corrupted = original.clone();
    corrupted[86] ^= 0x01;
    std::fs::write(&file, &corrupted).expect("writes");
    let strict = EventReplayer::new(dir.path(), true);
    assert!(matches!(
        strict.replay(&MemoryRepository::new(Arc::new(AllowAll))),
        Err(ReplayError::ChecksumMismatch { .. })
    ));

    // Without checksum validation the same file replays
    let lenient = EventReplayer::new(dir.path(), false);
    assert!(lenient.replay(&MemoryRepository::new(Arc::new(AllowAll))).is_ok());

    // A broken magic prefix is fatal either way
    let mut corrupted = original;
    corrupted[0] = 0;
    std::fs::write(&file, &corrupted).expect("writes");
    assert!(matches!(
        lenient.replay(&MemoryRepository::new(Arc::new(AllowAll))),
        Err(ReplayError::InvalidMagic { .. })
    ));
}

#[test_log::test]
fn replay_orders_files_by_their_suffix() {
    let dir = tempfile::tempdir().expect("temp dir");

    // Two generations of events written out of filesystem order: the
    // rename only replays correctly after the add.
    let user_id = ForumId::generate();
    let write_file = |name: &str, payloads: &[Vec<u8>]| {
        let mut bytes = Vec::new();
        for payload in payloads {
            bytes.extend_from_slice(&MAGIC_PREFIX.to_le_bytes());
            bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&crc32(payload).to_le_bytes());
            bytes.extend_from_slice(payload);
            bytes.extend_from_slice(&vec![0u8; padding_required(payload.len())]);
        }
        std::fs::write(dir.path().join(name), bytes).expect("writes");
    };
    let encode = |event_type: u32, data: &dyn Fn(&mut agora_core::wire::BlobWriter)| {
        let mut w = agora_core::wire::BlobWriter::with_capacity(128);
        w.write_u32(event_type);
        w.write_u16(1);
        w.write_u16(1);
        w.write_i64(100);
        w.write_id(ForumId::ZERO);
        w.write_ip(IpAddress::ZERO);
        data(&mut w);
        w.into_vec()
    };

    // "forum-2000" sorts before "forum-900" lexicographically; only the
    // numeric sort replays the add before the rename.
    write_file(
        "forum-2000.events",
        &[encode(2, &|w| {
            w.write_id(user_id);
            w.write_lp_str("renamed");
        })],
    );
    write_file(
        "forum-900.events",
        &[encode(1, &|w| {
            w.write_id(user_id);
            w.write_lp_str("auth-x");
            w.write_lp_str("original");
        })],
    );
    // Files that do not match the name pattern are ignored
    std::fs::write(dir.path().join("notes.txt"), b"ignore me").expect("writes");

    let repo = MemoryRepository::new(Arc::new(AllowAll));
    let stats = EventReplayer::new(dir.path(), true)
        .replay(&repo)
        .expect("replays");
    assert_eq!(stats.files, 2);
    assert_eq!(stats.frames, 2);

    let details = repo
        .get_user_by_id(&ctx(ForumId::ZERO, 500), user_id)
        .expect("reads");
    assert_eq!(details.summary.name, "renamed");
}

#[test_log::test]
fn replay_runs_inside_batch_insert() {
    // Orderings must be rebuilt by the time replay returns
    let (dir, repo, persistence) = temp_persistence(EventPipeline::DEFAULT_CAPACITY);
    let alice = repo
        .add_new_user(&ctx(ForumId::ZERO, 100), "alice", "a1")
        .expect("adds");
    repo.add_new_discussion_thread(&ctx(alice.id, 110), "zebra")
        .expect("adds");
    repo.add_new_discussion_thread(&ctx(alice.id, 111), "aardvark")
        .expect("adds");
    persistence.shutdown();

    let replayed = MemoryRepository::new(Arc::new(AllowAll));
    EventReplayer::new(dir.path(), true)
        .replay(&replayed)
        .expect("replays");

    let names: Vec<String> = replayed
        .get_discussion_threads(&ctx(ForumId::ZERO, 500), RetrieveThreadsBy::Name, 0)
        .expect("reads")
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["aardvark", "zebra"]);
}

#[test_log::test]
fn direct_interface_is_idempotent_for_replayed_deletes() {
    use agora_core::event::EventContext;

    let repo = MemoryRepository::new(Arc::new(AllowAll));
    let ectx = EventContext {
        timestamp: Timestamp::from_secs(100),
        performed_by: ForumId::ZERO,
        ip: IpAddress::ZERO,
    };
    let missing = ForumId::generate();
    assert_eq!(
        repo.direct_delete_discussion_thread_message(&ectx, missing),
        StatusCode::NotFound
    );
    assert_eq!(
        repo.direct_delete_discussion_thread(&ectx, missing),
        StatusCode::NotFound
    );
    assert_eq!(repo.direct_delete_user(&ectx, missing), StatusCode::NotFound);
}
