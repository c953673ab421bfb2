use agora_core::Timestamp;
use agora_core::id::ForumId;

use super::*;
use crate::entities::MessageContent;

fn ts(secs: i64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn add_user(store: &mut EntityStore, name: &str, at: i64) -> UserHandle {
    let handle = store.create_user(
        ForumId::generate(),
        CollatedString::from(name),
        format!("auth-{name}"),
        ts(at),
    );
    store.insert_user(handle);
    handle
}

fn add_thread(store: &mut EntityStore, name: &str, by: UserHandle, at: i64) -> ThreadHandle {
    let handle = store.create_thread(ForumId::generate(), CollatedString::from(name), by, ts(at));
    store.insert_thread(handle);
    handle
}

fn add_message(
    store: &mut EntityStore,
    thread: ThreadHandle,
    by: UserHandle,
    at: i64,
) -> MessageHandle {
    let handle = store.create_message(
        ForumId::generate(),
        thread,
        by,
        MessageContent::Owned(format!("message at {at}")),
        ts(at),
    );
    store.insert_message(handle);
    handle
}

fn add_tag(store: &mut EntityStore, name: &str) -> TagHandle {
    let handle = store.create_tag(ForumId::generate(), CollatedString::from(name), ts(1));
    store.insert_tag(handle);
    handle
}

fn add_category(
    store: &mut EntityStore,
    name: &str,
    parent: Option<CategoryHandle>,
) -> CategoryHandle {
    let handle =
        store.create_category(ForumId::generate(), CollatedString::from(name), parent, ts(1));
    store.insert_category(handle);
    handle
}

#[test_log::test]
fn counters_track_set_sizes() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 10);
    let thread = add_thread(&mut store, "hello", alice, 20);
    add_message(&mut store, thread, alice, 30);
    add_message(&mut store, thread, alice, 40);

    let thread_entity = store.thread(thread).expect("live");
    assert_eq!(thread_entity.message_count(), 2);
    assert_eq!(thread_entity.messages().count(), 2);
    assert_eq!(thread_entity.latest_message_created(), ts(40));

    let user = store.user(alice).expect("live");
    assert_eq!(user.thread_count(), 1);
    assert_eq!(user.message_count(), 2);
}

#[test_log::test]
fn name_change_moves_every_affected_ordering() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 10);
    let tag = add_tag(&mut store, "news");

    let aardvark = add_thread(&mut store, "aardvark", alice, 20);
    let zebra = add_thread(&mut store, "zebra", alice, 21);
    store.add_tag_to_thread(tag, aardvark);
    store.add_tag_to_thread(tag, zebra);

    let names = |store: &EntityStore| -> Vec<String> {
        store
            .thread_collection()
            .iter_by_name()
            .map(|h| store.thread(h).expect("live").name().as_str().to_owned())
            .collect()
    };
    assert_eq!(names(&store), ["aardvark", "zebra"]);

    store.change_thread_name(aardvark, CollatedString::from("zzz last"));
    assert_eq!(names(&store), ["zebra", "zzz last"]);

    // The rename also repositioned the thread in the creator's and the
    // tag's name-ordered sets.
    let user_threads: Vec<ThreadHandle> = store.user(alice).expect("live").threads().collect();
    assert_eq!(user_threads, [zebra, aardvark]);
    let tag_threads: Vec<ThreadHandle> = store.tag(tag).expect("live").threads().collect();
    assert_eq!(tag_threads, [zebra, aardvark]);
}

#[test_log::test]
fn merge_threads_moves_messages_and_subscribers() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let bob = add_user(&mut store, "bob", 2);

    let t1 = add_thread(&mut store, "first", alice, 10);
    let t2 = add_thread(&mut store, "second", alice, 11);
    let m1 = add_message(&mut store, t1, alice, 20);
    let m2 = add_message(&mut store, t1, bob, 21);
    let m3 = add_message(&mut store, t2, bob, 22);

    store.subscribe_to_thread(bob, t1);
    store.subscribe_to_thread(alice, t2);

    let t1_id = store.thread(t1).expect("live").id();
    store.merge_threads(t1, t2, ts(30));

    assert!(store.thread_by_id(t1_id).is_none());
    let merged = store.thread(t2).expect("live");
    assert_eq!(merged.message_count(), 3);
    let mut messages: Vec<MessageHandle> = merged.messages().collect();
    messages.sort();
    let mut expected = vec![m1, m2, m3];
    expected.sort();
    assert_eq!(messages, expected);
    for handle in [m1, m2, m3] {
        assert_eq!(store.message(handle).expect("live").parent_thread(), t2);
    }

    let subscribers: Vec<UserHandle> = merged.subscribers().collect();
    assert_eq!(subscribers, [alice, bob]);

    // Authors keep their counters; only thread ownership of `from` is gone
    assert_eq!(store.user(alice).expect("live").message_count(), 1);
    assert_eq!(store.user(bob).expect("live").message_count(), 2);
    assert_eq!(store.user(alice).expect("live").thread_count(), 1);
}

#[test_log::test]
fn merge_threads_keeps_tag_counters_exact() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let tag = add_tag(&mut store, "news");

    let t1 = add_thread(&mut store, "first", alice, 10);
    let t2 = add_thread(&mut store, "second", alice, 11);
    add_message(&mut store, t1, alice, 20);
    add_message(&mut store, t1, alice, 21);
    add_message(&mut store, t2, alice, 22);
    store.add_tag_to_thread(tag, t1);

    store.merge_threads(t1, t2, ts(30));

    let tag_entity = store.tag(tag).expect("live");
    assert_eq!(tag_entity.thread_count(), 1);
    // All three messages now live in t2, which carries the tag
    assert_eq!(tag_entity.message_count(), 3);
    let threads: Vec<ThreadHandle> = tag_entity.threads().collect();
    assert_eq!(threads, [t2]);
}

#[test_log::test]
fn delete_user_cascades_everywhere() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let bob = add_user(&mut store, "bob", 2);
    let alice_id = store.user(alice).expect("live").id();

    // Alice owns a thread with her own and bob's messages
    let alice_thread = add_thread(&mut store, "alice thread", alice, 10);
    add_message(&mut store, alice_thread, alice, 20);
    let bob_msg_in_alice_thread = add_message(&mut store, alice_thread, bob, 21);

    // Bob owns a thread alice participated in
    let bob_thread = add_thread(&mut store, "bob thread", bob, 11);
    let alice_msg = add_message(&mut store, bob_thread, alice, 22);
    let bob_msg = add_message(&mut store, bob_thread, bob, 23);

    store.subscribe_to_thread(alice, bob_thread);
    store.vote_message(bob_msg, alice, ts(30), true);
    let comment = store.create_comment(
        ForumId::generate(),
        bob_msg,
        alice,
        "a comment".into(),
        ts(31),
    );
    store.insert_comment(comment);

    store.delete_user(alice);

    assert!(store.user_by_id(alice_id).is_none());
    // Her thread is gone together with bob's message inside it
    assert!(store.thread(alice_thread).is_none());
    assert!(store.message(bob_msg_in_alice_thread).is_none());
    // Her message in bob's thread is gone, bob's remains
    assert!(store.message(alice_msg).is_none());
    let bob_thread_entity = store.thread(bob_thread).expect("live");
    assert_eq!(bob_thread_entity.message_count(), 1);
    assert_eq!(bob_thread_entity.subscribers().count(), 0);
    // Her vote and comment are retracted
    let bob_message = store.message(bob_msg).expect("live");
    assert_eq!(bob_message.up_vote_count(), 0);
    assert_eq!(bob_message.comments().count(), 0);
    // Bob lost the message that lived in alice's thread
    assert_eq!(store.user(bob).expect("live").message_count(), 1);
}

#[test_log::test]
fn delete_thread_decrements_tag_and_category_counters() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let tag = add_tag(&mut store, "news");
    let category = add_category(&mut store, "general", None);
    store.add_tag_to_category(tag, category);

    let thread = add_thread(&mut store, "hello", alice, 10);
    store.add_tag_to_thread(tag, thread);
    add_message(&mut store, thread, alice, 20);
    add_message(&mut store, thread, alice, 21);

    assert_eq!(store.tag(tag).expect("live").message_count(), 2);
    assert_eq!(store.category(category).expect("live").message_count(), 2);

    store.delete_thread(thread);

    let tag_entity = store.tag(tag).expect("live");
    assert_eq!(tag_entity.thread_count(), 0);
    assert_eq!(tag_entity.message_count(), 0);
    let category_entity = store.category(category).expect("live");
    assert_eq!(category_entity.thread_count(), 0);
    assert_eq!(category_entity.message_count(), 0);
}

#[test_log::test]
fn tag_category_transitive_membership() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let news = add_tag(&mut store, "news");
    let tech = add_tag(&mut store, "tech");
    let category = add_category(&mut store, "front page", None);

    let thread = add_thread(&mut store, "hello", alice, 10);
    add_message(&mut store, thread, alice, 20);
    store.add_tag_to_thread(news, thread);
    store.add_tag_to_thread(tech, thread);

    store.add_tag_to_category(news, category);
    store.add_tag_to_category(tech, category);
    let category_entity = store.category(category).expect("live");
    // One thread reachable through two tags is counted once
    assert_eq!(category_entity.thread_count(), 1);
    assert_eq!(category_entity.message_count(), 1);

    // Removing one tag keeps the thread reachable through the other
    store.remove_tag_from_thread(news, thread);
    assert_eq!(store.category(category).expect("live").thread_count(), 1);

    store.remove_tag_from_thread(tech, thread);
    let category_entity = store.category(category).expect("live");
    assert_eq!(category_entity.thread_count(), 0);
    assert_eq!(category_entity.message_count(), 0);
}

#[test_log::test]
fn merge_tags_retags_threads() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let from = add_tag(&mut store, "old");
    let into = add_tag(&mut store, "new");

    let t1 = add_thread(&mut store, "first", alice, 10);
    let t2 = add_thread(&mut store, "second", alice, 11);
    add_message(&mut store, t1, alice, 20);
    store.add_tag_to_thread(from, t1);
    store.add_tag_to_thread(from, t2);
    store.add_tag_to_thread(into, t2);
    let from_id = store.tag(from).expect("live").id();

    store.merge_tags(from, into);

    assert!(store.tag_by_id(from_id).is_none());
    let into_entity = store.tag(into).expect("live");
    assert_eq!(into_entity.thread_count(), 2);
    assert_eq!(into_entity.message_count(), 1);
    assert!(store.thread(t1).expect("live").tags().eq([into]));
    assert!(store.thread(t2).expect("live").tags().eq([into]));
}

#[test_log::test]
fn category_cycle_detection() {
    let mut store = EntityStore::new();
    let root = add_category(&mut store, "root", None);
    let child = add_category(&mut store, "child", Some(root));
    let grandchild = add_category(&mut store, "grandchild", Some(child));

    assert!(store.category_parent_would_cycle(root, root));
    assert!(store.category_parent_would_cycle(root, child));
    assert!(store.category_parent_would_cycle(root, grandchild));
    assert!(store.category_parent_would_cycle(child, grandchild));
    assert!(!store.category_parent_would_cycle(grandchild, root));

    // A legal reparent updates both children sets
    store.change_category_parent(grandchild, Some(root));
    assert!(store.category(root).expect("live").children().eq([child, grandchild]));
    assert_eq!(store.category(child).expect("live").children().count(), 0);
}

#[test_log::test]
fn delete_category_reparents_children() {
    let mut store = EntityStore::new();
    let root = add_category(&mut store, "root", None);
    let middle = add_category(&mut store, "middle", Some(root));
    let leaf = add_category(&mut store, "leaf", Some(middle));

    store.delete_category(middle);

    assert_eq!(store.category(leaf).expect("live").parent(), Some(root));
    assert!(store.category(root).expect("live").children().eq([leaf]));
}

#[test_log::test]
fn lower_bound_rank_is_the_paging_primitive() {
    let mut store = EntityStore::new();
    for name in ["delta", "alpha", "charlie", "bravo"] {
        add_user(&mut store, name, 1);
    }
    let rank = |store: &EntityStore, name: &str| {
        store
            .user_collection()
            .lower_bound_rank(&crate::sort_key::SortKey::of(name))
    };
    assert_eq!(rank(&store, "alpha"), 0);
    assert_eq!(rank(&store, "bravo"), 1);
    assert_eq!(rank(&store, "Charlie"), 2);
    assert_eq!(rank(&store, "zulu"), 4);
}

#[test_log::test]
fn votes_and_reset() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let bob = add_user(&mut store, "bob", 2);
    let thread = add_thread(&mut store, "hello", alice, 10);
    let message = add_message(&mut store, thread, alice, 20);

    assert!(store.vote_message(message, bob, ts(30), true));
    // Voting twice has no effect
    assert!(!store.vote_message(message, bob, ts(31), false));
    assert_eq!(store.message(message).expect("live").up_vote_count(), 1);

    let alice_entity = store.user(alice).expect("live");
    let votes: Vec<_> = alice_entity.received_votes().collect();
    assert_eq!(votes.len(), 1);
    assert!(votes[0].up);

    assert_eq!(store.reset_vote(message, bob), Some(ts(30)));
    assert_eq!(store.message(message).expect("live").up_vote_count(), 0);
    assert_eq!(store.reset_vote(message, bob), None);
}

#[test_log::test]
fn solved_comments_one_way() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let thread = add_thread(&mut store, "hello", alice, 10);
    let message = add_message(&mut store, thread, alice, 20);
    let comment = store.create_comment(
        ForumId::generate(),
        message,
        alice,
        "needs a fix".into(),
        ts(30),
    );
    store.insert_comment(comment);

    assert!(store.solve_comment(comment));
    assert!(!store.solve_comment(comment));
    assert_eq!(store.message(message).expect("live").solved_comment_count(), 1);
    assert!(store.comment(comment).expect("live").solved());
}

#[test_log::test]
fn private_messages_fill_boxes() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let bob = add_user(&mut store, "bob", 2);

    let pm = store.create_private_message(ForumId::generate(), alice, bob, "hi".into(), ts(10));
    store.insert_private_message(pm);

    assert!(store.user(alice).expect("live").pm_outbox().eq([pm]));
    assert!(store.user(bob).expect("live").pm_inbox().eq([pm]));
    assert_eq!(store.user(bob).expect("live").unread_private_messages(), 1);

    store.delete_private_message(pm);
    assert_eq!(store.user(bob).expect("live").pm_inbox().count(), 0);
    assert_eq!(store.user(bob).expect("live").unread_private_messages(), 0);
    assert_eq!(store.private_messages.len(), 0);
}

#[test_log::test]
fn batch_insert_rebuild_restores_invariants() {
    let mut store = EntityStore::new();
    store.start_batch_insert();

    let alice = add_user(&mut store, "alice", 1);
    let tag = add_tag(&mut store, "news");
    let thread = add_thread(&mut store, "hello", alice, 10);
    store.add_tag_to_thread(tag, thread);
    add_message(&mut store, thread, alice, 20);
    add_message(&mut store, thread, alice, 21);

    // Secondary orderings are not maintained during the batch
    assert_eq!(store.user_collection().iter_by_name().count(), 0);

    store.stop_batch_insert();

    assert_eq!(store.user_collection().iter_by_name().count(), 1);
    assert!(store.thread_collection().iter_by_name().eq([thread]));
    assert_eq!(store.message_collection().iter_by_created_desc().count(), 2);
    assert_eq!(store.thread(thread).expect("live").message_count(), 2);
    assert_eq!(store.thread(thread).expect("live").latest_message_created(), ts(21));
    assert_eq!(store.user(alice).expect("live").message_count(), 2);
    assert_eq!(store.tag(tag).expect("live").message_count(), 2);
    // Count-keyed orderings see the recomputed values
    assert!(store.thread_collection().iter_by_message_count_desc().eq([thread]));
}

#[test_log::test]
fn move_message_shifts_all_counters() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let tag1 = add_tag(&mut store, "one");
    let tag2 = add_tag(&mut store, "two");
    let t1 = add_thread(&mut store, "first", alice, 10);
    let t2 = add_thread(&mut store, "second", alice, 11);
    store.add_tag_to_thread(tag1, t1);
    store.add_tag_to_thread(tag2, t2);
    let message = add_message(&mut store, t1, alice, 20);

    store.move_message(message, t2, ts(30));

    assert_eq!(store.message(message).expect("live").parent_thread(), t2);
    assert_eq!(store.thread(t1).expect("live").message_count(), 0);
    assert_eq!(store.thread(t1).expect("live").latest_message_created(), ts(0));
    assert_eq!(store.thread(t2).expect("live").message_count(), 1);
    assert_eq!(store.tag(tag1).expect("live").message_count(), 0);
    assert_eq!(store.tag(tag2).expect("live").message_count(), 1);
}

#[test_log::test]
fn mapped_message_content_resolves_through_the_shared_region() {
    use std::io::Write as _;

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("messages.bin");
    let mut file = std::fs::File::create(&path).expect("creates");
    file.write_all(b"prefix-historical message body-suffix")
        .expect("writes");
    drop(file);

    let mut store = EntityStore::new();
    let file = std::fs::File::open(&path).expect("opens");
    let map = unsafe { memmap2::Mmap::map(&file) }.expect("maps");
    store.attach_message_content_map(map);

    let alice = add_user(&mut store, "alice", 1);
    let thread = add_thread(&mut store, "hello", alice, 10);
    let handle = store.create_message(
        ForumId::generate(),
        thread,
        alice,
        MessageContent::Mapped {
            offset: 7,
            len: 23,
        },
        ts(20),
    );
    store.insert_message(handle);

    let message = store.message(handle).expect("live");
    assert_eq!(
        store.message_content_str(message),
        Some("historical message body")
    );

    // Out-of-range spans resolve to nothing rather than panicking
    let bad = store.create_message(
        ForumId::generate(),
        thread,
        alice,
        MessageContent::Mapped {
            offset: 1_000_000,
            len: 10,
        },
        ts(21),
    );
    store.insert_message(bad);
    assert_eq!(store.message_content_str(store.message(bad).expect("live")), None);
}

mod properties {
    use proptest::prelude::*;

    use super::*;

    #[derive(Clone, Debug)]
    enum Op {
        AddUser(String),
        AddThread(String, usize),
        AddMessage(usize, usize),
        DeleteUser(usize),
        DeleteThread(usize),
        RenameThread(usize, String),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            "[a-z]{3,8}".prop_map(Op::AddUser),
            ("[a-z ]{3,12}", any::<usize>()).prop_map(|(n, u)| Op::AddThread(n, u)),
            (any::<usize>(), any::<usize>()).prop_map(|(t, u)| Op::AddMessage(t, u)),
            any::<usize>().prop_map(Op::DeleteUser),
            any::<usize>().prop_map(Op::DeleteThread),
            (any::<usize>(), "[a-z ]{3,12}").prop_map(|(t, n)| Op::RenameThread(t, n)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Every ordering holds exactly one entry per live handle, no
        /// matter what sequence of operations ran.
        #[test]
        fn indexes_stay_coherent(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let mut store = EntityStore::new();
            let mut users: Vec<UserHandle> = Vec::new();
            let mut threads: Vec<ThreadHandle> = Vec::new();
            let mut at = 0i64;

            for op in ops {
                at += 1;
                match op {
                    Op::AddUser(name) => {
                        let unique = format!("{name}-{at}");
                        users.push(add_user(&mut store, &unique, at));
                    }
                    Op::AddThread(name, user) => {
                        if users.is_empty() {
                            continue;
                        }
                        let by = users[user % users.len()];
                        let unique = format!("{name}-{at}");
                        threads.push(add_thread(&mut store, &unique, by, at));
                    }
                    Op::AddMessage(thread, user) => {
                        if users.is_empty() || threads.is_empty() {
                            continue;
                        }
                        let thread = threads[thread % threads.len()];
                        let by = users[user % users.len()];
                        add_message(&mut store, thread, by, at);
                    }
                    Op::DeleteUser(user) => {
                        if users.is_empty() {
                            continue;
                        }
                        let handle = users.swap_remove(user % users.len());
                        store.delete_user(handle);
                        threads.retain(|t| store.thread(*t).is_some());
                    }
                    Op::DeleteThread(thread) => {
                        if threads.is_empty() {
                            continue;
                        }
                        let handle = threads.swap_remove(thread % threads.len());
                        store.delete_thread(handle);
                    }
                    Op::RenameThread(thread, name) => {
                        if threads.is_empty() {
                            continue;
                        }
                        let handle = threads[thread % threads.len()];
                        let unique = format!("{name}-{at}");
                        store.change_thread_name(handle, CollatedString::new(unique));
                    }
                }

                prop_assert_eq!(store.user_collection().len(), store.users.len());
                prop_assert_eq!(store.user_collection().iter_by_name().count(), store.users.len());
                prop_assert_eq!(store.user_collection().iter_by_created().count(), store.users.len());
                prop_assert_eq!(store.thread_collection().len(), store.threads.len());
                prop_assert_eq!(
                    store.thread_collection().iter_by_name().count(),
                    store.threads.len()
                );
                prop_assert_eq!(
                    store.thread_collection().iter_by_message_count_desc().count(),
                    store.threads.len()
                );
                prop_assert_eq!(
                    store.message_collection().iter_by_created_desc().count(),
                    store.messages.len()
                );

                // Counters always equal the sizes of their sets
                for (_, user) in store.users.iter() {
                    prop_assert_eq!(user.thread_count() as usize, user.threads().count());
                    prop_assert_eq!(user.message_count() as usize, user.messages().count());
                }
                for (_, thread) in store.threads.iter() {
                    prop_assert_eq!(thread.message_count() as usize, thread.messages().count());
                }
            }
        }
    }
}

#[test_log::test]
fn index_sizes_match_live_handles() {
    let mut store = EntityStore::new();
    let alice = add_user(&mut store, "alice", 1);
    let bob = add_user(&mut store, "bob", 2);
    let thread = add_thread(&mut store, "hello", alice, 10);
    add_message(&mut store, thread, bob, 20);

    assert_eq!(store.user_collection().len(), store.users.len());
    assert_eq!(store.user_collection().iter_by_created().count(), 2);

    store.delete_user(bob);
    assert_eq!(store.user_collection().len(), store.users.len());
    assert_eq!(store.user_collection().iter_by_created().count(), 1);
    assert_eq!(
        store.user_collection().iter_by_message_count_desc().count(),
        1
    );
}
