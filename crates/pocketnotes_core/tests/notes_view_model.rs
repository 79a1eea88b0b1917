mod common;

use common::{fast_retry, note, slow_retry, wait_until, StoreOp, TestStore};
use pocketnotes_core::{NoteEdit, NoteRepository, NotesStatus, NotesViewModel, RetryPolicy};
use std::sync::Arc;
use tokio::runtime::Handle;

fn view_model(store: &Arc<TestStore>, policy: RetryPolicy) -> NotesViewModel<TestStore> {
    NotesViewModel::with_policy(
        NoteRepository::from_shared(Arc::clone(store)),
        Handle::current(),
        policy,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_goes_from_loading_to_empty_on_empty_store() {
    let store = Arc::new(TestStore::new());
    store.fetch_gate.close();
    let vm = view_model(&store, RetryPolicy::none());

    assert_eq!(vm.status(), NotesStatus::Loading);
    assert!(vm.is_loading());

    store.fetch_gate.release();
    vm.wait_idle().await;

    assert_eq!(vm.status(), NotesStatus::Empty);
    assert!(vm.notes().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_is_loading_until_load_completes_even_with_stored_notes() {
    let store = Arc::new(TestStore::with_notes(&[note(1, "a")]));
    store.fetch_gate.close();
    let vm = view_model(&store, RetryPolicy::none());

    assert_eq!(vm.status(), NotesStatus::Loading);

    store.fetch_gate.release();
    vm.wait_idle().await;

    assert_eq!(vm.status(), NotesStatus::NotEmpty);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initial_load_orders_newest_first() {
    let store = Arc::new(TestStore::with_notes(&[
        note(3, "c"),
        note(1, "a"),
        note(2, "b"),
    ]));
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;

    let ids = vm.notes().iter().map(|loaded| loaded.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn add_and_remove_update_memory_before_persistence_runs() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;

    store.delete_gate.close();
    let first = note(1, "A");
    vm.add_note(first.clone());
    assert_eq!(vm.notes(), vec![first.clone()]);
    assert_eq!(vm.status(), NotesStatus::NotEmpty);

    assert!(vm.remove_note(&first));
    assert!(vm.notes().is_empty());
    assert_eq!(vm.status(), NotesStatus::Empty);
    assert!(!store.journal().contains(&StoreOp::Delete(1)));

    wait_until(|| store.journal().contains(&StoreOp::Upsert(1))).await;
    store.delete_gate.release();
    vm.wait_idle().await;
    assert!(store.rows().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn add_note_always_goes_to_front() {
    let store = Arc::new(TestStore::with_notes(&[note(5, "e"), note(9, "i")]));
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;

    vm.add_note(note(1, "older id"));
    vm.add_note(note(100, "newer id"));

    let ids = vm.notes().iter().map(|loaded| loaded.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![100, 1, 9, 5]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remove_note_removes_at_most_one_equal_element() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;

    let duplicate = note(1, "same");
    vm.add_note(duplicate.clone());
    vm.add_note(duplicate.clone());

    assert!(vm.remove_note(&duplicate));
    assert_eq!(vm.notes(), vec![duplicate.clone()]);

    assert!(!vm.remove_note(&note(2, "absent")));
    assert!(!vm.remove_note(&note(1, "same id, other title")));
    assert_eq!(vm.notes(), vec![duplicate]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn edits_reach_storage_only_on_flush() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;

    vm.add_note(note(1, "draft"));
    vm.wait_idle().await;

    let edited = vm.edit_note(
        1,
        NoteEdit {
            title: Some("final".to_string()),
            body: Some("text".to_string()),
            important: Some(true),
        },
    );
    assert!(edited);
    assert!(!vm.edit_note(42, NoteEdit::default()));
    vm.wait_idle().await;
    assert_eq!(store.rows()[0].title, "draft");

    vm.flush();
    vm.wait_idle().await;

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "final");
    assert_eq!(rows[0].body, "text");
    assert!(rows[0].important);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn flush_captures_the_list_at_call_time() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;
    vm.add_note(note(1, "a"));
    vm.add_note(note(2, "b"));
    vm.wait_idle().await;

    vm.flush();
    vm.edit_note(
        1,
        NoteEdit {
            title: Some("after flush".to_string()),
            ..NoteEdit::default()
        },
    );
    vm.wait_idle().await;

    assert!(store.journal().contains(&StoreOp::UpsertAll(2)));
    assert_eq!(store.rows()[0].title, "a");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn add_remove_flush_scenario_with_pending_delete() {
    let store = Arc::new(TestStore::new());
    store.fetch_gate.close();
    let vm = view_model(&store, RetryPolicy::none());
    assert_eq!(vm.status(), NotesStatus::Loading);
    store.fetch_gate.release();
    vm.wait_idle().await;
    assert_eq!(vm.status(), NotesStatus::Empty);

    let first = note(1, "A");
    vm.add_note(first.clone());
    assert_eq!(vm.notes(), vec![first.clone()]);
    assert_eq!(vm.status(), NotesStatus::NotEmpty);
    vm.wait_idle().await;

    store.delete_gate.close();
    vm.remove_note(&first);
    assert!(vm.notes().is_empty());
    assert_eq!(vm.status(), NotesStatus::Empty);

    vm.flush();
    wait_until(|| store.journal().contains(&StoreOp::UpsertAll(0))).await;
    // The delete has not reached the store yet.
    assert_eq!(store.rows(), vec![first]);

    store.delete_gate.release();
    vm.wait_idle().await;
    assert!(store.rows().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undo_racing_a_pending_delete_loses_to_the_later_delete() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;

    let first = note(1, "A");
    vm.add_note(first.clone());
    vm.wait_idle().await;

    store.delete_gate.close();
    vm.remove_note(&first);
    vm.add_note(first.clone());
    wait_until(|| {
        store
            .journal()
            .iter()
            .filter(|op| **op == StoreOp::Upsert(1))
            .count()
            == 2
    })
    .await;

    store.delete_gate.release();
    vm.wait_idle().await;

    // Memory shows the undone note, storage reflects whichever task ran last.
    assert_eq!(vm.notes(), vec![first]);
    assert!(store.rows().is_empty());
    assert_eq!(store.journal().last(), Some(&StoreOp::Delete(1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undo_after_completed_delete_restores_row() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;

    let first = note(1, "A");
    vm.add_note(first.clone());
    vm.wait_idle().await;
    vm.remove_note(&first);
    vm.wait_idle().await;
    assert!(store.rows().is_empty());

    vm.add_note(first.clone());
    vm.wait_idle().await;
    assert_eq!(store.rows(), vec![first]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transient_write_failures_are_retried() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, fast_retry(3));
    vm.wait_idle().await;

    store.fail_next_writes(2);
    vm.add_note(note(1, "A"));
    vm.wait_idle().await;

    assert_eq!(store.rows(), vec![note(1, "A")]);
    assert_eq!(vm.persistence_health().failed_tasks, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exhausted_write_failures_are_surfaced_without_touching_memory() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, fast_retry(2));
    vm.wait_idle().await;

    store.fail_next_writes(5);
    vm.add_note(note(1, "A"));
    vm.wait_idle().await;

    assert_eq!(vm.notes(), vec![note(1, "A")]);
    assert!(store.rows().is_empty());
    let health = vm.persistence_health();
    assert_eq!(health.failed_tasks, 1);
    assert_eq!(health.last_failed_op, Some("add"));
    assert!(health
        .last_error
        .as_deref()
        .unwrap_or_default()
        .contains("after 2 attempt(s)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn add_retry_does_not_restore_a_note_deleted_during_backoff() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, slow_retry(3));
    vm.wait_idle().await;

    store.fail_next_writes(1);
    let first = note(1, "A");
    vm.add_note(first.clone());
    wait_until(|| store.journal().contains(&StoreOp::FailedWrite)).await;

    vm.remove_note(&first);
    wait_until(|| store.journal().contains(&StoreOp::Delete(1))).await;
    vm.wait_idle().await;

    assert!(vm.notes().is_empty());
    assert!(store.rows().is_empty());
    assert!(!store.journal().contains(&StoreOp::Upsert(1)));
    assert_eq!(vm.persistence_health().failed_tasks, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remove_retry_does_not_delete_a_note_restored_during_backoff() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, slow_retry(3));
    vm.wait_idle().await;
    let first = note(1, "A");
    vm.add_note(first.clone());
    vm.wait_idle().await;

    store.fail_next_writes(1);
    vm.remove_note(&first);
    wait_until(|| store.journal().contains(&StoreOp::FailedWrite)).await;

    vm.add_note(first.clone());
    vm.wait_idle().await;

    assert_eq!(vm.notes(), vec![first.clone()]);
    assert_eq!(store.rows(), vec![first]);
    assert!(!store.journal().contains(&StoreOp::Delete(1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn flush_retry_skips_notes_deleted_during_backoff() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, slow_retry(3));
    vm.wait_idle().await;
    vm.add_note(note(1, "A"));
    vm.add_note(note(2, "B"));
    vm.wait_idle().await;

    store.fail_next_writes(1);
    vm.flush();
    wait_until(|| store.journal().contains(&StoreOp::FailedWrite)).await;

    vm.remove_note(&note(1, "A"));
    wait_until(|| store.journal().contains(&StoreOp::Delete(1))).await;
    vm.wait_idle().await;

    assert_eq!(vm.notes(), vec![note(2, "B")]);
    assert_eq!(store.rows(), vec![note(2, "B")]);
    assert_eq!(store.journal().last(), Some(&StoreOp::UpsertAll(1)));
    assert_eq!(vm.persistence_health().failed_tasks, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_initial_load_ends_loading_with_empty_list() {
    let store = Arc::new(TestStore::with_notes(&[note(1, "a")]));
    store.fail_next_fetches(10);
    let vm = view_model(&store, fast_retry(2));
    vm.wait_idle().await;

    assert_eq!(vm.status(), NotesStatus::Empty);
    assert_eq!(vm.persistence_health().last_failed_op, Some("load_all"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribers_observe_each_change() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;
    let mut updates = vm.subscribe();
    updates.borrow_and_update();

    vm.add_note(note(1, "A"));
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().status(), NotesStatus::NotEmpty);

    vm.remove_note(&note(1, "A"));
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().status(), NotesStatus::Empty);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_view_model_keeps_editing_in_memory_but_stops_persisting() {
    let store = Arc::new(TestStore::new());
    let vm = view_model(&store, RetryPolicy::none());
    vm.wait_idle().await;

    vm.close();
    assert!(vm.is_closed());
    vm.add_note(note(1, "A"));
    vm.flush();
    vm.wait_idle().await;

    assert_eq!(vm.notes(), vec![note(1, "A")]);
    assert!(store.rows().is_empty());
    assert_eq!(vm.pending_tasks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_view_model_abandons_pending_load() {
    let store = Arc::new(TestStore::with_notes(&[note(1, "a")]));
    store.fetch_gate.close();
    let vm = view_model(&store, RetryPolicy::none());
    let mut updates = vm.subscribe();
    drop(vm);

    store.fetch_gate.release();
    // The sender is gone once the load task has observed the cancellation.
    assert!(updates.changed().await.is_err());
    assert!(updates.borrow().loading);
}
