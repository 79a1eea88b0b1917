#![allow(dead_code)]

use pocketnotes_core::db::open_db_in_memory;
use pocketnotes_core::{Note, NoteId, NoteStore, RetryPolicy, SqliteNoteStore, StoreError, StoreResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Blocks store calls until released.
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn new(open: bool) -> Self {
        Self {
            open: Mutex::new(open),
            cond: Condvar::new(),
        }
    }

    pub fn close(&self) {
        *self.open.lock().unwrap() = false;
    }

    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn pass(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    FetchAll,
    Upsert(NoteId),
    Delete(NoteId),
    UpsertAll(usize),
    /// An injected write failure fired.
    FailedWrite,
}

/// In-memory SQLite store with gates, injected failures and an op journal.
pub struct TestStore {
    inner: SqliteNoteStore,
    pub fetch_gate: Gate,
    pub delete_gate: Gate,
    fetch_failures: AtomicU32,
    write_failures: AtomicU32,
    journal: Mutex<Vec<StoreOp>>,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteNoteStore::try_new(open_db_in_memory().unwrap()).unwrap(),
            fetch_gate: Gate::new(true),
            delete_gate: Gate::new(true),
            fetch_failures: AtomicU32::new(0),
            write_failures: AtomicU32::new(0),
            journal: Mutex::new(Vec::new()),
        }
    }

    pub fn with_notes(notes: &[Note]) -> Self {
        let store = Self::new();
        for note in notes {
            store.inner.upsert(note).unwrap();
        }
        store
    }

    pub fn fail_next_fetches(&self, count: u32) {
        self.fetch_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, count: u32) {
        self.write_failures.store(count, Ordering::SeqCst);
    }

    /// Direct read of the underlying rows, bypassing gates and failures.
    pub fn rows(&self) -> Vec<Note> {
        let mut notes = self.inner.fetch_all().unwrap();
        notes.sort_by_key(|note| note.id);
        notes
    }

    pub fn journal(&self) -> Vec<StoreOp> {
        self.journal.lock().unwrap().clone()
    }

    fn record(&self, op: StoreOp) {
        self.journal.lock().unwrap().push(op);
    }

    fn fail_write(&self) -> StoreResult<()> {
        Self::take_failure(&self.write_failures).map_err(|err| {
            self.record(StoreOp::FailedWrite);
            err
        })
    }

    fn take_failure(counter: &AtomicU32) -> StoreResult<()> {
        let injected = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            Err(StoreError::InvalidData("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl NoteStore for TestStore {
    fn fetch_all(&self) -> StoreResult<Vec<Note>> {
        self.fetch_gate.pass();
        Self::take_failure(&self.fetch_failures)?;
        let notes = self.inner.fetch_all()?;
        self.record(StoreOp::FetchAll);
        Ok(notes)
    }

    fn upsert(&self, note: &Note) -> StoreResult<()> {
        self.fail_write()?;
        self.inner.upsert(note)?;
        self.record(StoreOp::Upsert(note.id));
        Ok(())
    }

    fn delete(&self, note: &Note) -> StoreResult<()> {
        self.delete_gate.pass();
        self.fail_write()?;
        self.inner.delete(note)?;
        self.record(StoreOp::Delete(note.id));
        Ok(())
    }

    fn upsert_all(&self, notes: &[Note]) -> StoreResult<()> {
        self.fail_write()?;
        self.inner.upsert_all(notes)?;
        self.record(StoreOp::UpsertAll(notes.len()));
        Ok(())
    }
}

pub fn note(id: NoteId, title: &str) -> Note {
    let mut note = Note::with_id(id);
    note.title = title.to_string();
    note
}

/// Retries with a backoff long enough for other operations to run meanwhile.
pub fn slow_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(200),
        max_backoff: Duration::from_secs(1),
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

/// Polls `condition` until it holds; panics after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
