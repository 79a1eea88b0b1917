//! Notes view-model: in-memory list, derived status, background persistence.
//!
//! # Responsibility
//! - Own the note list shown on screen and the initial-load flag.
//! - Mirror add/remove to storage immediately and edits on `flush`.
//! - Publish every state change to subscribers.
//!
//! # Invariants
//! - `add_note` places the note at index 0, whatever its id.
//! - `remove_note` removes at most one element equal to the given note.
//! - Status is `Loading` until the initial load finishes, then derived from
//!   list emptiness on every read.
//! - Persistence tasks are independent. Two first attempts touching the same
//!   id (delete, then undo re-add) race; whichever reaches the store last wins.
//! - A retry never writes a note that a later add/remove has touched.

use crate::model::note::{Note, NoteEdit, NoteId, NotesStatus};
use crate::repo::note_repo::NoteRepository;
use crate::store::{NoteStore, StoreResult};
use crate::viewmodel::generations::NoteGenerations;
use crate::viewmodel::retry::{run_with_retry, PersistError, RetryPolicy};
use crate::viewmodel::task_scope::TaskScope;
use log::{debug, error, info};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Snapshot published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesState {
    /// Newest first.
    pub notes: Vec<Note>,
    pub loading: bool,
}

impl NotesState {
    fn initial() -> Self {
        Self {
            notes: Vec::new(),
            loading: true,
        }
    }

    pub fn status(&self) -> NotesStatus {
        NotesStatus::derive(self.loading, self.notes.is_empty())
    }
}

/// Failure bookkeeping for background persistence.
///
/// This is the only channel through which storage problems become visible;
/// mutations never fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceHealth {
    pub failed_tasks: u64,
    pub last_failed_op: Option<&'static str>,
    pub last_error: Option<String>,
}

impl PersistenceHealth {
    fn record(&mut self, op: &'static str, err: &PersistError) {
        self.failed_tasks += 1;
        self.last_failed_op = Some(op);
        self.last_error = Some(err.to_string());
    }
}

pub struct NotesViewModel<S: NoteStore + 'static> {
    repository: NoteRepository<S>,
    state: Arc<watch::Sender<NotesState>>,
    health: Arc<Mutex<PersistenceHealth>>,
    generations: Arc<NoteGenerations>,
    policy: RetryPolicy,
    scope: TaskScope,
}

impl<S: NoteStore + 'static> NotesViewModel<S> {
    /// Creates the view-model and starts the initial load on `handle`.
    pub fn new(repository: NoteRepository<S>, handle: Handle) -> Self {
        Self::with_policy(repository, handle, RetryPolicy::default())
    }

    pub fn with_policy(repository: NoteRepository<S>, handle: Handle, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(NotesState::initial());
        let view_model = Self {
            repository,
            state: Arc::new(state),
            health: Arc::new(Mutex::new(PersistenceHealth::default())),
            generations: Arc::new(NoteGenerations::default()),
            policy,
            scope: TaskScope::new(handle),
        };
        view_model.initialize();
        view_model
    }

    fn initialize(&self) {
        let repository = self.repository.clone();
        let state = Arc::clone(&self.state);
        let health = Arc::clone(&self.health);
        let cancel = self.scope.cancellation();
        let policy = self.policy;

        self.scope.spawn(async move {
            let loaded = run_with_retry("load_all", policy, &cancel, move |_| {
                repository.load_all()
            })
            .await;

            match loaded {
                Ok(notes) => {
                    let count = notes.len();
                    state.send_modify(|current| {
                        current.notes = notes;
                        current.loading = false;
                    });
                    info!("event=notes_init module=viewmodel status=ok count={count}");
                }
                Err(PersistError::Cancelled) => {
                    info!("event=notes_init module=viewmodel status=cancelled");
                }
                Err(err) => {
                    error!("event=notes_init module=viewmodel status=error error={err}");
                    lock_health(&health).record("load_all", &err);
                    state.send_modify(|current| current.loading = false);
                }
            }
        });
    }

    /// Current notes, newest first.
    pub fn notes(&self) -> Vec<Note> {
        self.state.borrow().notes.clone()
    }

    pub fn snapshot(&self) -> NotesState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Recomputed from current state on every call.
    pub fn status(&self) -> NotesStatus {
        self.state.borrow().status()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<NotesState> {
        self.state.subscribe()
    }

    /// Prepends `note` and schedules its upsert.
    ///
    /// Also used to undo a removal: the note comes back at the front, not at
    /// its former position.
    pub fn add_note(&self, note: Note) {
        let note_id = note.id;
        let persisted = note.clone();
        self.state
            .send_modify(|current| current.notes.insert(0, note));
        debug!(
            "event=note_add module=viewmodel status=ok note_id={note_id} count={}",
            self.state.borrow().notes.len()
        );

        let repository = self.repository.clone();
        let generation = self.generations.bump(note_id);
        let generations = Arc::clone(&self.generations);
        self.schedule("add", move |attempt| {
            if attempt > 1 && !generations.is_current(note_id, generation) {
                debug!("event=persist module=viewmodel status=superseded op=add note_id={note_id}");
                return Ok(());
            }
            repository.add(&persisted)
        });
    }

    /// Removes the first note equal to `note` and schedules its deletion.
    ///
    /// Returns whether an in-memory element was removed. The store delete is
    /// scheduled either way.
    pub fn remove_note(&self, note: &Note) -> bool {
        let removed = self.state.send_if_modified(|current| {
            match current.notes.iter().position(|candidate| candidate == note) {
                Some(index) => {
                    current.notes.remove(index);
                    true
                }
                None => false,
            }
        });
        debug!(
            "event=note_remove module=viewmodel status=ok note_id={} removed={removed}",
            note.id
        );

        let repository = self.repository.clone();
        let persisted = note.clone();
        let note_id = note.id;
        let generation = self.generations.bump(note_id);
        let generations = Arc::clone(&self.generations);
        self.schedule("remove", move |attempt| {
            if attempt > 1 && !generations.is_current(note_id, generation) {
                debug!(
                    "event=persist module=viewmodel status=superseded op=remove note_id={note_id}"
                );
                return Ok(());
            }
            repository.remove(&persisted)
        });
        removed
    }

    /// Edits the first note with `id` in place. Not persisted until `flush`.
    ///
    /// Returns whether a note with that id exists.
    pub fn edit_note(&self, id: NoteId, edit: NoteEdit) -> bool {
        let mut found = false;
        self.state.send_if_modified(|current| {
            match current.notes.iter_mut().find(|candidate| candidate.id == id) {
                Some(note) => {
                    found = true;
                    edit.apply_to(note)
                }
                None => false,
            }
        });
        if !found {
            debug!("event=note_edit module=viewmodel status=not_found note_id={id}");
        }
        found
    }

    /// Schedules a bulk upsert of the list as it is right now.
    ///
    /// Retries leave out notes added or removed after this call.
    pub fn flush(&self) {
        let snapshot = self.notes();
        let captured = self.generations.capture(&snapshot);
        debug!(
            "event=notes_flush module=viewmodel status=scheduled count={}",
            snapshot.len()
        );
        let repository = self.repository.clone();
        let generations = Arc::clone(&self.generations);
        self.schedule("save_all", move |attempt| {
            if attempt == 1 {
                return repository.save_all(&snapshot);
            }
            let current = generations.retain_current(&snapshot, &captured);
            if current.len() < snapshot.len() {
                debug!(
                    "event=persist module=viewmodel status=superseded op=save_all skipped={}",
                    snapshot.len() - current.len()
                );
            }
            repository.save_all(&current)
        });
    }

    pub fn persistence_health(&self) -> PersistenceHealth {
        lock_health(&self.health).clone()
    }

    /// Persistence tasks scheduled and not yet finished.
    pub fn pending_tasks(&self) -> usize {
        self.scope.pending()
    }

    /// Waits for every persistence task scheduled so far.
    pub async fn wait_idle(&self) {
        self.scope.wait_idle().await;
    }

    /// `wait_idle` as a future that does not borrow the view-model.
    pub fn idle(&self) -> impl Future<Output = ()> + Send + 'static {
        self.scope.idle()
    }

    /// Cancels the task scope. Pending persistence may be lost; later
    /// mutations still update memory but are no longer persisted.
    pub fn close(&self) {
        self.scope.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.scope.is_cancelled()
    }

    fn schedule<F>(&self, op: &'static str, job: F)
    where
        F: Fn(u32) -> StoreResult<()> + Send + Sync + 'static,
    {
        let health = Arc::clone(&self.health);
        let cancel = self.scope.cancellation();
        let policy = self.policy;

        self.scope.spawn(async move {
            match run_with_retry(op, policy, &cancel, job).await {
                Ok(()) => {}
                Err(PersistError::Cancelled) => {
                    info!("event=persist module=viewmodel status=cancelled op={op}");
                }
                Err(err) => {
                    error!("event=persist module=viewmodel status=error op={op} error={err}");
                    lock_health(&health).record(op, &err);
                }
            }
        });
    }
}

fn lock_health(health: &Mutex<PersistenceHealth>) -> std::sync::MutexGuard<'_, PersistenceHealth> {
    health.lock().unwrap_or_else(PoisonError::into_inner)
}
