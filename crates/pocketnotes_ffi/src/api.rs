//! FFI use-case API for the Flutter notes screen.
//!
//! # Responsibility
//! - Expose the notes view-model to Dart via FRB as plain data calls.
//! - Own the process-wide async runtime and the single notes session.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Mutations return as soon as memory is updated; persistence runs on the
//!   session runtime.
//! - At most one session is open per process.

use crate::config::{resolve_db_path, resolve_retry_policy};
use log::{error, info};
use pocketnotes_core::db::open_db;
use pocketnotes_core::{
    core_version as core_version_inner, default_log_level as default_log_level_inner,
    init_logging as init_logging_inner, ping as ping_inner,
    Note, NoteEdit, NoteRepository, NotesViewModel, PersistenceHealth, SqliteNoteStore,
};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::runtime::{Builder, Runtime};

const RUNTIME_THREAD_NAME: &str = "pocketnotes-persist";

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static SESSION: Mutex<Option<NotesViewModel<SqliteNoteStore>>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Level the UI should pass to `init_logging` when the user has not chosen
/// one: `debug` for debug builds of the native library, `info` otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn default_log_level() -> String {
    default_log_level_inner().to_owned()
}

/// Note as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub important: bool,
}

impl From<Note> for NoteItem {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            body: note.body,
            important: note.important,
        }
    }
}

impl From<NoteItem> for Note {
    fn from(item: NoteItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            body: item.body,
            important: item.important,
        }
    }
}

/// Read model for one render of the notes screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesSnapshot {
    /// Whether a notes session is open.
    pub open: bool,
    /// `loading|empty|not_empty`; `loading` while no session is open.
    pub status: String,
    /// Newest first.
    pub notes: Vec<NoteItem>,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesActionResponse {
    pub ok: bool,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl NotesActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Background persistence failures observed by the open session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceHealthItem {
    pub failed_tasks: u64,
    pub last_failed_op: Option<String>,
    pub last_error: Option<String>,
}

impl From<PersistenceHealth> for PersistenceHealthItem {
    fn from(health: PersistenceHealth) -> Self {
        Self {
            failed_tasks: health.failed_tasks,
            last_failed_op: health.last_failed_op.map(str::to_string),
            last_error: health.last_error,
        }
    }
}

/// Opens the notes session and starts loading stored notes.
///
/// `db_path` falls back to `POCKETNOTES_DB_PATH`, then to a file in the
/// system temp directory.
///
/// # FFI contract
/// - Sync call; opens the database and runs migrations.
/// - Calling it while a session is open is a successful no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_open(db_path: Option<String>) -> NotesActionResponse {
    let mut session = lock_session();
    if session.is_some() {
        return NotesActionResponse::success("Notes session already open.");
    }

    let path = resolve_db_path(db_path.as_deref());
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(err) => return NotesActionResponse::failure(format!("notes_open failed: {err}")),
    };
    let conn = match open_db(&path) {
        Ok(conn) => conn,
        Err(err) => return NotesActionResponse::failure(format!("notes_open failed: {err}")),
    };
    let store = match SqliteNoteStore::try_new(conn) {
        Ok(store) => store,
        Err(err) => return NotesActionResponse::failure(format!("notes_open failed: {err}")),
    };

    *session = Some(NotesViewModel::with_policy(
        NoteRepository::new(store),
        runtime.handle().clone(),
        resolve_retry_policy(),
    ));
    info!(
        "event=session_open module=ffi status=ok db_path={}",
        path.display()
    );
    NotesActionResponse::success("Notes session opened.")
}

/// Waits for pending persistence, then closes the session.
///
/// # FFI contract
/// - Blocks until scheduled writes finish; call from a shutdown path, not
///   per frame.
/// - Closing without an open session is a successful no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_close() -> NotesActionResponse {
    let Some(view_model) = lock_session().take() else {
        return NotesActionResponse::success("No notes session open.");
    };
    if let Some(runtime) = RUNTIME.get() {
        runtime.block_on(view_model.wait_idle());
    }
    view_model.close();
    info!("event=session_close module=ffi status=ok");
    NotesActionResponse::success("Notes session closed.")
}

/// Builds a fresh empty note with a current-time id. Not added to the list.
#[flutter_rust_bridge::frb(sync)]
pub fn note_new() -> NoteItem {
    Note::new().into()
}

#[flutter_rust_bridge::frb(sync)]
pub fn notes_snapshot() -> NotesSnapshot {
    match with_session(|view_model| view_model.snapshot()) {
        Ok(state) => NotesSnapshot {
            open: true,
            status: state.status().as_str().to_string(),
            notes: state.notes.into_iter().map(NoteItem::from).collect(),
        },
        Err(_) => NotesSnapshot {
            open: false,
            status: pocketnotes_core::NotesStatus::Loading.as_str().to_string(),
            notes: Vec::new(),
        },
    }
}

/// Adds `note` to the front of the list; also the undo path after removal.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_add(note: NoteItem) -> NotesActionResponse {
    match with_session(|view_model| view_model.add_note(note.into())) {
        Ok(()) => NotesActionResponse::success("Note added."),
        Err(err) => NotesActionResponse::failure(format!("notes_add failed: {err}")),
    }
}

/// Removes the first note equal to `note`.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_remove(note: NoteItem) -> NotesActionResponse {
    match with_session(|view_model| view_model.remove_note(&Note::from(note))) {
        Ok(true) => NotesActionResponse::success("Note deleted."),
        Ok(false) => NotesActionResponse::success("Note was not in the list."),
        Err(err) => NotesActionResponse::failure(format!("notes_remove failed: {err}")),
    }
}

/// Edits a note in memory; the change is persisted by the next flush.
///
/// `None` arguments leave the corresponding field unchanged.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_edit(
    id: i64,
    title: Option<String>,
    body: Option<String>,
    important: Option<bool>,
) -> NotesActionResponse {
    let edit = NoteEdit {
        title,
        body,
        important,
    };
    match with_session(|view_model| view_model.edit_note(id, edit)) {
        Ok(true) => NotesActionResponse::success("Note edited."),
        Ok(false) => NotesActionResponse::failure(format!("notes_edit failed: no note with id {id}")),
        Err(err) => NotesActionResponse::failure(format!("notes_edit failed: {err}")),
    }
}

/// Schedules a bulk save of the current list. Call when the app goes to
/// the background.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_flush() -> NotesActionResponse {
    match with_session(|view_model| view_model.flush()) {
        Ok(()) => NotesActionResponse::success("Notes flush scheduled."),
        Err(err) => NotesActionResponse::failure(format!("notes_flush failed: {err}")),
    }
}

/// Blocks until every persistence task scheduled so far has finished.
///
/// The session stays usable from other threads while this waits.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_wait_idle() -> NotesActionResponse {
    let Some(runtime) = RUNTIME.get() else {
        return NotesActionResponse::failure("notes_wait_idle failed: notes session is not open");
    };
    let idle = match with_session(|view_model| view_model.idle()) {
        Ok(idle) => idle,
        Err(err) => return NotesActionResponse::failure(format!("notes_wait_idle failed: {err}")),
    };
    runtime.block_on(idle);
    NotesActionResponse::success("Notes persisted.")
}

#[flutter_rust_bridge::frb(sync)]
pub fn notes_persistence_health() -> PersistenceHealthItem {
    with_session(|view_model| view_model.persistence_health())
        .map(PersistenceHealthItem::from)
        .unwrap_or_default()
}

fn runtime() -> Result<&'static Runtime, String> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let built = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(RUNTIME_THREAD_NAME)
        .enable_time()
        .build()
        .map_err(|err| {
            error!("event=runtime_start module=ffi status=error error={err}");
            format!("failed to start persistence runtime: {err}")
        })?;
    // A concurrent caller may have won; its runtime is kept and ours dropped.
    let _ = RUNTIME.set(built);
    RUNTIME
        .get()
        .ok_or_else(|| "persistence runtime unavailable".to_string())
}

fn lock_session() -> MutexGuard<'static, Option<NotesViewModel<SqliteNoteStore>>> {
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_session<T>(f: impl FnOnce(&NotesViewModel<SqliteNoteStore>) -> T) -> Result<T, String> {
    let session = lock_session();
    session
        .as_ref()
        .map(f)
        .ok_or_else(|| "notes session is not open".to_string())
}
