//! Notes database bootstrap.
//!
//! # Responsibility
//! - Open the notes database (file or in-memory) and bring it to the
//!   supported schema before a store is built on top of it.
//! - Report bootstrap failures together with the database they concern.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A connection is handed out only after migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Where a notes database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    /// Short label used in log events; never contains the path.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Memory => None,
        }
    }
}

impl Display for DbLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "`{}`", path.display()),
            Self::Memory => write!(f, "in-memory"),
        }
    }
}

/// Failure opening or migrating a notes database.
#[derive(Debug)]
pub enum DbError {
    /// SQLite rejected the open, a pragma or a migration statement.
    Sqlite {
        location: DbLocation,
        source: rusqlite::Error,
    },
    /// The file was written by a newer build whose notes schema this build
    /// cannot read. The file is left untouched.
    UnsupportedSchemaVersion {
        location: DbLocation,
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    pub(crate) fn sqlite(location: &DbLocation) -> impl Fn(rusqlite::Error) -> Self + '_ {
        move |source| Self::Sqlite {
            location: location.clone(),
            source,
        }
    }

    pub fn location(&self) -> &DbLocation {
        match self {
            Self::Sqlite { location, .. } | Self::UnsupportedSchemaVersion { location, .. } => {
                location
            }
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite { location, source } => {
                write!(f, "notes database {location}: {source}")
            }
            Self::UnsupportedSchemaVersion {
                location,
                db_version,
                latest_supported,
            } => write!(
                f,
                "notes database {location} has schema version {db_version}; this build reads up to {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}
