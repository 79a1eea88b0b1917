//! Session configuration resolved from call arguments and environment.
//!
//! Precedence: explicit argument, then environment variable, then default.

use pocketnotes_core::RetryPolicy;
use std::path::PathBuf;

pub(crate) const DB_PATH_ENV: &str = "POCKETNOTES_DB_PATH";
pub(crate) const PERSIST_ATTEMPTS_ENV: &str = "POCKETNOTES_PERSIST_ATTEMPTS";
const DEFAULT_DB_FILE_NAME: &str = "pocketnotes.sqlite3";

pub(crate) fn resolve_db_path(explicit: Option<&str>) -> PathBuf {
    resolve_db_path_from(explicit, std::env::var(DB_PATH_ENV).ok().as_deref())
}

pub(crate) fn resolve_retry_policy() -> RetryPolicy {
    retry_policy_from(std::env::var(PERSIST_ATTEMPTS_ENV).ok().as_deref())
}

fn resolve_db_path_from(explicit: Option<&str>, env_value: Option<&str>) -> PathBuf {
    [explicit, env_value]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
}

fn retry_policy_from(attempts: Option<&str>) -> RetryPolicy {
    let mut policy = RetryPolicy::default();
    if let Some(max_attempts) = attempts
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|value| *value >= 1)
    {
        policy.max_attempts = max_attempts;
    }
    policy
}
