//! The claim protocol: exclusive-create a lock file per item/phase, treat a
//! lock whose mtime has aged past the stale-lock TTL as abandoned, and
//! reclaim it via rename-to-tombstone then delete.
//!
//! Unlike a single-host lock manager, staleness here is judged purely by the
//! lock file's mtime, there is no way to signal a PID on another host to
//! check liveness, so `created_at`/`owner_host` inside [`pipeline_types::Lock`]
//! are descriptive only, never authoritative.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pipeline_types::Lock;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum LockError {
    #[error("lock already held for item {item_id}")]
    AlreadyHeld { item_id: String },

    #[error("failed to reclaim stale lock for item {item_id}: {reason}")]
    ReclaimFailed { item_id: String, reason: String },

    #[error("io error manipulating lock for item {item_id}: {source}")]
    Io {
        item_id: String,
        #[source]
        source: io::Error,
    },
}

/// A claimed lock. Dropping it (or calling [`ClaimedLock::release`]) deletes
/// the lock file; a worker that panics mid-item leaves the file for another
/// worker to reclaim once it goes stale.
pub struct ClaimedLock {
    path: PathBuf,
    item_id: String,
    released: bool,
}

impl ClaimedLock {
    /// Attempt to claim `item_id` at `lock_path` (`locks/{phase}/{item_id}`).
    ///
    /// A pre-existing lock older than `ttl` is deleted and acquisition is
    /// retried exactly once.
    pub fn acquire(lock_path: &Path, item_id: &str, owner_host: &str, ttl: Duration) -> Result<Self, LockError> {
        match try_create(lock_path, item_id, owner_host) {
            Ok(()) => Ok(Self {
                path: lock_path.to_path_buf(),
                item_id: item_id.to_string(),
                released: false,
            }),
            Err(LockError::AlreadyHeld { .. }) => {
                if is_stale(lock_path, ttl)? {
                    debug!(item_id, path = %lock_path.display(), "reclaiming stale lock");
                    reclaim_stale(lock_path, item_id)?;
                    try_create(lock_path, item_id, owner_host)?;
                    Ok(Self {
                        path: lock_path.to_path_buf(),
                        item_id: item_id.to_string(),
                        released: false,
                    })
                } else {
                    Err(LockError::AlreadyHeld {
                        item_id: item_id.to_string(),
                    })
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Release without error propagation concerns, used by `Drop`.
    pub fn release(mut self) -> Result<(), LockError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockError::Io {
                item_id: self.item_id.clone(),
                source,
            }),
        }
    }
}

impl Drop for ClaimedLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(item_id = %self.item_id, error = %e, "failed to release lock on drop");
        }
    }
}

fn try_create(lock_path: &Path, item_id: &str, owner_host: &str) -> Result<(), LockError> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(|source| LockError::Io {
            item_id: item_id.to_string(),
            source,
        })?;
    }

    let lock = Lock::new(item_id, owner_host);
    let body = serde_json::to_vec(&lock).expect("Lock serializes infallibly");

    match fs::OpenOptions::new().create_new(true).write(true).open(lock_path) {
        Ok(mut file) => {
            use io::Write as _;
            file.write_all(&body).map_err(|source| LockError::Io {
                item_id: item_id.to_string(),
                source,
            })?;
            file.sync_all().map_err(|source| LockError::Io {
                item_id: item_id.to_string(),
                source,
            })?;
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(LockError::AlreadyHeld {
            item_id: item_id.to_string(),
        }),
        Err(source) => Err(LockError::Io {
            item_id: item_id.to_string(),
            source,
        }),
    }
}

fn is_stale(lock_path: &Path, ttl: Duration) -> Result<bool, LockError> {
    let item_id = lock_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let metadata = match fs::metadata(lock_path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(source) => return Err(LockError::Io { item_id, source }),
    };

    let mtime = metadata.modified().map_err(|source| LockError::Io {
        item_id: item_id.clone(),
        source,
    })?;
    let age = SystemTime::now()
        .duration_since(mtime)
        .unwrap_or(Duration::ZERO);
    Ok(age > ttl)
}

/// Rename-to-tombstone then delete, narrowing the race window between
/// validating staleness and removing the file.
fn reclaim_stale(lock_path: &Path, item_id: &str) -> Result<(), LockError> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let tombstone = lock_path.with_extension(format!("stale.{timestamp}.{}", process::id()));

    match fs::rename(lock_path, &tombstone) {
        Ok(()) => {
            let _ = fs::remove_file(&tombstone);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::ReclaimFailed {
            item_id: item_id.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, age: Duration) {
        let mtime = SystemTime::now() - age;
        let file = File::open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("item-1");
        let lock = ClaimedLock::acquire(&path, "item-1", "host-a", Duration::from_secs(600)).unwrap();
        lock.release().unwrap();
        assert!(!path.exists());
        ClaimedLock::acquire(&path, "item-1", "host-b", Duration::from_secs(600)).unwrap();
    }

    #[test]
    fn concurrent_claim_fails_while_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("item-1");
        let _held = ClaimedLock::acquire(&path, "item-1", "host-a", Duration::from_secs(600)).unwrap();
        let second = ClaimedLock::acquire(&path, "item-1", "host-b", Duration::from_secs(600));
        assert!(matches!(second, Err(LockError::AlreadyHeld { .. })));
    }

    #[test]
    fn stale_lock_is_reclaimed_after_ttl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("item-1");
        let held = ClaimedLock::acquire(&path, "item-1", "host-a", Duration::from_secs(600)).unwrap();
        set_mtime(&path, Duration::from_secs(700));
        std::mem::forget(held); // simulate crash: never released

        let reclaimed = ClaimedLock::acquire(&path, "item-1", "host-b", Duration::from_secs(600));
        assert!(reclaimed.is_ok());
    }

    #[test]
    fn drop_releases_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("item-1");
        {
            let _lock = ClaimedLock::acquire(&path, "item-1", "host-a", Duration::from_secs(600)).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
