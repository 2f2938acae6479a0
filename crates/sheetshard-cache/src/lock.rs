//! Per-table lock markers
//!
//! A table is locked while `<table>.lock` exists next to `<table>.json`.
//! The marker is created with exclusive-create semantics, so checking for a
//! holder and taking the lock is a single filesystem operation.
//!
//! Waiting is a blocking poll. By default it never gives up and never
//! reclaims a marker, which means a process that dies while holding the lock
//! stalls every later writer on that table until the marker is removed by
//! hand. `LockOptions::stale_after` and `LockOptions::timeout` bound this.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Lock result type
pub type LockResult<T> = Result<T, LockError>;

/// Errors from lock operations
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock timeout after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a writer waits for a table lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Delay between attempts while another writer holds the marker
    pub poll_interval: Duration,
    /// Reclaim a marker whose mtime is older than this (None = never)
    pub stale_after: Option<Duration>,
    /// Give up after waiting this long (None = wait forever)
    pub timeout: Option<Duration>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            stale_after: None,
            timeout: None,
        }
    }
}

static NEXT_OWNER: AtomicU64 = AtomicU64::new(0);

/// Held lock on one cache table.
///
/// The marker file is removed when this guard is dropped, including on
/// early returns and unwinding. The marker carries an owner token, and a
/// guard only removes a marker that still holds its own token; a guard
/// whose marker was reclaimed as stale leaves the new holder's marker alone.
#[derive(Debug)]
pub struct TableLock {
    lock_path: PathBuf,
    owner: String,
}

impl TableLock {
    /// Log a contention warning once the wait exceeds this.
    const CONTENTION_WARN_AFTER: Duration = Duration::from_secs(5);

    /// Acquire the lock marker at `lock_path`, waiting per `options`.
    pub fn acquire(lock_path: &Path, options: &LockOptions) -> LockResult<Self> {
        let start = Instant::now();
        let mut warned = false;

        let owner = Self::owner_token();

        loop {
            match Self::try_create(lock_path, &owner) {
                Ok(()) => {
                    if warned {
                        info!(
                            lock = %lock_path.display(),
                            waited_secs = start.elapsed().as_secs_f64(),
                            "cache lock acquired after contention"
                        );
                    }
                    return Ok(Self {
                        lock_path: lock_path.to_path_buf(),
                        owner,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if let Some(stale_after) = options.stale_after {
                        if Self::reclaim_if_stale(lock_path, stale_after)? {
                            continue;
                        }
                    }
                    if !warned && start.elapsed() > Self::CONTENTION_WARN_AFTER {
                        warn!(lock = %lock_path.display(), "cache lock contention, waiting");
                        warned = true;
                    }
                }
                Err(e) => return Err(LockError::Io(e)),
            }

            if let Some(timeout) = options.timeout {
                if start.elapsed() >= timeout {
                    return Err(LockError::Timeout(timeout));
                }
            }

            std::thread::sleep(options.poll_interval);
        }
    }

    /// Whether a marker currently exists at `lock_path`.
    pub fn is_held(lock_path: &Path) -> bool {
        lock_path.exists()
    }

    /// Get the lock marker path.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Token written into the marker: pid, a per-process counter and the
    /// acquisition time in nanoseconds.
    fn owner_token() -> String {
        let seq = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        format!("{}:{}:{}", std::process::id(), seq, nanos)
    }

    fn try_create(lock_path: &Path, owner: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)?;
        let written = file.write_all(owner.as_bytes()).and_then(|()| file.sync_all());
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(lock_path);
            return Err(e);
        }
        Ok(())
    }

    /// Remove the marker if its mtime is older than `stale_after`.
    ///
    /// Returns true when the caller should retry immediately (the marker was
    /// removed, or vanished between the failed create and this check).
    fn reclaim_if_stale(lock_path: &Path, stale_after: Duration) -> LockResult<bool> {
        let modified = match fs::metadata(lock_path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(LockError::Io(e)),
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < stale_after {
            return Ok(false);
        }

        warn!(
            lock = %lock_path.display(),
            age_secs = age.as_secs(),
            "reclaiming stale cache lock"
        );
        match fs::remove_file(lock_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(LockError::Io(e)),
        }
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        match fs::read_to_string(&self.lock_path) {
            Ok(current) if current == self.owner => {
                if let Err(e) = fs::remove_file(&self.lock_path) {
                    debug!(lock = %self.lock_path.display(), error = %e, "lock marker already gone");
                }
            }
            Ok(_) => {
                warn!(
                    lock = %self.lock_path.display(),
                    "lock marker was reclaimed by another writer, leaving it in place"
                );
            }
            Err(e) => {
                debug!(lock = %self.lock_path.display(), error = %e, "lock marker already gone");
            }
        }
    }
}
