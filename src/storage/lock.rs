//! Cooperative run lock.
//!
//! Overlapping invocations (a slow run still going when cron fires again)
//! would both read the same watermark and publish the same post twice. The
//! lock file serializes them:
//!
//! 1. Acquisition creates `<state>.lock` with create-new semantics; only one
//!    process can succeed.
//! 2. The file records the holder and an expiry. A lock past its expiry was
//!    left by a dead run and is taken over.
//! 3. A live lock is polled until `wait` elapses, then the run fails with
//!    [`AppError::StoreLocked`].
//! 4. Dropping the [`StoreLease`] deletes the file if it is still ours.
//!
//! Removing a lock file (takeover or release) happens only while holding
//! `<state>.lock.takeover`, and only after re-reading the lock under it. A
//! takeover deletes the exact record it judged stale and nothing newer.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

/// Interval between acquisition attempts while another run holds the lock.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Interval between attempts on the takeover guard.
const GUARD_POLL: Duration = Duration::from_millis(10);

/// Guard older than this was left by a crashed run.
const GUARD_TTL: Duration = Duration::from_secs(30);

/// How long a release waits for the guard before leaving the lock to expire.
const RELEASE_PATIENCE: Duration = Duration::from_secs(2);

/// Lock file contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    /// Unique lock holder ID
    pub holder_id: String,

    /// When the lock was acquired
    pub acquired_at: DateTime<Utc>,

    /// When the lock expires
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    fn new(ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52));
        Self {
            holder_id: format!(
                "{}-{}",
                std::process::id(),
                now.timestamp_nanos_opt().unwrap_or_default()
            ),
            acquired_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Exclusive lease on a store for one run.
#[derive(Debug)]
pub struct StoreLease {
    held: Option<(PathBuf, String)>,
}

impl StoreLease {
    /// Lease for backends that need no cross-process coordination.
    pub fn in_process() -> Self {
        Self { held: None }
    }

    /// Lock file backing this lease, if any.
    pub fn path(&self) -> Option<&Path> {
        self.held.as_ref().map(|(path, _)| path.as_path())
    }

    /// Acquire the lock file at `path`.
    pub async fn acquire(path: impl Into<PathBuf>, ttl: Duration, wait: Duration) -> Result<Self> {
        let path = path.into();
        let started = tokio::time::Instant::now();

        loop {
            let info = LockInfo::new(ttl);
            match try_create(&path, &info).await {
                Ok(()) => {
                    log::debug!("Acquired lock {} as {}", path.display(), info.holder_id);
                    return Ok(Self {
                        held: Some((path, info.holder_id)),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(AppError::persistence(&path, e)),
            }

            let Some(observed) = observe(&path).await else {
                // Released between our create and read.
                continue;
            };
            if is_stale(&path, &observed, ttl).await {
                if take_over(&path, &observed, ttl).await? {
                    log::warn!("Took over stale lock {}", path.display());
                }
                continue;
            }

            if started.elapsed() >= wait {
                return Err(AppError::StoreLocked(path.display().to_string()));
            }
            log::info!("Waiting for lock {} held by another run", path.display());
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Drop for StoreLease {
    fn drop(&mut self) {
        let Some((path, holder)) = self.held.take() else {
            return;
        };
        let Some(_guard) = TakeoverGuard::acquire_blocking(&path, RELEASE_PATIENCE) else {
            log::warn!("Lock {} left to expire: takeover guard busy", path.display());
            return;
        };
        let ours = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LockInfo>(&bytes).ok())
            .is_some_and(|info| info.holder_id == holder);
        if ours {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to release lock {}: {}", path.display(), e);
            }
        }
    }
}

async fn try_create(path: &Path, info: &LockInfo) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    let bytes = serde_json::to_vec(info)?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Lock file contents as seen at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    Held(LockInfo),
    Unreadable,
}

/// Read the lock file; `None` when it no longer exists.
async fn observe(path: &Path) -> Option<Observed> {
    let bytes = tokio::fs::read(path).await.ok()?;
    Some(match serde_json::from_slice::<LockInfo>(&bytes) {
        Ok(info) => Observed::Held(info),
        Err(_) => Observed::Unreadable,
    })
}

/// Expired per its own record, or unreadable and older than `ttl`.
async fn is_stale(path: &Path, observed: &Observed, ttl: Duration) -> bool {
    match observed {
        Observed::Held(info) => info.is_expired(Utc::now()),
        // A half-written file from a crashed run: fall back to its age.
        Observed::Unreadable => age(path).is_some_and(|age| age >= ttl),
    }
}

fn age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Remove the lock file if it still holds the stale record `judged`.
///
/// Returns `false` when the file changed since it was judged, e.g. another
/// run already took it over.
async fn take_over(path: &Path, judged: &Observed, ttl: Duration) -> Result<bool> {
    let _guard = loop {
        match TakeoverGuard::try_acquire(path).map_err(|e| AppError::persistence(path, e))? {
            Some(guard) => break guard,
            None => tokio::time::sleep(GUARD_POLL).await,
        }
    };

    let current = observe(path).await;
    if current.as_ref() != Some(judged) || !is_stale(path, judged, ttl).await {
        log::debug!("Lock {} changed since inspected; not taking over", path.display());
        return Ok(false);
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AppError::persistence(path, e)),
    }
}

/// `<lock>.takeover`, serializing every removal of the lock file.
#[derive(Debug)]
struct TakeoverGuard {
    path: PathBuf,
}

impl TakeoverGuard {
    fn path_for(lock_path: &Path) -> PathBuf {
        let mut name = lock_path.file_name().unwrap_or_default().to_os_string();
        name.push(".takeover");
        lock_path.with_file_name(name)
    }

    fn try_acquire(lock_path: &Path) -> std::io::Result<Option<Self>> {
        let path = Self::path_for(lock_path);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Some(Self { path })),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if age(&path).is_some_and(|age| age >= GUARD_TTL) {
                    log::warn!("Removing abandoned takeover guard {}", path.display());
                    let _ = std::fs::remove_file(&path);
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn acquire_blocking(lock_path: &Path, patience: Duration) -> Option<Self> {
        let started = std::time::Instant::now();
        loop {
            match Self::try_acquire(lock_path) {
                Ok(Some(guard)) => return Some(guard),
                Ok(None) if started.elapsed() < patience => std::thread::sleep(GUARD_POLL),
                _ => return None,
            }
        }
    }
}

impl Drop for TakeoverGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn test_acquire_and_release() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json.lock");

        let lease = StoreLease::acquire(&path, TTL, Duration::ZERO).await.unwrap();
        assert!(path.exists());
        assert_eq!(lease.path(), Some(path.as_path()));

        drop(lease);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json.lock");

        let _held = StoreLease::acquire(&path, TTL, Duration::ZERO).await.unwrap();
        let err = StoreLease::acquire(&path, TTL, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreLocked(_)));
        assert_eq!(err.exit_code(), 16);
    }

    #[tokio::test]
    async fn test_released_lock_can_be_reacquired() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json.lock");

        drop(StoreLease::acquire(&path, TTL, Duration::ZERO).await.unwrap());
        assert!(StoreLease::acquire(&path, TTL, Duration::ZERO).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json.lock");

        let stale = LockInfo {
            holder_id: "dead-run".into(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

        let lease = StoreLease::acquire(&path, TTL, Duration::ZERO).await.unwrap();
        let info: LockInfo = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_ne!(info.holder_id, "dead-run");
        drop(lease);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_takeovers_keep_one_holder() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json.lock");

        let stale = LockInfo {
            holder_id: "dead-run".into(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

        // Run B inspects the expired record first...
        let judged_by_b = observe(&path).await.unwrap();
        assert!(is_stale(&path, &judged_by_b, TTL).await);

        // ...run A takes over before B acts on it...
        let lease_a = StoreLease::acquire(&path, TTL, Duration::ZERO).await.unwrap();
        let holder_a = lease_a.held.as_ref().unwrap().1.clone();

        // ...so B must not remove A's fresh lock.
        assert!(!take_over(&path, &judged_by_b, TTL).await.unwrap());
        let info: LockInfo = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(info.holder_id, holder_a);

        let err = StoreLease::acquire(&path, TTL, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreLocked(_)));
        assert!(!TakeoverGuard::path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_takeover_removes_only_the_judged_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json.lock");

        let stale = LockInfo {
            holder_id: "dead-run".into(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();
        let judged = observe(&path).await.unwrap();

        assert!(take_over(&path, &judged, TTL).await.unwrap());
        assert!(!path.exists());
        assert!(!TakeoverGuard::path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_release_waits_out_a_busy_guard() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json.lock");

        let lease = StoreLease::acquire(&path, TTL, Duration::ZERO).await.unwrap();
        let guard = TakeoverGuard::try_acquire(&path).unwrap().unwrap();
        assert!(TakeoverGuard::try_acquire(&path).unwrap().is_none());

        let releaser = std::thread::spawn(move || drop(lease));
        std::thread::sleep(Duration::from_millis(50));
        drop(guard);
        releaser.join().unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_leaves_foreign_lock_alone() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json.lock");

        let lease = StoreLease::acquire(&path, TTL, Duration::ZERO).await.unwrap();
        let foreign = LockInfo::new(TTL);
        std::fs::write(&path, serde_json::to_vec(&foreign).unwrap()).unwrap();

        drop(lease);
        assert!(path.exists());
    }

    #[test]
    fn test_in_process_lease_has_no_file() {
        assert!(StoreLease::in_process().path().is_none());
    }
}
