//! Storage manager for the expiring download area

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::guard::SweepLock;
use crate::storage::names::sanitize_name;
use crate::storage::types::{
    StoredFile, SweepMode, SweepObserver, SweepOutcome, SweepProgress, UsageSummary,
};
use futures::stream::{self, Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Owns the storage root, its TTL and the sweep lock
#[derive(Debug)]
pub struct StorageManager {
    root: PathBuf,
    ttl: Duration,
    sweep_lock: SweepLock,
}

enum ListState {
    Start(PathBuf),
    Reading(fs::ReadDir),
    Done,
}

impl StorageManager {
    /// Open (and create if needed) the storage root
    pub async fn open(root: impl AsRef<Path>, ttl: Duration) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            ttl,
            sweep_lock: SweepLock::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether a sweep currently holds the lock
    pub fn is_sweeping(&self) -> bool {
        self.sweep_lock.is_held()
    }

    /// Absolute path for a stored name, after validation
    pub fn path_for(&self, name: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(sanitize_name(name)?))
    }

    /// Persist a byte stream under `name`
    ///
    /// Data is written to a hidden staging file first and renamed into
    /// place, so readers never observe a partial file. An existing file with
    /// the same name is replaced.
    pub async fn store<R>(&self, name: &str, reader: &mut R) -> StorageResult<StoredFile>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let name = sanitize_name(name)?;
        let target = self.root.join(&name);
        let staging = self
            .root
            .join(format!(".{}.part", uuid::Uuid::new_v4().simple()));

        if let Err(e) = Self::write_staging(&staging, reader).await {
            let _ = fs::remove_file(&staging).await;
            tracing::error!(file = %name, error = %e, "Failed to write upload");
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            tracing::error!(file = %name, error = %e, "Failed to move upload into place");
            return Err(e.into());
        }

        let metadata = fs::metadata(&target).await?;
        let stored = StoredFile {
            name,
            size_bytes: metadata.len(),
            created_at: metadata.modified()?,
        };

        crate::metrics::record_file_stored(stored.size_bytes);
        tracing::info!(
            file = %stored.name,
            bytes = stored.size_bytes,
            path = %target.display(),
            "Uploaded file saved"
        );

        Ok(stored)
    }

    async fn write_staging<R>(staging: &Path, reader: &mut R) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut file = fs::File::create(staging).await?;
        tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Enumerate the regular files currently in the storage root
    ///
    /// The stream is lazy and finite; call again to restart. Hidden entries,
    /// subdirectories and entries whose metadata cannot be read are skipped
    /// with a log line. Failing to read the root itself yields one error.
    pub fn list_active(&self) -> impl Stream<Item = StorageResult<StoredFile>> + Send + 'static {
        stream::unfold(ListState::Start(self.root.clone()), |state| async move {
            let mut entries = match state {
                ListState::Start(root) => match fs::read_dir(&root).await {
                    Ok(entries) => entries,
                    Err(e) => return Some((Err(StorageError::Io(e)), ListState::Done)),
                },
                ListState::Reading(entries) => entries,
                ListState::Done => return None,
            };

            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        if let Some(file) = Self::stored_file(&entry).await {
                            return Some((Ok(file), ListState::Reading(entries)));
                        }
                    }
                    Ok(None) => return None,
                    Err(e) => return Some((Err(StorageError::Io(e)), ListState::Done)),
                }
            }
        })
    }

    async fn stored_file(entry: &fs::DirEntry) -> Option<StoredFile> {
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                tracing::warn!(name = ?raw, "Skipping entry with non UTF-8 name");
                return None;
            }
        };

        if name.starts_with('.') {
            return None;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Skipping unreadable entry");
                return None;
            }
        };

        if !metadata.is_file() {
            tracing::debug!(file = %name, "Skipping non-regular entry");
            return None;
        }

        match metadata.modified() {
            Ok(created_at) => Some(StoredFile {
                name,
                size_bytes: metadata.len(),
                created_at,
            }),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Skipping entry without mtime");
                None
            }
        }
    }

    /// File count and total bytes of the active files
    pub async fn usage_summary(&self) -> StorageResult<UsageSummary> {
        self.list_active()
            .try_fold(UsageSummary::default(), |mut summary, file| async move {
                summary.add(&file);
                Ok(summary)
            })
            .await
    }

    /// Delete expired files (or all files) while holding the sweep lock
    ///
    /// Returns [`SweepOutcome::Skipped`] without touching anything if another
    /// sweep is running. Yields to the runtime after every deletion.
    pub async fn sweep(&self, mode: SweepMode, observer: &dyn SweepObserver) -> SweepOutcome {
        let Some(_guard) = self.sweep_lock.try_acquire() else {
            tracing::warn!(%mode, "Cleanup already running, skipping");
            crate::metrics::record_sweep_skipped();
            return SweepOutcome::Skipped;
        };

        let now = SystemTime::now();
        let ttl = self.ttl;
        let candidates: Vec<StoredFile> = match self
            .list_active()
            .try_filter(|file| {
                futures::future::ready(mode == SweepMode::All || file.is_expired(now, ttl))
            })
            .try_collect()
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(%mode, error = %e, "Cleanup aborted while scanning");
                return SweepOutcome::Aborted {
                    deleted: 0,
                    total: 0,
                    reason: e.to_string(),
                };
            }
        };

        let mut progress = SweepProgress {
            mode,
            total: candidates.len(),
            processed: 0,
            deleted: 0,
        };
        Self::report(observer, &progress).await;

        for file in &candidates {
            if self.delete_one(&file.name).await {
                progress.deleted += 1;
            }
            progress.processed += 1;
            Self::report(observer, &progress).await;

            tokio::task::yield_now().await;
        }

        crate::metrics::record_sweep(mode, progress.deleted);
        if progress.deleted > 0 {
            tracing::info!(%mode, deleted = progress.deleted, total = progress.total, "Cleanup removed files");
        } else {
            tracing::debug!(%mode, total = progress.total, "Cleanup found nothing to delete");
        }

        SweepOutcome::Completed {
            deleted: progress.deleted,
            total: progress.total,
        }
    }

    async fn report(observer: &dyn SweepObserver, progress: &SweepProgress) {
        if let Err(e) = observer.on_progress(progress).await {
            tracing::warn!(error = %e, "Cleanup progress report failed");
        }
    }

    /// Best-effort delete of a single file; returns whether it was removed
    pub async fn delete_one(&self, name: &str) -> bool {
        let path = match self.path_for(name) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Refusing to delete");
                return false;
            }
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(file = %name, "Deleted file");
                true
            }
            Err(e) => {
                tracing::error!(file = %name, error = %e, "Failed to delete file");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{NoopObserver, ObserverError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    async fn test_manager() -> (TempDir, StorageManager) {
        let dir = TempDir::new().unwrap();
        let manager = StorageManager::open(dir.path().join("uploads"), DAY)
            .await
            .unwrap();
        (dir, manager)
    }

    fn write_aged(manager: &StorageManager, name: &str, data: &[u8], age: Duration) {
        let path = manager.root().join(name);
        std::fs::write(&path, data).unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn names(manager: &StorageManager) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(manager.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<SweepProgress>>,
        fail: bool,
    }

    #[async_trait]
    impl SweepObserver for RecordingObserver {
        async fn on_progress(&self, progress: &SweepProgress) -> Result<(), ObserverError> {
            self.seen.lock().push(*progress);
            if self.fail {
                return Err("chat unavailable".into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_and_list() {
        let (_dir, manager) = test_manager().await;

        let mut data: &[u8] = b"%PDF-1.7";
        let stored = manager.store("report.pdf", &mut data).await.unwrap();
        assert_eq!(stored.name, "report.pdf");
        assert_eq!(stored.size_bytes, 8);

        let listed: Vec<StoredFile> = manager.list_active().try_collect().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "report.pdf");

        // No staging leftovers
        assert_eq!(names(&manager), vec!["report.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_store_rejects_traversal() {
        let (_dir, manager) = test_manager().await;

        let mut data: &[u8] = b"x";
        let result = manager.store("../escape.pdf", &mut data).await;
        assert!(matches!(result, Err(StorageError::InvalidName(_))));
        assert!(names(&manager).is_empty());
    }

    #[tokio::test]
    async fn test_store_replaces_existing() {
        let (_dir, manager) = test_manager().await;

        let mut first: &[u8] = b"first";
        manager.store("a.pdf", &mut first).await.unwrap();
        let mut second: &[u8] = b"second!";
        let stored = manager.store("a.pdf", &mut second).await.unwrap();

        assert_eq!(stored.size_bytes, 7);
        assert_eq!(std::fs::read(manager.root().join("a.pdf")).unwrap(), b"second!");
    }

    #[tokio::test]
    async fn test_list_skips_dirs_and_hidden() {
        let (_dir, manager) = test_manager().await;

        std::fs::create_dir(manager.root().join("nested")).unwrap();
        std::fs::write(manager.root().join(".abc.part"), b"partial").unwrap();
        std::fs::write(manager.root().join("kept.png"), b"png").unwrap();

        let listed: Vec<StoredFile> = manager.list_active().try_collect().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "kept.png");

        // Restartable
        let again: Vec<StoredFile> = manager.list_active().try_collect().await.unwrap();
        assert_eq!(again, listed);
    }

    #[tokio::test]
    async fn test_list_missing_root_errors() {
        let (_dir, manager) = test_manager().await;
        std::fs::remove_dir(manager.root()).unwrap();

        let result: StorageResult<Vec<StoredFile>> = manager.list_active().try_collect().await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[tokio::test]
    async fn test_usage_summary() {
        let (_dir, manager) = test_manager().await;

        write_aged(&manager, "a.pdf", &[0u8; 100], Duration::ZERO);
        write_aged(&manager, "b.pdf", &[0u8; 50], Duration::ZERO);

        let summary = manager.usage_summary().await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_bytes, 150);
    }

    #[tokio::test]
    async fn test_sweep_expired_only() {
        let (_dir, manager) = test_manager().await;

        write_aged(&manager, "old.pdf", b"old", Duration::from_secs(25 * 3600));
        write_aged(&manager, "fresh.pdf", b"new", Duration::from_secs(3600));
        write_aged(&manager, "edge.pdf", b"edge", Duration::from_secs(23 * 3600));

        let outcome = manager.sweep(SweepMode::ExpiredOnly, &NoopObserver).await;

        assert_eq!(outcome, SweepOutcome::Completed { deleted: 1, total: 1 });
        assert_eq!(names(&manager), vec!["edge.pdf".to_string(), "fresh.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_all() {
        let (_dir, manager) = test_manager().await;

        write_aged(&manager, "old.pdf", b"old", Duration::from_secs(25 * 3600));
        write_aged(&manager, "fresh.pdf", b"new", Duration::ZERO);
        std::fs::create_dir(manager.root().join("keepdir")).unwrap();

        let outcome = manager.sweep(SweepMode::All, &NoopObserver).await;

        assert_eq!(outcome, SweepOutcome::Completed { deleted: 2, total: 2 });
        assert_eq!(names(&manager), vec!["keepdir".to_string()]);
        assert!(!manager.is_sweeping());
    }

    #[tokio::test]
    async fn test_sweep_reports_progress() {
        let (_dir, manager) = test_manager().await;

        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            write_aged(&manager, name, b"x", Duration::ZERO);
        }

        let observer = RecordingObserver::default();
        manager.sweep(SweepMode::All, &observer).await;

        let seen = observer.seen.lock().clone();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].processed, 0);
        assert_eq!(seen[0].total, 3);
        assert_eq!(seen[3].deleted, 3);
        assert_eq!(seen[3].processed, 3);
    }

    #[tokio::test]
    async fn test_sweep_swallows_observer_errors() {
        let (_dir, manager) = test_manager().await;

        write_aged(&manager, "a.pdf", b"x", Duration::ZERO);
        write_aged(&manager, "b.pdf", b"x", Duration::ZERO);

        let observer = RecordingObserver {
            fail: true,
            ..Default::default()
        };
        let outcome = manager.sweep(SweepMode::All, &observer).await;

        assert_eq!(outcome, SweepOutcome::Completed { deleted: 2, total: 2 });
        assert!(names(&manager).is_empty());
    }

    #[tokio::test]
    async fn test_sweep_skipped_while_running() {
        let (_dir, manager) = test_manager().await;
        write_aged(&manager, "a.pdf", b"x", Duration::ZERO);

        let _held = manager.sweep_lock.try_acquire().unwrap();
        let outcome = manager.sweep(SweepMode::All, &NoopObserver).await;

        assert!(outcome.is_skipped());
        assert_eq!(outcome.deleted(), 0);
        assert_eq!(names(&manager), vec!["a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_aborts_when_root_missing() {
        let (_dir, manager) = test_manager().await;
        std::fs::remove_dir(manager.root()).unwrap();

        let outcome = manager.sweep(SweepMode::All, &NoopObserver).await;
        assert!(matches!(outcome, SweepOutcome::Aborted { deleted: 0, total: 0, .. }));
        assert!(!manager.is_sweeping());
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_exclusive() {
        let (_dir, manager) = test_manager().await;
        for i in 0..50 {
            write_aged(&manager, &format!("f{i}.pdf"), b"x", Duration::ZERO);
        }

        let manager = Arc::new(manager);
        let (first, second) = tokio::join!(
            manager.sweep(SweepMode::All, &NoopObserver),
            manager.sweep(SweepMode::All, &NoopObserver),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|o| o.is_skipped()).count(), 1);
        assert_eq!(outcomes.iter().map(SweepOutcome::deleted).sum::<usize>(), 50);
        assert!(names(&manager).is_empty());
    }

    #[tokio::test]
    async fn test_delete_one_missing_is_not_fatal() {
        let (_dir, manager) = test_manager().await;
        assert!(!manager.delete_one("ghost.pdf").await);
        assert!(!manager.delete_one("../ghost.pdf").await);
    }
}
