use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, SystemTime};

/// A file in the expiring area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Unique within the storage root; doubles as the public link token
    pub name: String,

    pub size_bytes: u64,

    /// Last modification time of the file on disk
    pub created_at: SystemTime,
}

impl StoredFile {
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_at).unwrap_or(Duration::ZERO)
    }

    /// Strictly older than the TTL
    pub fn is_expired(&self, now: SystemTime, ttl: Duration) -> bool {
        self.age(now) > ttl
    }
}

/// Aggregate over the active files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSummary {
    pub count: u64,
    pub total_bytes: u64,
}

impl UsageSummary {
    pub fn add(&mut self, file: &StoredFile) {
        self.count += 1;
        self.total_bytes += file.size_bytes;
    }

    /// Total size in megabytes, rounded to two decimals
    pub fn total_mb(&self) -> f64 {
        (self.total_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

impl fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} files, {:.2} MB", self.count, self.total_mb())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Delete files older than the TTL
    ExpiredOnly,
    /// Delete every file regardless of age
    All,
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepMode::ExpiredOnly => write!(f, "expired-only"),
            SweepMode::All => write!(f, "all"),
        }
    }
}

/// Snapshot of a running sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    pub mode: SweepMode,
    pub total: usize,
    pub processed: usize,
    pub deleted: usize,
}

impl SweepProgress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        (self.processed * 100 / self.total) as u32
    }
}

/// How a sweep ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Ran to the end; `deleted` may be lower than `total` if single deletes failed
    Completed { deleted: usize, total: usize },

    /// Another sweep was already running; nothing was deleted
    Skipped,

    /// An error terminated the sweep early
    Aborted {
        deleted: usize,
        total: usize,
        reason: String,
    },
}

impl SweepOutcome {
    pub fn deleted(&self) -> usize {
        match self {
            SweepOutcome::Completed { deleted, .. } | SweepOutcome::Aborted { deleted, .. } => {
                *deleted
            }
            SweepOutcome::Skipped => 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SweepOutcome::Skipped)
    }
}

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives sweep progress: once at start, then after every deletion
///
/// Errors are logged by the sweep and never abort it.
#[async_trait]
pub trait SweepObserver: Send + Sync {
    async fn on_progress(&self, progress: &SweepProgress) -> Result<(), ObserverError>;
}

/// Observer for sweeps nobody is watching
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

#[async_trait]
impl SweepObserver for NoopObserver {
    async fn on_progress(&self, _progress: &SweepProgress) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Human-readable byte count, e.g. `1.50 GB`
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
