//! Expiring file storage
//!
//! Files live as plain entries in a single directory. The file name is
//! both the storage key and the public link token. A TTL sweep evicts
//! entries older than the configured lifetime; only one sweep may run at a
//! time per [`StorageManager`].

mod error;
mod guard;
mod link;
mod manager;
mod names;
mod types;

pub use error::{StorageError, StorageResult};
pub use guard::{SweepGuard, SweepLock};
pub use link::{expires_at, format_expiry, public_link};
pub use manager::StorageManager;
pub use names::{sanitize_name, MAX_NAME_LEN};
pub use types::{
    human_size, NoopObserver, ObserverError, StoredFile, SweepMode, SweepObserver,
    SweepOutcome, SweepProgress, UsageSummary,
};
