use std::sync::atomic::{AtomicBool, Ordering};

/// Mutual-exclusion token for sweeps
///
/// At most one [`SweepGuard`] exists per lock. The flag is cleared when the
/// guard drops, on every exit path of the holder.
#[derive(Debug, Default)]
pub struct SweepLock {
    running: AtomicBool,
}

impl SweepLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or `None` if a sweep is already running
    pub fn try_acquire(&self) -> Option<SweepGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepGuard { lock: self })
    }

    pub fn is_held(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SweepGuard<'a> {
    lock: &'a SweepLock,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.lock.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_holder() {
        let lock = SweepLock::new();

        let guard = lock.try_acquire().expect("first acquire succeeds");
        assert!(lock.is_held());
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let lock = SweepLock::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.try_acquire().unwrap();
            panic!("sweep blew up");
        }));

        assert!(result.is_err());
        assert!(!lock.is_held());
    }
}
