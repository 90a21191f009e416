use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use traymon_frame::Snapshot;

/// Single-slot, latest-value-wins holder for one [`Snapshot`].
///
/// Cloning the cache clones the handle, not the value: every clone sees the
/// same slot. Readers get a copy, so a snapshot is never observed half-written.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held snapshot.
    pub fn set(&self, snapshot: Snapshot) {
        *self.lock() = Some(snapshot);
    }

    /// Copy of the held snapshot, or `None` if nothing was set yet.
    pub fn get(&self) -> Option<Snapshot> {
        self.lock().clone()
    }

    /// Whether no snapshot has been set (or the cache was cleared).
    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    /// Drop the held snapshot.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    // The slot always holds a whole value, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<Snapshot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_until_set() {
        let cache = SnapshotCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn get_returns_last_set() {
        let cache = SnapshotCache::new();
        let first = Snapshot::new("10:00", 5, 10, 40);
        let second = Snapshot::new("10:01", 6, 10, 41);

        cache.set(first.clone());
        assert_eq!(cache.get(), Some(first));
        cache.set(second.clone());
        assert_eq!(cache.get(), Some(second.clone()));
        assert_eq!(cache.get(), Some(second));
    }

    #[test]
    fn clones_share_the_slot() {
        let writer = SnapshotCache::new();
        let reader = writer.clone();
        writer.set(Snapshot::placeholder("08:15"));
        assert_eq!(reader.get().map(|s| s.time), Some("08:15".to_string()));

        reader.clear();
        assert!(writer.is_empty());
    }

    #[test]
    fn concurrent_readers_see_whole_values() {
        let cache = SnapshotCache::new();
        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for n in 0..=100u8 {
                    cache.set(Snapshot::new(format!("{n:02}:{n:02}"), n, n, i32::from(n)));
                }
            })
        };

        for _ in 0..1000 {
            if let Some(s) = cache.get() {
                assert_eq!(s.cpu_load, s.volume);
                assert_eq!(i32::from(s.cpu_load), s.cpu_temp);
                assert_eq!(s.time, format!("{:02}:{:02}", s.cpu_load, s.cpu_load));
            }
        }
        writer.join().unwrap();
        assert_eq!(cache.get().map(|s| s.cpu_load), Some(100));
    }

    #[test]
    fn survives_poisoned_lock() {
        let cache = SnapshotCache::new();
        cache.set(Snapshot::placeholder("01:02"));

        let poisoner = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();

        assert_eq!(cache.get().map(|s| s.time), Some("01:02".to_string()));
    }
}
