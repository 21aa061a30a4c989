// ── Reactive keyed collection ──
//
// Concurrent storage with O(1) lookups and push-based change
// notification via `watch` channels.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

/// A concurrent, reactive collection keyed by `K`.
///
/// Every mutation bumps a version counter and rebuilds the snapshot that
/// subscribers receive. Snapshots are ordered by key.
pub(crate) struct Collection<K, T>
where
    K: Eq + Hash + Ord + Clone,
    T: Send + Sync + 'static,
{
    by_key: DashMap<K, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> Collection<K, T>
where
    K: Eq + Hash + Ord + Clone,
    T: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Create the entry from `create` or rewrite it with `update`.
    ///
    /// Returns the stored value and `true` if the key was new. The shard
    /// lock is held only while the closure runs.
    pub(crate) fn upsert_with(
        &self,
        key: K,
        create: impl FnOnce() -> T,
        update: impl FnOnce(&T) -> T,
    ) -> (Arc<T>, bool) {
        let (stored, is_new) = match self.by_key.entry(key) {
            Entry::Occupied(mut occupied) => {
                let next = Arc::new(update(occupied.get()));
                occupied.insert(Arc::clone(&next));
                (next, false)
            }
            Entry::Vacant(vacant) => {
                let next = Arc::new(create());
                vacant.insert(Arc::clone(&next));
                (next, true)
            }
        };

        self.rebuild_snapshot();
        self.bump_version();

        (stored, is_new)
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(K, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn put(col: &Collection<u32, String>, key: u32, value: &str) -> bool {
        let value = value.to_owned();
        let replacement = value.clone();
        col.upsert_with(key, move || value, move |_| replacement).1
    }

    #[test]
    fn upsert_reports_new_keys() {
        let col = Collection::new();
        assert!(put(&col, 1, "hello"));
        assert!(!put(&col, 1, "world"));
        assert_eq!(*col.get(&1).unwrap(), "world");
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn update_sees_previous_value() {
        let col: Collection<u32, Vec<u8>> = Collection::new();
        col.upsert_with(1, || vec![1], |_| unreachable!());
        let (stored, is_new) = col.upsert_with(
            1,
            || unreachable!(),
            |prev| {
                let mut next = prev.clone();
                next.push(2);
                next
            },
        );
        assert!(!is_new);
        assert_eq!(*stored, vec![1, 2]);
    }

    #[test]
    fn snapshot_is_sorted_and_versioned() {
        let col = Collection::new();
        assert!(col.is_empty());
        assert_eq!(col.version(), 0);

        put(&col, 3, "c");
        put(&col, 1, "a");
        put(&col, 2, "b");

        let snap: Vec<String> = col.snapshot().iter().map(|s| (**s).clone()).collect();
        assert_eq!(snap, ["a", "b", "c"]);
        assert_eq!(col.version(), 3);
    }

    #[test]
    fn subscribers_see_mutations() {
        let col = Collection::new();
        let mut rx = col.subscribe();
        assert!(!rx.has_changed().unwrap());

        put(&col, 1, "x");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
        assert!(col.contains(&1));
    }
}
