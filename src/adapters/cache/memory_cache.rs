use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::{error, warn};

use crate::ports::cache::SnapshotCache;

const FALLBACK_CAPACITY: NonZeroUsize = NonZeroUsize::new(100).unwrap();

struct Snapshot {
    json: String,
    expires_at: Instant,
}

impl Snapshot {
    fn is_fresh(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// In-process LRU of serialized availability snapshots, one entry per key
/// (`availabilities:{id}`, `active:{id}`), each with its own TTL.
pub struct MemoryCache {
    snapshots: RwLock<LruCache<String, Snapshot>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or_else(|| {
            warn!(fallback = FALLBACK_CAPACITY.get(), "Cache max_entries was 0");
            FALLBACK_CAPACITY
        });
        Self {
            snapshots: RwLock::new(LruCache::new(capacity)),
        }
    }
}

impl SnapshotCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let Ok(mut snapshots) = self.snapshots.write() else {
            error!(key, "Snapshot cache lock poisoned, treating as miss");
            return None;
        };
        if snapshots.get(key)?.is_fresh(Instant::now()) {
            return snapshots.get(key).map(|s| s.json.clone());
        }
        snapshots.pop(key);
        None
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        let Ok(mut snapshots) = self.snapshots.write() else {
            error!(key, "Snapshot cache lock poisoned, skipping write");
            return;
        };
        snapshots.put(
            key.to_string(),
            Snapshot {
                json: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn invalidate(&self, key: &str) {
        match self.snapshots.write() {
            Ok(mut snapshots) => {
                snapshots.pop(key);
            }
            Err(_) => error!(key, "Snapshot cache lock poisoned, cannot invalidate"),
        }
    }
}
