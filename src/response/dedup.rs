use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Remembers the most recent tweet ids.
///
/// Ids are only ever inserted and tested, never promoted, so eviction is strictly
/// first-in-first-out: once the cache is full, the oldest id is forgotten and will count as
/// unique again if it is seen a second time.
#[derive(Debug)]
pub struct Dedup {
    seen: LruCache<String, ()>,
}

pub type SharedDedup = Arc<Mutex<Dedup>>;

impl Dedup {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
        }
    }

    pub fn shared(capacity: usize) -> SharedDedup {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Records `id`, returning `true` if it was not already remembered.
    pub fn check(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            false
        } else {
            self.seen.put(id.to_string(), ());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn recover(poisoned: PoisonError<MutexGuard<Self>>) -> MutexGuard<Self> {
        log::error!("{}", &poisoned);
        poisoned.into_inner()
    }
}
