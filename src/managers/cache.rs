// Warm instance cache
//
// Keeps recently used AI instances in memory so classification does not
// reload them from disk. The manager only relies on the `InstanceCache`
// contract; `ExpiringInstanceCache` is the bounded default.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::engine::AiInstance;

/// Key -> instance store shared by training and classification
///
/// Keys are family ids. Implementations decide eviction.
pub trait InstanceCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<AiInstance>>;
    fn put(&self, key: String, instance: Arc<AiInstance>);
}

struct Entry {
    instance: Arc<AiInstance>,
    stored_at: Instant,
}

/// Size and age bounded cache
///
/// Entries older than `max_age` are dropped when touched. Inserting past
/// `max_len` evicts the oldest entry.
pub struct ExpiringInstanceCache {
    entries: Mutex<HashMap<String, Entry>>,
    max_len: usize,
    max_age: Duration,
}

impl ExpiringInstanceCache {
    pub fn new(max_len: usize, max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_len: max_len.max(1),
            max_age,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_len, Duration::from_secs(config.max_age_secs))
    }

    /// Live entry count, expired entries excluded
    pub fn len(&self) -> usize {
        let mut entries = self.lock();
        self.purge_expired(&mut entries);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries are replaced whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|poisoned| {
            log::warn!("[InstanceCache] lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn purge_expired(&self, entries: &mut HashMap<String, Entry>) {
        let max_age = self.max_age;
        entries.retain(|_, entry| entry.stored_at.elapsed() < max_age);
    }
}

impl InstanceCache for ExpiringInstanceCache {
    fn get(&self, key: &str) -> Option<Arc<AiInstance>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.max_age => Some(Arc::clone(&entry.instance)),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: String, instance: Arc<AiInstance>) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_len {
            self.purge_expired(&mut entries);
            if entries.len() >= self.max_len {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    tracing::debug!(evicted = %oldest, "instance cache full");
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            Entry {
                instance,
                stored_at: Instant::now(),
            },
        );
    }
}
