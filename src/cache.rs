use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct CachedPage {
    stored_at: Instant,
    body: String,
}

/// Process-wide cache of rendered pages, keyed by the caller (the index uses
/// the resolved page number plus the viewer). Entries expire `ttl` after
/// being stored.
pub struct PageCache {
    ttl: Duration,
    pages: Mutex<HashMap<String, CachedPage>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> PageCache {
        PageCache {
            ttl,
            pages: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut pages = self.lock();
        let fresh = match pages.get(key) {
            Some(page) => page.stored_at.elapsed() < self.ttl,
            None => return None,
        };
        if fresh {
            pages.get(key).map(|page| page.body.clone())
        } else {
            pages.remove(key);
            None
        }
    }

    /// Stores `body` under `key`, dropping every entry that has expired.
    pub fn insert(&self, key: String, body: String) {
        let page = CachedPage {
            stored_at: Instant::now(),
            body,
        };
        let mut pages = self.lock();
        let ttl = self.ttl;
        pages.retain(|_, cached| cached.stored_at.elapsed() < ttl);
        pages.insert(key, page);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedPage>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_stored_page_until_cleared() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.insert("/".to_string(), "<p>first</p>".to_string());

        assert_eq!(cache.get("/"), Some("<p>first</p>".to_string()));
        assert_eq!(cache.get("/?page=2"), None);

        cache.clear();
        assert_eq!(cache.get("/"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = PageCache::new(Duration::ZERO);
        cache.insert("/".to_string(), "stale".to_string());

        assert_eq!(cache.get("/"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.insert("/".to_string(), "old".to_string());
        cache.insert("/".to_string(), "new".to_string());

        assert_eq!(cache.get("/").as_deref(), Some("new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_evicts_expired_entries() {
        let cache = PageCache::new(Duration::ZERO);
        for n in 0..50 {
            cache.insert(format!("index:{}#0", n), "page".to_string());
        }
        assert_eq!(cache.len(), 1);
    }
}
