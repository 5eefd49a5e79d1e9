#![forbid(unsafe_code)]

//! Bounded LRU map of context ID → page.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::component::ComponentRef;

/// One of a session's two page caches.
///
/// A capacity of `0` disables the cache: inserts are dropped and lookups
/// miss.
pub struct PageCache {
    cache: Option<LruCache<String, ComponentRef>>,
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("capacity", &self.capacity())
            .field("keys", &self.keys())
            .finish()
    }
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Store `page` as most recently used. Returns the evicted entry, if
    /// the insert pushed one out.
    pub fn insert(&mut self, context_id: &str, page: ComponentRef) -> Option<(String, ComponentRef)> {
        let cache = self.cache.as_mut()?;
        match cache.push(context_id.to_owned(), page) {
            Some((key, old)) if key != context_id => Some((key, old)),
            _ => None,
        }
    }

    /// Look up and mark most recently used.
    pub fn restore(&mut self, context_id: &str) -> Option<ComponentRef> {
        self.cache.as_mut()?.get(context_id).cloned()
    }

    /// Membership test that leaves recency untouched.
    pub fn contains(&self, context_id: &str) -> bool {
        self.cache.as_ref().is_some_and(|c| c.contains(context_id))
    }

    pub fn remove(&mut self, context_id: &str) -> Option<ComponentRef> {
        self.cache.as_mut()?.pop(context_id)
    }

    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.cap().get())
    }

    pub fn clear(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    /// Context IDs, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.cache
            .as_ref()
            .map(|c| c.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use woframe_core::Response;

    use super::*;
    use crate::component::ComponentDefinition;
    use crate::context::Context;
    use crate::element::Element;

    #[derive(Debug)]
    struct Empty;

    impl Element for Empty {
        fn append_to_response(&self, _: &mut Response, _: &mut Context) -> crate::Result<()> {
            Ok(())
        }
    }

    fn page() -> ComponentRef {
        Arc::new(ComponentDefinition::new("Page", Arc::new(Empty))).instantiate(None)
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = PageCache::new(2);
        assert!(cache.insert("a", page()).is_none());
        assert!(cache.insert("b", page()).is_none());
        let evicted = cache.insert("c", page()).map(|(k, _)| k);
        assert_eq!(evicted.as_deref(), Some("a"));
        assert_eq!(cache.keys(), vec!["c".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn restore_refreshes_recency() {
        let mut cache = PageCache::new(2);
        cache.insert("a", page());
        cache.insert("b", page());
        assert!(cache.restore("a").is_some());
        let evicted = cache.insert("c", page()).map(|(k, _)| k);
        assert_eq!(evicted.as_deref(), Some("b"), "hit on 'a' should make 'b' the victim");
        assert!(cache.contains("a"));
    }

    #[test]
    fn contains_does_not_touch_recency() {
        let mut cache = PageCache::new(2);
        cache.insert("a", page());
        cache.insert("b", page());
        assert!(cache.contains("a"));
        let evicted = cache.insert("c", page()).map(|(k, _)| k);
        assert_eq!(evicted.as_deref(), Some("a"));
    }

    #[test]
    fn reinsert_same_key_is_not_an_eviction() {
        let mut cache = PageCache::new(1);
        let first = page();
        let second = page();
        cache.insert("a", first);
        assert!(cache.insert("a", second.clone()).is_none());
        assert!(cache.restore("a").is_some_and(|p| p.ptr_eq(&second)));
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let mut cache = PageCache::new(0);
        assert!(cache.insert("a", page()).is_none());
        assert!(cache.restore("a").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 0);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(capacity in 1usize..6, ids in proptest::collection::vec(0u8..12, 0..40)) {
            let mut cache = PageCache::new(capacity);
            for id in ids {
                cache.insert(&id.to_string(), page());
                prop_assert!(cache.len() <= capacity);
            }
        }

        #[test]
        fn victim_is_oldest_untouched(capacity in 1usize..6) {
            let mut cache = PageCache::new(capacity);
            for id in 0..capacity {
                cache.insert(&id.to_string(), page());
            }
            // touch the oldest entry, the second oldest becomes the victim
            cache.restore("0");
            let evicted = cache.insert("new", page()).map(|(k, _)| k);
            let expected = if capacity == 1 { "0".to_owned() } else { "1".to_owned() };
            prop_assert_eq!(evicted, Some(expected));
        }
    }
}
