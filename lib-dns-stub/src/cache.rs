//! Answer caching.
//!
//! Two variants share one trait: [`Cache`] is a plain map swept of
//! expired entries on a timer, [`LruCache`] is bounded and evicts the
//! least recently used answers.  Both guard everything - map, links,
//! statistics - with a single mutex, so every externally callable
//! method takes the lock exactly once.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use priority_queue::PriorityQueue;

use dns_wire::message::types::{RdataClass, RdataType};
use dns_wire::name::Name;

use crate::answer::Answer;

/// What answers are indexed by.
pub type CacheKey = (Name, RdataType, RdataClass);

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

/// Hit and miss counts.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
}

/// The caching capability the resolver consumes.  Lookup failure is
/// not an error: a miss is a normal outcome.
pub trait AnswerCache: Send + Sync {
    /// Get an unexpired answer.
    fn get(&self, key: &CacheKey) -> Option<Answer>;

    /// Insert an answer, replacing any previous one.
    fn put(&self, key: CacheKey, answer: Answer);

    /// Drop one entry, or everything.
    fn flush(&self, key: Option<&CacheKey>);

    /// A consistent snapshot of the statistics, taken under the lock.
    fn statistics(&self) -> CacheStatistics;

    /// Zero the statistics.
    fn reset_statistics(&self);
}

/// Simple thread-safe DNS answer cache.
///
/// Expired entries are dropped opportunistically: once the cleaning
/// interval has passed, the next operation sweeps everything whose
/// expiration is behind the clock, cheapest-first via a priority
/// queue keyed on expiration time.
#[derive(Debug)]
pub struct Cache {
    inner: Mutex<CacheInner>,
    cleaning_interval: Duration,
}

#[derive(Debug)]
struct CacheInner {
    data: HashMap<CacheKey, Answer>,
    expiry_priority: PriorityQueue<CacheKey, Reverse<SystemTime>>,
    next_cleaning: SystemTime,
    statistics: CacheStatistics,
}

impl Cache {
    pub fn new() -> Self {
        Self::with_cleaning_interval(Duration::from_secs(300))
    }

    pub fn with_cleaning_interval(cleaning_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                data: HashMap::new(),
                expiry_priority: PriorityQueue::new(),
                next_cleaning: SystemTime::now() + cleaning_interval,
                statistics: CacheStatistics::default(),
            }),
            cleaning_interval,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInner {
    fn maybe_clean(&mut self, now: SystemTime, cleaning_interval: Duration) {
        if self.next_cleaning > now {
            return;
        }
        loop {
            let expired = matches!(
                self.expiry_priority.peek(),
                Some((_, Reverse(expiration))) if *expiration <= now
            );
            if !expired {
                break;
            }
            if let Some((key, _)) = self.expiry_priority.pop() {
                self.data.remove(&key);
            }
        }
        self.next_cleaning = now + cleaning_interval;
    }
}

impl AnswerCache for Cache {
    fn get(&self, key: &CacheKey) -> Option<Answer> {
        let now = SystemTime::now();
        let mut inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        let inner = &mut *inner;
        inner.maybe_clean(now, self.cleaning_interval);
        match inner.data.get(key) {
            Some(answer) if !answer.is_expired(now) => {
                let answer = answer.clone();
                inner.statistics.hits += 1;
                Some(answer)
            }
            _ => {
                inner.statistics.misses += 1;
                None
            }
        }
    }

    fn put(&self, key: CacheKey, answer: Answer) {
        let now = SystemTime::now();
        let mut inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        inner.maybe_clean(now, self.cleaning_interval);
        inner
            .expiry_priority
            .push(key.clone(), Reverse(answer.expiration));
        inner.data.insert(key, answer);
    }

    fn flush(&self, key: Option<&CacheKey>) {
        let mut inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        match key {
            Some(key) => {
                inner.data.remove(key);
                inner.expiry_priority.remove(key);
            }
            None => {
                inner.data.clear();
                inner.expiry_priority.clear();
                inner.next_cleaning = SystemTime::now() + self.cleaning_interval;
            }
        }
    }

    fn statistics(&self) -> CacheStatistics {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).statistics
    }

    fn reset_statistics(&self) {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).statistics = CacheStatistics::default();
    }
}

/// Thread-safe, bounded, least-recently-used DNS answer cache.
///
/// Better than [`Cache`] for processes doing a lot of resolutions: a
/// crawler never grows this past `max_size` answers.  Nodes live in a
/// slab indexed by position and are linked into a circular list
/// through a sentinel, most recently used first.
#[derive(Debug)]
pub struct LruCache {
    inner: Mutex<LruInner>,
    max_size: usize,
}

const SENTINEL: usize = 0;

#[derive(Debug)]
struct LruInner {
    data: HashMap<CacheKey, usize>,
    nodes: Vec<LruNode>,
    free: Vec<usize>,
    statistics: CacheStatistics,
}

#[derive(Debug)]
struct LruNode {
    key: Option<CacheKey>,
    value: Option<Answer>,
    hits: u64,
    prev: usize,
    next: usize,
}

impl LruCache {
    pub fn new() -> Self {
        Self::with_max_size(100_000)
    }

    /// Panics:
    ///
    /// - If called with a `max_size` of 0.
    pub fn with_max_size(max_size: usize) -> Self {
        assert!(max_size > 0, "cannot create a zero-size cache");
        Self {
            inner: Mutex::new(LruInner {
                data: HashMap::with_capacity(max_size.min(4096)),
                nodes: vec![LruNode {
                    key: None,
                    value: None,
                    hits: 0,
                    prev: SENTINEL,
                    next: SENTINEL,
                }],
                free: Vec::new(),
                statistics: CacheStatistics::default(),
            }),
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How often this key has been hit since it was inserted.
    pub fn hits_for_key(&self, key: &CacheKey) -> u64 {
        let inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        match inner.data.get(key) {
            Some(&index) => inner.nodes[index].hits,
            None => 0,
        }
    }

    /// The keys from most to least recently used.  Test and
    /// diagnostic aid.
    pub fn keys_by_recency(&self) -> Vec<CacheKey> {
        let inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        let mut out = Vec::with_capacity(inner.data.len());
        let mut at = inner.nodes[SENTINEL].next;
        while at != SENTINEL {
            if let Some(key) = &inner.nodes[at].key {
                out.push(key.clone());
            }
            at = inner.nodes[at].next;
        }
        out
    }
}

impl Default for LruCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LruInner {
    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_front(&mut self, index: usize) {
        let first = self.nodes[SENTINEL].next;
        self.nodes[index].prev = SENTINEL;
        self.nodes[index].next = first;
        self.nodes[first].prev = index;
        self.nodes[SENTINEL].next = index;
    }

    fn move_to_front(&mut self, index: usize) {
        self.unlink(index);
        self.link_front(index);
    }

    fn delete_node(&mut self, index: usize) {
        self.unlink(index);
        if let Some(key) = self.nodes[index].key.take() {
            self.data.remove(&key);
        }
        self.nodes[index].value = None;
        self.nodes[index].hits = 0;
        self.free.push(index);
    }

    fn remove_least_recently_used(&mut self) {
        let tail = self.nodes[SENTINEL].prev;
        if tail != SENTINEL {
            self.delete_node(tail);
        }
    }

    fn insert_front(&mut self, key: CacheKey, answer: Answer) {
        let node = LruNode {
            key: Some(key.clone()),
            value: Some(answer),
            hits: 0,
            prev: SENTINEL,
            next: SENTINEL,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.link_front(index);
        self.data.insert(key, index);
    }
}

impl AnswerCache for LruCache {
    fn get(&self, key: &CacheKey) -> Option<Answer> {
        let now = SystemTime::now();
        let mut inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        let inner = &mut *inner;
        let Some(&index) = inner.data.get(key) else {
            inner.statistics.misses += 1;
            return None;
        };
        let expired = match &inner.nodes[index].value {
            Some(answer) => answer.is_expired(now),
            None => true,
        };
        if expired {
            inner.delete_node(index);
            inner.statistics.misses += 1;
            return None;
        }
        inner.nodes[index].hits += 1;
        inner.move_to_front(index);
        inner.statistics.hits += 1;
        inner.nodes[index].value.clone()
    }

    fn put(&self, key: CacheKey, answer: Answer) {
        let mut inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        let inner = &mut *inner;
        if let Some(&index) = inner.data.get(&key) {
            inner.nodes[index].value = Some(answer);
            inner.nodes[index].hits += 1;
            inner.move_to_front(index);
            return;
        }
        while inner.data.len() >= self.max_size {
            inner.remove_least_recently_used();
        }
        inner.insert_front(key, answer);
    }

    fn flush(&self, key: Option<&CacheKey>) {
        let mut inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        let inner = &mut *inner;
        match key {
            Some(key) => {
                if let Some(&index) = inner.data.get(key) {
                    inner.delete_node(index);
                }
            }
            None => {
                inner.data.clear();
                inner.nodes.truncate(1);
                inner.nodes[SENTINEL].prev = SENTINEL;
                inner.nodes[SENTINEL].next = SENTINEL;
                inner.free.clear();
            }
        }
    }

    fn statistics(&self) -> CacheStatistics {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).statistics
    }

    fn reset_statistics(&self) {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).statistics = CacheStatistics::default();
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn cache_put_then_get() {
        let cache = Cache::new();
        cache.put(key("www.example.com."), answer_with_ttl("www.example.com.", 300));

        let got = cache.get(&key("www.example.com.")).unwrap();
        assert_eq!(key("www.example.com.").0, got.qname);
        assert_eq!(CacheStatistics { hits: 1, misses: 0 }, cache.statistics());
    }

    #[test]
    fn cache_get_is_case_insensitive() {
        let cache = Cache::new();
        cache.put(key("www.example.com."), answer_with_ttl("www.example.com.", 300));
        assert!(cache.get(&key("WWW.EXAMPLE.COM.")).is_some());
    }

    #[test]
    fn cache_expired_entries_are_misses() {
        let cache = Cache::new();
        cache.put(key("gone.example."), expired_answer("gone.example."));

        assert!(cache.get(&key("gone.example.")).is_none());
        assert_eq!(CacheStatistics { hits: 0, misses: 1 }, cache.statistics());
    }

    #[test]
    fn cache_sweep_drops_expired_entries() {
        let cache = Cache::with_cleaning_interval(Duration::from_secs(0));
        cache.put(key("gone.example."), expired_answer("gone.example."));
        cache.put(key("kept.example."), answer_with_ttl("kept.example.", 300));

        // interval of zero: the next operation sweeps
        let _ = cache.get(&key("kept.example."));
        assert_eq!(1, cache.len());
    }

    #[test]
    fn cache_flush_one_and_all() {
        let cache = Cache::new();
        cache.put(key("a.example."), answer_with_ttl("a.example.", 300));
        cache.put(key("b.example."), answer_with_ttl("b.example.", 300));

        cache.flush(Some(&key("a.example.")));
        assert!(cache.get(&key("a.example.")).is_none());
        assert!(cache.get(&key("b.example.")).is_some());

        cache.flush(None);
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_put_overwrites() {
        let cache = Cache::new();
        cache.put(key("www.example.com."), answer_with_ttl("www.example.com.", 10));
        cache.put(key("www.example.com."), answer_with_ttl("www.example.com.", 300));
        assert_eq!(1, cache.len());
    }

    #[test]
    fn cache_statistics_snapshot_and_reset() {
        let cache = Cache::new();
        cache.put(key("a.example."), answer_with_ttl("a.example.", 300));
        let _ = cache.get(&key("a.example."));
        let _ = cache.get(&key("missing.example."));
        assert_eq!(CacheStatistics { hits: 1, misses: 1 }, cache.statistics());
        cache.reset_statistics();
        assert_eq!(CacheStatistics::default(), cache.statistics());
    }

    #[test]
    fn lru_put_then_get() {
        let cache = LruCache::new();
        cache.put(key("www.example.com."), answer_with_ttl("www.example.com.", 300));
        assert!(cache.get(&key("www.example.com.")).is_some());
        assert_eq!(CacheStatistics { hits: 1, misses: 0 }, cache.statistics());
    }

    #[test]
    fn lru_size_never_exceeds_max() {
        let cache = LruCache::with_max_size(3);
        for i in 0..10 {
            let owner = format!("host{i}.example.");
            cache.put(key(&owner), answer_with_ttl(&owner, 300));
            assert!(cache.len() <= 3);
        }
        assert_eq!(3, cache.len());
    }

    #[test]
    fn lru_eviction_removes_least_recently_used() {
        let cache = LruCache::with_max_size(2);
        cache.put(key("a.example."), answer_with_ttl("a.example.", 300));
        cache.put(key("b.example."), answer_with_ttl("b.example.", 300));
        let _ = cache.get(&key("a.example."));
        cache.put(key("c.example."), answer_with_ttl("c.example.", 300));

        assert!(cache.get(&key("a.example.")).is_some());
        assert!(cache.get(&key("b.example.")).is_none());
        assert!(cache.get(&key("c.example.")).is_some());
    }

    #[test]
    fn lru_order_is_most_recently_used_first() {
        let cache = LruCache::with_max_size(10);
        cache.put(key("a.example."), answer_with_ttl("a.example.", 300));
        cache.put(key("b.example."), answer_with_ttl("b.example.", 300));
        cache.put(key("c.example."), answer_with_ttl("c.example.", 300));
        assert_eq!(
            vec![key("c.example."), key("b.example."), key("a.example.")],
            cache.keys_by_recency()
        );

        let _ = cache.get(&key("a.example."));
        assert_eq!(
            vec![key("a.example."), key("c.example."), key("b.example.")],
            cache.keys_by_recency()
        );

        cache.put(key("b.example."), answer_with_ttl("b.example.", 600));
        assert_eq!(
            vec![key("b.example."), key("a.example."), key("c.example.")],
            cache.keys_by_recency()
        );
    }

    #[test]
    fn lru_expired_entries_are_evicted_on_get() {
        let cache = LruCache::new();
        cache.put(key("gone.example."), expired_answer("gone.example."));
        assert!(cache.get(&key("gone.example.")).is_none());
        assert!(cache.is_empty());
        assert_eq!(CacheStatistics { hits: 0, misses: 1 }, cache.statistics());
    }

    #[test]
    fn lru_hit_counting_per_key() {
        let cache = LruCache::new();
        cache.put(key("a.example."), answer_with_ttl("a.example.", 300));
        let _ = cache.get(&key("a.example."));
        let _ = cache.get(&key("a.example."));
        assert_eq!(2, cache.hits_for_key(&key("a.example.")));
        assert_eq!(0, cache.hits_for_key(&key("missing.example.")));
    }

    #[test]
    fn lru_flush_one_and_all() {
        let cache = LruCache::new();
        cache.put(key("a.example."), answer_with_ttl("a.example.", 300));
        cache.put(key("b.example."), answer_with_ttl("b.example.", 300));

        cache.flush(Some(&key("a.example.")));
        assert_eq!(1, cache.len());
        assert_eq!(vec![key("b.example.")], cache.keys_by_recency());

        cache.flush(None);
        assert!(cache.is_empty());
        assert!(cache.keys_by_recency().is_empty());
    }

    #[test]
    fn lru_node_slots_are_reused() {
        let cache = LruCache::with_max_size(2);
        for i in 0..20 {
            let owner = format!("host{i}.example.");
            cache.put(key(&owner), answer_with_ttl(&owner, 300));
        }
        let inner = cache.inner.lock().unwrap();
        // sentinel + at most max_size live nodes + parked free slots
        assert!(inner.nodes.len() <= 1 + 2 + 1);
    }

    #[test]
    #[should_panic(expected = "zero-size cache")]
    fn lru_zero_size_is_refused() {
        let _ = LruCache::with_max_size(0);
    }

    #[test]
    fn caches_share_a_trait_object() {
        let caches: Vec<Box<dyn AnswerCache>> =
            vec![Box::new(Cache::new()), Box::new(LruCache::new())];
        for cache in caches {
            cache.put(key("a.example."), answer_with_ttl("a.example.", 300));
            assert!(cache.get(&key("a.example.")).is_some());
        }
    }
}
