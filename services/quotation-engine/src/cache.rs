//! Summary Cache
//!
//! In-process TTL cache for process summaries, invalidated per process on
//! every import or manual edit.
//!
//! Each process carries a generation bumped by every invalidation. A summary
//! is only stored under the generation it was computed from, so a slow read
//! that races an import cannot put pre-import figures back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use cotiza_models::ProcessSummary;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub struct SummaryCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<Uuid, (Instant, ProcessSummary)>>,
    generations: RwLock<HashMap<Uuid, u64>>,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
            generations: RwLock::new(HashMap::new()),
        }
    }

    /// A zero TTL turns every call into a no-op.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Get a fresh summary for the process
    pub async fn get(&self, process_id: Uuid) -> Option<ProcessSummary> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.read().await;
        let (stored_at, summary) = entries.get(&process_id)?;
        (self.clock.now().duration_since(*stored_at) < self.ttl).then(|| summary.clone())
    }

    /// Current generation of a process; capture it before reading the store.
    pub async fn generation(&self, process_id: Uuid) -> u64 {
        self.generations
            .read()
            .await
            .get(&process_id)
            .copied()
            .unwrap_or(0)
    }

    /// Store a summary computed at `generation`. Returns false when the
    /// process was invalidated since, leaving the cache untouched.
    pub async fn insert(&self, process_id: Uuid, generation: u64, summary: ProcessSummary) -> bool {
        if !self.is_enabled() {
            return false;
        }
        // held across the insert so an invalidation cannot slip in between
        let generations = self.generations.read().await;
        if generations.get(&process_id).copied().unwrap_or(0) != generation {
            return false;
        }
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored_at, _)| now.duration_since(*stored_at) < self.ttl);
        entries.insert(process_id, (now, summary));
        true
    }

    pub async fn invalidate(&self, process_id: Uuid) {
        let mut generations = self.generations.write().await;
        *generations.entry(process_id).or_insert(0) += 1;
        self.entries.write().await.remove(&process_id);
    }

    /// Drop every entry, returning how many were held.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ManualClock {
        base: Instant,
        offset_ms: AtomicU64,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                base: Instant::now(),
                offset_ms: AtomicU64::new(0),
            })
        }

        fn advance(&self, by: Duration) {
            self.offset_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
        }
    }

    fn summary(process_id: Uuid) -> ProcessSummary {
        ProcessSummary {
            process_id,
            base_currency: "PEN".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let clock = ManualClock::new();
        let cache = SummaryCache::with_clock(Duration::from_secs(60), clock.clone());
        let id = Uuid::new_v4();

        cache.insert(id, 0, summary(id)).await;
        assert_eq!(cache.get(id).await.map(|s| s.process_id), Some(id));

        clock.advance(Duration::from_secs(59));
        assert!(cache.get(id).await.is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(id).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = SummaryCache::with_clock(Duration::from_secs(60), ManualClock::new());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        cache.insert(a, 0, summary(a)).await;
        cache.insert(b, 0, summary(b)).await;

        cache.invalidate(a).await;
        assert!(cache.get(a).await.is_none());
        assert!(cache.get(b).await.is_some());
        assert_eq!(cache.clear().await, 1);
    }

    #[tokio::test]
    async fn test_summary_computed_before_invalidation_is_dropped() {
        let cache = SummaryCache::with_clock(Duration::from_secs(60), ManualClock::new());
        let id = Uuid::new_v4();

        let before_import = cache.generation(id).await;
        cache.invalidate(id).await;
        assert!(!cache.insert(id, before_import, summary(id)).await);
        assert!(cache.get(id).await.is_none());

        let current = cache.generation(id).await;
        assert_eq!(current, before_import + 1);
        assert!(cache.insert(id, current, summary(id)).await);
        assert!(cache.get(id).await.is_some());
    }

    #[tokio::test]
    async fn test_generations_are_per_process() {
        let cache = SummaryCache::with_clock(Duration::from_secs(60), ManualClock::new());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let generation_b = cache.generation(b).await;

        cache.invalidate(a).await;
        assert!(cache.insert(b, generation_b, summary(b)).await);
        assert_eq!(cache.generation(b).await, 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_caching() {
        let cache = SummaryCache::disabled();
        let id = Uuid::new_v4();
        cache.insert(id, 0, summary(id)).await;
        assert!(cache.get(id).await.is_none());
        assert_eq!(cache.clear().await, 0);
    }
}
