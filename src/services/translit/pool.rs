//! Lifecycle-managed pool of transliteration providers.
//!
//! Providers are capped per `{language, style}` key, health-tracked, and
//! reaped after sitting idle. `acquire` never blocks at capacity: callers get
//! [`LingoError::PoolAtCapacity`] and may retry, which keeps the worker pool
//! free of acquire/acquire deadlocks under back-pressure.
//!
//! Lock order: the manager map is guarded by an RW-lock (read path on
//! acquire, write path on pool creation and shutdown); each pool has its own
//! mutex guarding entry state. The maintenance loop takes the same locks as
//! acquire/release, so an entry can never be reaped while a lease holds it.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{PoolKey, TranslitResult};
use super::provider::{ProviderFactory, TranslitProvider};
use crate::Result;
use crate::error::LingoError;

/// Pool sizing and lifecycle configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum live providers per key.
    pub max_per_key: usize,
    /// Initial vector capacity per pool.
    pub initial_capacity: usize,
    /// Idle span after which an unused provider is reaped.
    pub idle_timeout: Duration,
    /// Bound on a single provider close.
    pub close_timeout: Duration,
    /// Bound on one maintenance pass.
    pub maintenance_timeout: Duration,
    /// Bound on full manager shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_per_key: 2,
            initial_capacity: 2,
            idle_timeout: Duration::from_secs(600),
            close_timeout: Duration::from_secs(300),
            maintenance_timeout: Duration::from_secs(180),
            shutdown_timeout: Duration::from_secs(600),
        }
    }
}

/// A provider instance bundled with its lifecycle bookkeeping.
struct PooledProvider {
    id: Uuid,
    provider: Arc<dyn TranslitProvider>,
    in_use: bool,
    last_used: Instant,
    usage_count: u64,
    created_at: Instant,
    init_duration: Duration,
    healthy: bool,
    last_error: Option<String>,
}

struct ProviderPool {
    entries: Vec<PooledProvider>,
    last_used: Instant,
}

impl ProviderPool {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            last_used: Instant::now(),
        }
    }
}

/// A checked-out provider. The holder has exclusive use of the instance
/// until it is handed back via [`PoolManager::release`]; dropping a lease
/// without releasing leaks the slot until shutdown.
pub struct ProviderLease {
    pool: Arc<Mutex<ProviderPool>>,
    id: Uuid,
    provider: Arc<dyn TranslitProvider>,
}

impl std::fmt::Debug for ProviderLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderLease")
            .field("id", &self.id)
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

impl ProviderLease {
    /// The leased provider.
    pub fn provider(&self) -> &Arc<dyn TranslitProvider> {
        &self.provider
    }
}

/// Process-wide manager of per-key provider pools.
pub struct PoolManager {
    pools: RwLock<HashMap<PoolKey, Arc<Mutex<ProviderPool>>>>,
    factory: Arc<dyn ProviderFactory>,
    config: PoolConfig,
    cancel: CancellationToken,
    maintenance: StdMutex<Option<JoinHandle<()>>>,
    is_shut_down: AtomicBool,
}

impl PoolManager {
    /// Create a manager and start its maintenance loop
    /// (period = `idle_timeout / 4`).
    pub fn new(factory: Arc<dyn ProviderFactory>, config: PoolConfig) -> Arc<Self> {
        let manager = Arc::new(Self {
            pools: RwLock::new(HashMap::new()),
            factory,
            config,
            cancel: CancellationToken::new(),
            maintenance: StdMutex::new(None),
            is_shut_down: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&manager);
        let cancel = manager.cancel.clone();
        let period = manager.config.idle_timeout / 4;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(manager) = weak.upgrade() else { break };
                let bound = manager.config.maintenance_timeout;
                if tokio::time::timeout(bound, manager.maintenance_pass())
                    .await
                    .is_err()
                {
                    warn!("provider pool maintenance pass exceeded {:?}", bound);
                }
            }
        });
        *manager.maintenance.lock().unwrap() = Some(handle);
        manager
    }

    /// Check a provider out of the pool for `key`.
    ///
    /// Reuses an available healthy entry, constructs a new one while under
    /// the per-key cap, and otherwise returns
    /// [`LingoError::PoolAtCapacity`] without waiting. Unhealthy entries are
    /// skipped but retained until the maintenance loop reaps them.
    pub async fn acquire(&self, key: &PoolKey) -> Result<ProviderLease> {
        if self.is_shut_down.load(Ordering::SeqCst) {
            return Err(LingoError::ProviderInit {
                provider: "pool".into(),
                message: "manager is shut down".into(),
            });
        }

        let pool = self.pool_for(key).await;
        let mut guard = pool.lock().await;
        guard.last_used = Instant::now();

        for entry in guard.entries.iter_mut() {
            if entry.in_use {
                continue;
            }
            if !entry.healthy {
                debug!(
                    "skipping unhealthy provider {} for {} ({})",
                    entry.id,
                    key,
                    entry.last_error.as_deref().unwrap_or("unknown error")
                );
                continue;
            }
            entry.in_use = true;
            entry.usage_count += 1;
            entry.last_used = Instant::now();
            return Ok(ProviderLease {
                pool: Arc::clone(&pool),
                id: entry.id,
                provider: Arc::clone(&entry.provider),
            });
        }

        if guard.entries.len() >= self.config.max_per_key {
            return Err(LingoError::PoolAtCapacity {
                key: key.to_string(),
            });
        }

        // Construction happens under the pool lock: concurrent callers for
        // the same key wait rather than racing past the cap.
        let started = Instant::now();
        let provider: Arc<dyn TranslitProvider> = Arc::from(self.factory.create(key).await?);
        let init_duration = started.elapsed();
        info!(
            "initialized provider {} for {} in {:?}",
            provider.provider_name(),
            key,
            init_duration
        );

        let id = Uuid::new_v4();
        guard.entries.push(PooledProvider {
            id,
            provider: Arc::clone(&provider),
            in_use: true,
            last_used: Instant::now(),
            usage_count: 1,
            created_at: started,
            init_duration,
            healthy: true,
            last_error: None,
        });
        Ok(ProviderLease {
            pool: Arc::clone(&pool),
            id,
            provider,
        })
    }

    /// Hand a provider back to its pool.
    pub async fn release(&self, lease: ProviderLease) {
        let mut guard = lease.pool.lock().await;
        guard.last_used = Instant::now();
        if let Some(entry) = guard.entries.iter_mut().find(|e| e.id == lease.id) {
            entry.in_use = false;
            entry.last_used = Instant::now();
        }
    }

    /// Acquire, process, and always release.
    ///
    /// A provider error marks the entry unhealthy (recording the error) so
    /// `acquire` never hands it out again, and the error is surfaced to the
    /// caller.
    pub async fn process_with_managed_provider(
        &self,
        key: &PoolKey,
        text: &str,
    ) -> Result<TranslitResult> {
        let lease = self.acquire(key).await?;
        let result = lease.provider.process_text(text).await;

        if let Err(e) = &result {
            let mut guard = lease.pool.lock().await;
            if let Some(entry) = guard.entries.iter_mut().find(|en| en.id == lease.id) {
                entry.healthy = false;
                entry.last_error = Some(e.to_string());
                warn!(
                    "provider {} for {} marked unhealthy after {} uses: {}",
                    entry.id, key, entry.usage_count, e
                );
            }
        }
        self.release(lease).await;
        result
    }

    /// Shut the manager down: stop maintenance, close every provider with a
    /// per-close bound, and drop all pools. Idempotent; a second call is a
    /// no-op. A fresh manager must be constructed to use pooling again.
    pub async fn shutdown(&self) {
        if self.is_shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        let handle = self.maintenance.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let deadline = self.config.shutdown_timeout;
        if tokio::time::timeout(deadline, self.close_all()).await.is_err() {
            warn!("provider pool shutdown exceeded {:?}; dropping remaining entries", deadline);
            self.pools.write().await.clear();
        }
    }

    async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (key, pool) in pools.drain() {
            let mut guard = pool.lock().await;
            for entry in guard.entries.drain(..) {
                close_entry(&key, entry, self.config.close_timeout).await;
            }
        }
    }

    async fn maintenance_pass(&self) {
        let now = Instant::now();
        let snapshot: Vec<(PoolKey, Arc<Mutex<ProviderPool>>)> = {
            let pools = self.pools.read().await;
            pools
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect()
        };

        for (key, pool) in &snapshot {
            let mut guard = pool.lock().await;
            let idle_timeout = self.config.idle_timeout;
            let mut keep = Vec::with_capacity(guard.entries.len());
            for entry in guard.entries.drain(..) {
                let idle = !entry.in_use && now.duration_since(entry.last_used) > idle_timeout;
                if idle {
                    close_entry(key, entry, self.config.close_timeout).await;
                } else {
                    keep.push(entry);
                }
            }
            guard.entries = keep;
        }

        // Drop pools that have been empty and untouched for 2x the idle span.
        let mut pools = self.pools.write().await;
        let mut stale = Vec::new();
        for (key, pool) in pools.iter() {
            let guard = pool.lock().await;
            if guard.entries.is_empty()
                && now.duration_since(guard.last_used) > self.config.idle_timeout * 2
            {
                stale.push(key.clone());
            }
        }
        for key in stale {
            debug!("dropping idle provider pool {}", key);
            pools.remove(&key);
        }
    }

    async fn pool_for(&self, key: &PoolKey) -> Arc<Mutex<ProviderPool>> {
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(key) {
                return Arc::clone(pool);
            }
        }
        let mut pools = self.pools.write().await;
        Arc::clone(
            pools
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(ProviderPool::new(self.config.initial_capacity)))),
        )
    }

    #[cfg(test)]
    async fn pool_size(&self, key: &PoolKey) -> usize {
        let pools = self.pools.read().await;
        match pools.get(key) {
            Some(pool) => pool.lock().await.entries.len(),
            None => 0,
        }
    }

    #[cfg(test)]
    async fn run_maintenance_now(&self) {
        self.maintenance_pass().await;
    }
}

async fn close_entry(key: &PoolKey, entry: PooledProvider, bound: Duration) {
    debug!(
        "closing provider {} for {} (used {} times, init {:?}, alive {:?})",
        entry.id,
        key,
        entry.usage_count,
        entry.init_duration,
        entry.created_at.elapsed()
    );
    match tokio::time::timeout(bound, entry.provider.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("provider close failed for {}: {}", key, e),
        Err(_) => warn!("provider close for {} exceeded {:?}", key, bound),
    }
}

static GLOBAL_MANAGER: Lazy<StdMutex<Option<Arc<PoolManager>>>> =
    Lazy::new(|| StdMutex::new(None));

/// Install a fresh global manager, replacing any previous one. The previous
/// manager, if any, is returned so the caller can shut it down.
pub fn init_global_manager(
    factory: Arc<dyn ProviderFactory>,
    config: PoolConfig,
) -> Option<Arc<PoolManager>> {
    let manager = PoolManager::new(factory, config);
    GLOBAL_MANAGER.lock().unwrap().replace(manager)
}

/// The current global manager, if one is installed.
pub fn global_manager() -> Option<Arc<PoolManager>> {
    GLOBAL_MANAGER.lock().unwrap().clone()
}

/// Shut down and uninstall the global manager. Safe to call repeatedly and
/// from both single-task and bulk paths; only the first call does work.
pub async fn shutdown_global_manager() {
    let manager = GLOBAL_MANAGER.lock().unwrap().take();
    if let Some(manager) = manager {
        manager.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::translit::{TranslitStyle, TranslitToken};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FakeProvider {
        lang: String,
        fail_processing: bool,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TranslitProvider for FakeProvider {
        async fn process_text(&self, text: &str) -> Result<TranslitResult> {
            if self.fail_processing {
                return Err(LingoError::provider("fake", "simulated failure"));
            }
            Ok(TranslitResult {
                tokens: vec![TranslitToken {
                    surface: text.to_string(),
                    romanized: None,
                }],
            })
        }
        async fn close(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn provider_name(&self) -> &str {
            "fake"
        }
        fn lang(&self) -> &str {
            &self.lang
        }
    }

    struct FakeFactory {
        created: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        fail_processing: bool,
    }

    impl FakeFactory {
        fn new() -> Self {
            Self {
                created: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
                fail_processing: false,
            }
        }
    }

    #[async_trait]
    impl ProviderFactory for FakeFactory {
        async fn create(&self, key: &PoolKey) -> Result<Box<dyn TranslitProvider>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeProvider {
                lang: key.lang_code.clone(),
                fail_processing: self.fail_processing,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn key() -> PoolKey {
        PoolKey {
            lang_code: "jpn".into(),
            style: TranslitStyle::Tokenize,
        }
    }

    fn config(idle_ms: u64) -> PoolConfig {
        PoolConfig {
            max_per_key: 2,
            idle_timeout: Duration::from_millis(idle_ms),
            ..PoolConfig::default()
        }
    }

    #[tokio::test]
    async fn test_acquire_caps_at_max_per_key() {
        let factory = Arc::new(FakeFactory::new());
        let created = Arc::clone(&factory.created);
        let manager = PoolManager::new(factory, config(60_000));

        let a = manager.acquire(&key()).await.unwrap();
        let b = manager.acquire(&key()).await.unwrap();
        let err = manager.acquire(&key()).await.unwrap_err();
        assert!(matches!(err, LingoError::PoolAtCapacity { .. }));
        assert_eq!(created.load(Ordering::SeqCst), 2);

        // After a release the slot is reused without a new construction.
        manager.release(a).await;
        let c = manager.acquire(&key()).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);

        manager.release(b).await;
        manager.release(c).await;
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_unhealthy_provider_never_handed_out() {
        let factory = Arc::new(FakeFactory {
            fail_processing: true,
            ..FakeFactory::new()
        });
        let created = Arc::clone(&factory.created);
        let manager = PoolManager::new(factory, config(60_000));

        let err = manager
            .process_with_managed_provider(&key(), "text")
            .await
            .unwrap_err();
        assert!(matches!(err, LingoError::Provider { .. }));
        assert_eq!(manager.pool_size(&key()).await, 1);

        // The sick entry stays pooled but a new acquire constructs a fresh one.
        let lease = manager.acquire(&key()).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
        manager.release(lease).await;
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_idle_entries_are_reaped() {
        let factory = Arc::new(FakeFactory::new());
        let closed = Arc::clone(&factory.closed);
        let manager = PoolManager::new(factory, config(30));

        let lease = manager.acquire(&key()).await.unwrap();
        manager.release(lease).await;
        assert_eq!(manager.pool_size(&key()).await, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        manager.run_maintenance_now().await;
        assert_eq!(manager.pool_size(&key()).await, 0);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_in_use_entries_survive_maintenance() {
        let factory = Arc::new(FakeFactory::new());
        let manager = PoolManager::new(factory, config(30));

        let lease = manager.acquire(&key()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        manager.run_maintenance_now().await;
        assert_eq!(manager.pool_size(&key()).await, 1);
        manager.release(lease).await;
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_closes_everything() {
        let factory = Arc::new(FakeFactory::new());
        let closed = Arc::clone(&factory.closed);
        let manager = PoolManager::new(factory, config(60_000));

        let lease = manager.acquire(&key()).await.unwrap();
        manager.release(lease).await;

        manager.shutdown().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        manager.shutdown().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        let err = manager.acquire(&key()).await.unwrap_err();
        assert!(matches!(err, LingoError::ProviderInit { .. }));
    }

    #[tokio::test]
    async fn test_global_manager_replace_and_shutdown() {
        let previous = init_global_manager(Arc::new(FakeFactory::new()), config(60_000));
        if let Some(previous) = previous {
            previous.shutdown().await;
        }
        assert!(global_manager().is_some());
        shutdown_global_manager().await;
        assert!(global_manager().is_none());
        // Idempotent with nothing installed.
        shutdown_global_manager().await;
    }
}
