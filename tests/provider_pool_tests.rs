//! Provider pool integration tests: capacity under parallel acquire, reuse
//! after release, and shutdown idempotence.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use lingo_cli::Result;
use lingo_cli::error::LingoError;
use lingo_cli::services::translit::pool::{PoolConfig, PoolManager};
use lingo_cli::services::translit::{
    PoolKey, ProviderFactory, TranslitProvider, TranslitResult, TranslitStyle, TranslitToken,
};

struct SlowProvider {
    lang: String,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl TranslitProvider for SlowProvider {
    async fn process_text(&self, text: &str) -> Result<TranslitResult> {
        Ok(TranslitResult {
            tokens: vec![TranslitToken {
                surface: text.to_string(),
                romanized: Some(text.to_lowercase()),
            }],
        })
    }
    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn provider_name(&self) -> &str {
        "slow"
    }
    fn lang(&self) -> &str {
        &self.lang
    }
}

struct SlowFactory {
    created: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl SlowFactory {
    fn new() -> Self {
        Self {
            created: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ProviderFactory for SlowFactory {
    async fn create(&self, key: &PoolKey) -> Result<Box<dyn TranslitProvider>> {
        // Model the expensive init the pool exists to amortize.
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SlowProvider {
            lang: key.lang_code.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }
}

fn key() -> PoolKey {
    PoolKey {
        lang_code: "jpn".into(),
        style: TranslitStyle::Romanize,
    }
}

fn config(max_per_key: usize) -> PoolConfig {
    PoolConfig {
        max_per_key,
        idle_timeout: Duration::from_secs(600),
        ..PoolConfig::default()
    }
}

#[tokio::test]
async fn parallel_acquire_respects_capacity() {
    let max_per_key = 2;
    let factory = Arc::new(SlowFactory::new());
    let created = Arc::clone(&factory.created);
    let manager = PoolManager::new(factory, config(max_per_key));

    // max_per_key + 2 concurrent callers, none releasing.
    let keys: Vec<PoolKey> = (0..max_per_key + 2).map(|_| key()).collect();
    let attempts =
        futures::future::join_all(keys.iter().map(|k| manager.acquire(k))).await;

    let mut leases = Vec::new();
    let mut at_capacity = 0;
    for attempt in attempts {
        match attempt {
            Ok(lease) => leases.push(lease),
            Err(LingoError::PoolAtCapacity { .. }) => at_capacity += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(leases.len(), max_per_key);
    assert!(at_capacity >= 2);
    assert_eq!(created.load(Ordering::SeqCst), max_per_key);

    // After a release, a subsequent acquire succeeds without constructing
    // a new provider.
    manager.release(leases.pop().unwrap()).await;
    let lease = manager.acquire(&key()).await.unwrap();
    assert_eq!(created.load(Ordering::SeqCst), max_per_key);

    manager.release(lease).await;
    for lease in leases {
        manager.release(lease).await;
    }
    manager.shutdown().await;
}

#[tokio::test]
async fn distinct_keys_get_distinct_pools() {
    let factory = Arc::new(SlowFactory::new());
    let created = Arc::clone(&factory.created);
    let manager = PoolManager::new(factory, config(1));

    let jpn = manager.acquire(&key()).await.unwrap();
    let kor = manager
        .acquire(&PoolKey {
            lang_code: "kor".into(),
            style: TranslitStyle::Romanize,
        })
        .await
        .unwrap();
    assert_eq!(jpn.provider().lang(), "jpn");
    assert_eq!(kor.provider().lang(), "kor");
    assert_eq!(created.load(Ordering::SeqCst), 2);

    manager.release(jpn).await;
    manager.release(kor).await;
    manager.shutdown().await;
}

#[tokio::test]
async fn managed_processing_reuses_one_instance() {
    let factory = Arc::new(SlowFactory::new());
    let created = Arc::clone(&factory.created);
    let manager = PoolManager::new(factory, config(2));

    for text in ["ONE", "TWO", "THREE"] {
        let result = manager
            .process_with_managed_provider(&key(), text)
            .await
            .unwrap();
        assert_eq!(
            result.tokens[0].romanized.as_deref(),
            Some(text.to_lowercase().as_str())
        );
    }
    // Sequential calls acquire-release the same pooled instance.
    assert_eq!(created.load(Ordering::SeqCst), 1);
    manager.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_providers_exactly_once() {
    let factory = Arc::new(SlowFactory::new());
    let closed = Arc::clone(&factory.closed);
    let manager = PoolManager::new(factory, config(2));

    let a = manager.acquire(&key()).await.unwrap();
    let b = manager.acquire(&key()).await.unwrap();
    manager.release(a).await;
    manager.release(b).await;

    manager.shutdown().await;
    manager.shutdown().await;
    assert_eq!(closed.load(Ordering::SeqCst), 2);

    assert!(manager.acquire(&key()).await.is_err());
}
