//! Repository behaviour against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::cache::{LruCache, ShardedCache};
use crate::storage::testing::Account;
use crate::storage::MemoryStore;

const HOUR: Duration = Duration::from_secs(3600);

fn lru(capacity: usize) -> Arc<RecordCache<Account>> {
    Arc::new(LruCache::<CacheKey, Cached<Account>>::new(capacity).unwrap())
}

fn setup() -> (Repository<Account>, Arc<MemoryStore<Account>>) {
    let store = Arc::new(MemoryStore::new());
    let repo = Repository::new(lru(64), store.clone()).unwrap();
    (repo, store)
}

fn account(name: &str, balance: i64) -> Account {
    let mut account = Account::named(name);
    account.balance = balance;
    account
}

async fn load_named(
    repo: &Repository<Account>,
    key: &str,
    ttl: Duration,
    loads: &AtomicUsize,
) -> Result<Arc<Account>> {
    repo.with_cache(key, Account::default, ttl, |mut dst: Account| {
        loads.fetch_add(1, Ordering::SeqCst);
        async move {
            dst.name = "ada".to_string();
            Ok(dst)
        }
    })
    .await
}

// == Read Through ==

#[tokio::test]
async fn test_read_through_loads_once_within_ttl() {
    let (repo, _) = setup();
    let loads = AtomicUsize::new(0);

    let first = load_named(&repo, "k", HOUR, &loads).await.unwrap();
    let second = load_named(&repo, "k", HOUR, &loads).await.unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.name, "ada");
}

#[tokio::test]
async fn test_read_through_reloads_after_ttl() {
    let (repo, _) = setup();
    let loads = AtomicUsize::new(0);

    load_named(&repo, "k", Duration::from_millis(40), &loads)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    load_named(&repo, "k", Duration::from_millis(40), &loads)
        .await
        .unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(repo.cache_stats().expirations, 1);
}

#[tokio::test]
async fn test_failed_load_is_not_cached() {
    let (repo, _) = setup();
    let loads = AtomicUsize::new(0);

    let failed = repo
        .with_cache("k", Account::default, HOUR, |_dst: Account| {
            loads.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::QueryFailed("connection refused".into())) }
        })
        .await;
    assert!(matches!(failed, Err(StoreError::QueryFailed(_))));
    assert!(repo.cache_stats().total_entries == 0);

    load_named(&repo, "k", HOUR, &loads).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_shape_mismatch_is_a_miss() {
    let (repo, _) = setup();
    let loads = AtomicUsize::new(0);

    load_named(&repo, "k", HOUR, &loads).await.unwrap();
    let list = repo
        .with_cache("k", Vec::new, HOUR, |mut dst: Vec<Account>| async move {
            dst.push(Account::named("grace"));
            Ok(dst)
        })
        .await
        .unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(repo.cache_stats().total_entries, 1);
}

#[tokio::test]
async fn test_read_by_key_hits_store_once() {
    let (repo, store) = setup();
    let mut ada = account("ada", 10);
    repo.create(&mut ada).await.unwrap();
    let id = ada.id.clone().unwrap();

    let first = repo.read_by_key("account:id", &id).await.unwrap();
    let second = repo.read_by_key("account:id", &id).await.unwrap();

    assert_eq!(first.balance, 10);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.calls().read_by_key, 1);

    let stats = repo.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_read_missing_record_is_not_found_and_not_cached() {
    let (repo, store) = setup();
    let id = RecordId::from("nope");

    let err = repo.read_by_key("account:nope", &id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(repo.read_by_key("account:nope", &id).await.is_err());
    assert_eq!(store.calls().read_by_key, 2);
}

#[tokio::test]
async fn test_find_one_and_lists() {
    let (repo, store) = setup();
    for (name, balance) in [("ada", 30), ("grace", 10), ("linus", 20)] {
        repo.create(&mut account(name, balance)).await.unwrap();
    }

    let grace = repo
        .find_one("account:name:grace", Filter::new().eq("name", "grace"))
        .await
        .unwrap();
    assert_eq!(grace.balance, 10);

    let all = repo.read_all("account:all").await.unwrap();
    assert_eq!(all.len(), 3);

    let top = repo
        .get_items("account:top2", Some(Order::desc("balance")), Some(2))
        .await
        .unwrap();
    let names: Vec<_> = top.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["ada", "linus"]);

    let names_only = repo
        .read_all_with_fields("account:names", &["name"])
        .await
        .unwrap();
    assert!(names_only.iter().all(|a| a.balance == 0 && !a.name.is_empty()));

    // Every read above again, all served from the cache
    let before = store.calls().reads();
    repo.read_all("account:all").await.unwrap();
    repo.get_items("account:top2", Some(Order::desc("balance")), Some(2))
        .await
        .unwrap();
    repo.find_one("account:name:grace", Filter::new().eq("name", "grace"))
        .await
        .unwrap();
    assert_eq!(store.calls().reads(), before);
}

#[tokio::test]
async fn test_uncached_reads_always_hit_store() {
    let (repo, store) = setup();
    let mut ada = account("ada", 30);
    repo.create(&mut ada).await.unwrap();
    repo.create(&mut account("grace", 30)).await.unwrap();

    let rich = repo
        .find_matches(Filter::new().eq("balance", 30))
        .await
        .unwrap();
    assert_eq!(rich.len(), 2);
    repo.find_matches(Filter::new().eq("balance", 30))
        .await
        .unwrap();
    assert_eq!(store.calls().find, 2);

    let id = ada.id.clone().unwrap();
    let slim = repo.find_by_key_with_fields(&id, &["name"]).await.unwrap();
    assert_eq!(slim.name, "ada");
    assert_eq!(slim.balance, 0);

    let err = repo
        .find_by_key_with_fields(&RecordId::from("missing"), &["name"])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_concurrent_misses_all_succeed() {
    let (repo, store) = setup();
    let mut ada = account("ada", 5);
    repo.create(&mut ada).await.unwrap();
    let id = ada.id.clone().unwrap();
    let repo = Arc::new(repo);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let id = id.clone();
            tokio::spawn(async move { repo.read_by_key("account:ada", &id).await })
        })
        .collect();

    for handle in handles {
        let found = handle.await.unwrap().unwrap();
        assert_eq!(found.name, "ada");
    }
    let reads = store.calls().read_by_key;
    assert!((1..=16).contains(&reads));
}

#[tokio::test]
async fn test_sharded_cache_backend() {
    let store = Arc::new(MemoryStore::new());
    let cache: Arc<RecordCache<Account>> =
        Arc::new(ShardedCache::<CacheKey, Cached<Account>>::new(64, 4).unwrap());
    let repo = Repository::new(cache, store.clone()).unwrap();

    let mut ada = account("ada", 1);
    repo.create(&mut ada).await.unwrap();
    let id = ada.id.clone().unwrap();
    repo.read_by_key("k", &id).await.unwrap();
    repo.read_by_key("k", &id).await.unwrap();

    assert_eq!(store.calls().read_by_key, 1);
}

// == Writes ==

#[tokio::test]
async fn test_create_assigns_id_and_timestamp() {
    let (repo, store) = setup();
    let mut ada = account("ada", 1);

    assert_ok!(repo.create(&mut ada).await);

    let id = ada.id.clone().unwrap();
    assert!(!id.is_empty());
    assert!(ada.meta.created_at.is_some());
    assert!(store.row(&id).is_some());
}

#[tokio::test]
async fn test_create_keeps_caller_id() {
    let (repo, store) = setup();
    let mut ada = account("ada", 1);
    ada.id = Some(RecordId::from("acc-1"));

    repo.create(&mut ada).await.unwrap();

    assert!(store.row(&RecordId::from("acc-1")).is_some());
}

#[tokio::test]
async fn test_strict_create_surfaces_duplicate() {
    let (repo, store) = setup();
    repo.create(&mut account("ada", 1)).await.unwrap();

    let result = repo.create(&mut account("ada", 2)).await;

    assert!(matches!(result, Err(ref err) if err.is_duplicate()));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_permissive_create_swallows_duplicate() {
    let (repo, store) = setup();
    repo.create(&mut account("ada", 1)).await.unwrap();

    assert_ok!(repo.create_ignore_duplicate(&mut account("ada", 2)).await);
    assert_ok!(
        repo.create_with(&mut account("ada", 3), DuplicatePolicy::Ignore)
            .await
    );

    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_permissive_create_still_surfaces_other_errors() {
    let (repo, store) = setup();
    store.fail_next(StoreError::QueryFailed("disk full".into()));

    let err = repo
        .create_ignore_duplicate(&mut account("ada", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::QueryFailed(_)));
}

#[tokio::test]
async fn test_create_if_not_is_idempotent() {
    let (repo, store) = setup();

    let mut first = account("ada", 1);
    assert_ok!(repo.create_if_not(&mut first).await);
    let mut second = account("ada", 1);
    assert_ok!(repo.create_if_not(&mut second).await);

    assert_eq!(store.len(), 1);
    assert_eq!(store.calls().create, 1);
    // The second call picked up the stored record
    assert_eq!(second.id, first.id);
}

#[tokio::test]
async fn test_create_if_not_surfaces_lookup_failures() {
    let (repo, store) = setup();
    store.fail_next(StoreError::QueryFailed("timeout".into()));

    let err = repo.create_if_not(&mut account("ada", 1)).await.unwrap_err();
    assert!(matches!(err, StoreError::QueryFailed(_)));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn test_exists() {
    let (repo, store) = setup();
    repo.create(&mut account("ada", 1)).await.unwrap();

    assert!(repo.exists(&account("ada", 0)).await.unwrap());
    assert!(!repo.exists(&account("grace", 0)).await.unwrap());

    store.fail_next(StoreError::QueryFailed("broken pipe".into()));
    assert!(repo.exists(&account("ada", 0)).await.is_err());
}

#[tokio::test]
async fn test_update_invalidates_cached_reads() {
    let (repo, _) = setup();
    let mut ada = account("ada", 1);
    repo.create(&mut ada).await.unwrap();
    let id = ada.id.clone().unwrap();

    assert_eq!(repo.read_by_key("account:ada", &id).await.unwrap().balance, 1);
    assert_eq!(repo.read_all("account:all").await.unwrap()[0].balance, 1);

    ada.balance = 50;
    repo.update(&mut ada).await.unwrap();

    assert_eq!(repo.read_by_key("account:ada", &id).await.unwrap().balance, 50);
    assert_eq!(repo.read_all("account:all").await.unwrap()[0].balance, 50);
    assert!(ada.meta.updated_at.is_some());
}

#[tokio::test]
async fn test_update_during_slow_load_does_not_leave_stale_read() {
    let (repo, store) = setup();
    let mut ada = account("ada", 1);
    repo.create(&mut ada).await.unwrap();
    let id = ada.id.clone().unwrap();

    let slow_read = repo.with_cache("account:ada", Account::default, HOUR, |dst: Account| {
        let store = Arc::clone(&store);
        let id = id.clone();
        async move {
            let read = store.read_by_key(dst, &id).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            read
        }
    });
    let write = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ada.balance = 50;
        repo.update(&mut ada).await
    };
    let (read, written) = tokio::join!(slow_read, write);

    // The overlapping read still answers its own caller
    assert_eq!(read.unwrap().balance, 1);
    assert_ok!(written);

    assert_eq!(repo.read_by_key("account:ada", &id).await.unwrap().balance, 50);
    assert_eq!(store.calls().read_by_key, 2);
}

#[tokio::test]
async fn test_create_during_slow_list_load_does_not_leave_stale_list() {
    let (repo, store) = setup();
    repo.create(&mut account("ada", 1)).await.unwrap();

    let slow_list = repo.with_cache("account:all", Vec::new, HOUR, |dst: Vec<Account>| {
        let store = Arc::clone(&store);
        async move {
            let found = store.find(dst, &ListQuery::new()).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            found
        }
    });
    let write = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        repo.create(&mut account("grace", 1)).await
    };
    let (listed, written) = tokio::join!(slow_list, write);

    assert_eq!(listed.unwrap().len(), 1);
    assert_ok!(written);
    assert_eq!(repo.read_all("account:all").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_invalidates_lists() {
    let (repo, _) = setup();
    repo.create(&mut account("ada", 1)).await.unwrap();
    assert_eq!(repo.read_all("account:all").await.unwrap().len(), 1);

    repo.create(&mut account("grace", 1)).await.unwrap();

    assert_eq!(repo.read_all("account:all").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_disabled_invalidation_serves_stale_reads() {
    let store = Arc::new(MemoryStore::new());
    let repo = Repository::builder()
        .cache(lru(64))
        .store(store.clone())
        .invalidation(Invalidation::Disabled)
        .build()
        .unwrap();

    let mut ada = account("ada", 1);
    repo.create(&mut ada).await.unwrap();
    let id = ada.id.clone().unwrap();
    repo.read_by_key("account:ada", &id).await.unwrap();

    ada.balance = 50;
    repo.update(&mut ada).await.unwrap();

    assert_eq!(repo.read_by_key("account:ada", &id).await.unwrap().balance, 1);

    repo.invalidate("account:ada");
    assert_eq!(repo.read_by_key("account:ada", &id).await.unwrap().balance, 50);
}

#[tokio::test]
async fn test_soft_delete_keeps_row_but_hides_it() {
    let (repo, store) = setup();
    let mut ada = account("ada", 1);
    repo.create(&mut ada).await.unwrap();
    let id = ada.id.clone().unwrap();
    repo.read_by_key("account:ada", &id).await.unwrap();

    repo.soft_delete(&mut ada).await.unwrap();

    assert!(ada.meta.deleted_at.is_some());
    assert_eq!(store.len(), 1);
    let row = store.row(&id).unwrap();
    assert!(row.contains_key("deleted_at"));

    let err = repo.read_by_key("account:ada", &id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete() {
    let (repo, store) = setup();
    let mut ada = account("ada", 1);
    repo.create(&mut ada).await.unwrap();
    let id = ada.id.clone().unwrap();
    repo.read_by_key("account:ada", &id).await.unwrap();

    repo.delete(&ada).await.unwrap();

    assert!(store.is_empty());
    assert!(repo.read_by_key("account:ada", &id).await.is_err());

    assert_err!(repo.delete(&ada).await);
}

#[tokio::test]
async fn test_truncate_empties_store_and_cache() {
    let (repo, store) = setup();
    let mut ada = account("ada", 1);
    repo.create(&mut ada).await.unwrap();
    repo.create(&mut account("grace", 2)).await.unwrap();
    let id = ada.id.clone().unwrap();
    repo.read_by_key("account:ada", &id).await.unwrap();
    assert_eq!(repo.read_all("account:all").await.unwrap().len(), 2);

    assert_eq!(repo.truncate().await.unwrap(), 2);

    assert!(store.is_empty());
    assert_eq!(repo.cache_stats().total_entries, 0);
    assert!(repo.read_by_key("account:ada", &id).await.unwrap_err().is_not_found());
    assert!(repo.read_all("account:all").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_truncate_clears_cache_even_without_invalidation() {
    let store = Arc::new(MemoryStore::new());
    let repo = Repository::builder()
        .cache(lru(64))
        .store(store.clone())
        .invalidation(Invalidation::Disabled)
        .build()
        .unwrap();
    repo.create(&mut account("ada", 1)).await.unwrap();
    assert_eq!(repo.read_all("account:all").await.unwrap().len(), 1);

    assert_eq!(repo.truncate().await.unwrap(), 1);

    assert!(repo.read_all("account:all").await.unwrap().is_empty());
}

// == Failure Modes ==

#[tokio::test]
async fn test_missing_store_is_configuration_error() {
    let repo = Repository::<Account>::builder().cache(lru(8)).build().unwrap();
    assert!(!repo.has_store());

    let id = RecordId::from("x");
    let mut ada = account("ada", 1);
    let results = vec![
        repo.read_by_key("k", &id).await.map(|_| ()),
        repo.find_one("k", Filter::new()).await.map(|_| ()),
        repo.read_all("k").await.map(|_| ()),
        repo.find_matches(Filter::new()).await.map(|_| ()),
        repo.create(&mut ada).await,
        repo.create_if_not(&mut ada).await,
        repo.exists(&ada).await.map(|_| ()),
        repo.update(&mut ada).await,
        repo.soft_delete(&mut ada).await,
        repo.delete(&ada).await,
        repo.truncate().await.map(|_| ()),
    ];

    for result in results {
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }
    assert!(ada.id.is_none(), "no id is assigned when the call is refused");
}

#[tokio::test]
async fn test_builder_validation() {
    let no_cache = Repository::<Account>::builder().build();
    assert!(matches!(no_cache, Err(StoreError::Configuration(_))));

    let zero_timeout = Repository::<Account>::builder()
        .cache(lru(8))
        .query_timeout(Duration::ZERO)
        .build();
    assert!(matches!(zero_timeout, Err(StoreError::Configuration(_))));

    let repo = Repository::<Account>::builder()
        .cache(lru(8))
        .read_ttl(Duration::from_secs(5))
        .build()
        .unwrap();
    assert_eq!(repo.read_ttl(), Duration::from_secs(5));
}

#[tokio::test]
async fn test_slow_store_exceeds_deadline() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(200)));
    let repo = Repository::builder()
        .cache(lru(8))
        .store(store.clone())
        .query_timeout(Duration::from_millis(20))
        .build()
        .unwrap();

    let err = repo
        .read_by_key("k", &RecordId::from("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::QueryFailed(_)));
    assert_eq!(repo.cache_stats().total_entries, 0);

    let err = repo.create(&mut account("ada", 1)).await.unwrap_err();
    assert!(matches!(err, StoreError::QueryFailed(_)));
}

#[tokio::test]
async fn test_eviction_bounds_cached_reads() {
    let store = Arc::new(MemoryStore::new());
    let repo = Repository::new(lru(2), store.clone()).unwrap();
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let mut record = account(name, 0);
        repo.create(&mut record).await.unwrap();
        ids.push(record.id.unwrap());
    }

    for (i, id) in ids.iter().enumerate() {
        repo.read_by_key(&format!("account:{}", i), id).await.unwrap();
    }
    assert_eq!(repo.cache_stats().evictions, 1);

    // The first key was evicted, so reading it again goes to the store
    repo.read_by_key("account:0", &ids[0]).await.unwrap();
    assert_eq!(store.calls().read_by_key, 4);
}
