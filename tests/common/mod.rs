//! Behaviour every store backend must show through a `CacheManager`.
//!
//! Each function here is one check. `contract_tests!` turns a list of them
//! into `#[test]`s for a given manager factory, so the same suite runs against
//! `MemoryStore` and `RemoteStore`.

#![allow(dead_code)]

use pcache::{
    CacheConfig, CacheError, CacheManager, KeyLock, Lock, Object, Store, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Expand to one `#[test]` per contract check, each with its own manager
/// built by `$factory(test_name)`.
macro_rules! contract_tests {
    ($factory:path; $($name:ident),* $(,)?) => {
        $(
            #[test]
            fn $name() {
                let cache = $factory(stringify!($name));
                common::$name(&cache);
            }
        )*
    };
}

/// A manager over `store` in `namespace`, polling locks quickly.
pub fn manager_for(store: Arc<dyn Store>, namespace: &str) -> CacheManager {
    let config = CacheConfig::new()
        .namespace(namespace)
        .lock_poll_interval(Duration::from_millis(5))
        .build();
    CacheManager::from_shared(store, config)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub customer: String,
    pub items: Vec<String>,
}

fn order(id: u64) -> Order {
    Order {
        id,
        customer: format!("customer-{}", id),
        items: vec!["book".to_string(), "pen".to_string()],
    }
}

pub fn get_returns_what_was_put(cache: &CacheManager) {
    cache.put("text", "value").unwrap();
    cache.put("number", 12_i32).unwrap();
    cache.put("flag", false).unwrap();
    cache.put("order", Object(order(1))).unwrap();

    assert_eq!(cache.get::<String>("text").as_deref(), Some("value"));
    assert_eq!(cache.get::<i32>("number"), Some(12));
    assert_eq!(cache.get::<bool>("flag"), Some(false));
    assert_eq!(
        cache.get::<Object<Order>>("order").map(Object::into_inner),
        Some(order(1))
    );
    assert_eq!(cache.get::<String>("never-put"), None);
}

pub fn put_of_non_serializable_value_fails(cache: &CacheManager) {
    let mut value = HashMap::new();
    value.insert(vec![1, 2], "list keys are not JSON");

    let err = cache.put("bad", Object(value)).unwrap_err();
    assert!(matches!(err, CacheError::NotSerializable(_)));
    assert!(!cache.contains("bad"));
}

pub fn remove_deletes_and_is_idempotent(cache: &CacheManager) {
    cache.put("k", "v").unwrap();
    cache.remove("k").unwrap();
    assert_eq!(cache.get::<String>("k"), None);

    cache.remove("k").unwrap();
    cache.remove("never-put").unwrap();
}

pub fn first_safe_put_wins(cache: &CacheManager) {
    cache.put("k", "v0").unwrap();
    let first = cache.get_safe_value("k").unwrap();
    let second = cache.get_safe_value("k").unwrap();

    assert!(cache.safe_put("k", &first, "v1").unwrap());
    assert!(!cache.safe_put("k", &second, "v2").unwrap());
    assert_eq!(cache.get::<String>("k").as_deref(), Some("v1"));
}

pub fn second_snapshot_wins_when_used_first(cache: &CacheManager) {
    cache.put("k", "v0").unwrap();
    let first = cache.get_safe_value("k").unwrap();
    let second = cache.get_safe_value("k").unwrap();

    assert!(cache.safe_put("k", &second, "v2").unwrap());
    assert!(!cache.safe_put("k", &first, "v1").unwrap());
    assert_eq!(cache.get::<String>("k").as_deref(), Some("v2"));
}

pub fn safe_put_with_ttl_expires(cache: &CacheManager) {
    cache.put("k", 1_i64).unwrap();
    let snapshot = cache.get_safe_value("k").unwrap();

    assert!(cache
        .safe_put_with_ttl("k", &snapshot, 2_i64, Duration::from_millis(50))
        .unwrap());
    assert_eq!(cache.get::<i64>("k"), Some(2));

    thread::sleep(Duration::from_millis(150));
    assert_eq!(cache.get::<i64>("k"), None);
}

pub fn unknown_key_has_no_safe_value(cache: &CacheManager) {
    assert!(cache.get_safe_value("never-put").is_none());
}

pub fn safe_put_after_removal_is_rejected(cache: &CacheManager) {
    cache.put("k", "v").unwrap();
    let snapshot = cache.get_safe_value("k").unwrap();
    cache.remove("k").unwrap();

    assert!(!cache.safe_put("k", &snapshot, "new").unwrap());
    assert!(!cache.contains("k"));
}

pub fn concurrent_safe_puts_have_one_winner(cache: &CacheManager) {
    const WRITERS: usize = 8;

    cache.put("balance", 100_i64).unwrap();
    let snapshot = cache.get_safe_value("balance").unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let cache = cache.clone();
            let snapshot = snapshot.clone();
            let barrier = Arc::clone(&barrier);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                barrier.wait();
                if cache.safe_put("balance", &snapshot, i as i64).unwrap() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_ne!(cache.get::<i64>("balance"), Some(100));
}

pub fn flush_clears_the_namespace(cache: &CacheManager) {
    cache.put("a", 1_i32).unwrap();
    cache.put("b", 2_i32).unwrap();

    cache.flush_cache().unwrap();

    assert!(!cache.contains("a"));
    assert!(!cache.contains("b"));
}

pub fn flush_of_empty_namespace_is_ok(cache: &CacheManager) {
    cache.flush_cache().unwrap();
    cache.flush_cache().unwrap();
}

pub fn get_all_with_every_key_present(cache: &CacheManager) {
    cache.put("a", 1_i64).unwrap();
    cache.put("b", 2_i64).unwrap();

    let result = cache.get_all::<i64>(&["a", "b"]);
    assert_eq!(result.hits(), &[1, 2]);
    assert!(!result.has_missed_keys());
}

pub fn get_all_with_some_keys_present(cache: &CacheManager) {
    cache.put("a", 1_i64).unwrap();

    let result = cache.get_all::<i64>(&["a", "b", "c"]);
    assert_eq!(result.hits(), &[1]);
    assert_eq!(result.missed_keys(), &["b".to_string(), "c".to_string()]);
}

pub fn get_all_with_no_keys_present(cache: &CacheManager) {
    let result = cache.get_all::<i64>(&["a", "b"]);
    assert!(result.hits().is_empty());
    assert_eq!(result.missed_keys(), &["a".to_string(), "b".to_string()]);
}

pub fn get_all_with_prefix(cache: &CacheManager) {
    cache.put("user:1", "Ada").unwrap();
    cache.put("user:2", "Grace").unwrap();
    cache.put("1", "not a user").unwrap();

    let result = cache.get_all_with_prefix::<String>("user:", &["1", "2", "3"]);
    assert_eq!(result.hits(), &["Ada".to_string(), "Grace".to_string()]);
    assert_eq!(result.missed_keys(), &["3".to_string()]);
}

pub fn prefixed_keys_miss_without_prefix(cache: &CacheManager) {
    cache.put("px", "under prefix").unwrap();

    let bare = cache.get_all::<String>(&["x"]);
    assert!(bare.hits().is_empty());
    assert_eq!(bare.missed_keys(), &["x".to_string()]);

    let prefixed = cache.get_all_with_prefix::<String>("p", &["x"]);
    assert_eq!(prefixed.hits(), &["under prefix".to_string()]);
    assert!(!prefixed.has_missed_keys());
}

pub fn huge_ttl_keeps_store_usable(cache: &CacheManager) {
    cache.put("before", "x").unwrap();

    cache.put_with_ttl("forever", "v", Duration::MAX).unwrap();
    assert!(cache.put_if_absent("forever-too", 1_i32, Duration::MAX).unwrap());
    cache
        .put_all(vec![("many", 2_i64)], Duration::MAX)
        .unwrap();

    assert_eq!(cache.get::<String>("forever"), Some("v".to_string()));
    assert_eq!(cache.get::<i64>("many"), Some(2));
    assert_eq!(cache.get::<String>("before"), Some("x".to_string()));

    let snapshot = cache.get_safe_value("forever").unwrap();
    assert!(cache
        .safe_put_with_ttl("forever", &snapshot, "w", Duration::MAX)
        .unwrap());
    cache.put("after", "y").unwrap();
    assert_eq!(cache.get::<String>("after"), Some("y".to_string()));
}

pub fn get_all_treats_other_types_as_missed(cache: &CacheManager) {
    cache.put("long", 7_i64).unwrap();
    cache.put("char", 'x').unwrap();

    let chars = cache.get_all::<char>(&["long", "char"]);
    assert_eq!(chars.hits(), &['x']);
    assert_eq!(chars.missed_keys(), &["long".to_string()]);

    let longs = cache.get_all::<i64>(&["long", "char"]);
    assert_eq!(longs.hits(), &[7]);
    assert_eq!(longs.missed_keys(), &["char".to_string()]);
}

pub fn get_all_with_mixed_types(cache: &CacheManager) {
    cache.put("a", 1_i32).unwrap();
    cache.put("b", "two").unwrap();
    cache.put("c", 3_i32).unwrap();

    let result = cache.get_all::<i32>(&["a", "b", "c"]);
    assert_eq!(result.hits(), &[1, 3]);
    assert_eq!(result.missed_keys(), &["b".to_string()]);

    let values = cache.get_all::<Value>(&["a", "b", "c"]);
    assert_eq!(values.hits().len(), 3);
}

pub fn get_all_with_composite_objects(cache: &CacheManager) {
    cache.put("o1", Object(order(1))).unwrap();
    cache.put("o2", Object(order(2))).unwrap();
    cache.put("o3", "not an order").unwrap();

    let result = cache.get_all::<Object<Order>>(&["o1", "o2", "o3"]);
    let orders: Vec<Order> = result.hits().iter().map(|o| o.0.clone()).collect();
    assert_eq!(orders, vec![order(1), order(2)]);
    assert_eq!(result.missed_keys(), &["o3".to_string()]);
}

pub fn get_all_or_else_fills_misses(cache: &CacheManager) {
    cache.put("1", Object(order(1))).unwrap();

    let orders = cache.get_all_or_else(&["1", "2"], |missed: &[String]| {
        missed
            .iter()
            .map(|id| Object(order(id.parse().unwrap())))
            .collect()
    });

    let ids: Vec<u64> = orders.iter().map(|o| o.0.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

pub fn try_lock_on_unknown_key(cache: &CacheManager) {
    assert!(cache.try_lock("job", None).unwrap());
    assert!(!cache.try_lock("job", None).unwrap());
}

pub fn try_lock_on_existing_key(cache: &CacheManager) {
    cache.put("job", "data").unwrap();
    assert!(!cache.try_lock("job", None).unwrap());
    assert_eq!(cache.get::<String>("job").as_deref(), Some("data"));
}

pub fn increment_counts_from_delta(cache: &CacheManager) {
    assert_eq!(cache.increment("hits", 3).unwrap(), 3);
    assert_eq!(cache.increment("hits", 4).unwrap(), 7);
    assert_eq!(cache.increment("hits", -10).unwrap(), -3);
    assert_eq!(cache.get::<i64>("hits"), Some(-3));

    cache.put("text", "seven").unwrap();
    assert!(cache.increment("text", 1).is_err());
}

pub fn key_lock_is_exclusive_until_expiry(cache: &CacheManager) {
    let lock = KeyLock::new(cache.clone());

    assert!(lock.lock("k", 100).unwrap());
    assert!(!lock.lock("k", 100).unwrap());

    thread::sleep(Duration::from_millis(200));
    assert!(lock.lock("k", 100).unwrap());

    assert!(matches!(
        lock.lock("other", -5),
        Err(CacheError::InvalidArgument(_))
    ));
}

pub fn put_all_writes_every_entry(cache: &CacheManager) {
    cache
        .put_all([("a", 1_i32), ("b", 2_i32)], Duration::from_secs(60))
        .unwrap();

    assert_eq!(cache.get::<i32>("a"), Some(1));
    assert_eq!(cache.get::<i32>("b"), Some(2));
}

pub fn put_all_aborts_on_non_serializable_value(cache: &CacheManager) {
    let mut map = HashMap::new();
    map.insert((1, 2), 3);

    let entries: Vec<(&str, Object<Option<HashMap<(i32, i32), i32>>>)> =
        vec![("a", Object(None)), ("b", Object(Some(map)))];
    assert!(matches!(
        cache.put_all(entries, Duration::ZERO),
        Err(CacheError::NotSerializable(_))
    ));
    assert!(!cache.contains("a"));
    assert!(!cache.contains("b"));
}

pub fn lock_gives_mutual_exclusion(cache: &CacheManager) {
    const WORKERS: usize = 4;
    const ROUNDS: usize = 5;

    let inside = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let lock = Lock::new(cache.clone());
            let inside = Arc::clone(&inside);
            let overlapped = Arc::clone(&overlapped);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    lock.lock("critical", 2_000).unwrap();
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlapped.store(true, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    lock.release_lock("critical").unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert!(!overlapped.load(Ordering::SeqCst));
}

pub fn lock_times_out_when_held(cache: &CacheManager) {
    let holder = Lock::new(cache.clone());
    holder.lock("busy", 1_000).unwrap();

    let waiter = Lock::new(cache.clone());
    match waiter.lock("busy", 2) {
        Err(CacheError::LockTimeout { key, attempts }) => {
            assert_eq!(key, "busy");
            assert_eq!(attempts, 2);
        }
        other => panic!("expected a lock timeout, got {:?}", other),
    }

    holder.release_lock("busy").unwrap();
    waiter.lock("busy", 2).unwrap();
}
