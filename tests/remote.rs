//! The manager contract over `RemoteStore` talking to a live server.
//!
//! One server runs per test binary on an ephemeral port; every test uses its
//! own namespace on it.

#[macro_use]
mod common;

use pcache::{server, CacheManager, MemoryStore, RemoteStore, Store, StoreError};
use std::sync::mpsc;
use std::sync::{Arc, OnceLock};
use std::thread;
use tokio::net::TcpListener;

fn server_addr() -> &'static str {
    static ADDR: OnceLock<String> = OnceLock::new();
    ADDR.get_or_init(|| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("failed to build server runtime");
            runtime.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap().to_string()).unwrap();
                let store = Arc::new(MemoryStore::default());
                server::run(listener, store, std::future::pending::<()>())
                    .await
                    .unwrap();
            });
        });
        rx.recv().expect("server thread died before binding")
    })
}

fn remote_manager(namespace: &str) -> CacheManager {
    let store = RemoteStore::connect(server_addr()).unwrap();
    let cache = common::manager_for(Arc::new(store), namespace);
    cache.flush_cache().unwrap();
    cache
}

contract_tests! {
    remote_manager;
    get_returns_what_was_put,
    put_of_non_serializable_value_fails,
    remove_deletes_and_is_idempotent,
    first_safe_put_wins,
    second_snapshot_wins_when_used_first,
    safe_put_with_ttl_expires,
    unknown_key_has_no_safe_value,
    safe_put_after_removal_is_rejected,
    concurrent_safe_puts_have_one_winner,
    flush_clears_the_namespace,
    flush_of_empty_namespace_is_ok,
    get_all_with_every_key_present,
    get_all_with_some_keys_present,
    get_all_with_no_keys_present,
    get_all_with_prefix,
    prefixed_keys_miss_without_prefix,
    huge_ttl_keeps_store_usable,
    get_all_treats_other_types_as_missed,
    get_all_with_mixed_types,
    get_all_with_composite_objects,
    get_all_or_else_fills_misses,
    try_lock_on_unknown_key,
    try_lock_on_existing_key,
    increment_counts_from_delta,
    key_lock_is_exclusive_until_expiry,
    put_all_writes_every_entry,
    put_all_aborts_on_non_serializable_value,
    lock_gives_mutual_exclusion,
    lock_times_out_when_held,
}

#[test]
fn test_ping_and_stats() {
    let store = RemoteStore::connect(server_addr()).unwrap();
    store.ping().unwrap();

    let stats = store.stats().unwrap();
    assert!(stats.contains("hits:"));
    assert!(stats.contains("cas_ok:"));
}

#[test]
fn test_server_errors_are_reported() {
    let store = RemoteStore::connect(server_addr()).unwrap();
    store
        .set("errors:text", bytes::Bytes::from_static(b"\x01abc"), None)
        .unwrap();

    let err = store.increment("errors:text", 1).unwrap_err();
    assert!(matches!(err, StoreError::Server(_)));
}

#[test]
fn test_binary_values_survive_the_wire() {
    let store = RemoteStore::connect(server_addr()).unwrap();
    let value = bytes::Bytes::from_static(b"\x00\r\n$-1\r\n\xff");

    store.set("wire:binary", value.clone(), None).unwrap();
    assert_eq!(store.get("wire:binary").unwrap(), Some(value));
}

#[test]
fn test_two_clients_share_one_server() {
    let first = remote_manager("shared_server");
    let second = common::manager_for(
        Arc::new(RemoteStore::connect(server_addr()).unwrap()),
        "shared_server",
    );

    first.put("k", 41_i64).unwrap();
    assert_eq!(second.increment("k", 1).unwrap(), 42);
    assert_eq!(first.get::<i64>("k"), Some(42));
}
