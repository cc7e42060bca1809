//! Integration tests for the Redis-backed coordination store.
//!
//! Require Docker (via testcontainers); skipped in environments without
//! Docker by simply failing at container startup.
//!
//! Run with: `cargo test --test redis_integration --features redis`

use tollgate::store::redis_store::RedisStore;
use tollgate::store::{Store, StoreOp, StoreReply};

use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

async fn start_redis() -> (RedisStore, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379_u16.tcp())
        .start()
        .await
        .expect("failed to start redis container");

    let host = container.get_host().await.expect("get host");
    let port = container.get_host_port_ipv4(6379).await.expect("get port");

    let url = format!("redis://{}:{}", host, port);
    let store = RedisStore::connect(&url, 4).await.expect("connect to redis");

    (store, container)
}

#[tokio::test]
async fn test_incrby_expire_get_pipeline() {
    let (store, _container) = start_redis().await;

    let replies = store
        .execute(vec![
            StoreOp::IncrBy {
                key: "rate-limiter:request:checkout:1000".to_string(),
                amount: 7,
            },
            StoreOp::Expire {
                key: "rate-limiter:request:checkout:1000".to_string(),
                seconds: 3600,
            },
            StoreOp::Get {
                key: "rate-limiter:request:checkout:1000".to_string(),
            },
        ])
        .await
        .expect("pipeline execute");

    assert!(matches!(replies[0], StoreReply::Int(7)));
    assert!(matches!(replies[1], StoreReply::Ok));
    assert!(matches!(replies[2], StoreReply::Int(7)));
}

#[tokio::test]
async fn test_get_on_missing_key_is_nil() {
    let (store, _container) = start_redis().await;

    let replies = store
        .execute(vec![StoreOp::Get {
            key: "rate-limiter:request:never-written:1".to_string(),
        }])
        .await
        .expect("pipeline execute");

    assert!(matches!(replies[0], StoreReply::Nil));
}

#[tokio::test]
async fn test_incrby_accumulates_across_round_trips() {
    let (store, _container) = start_redis().await;
    let key = "rate-limiter:request:search:500".to_string();

    store
        .execute(vec![StoreOp::IncrBy { key: key.clone(), amount: 3 }])
        .await
        .unwrap();
    let replies = store
        .execute(vec![StoreOp::IncrBy { key: key.clone(), amount: 4 }])
        .await
        .unwrap();

    assert!(matches!(replies[0], StoreReply::Int(7)));
}

#[tokio::test]
async fn test_concurrent_instances_share_cluster_counter() {
    let (store, _container) = start_redis().await;
    let key = "rate-limiter:request:shared:900".to_string();

    // Two instances upload their own local counts for the same second.
    store
        .execute(vec![StoreOp::IncrBy { key: key.clone(), amount: 12 }])
        .await
        .unwrap();
    store
        .execute(vec![StoreOp::IncrBy { key: key.clone(), amount: 8 }])
        .await
        .unwrap();

    let replies = store.execute(vec![StoreOp::Get { key }]).await.unwrap();
    assert!(matches!(replies[0], StoreReply::Int(20)));
}
