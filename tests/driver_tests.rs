
use std::time::Duration;

use queue_janitor::config::JanitorConfig;
use queue_janitor::{Driver, Janitor, JanitorError};
use test_harness::{claim, minutes_ago, test_config, FakeCluster, MemoryStore};
use tokio_util::sync::CancellationToken;

fn create_test_driver(
    store: &MemoryStore,
    cluster: &FakeCluster,
    config: JanitorConfig,
) -> Driver<MemoryStore, FakeCluster> {
    Driver::new(Janitor::new(store.clone(), cluster.clone(), config))
}

#[tokio::test]
async fn test_run_once_publishes_stats() {
    let store = MemoryStore::new();
    let cluster = FakeCluster::new();
    claim(&store, "job-1", "dead", "predicting", &minutes_ago(60));
    let mut driver = create_test_driver(&store, &cluster, test_config());
    let stats = driver.stats();

    let report = driver.run_once().await.unwrap();

    assert_eq!(report.requeued, 1);
    let published = stats.read().await;
    assert_eq!(published.sweeps, 1);
    assert_eq!(published.total_repairs, 1);
    assert_eq!(published.last_report.as_ref(), Some(&report));
}

#[tokio::test(start_paused = true)]
async fn test_run_sweeps_every_interval() {
    let store = MemoryStore::new();
    let cluster = FakeCluster::new();
    let config = JanitorConfig {
        interval: Duration::from_secs(20),
        ..test_config()
    };
    let driver = create_test_driver(&store, &cluster, config);
    let stats = driver.stats();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(driver.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(stats.read().await.sweeps, 1);

    claim(&store, "job-1", "dead", "predicting", &minutes_ago(60));
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(stats.read().await.sweeps, 2);
    assert_eq!(store.list("q"), vec!["job-1"]);

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let store = MemoryStore::new();
    let cluster = FakeCluster::new();
    let config = JanitorConfig {
        interval: Duration::from_secs(3600),
        ..test_config()
    };
    let driver = create_test_driver(&store, &cluster, config);
    let stats = driver.stats();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(driver.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("driver did not stop");
    assert!(result.unwrap().is_ok());
    assert_eq!(stats.read().await.sweeps, 1);
}

#[tokio::test]
async fn test_run_skips_sweep_when_already_cancelled() {
    let store = MemoryStore::new();
    let cluster = FakeCluster::new();
    let driver = create_test_driver(&store, &cluster, test_config());
    let stats = driver.stats();
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    driver.run(shutdown).await.unwrap();

    assert_eq!(stats.read().await.sweeps, 0);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_run_returns_fatal_store_error() {
    let store = MemoryStore::new();
    let cluster = FakeCluster::new();
    store.fail_hard(Some("WRONGTYPE"));
    let driver = create_test_driver(&store, &cluster, test_config());

    let err = driver.run(CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, JanitorError::Store(_)));
}
