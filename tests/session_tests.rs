//! Session lifecycle driven end to end through the bus and the activity feed

mod common;

use chronicle::{
    ActivityKind, AuthService, CancellationToken, ChronicleConfig, ChronicleEngine, EntityKind,
    InvalidationBus, LocalAuth, MemoryStore,
};
use common::{bilbo, SpyAuth};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn config() -> ChronicleConfig {
    let mut config = ChronicleConfig::default();
    config.session.throttle_ms = 1_000;
    config.session.poll_interval_ms = 2_000;
    config.session.expiry_window_ms = 10_000;
    config
}

fn spied_engine() -> (ChronicleEngine, Arc<SpyAuth>) {
    spied_engine_with(config())
}

fn spied_engine_with(config: ChronicleConfig) -> (ChronicleEngine, Arc<SpyAuth>) {
    let bus = InvalidationBus::new(config.bus.capacity);
    let auth = Arc::new(SpyAuth::new(LocalAuth::new(
        bus.clone(),
        config.session.expiry_window(),
    )));
    let engine = ChronicleEngine::new(Arc::new(MemoryStore::new()), auth.clone(), bus, config);
    (engine, auth)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn activity_burst_refreshes_once() {
    let (engine, auth) = spied_engine();
    auth.sign_in(bilbo());
    let (tx, rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let (_manager, handle) = engine.spawn_session(rx, cancel.clone());

    for kind in ActivityKind::ALL {
        tx.send(kind).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    settle().await;
    assert_eq!(auth.refresh_count(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    tx.send(ActivityKind::Click).await.unwrap();
    settle().await;
    assert_eq!(auth.refresh_count(), 2);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn steady_activity_keeps_session_alive() {
    let (engine, auth) = spied_engine();
    auth.sign_in(bilbo());
    let (tx, rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let (_manager, handle) = engine.spawn_session(rx, cancel.clone());

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(ActivityKind::KeyDown).await.unwrap();
    }
    settle().await;

    assert_eq!(auth.sign_out_count(), 0);
    assert!(auth.current_identity().is_some());
    assert_eq!(auth.refresh_count(), 6);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn inactivity_signs_out_exactly_once() {
    let (engine, auth) = spied_engine();
    auth.sign_in(bilbo());
    let (tx, rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let (manager, handle) = engine.spawn_session(rx, cancel.clone());

    tx.send(ActivityKind::PointerDown).await.unwrap();
    tokio::time::sleep(Duration::from_secs(13)).await;
    assert_eq!(auth.sign_out_count(), 1);
    assert!(auth.current_identity().is_none());
    assert!(!manager.is_attached());

    tokio::time::sleep(Duration::from_secs(30)).await;
    tx.send(ActivityKind::PointerDown).await.unwrap();
    settle().await;
    assert_eq!(auth.sign_out_count(), 1);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn sign_in_reattaches_with_fresh_clock() {
    let (engine, auth) = spied_engine();
    let (tx, rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let (manager, handle) = engine.spawn_session(rx, cancel.clone());
    assert!(!manager.is_attached());

    tx.send(ActivityKind::Scroll).await.unwrap();
    settle().await;
    assert_eq!(auth.refresh_count(), 0);

    auth.sign_in(bilbo());
    settle().await;
    assert!(manager.is_attached());
    assert!(manager.last_activity().is_none());

    tx.send(ActivityKind::Scroll).await.unwrap();
    settle().await;
    assert_eq!(auth.refresh_count(), 1);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn sign_in_lost_to_lag_still_expires() {
    let mut config = config();
    config.bus.capacity = 2;
    let (engine, auth) = spied_engine_with(config);
    let (_tx, rx) = mpsc::channel::<ActivityKind>(8);
    let cancel = CancellationToken::new();
    let (manager, handle) = engine.spawn_session(rx, cancel.clone());

    // The sign-in signal is pushed out of the queue before the manager runs
    auth.sign_in(bilbo());
    for _ in 0..3 {
        engine.bus().collection_changed(EntityKind::Note);
    }
    settle().await;
    assert!(manager.is_attached());

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(auth.sign_out_count(), 1);
    assert!(auth.current_identity().is_none());
    assert!(!manager.is_attached());

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn closing_the_activity_feed_stops_the_manager() {
    let (engine, _auth) = spied_engine();
    let (tx, rx) = mpsc::channel::<ActivityKind>(1);
    let (_manager, handle) = engine.spawn_session(rx, CancellationToken::new());

    drop(tx);
    handle.await.unwrap();
}
