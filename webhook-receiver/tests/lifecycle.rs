//! Startup, drain and forced shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{routing::get, Router};
use reqwest::StatusCode;

mod common;

use common::{client, spawn_app, spawn_router, test_config};
use webhook_receiver::{LifecycleState, ShutdownOutcome};

fn slow_router(delay: Duration) -> Router {
    Router::new().route(
        "/slow",
        get(move || async move {
            tokio::time::sleep(delay).await;
            "done"
        }),
    )
}

#[tokio::test]
async fn test_ephemeral_port_is_assigned() {
    let server = spawn_app(test_config(None)).await;

    assert!(server.handle.local_addr().port() > 0);
    assert_eq!(server.handle.state(), LifecycleState::Listening);

    server.handle.shutdown_trigger().trigger();
    assert_eq!(server.handle.wait().await, ShutdownOutcome::Graceful);
}

#[tokio::test]
async fn test_idle_shutdown_is_graceful() {
    let server = spawn_app(test_config(None)).await;
    let trigger = server.handle.shutdown_trigger();

    let res = client().get(&server.base_url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let started = Instant::now();
    assert!(trigger.trigger());
    let outcome = server.handle.wait().await;

    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert_eq!(outcome.exit_code(), 0);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_second_trigger_is_ignored() {
    let server = spawn_app(test_config(None)).await;
    let first = server.handle.shutdown_trigger();
    let second = server.handle.shutdown_trigger();

    assert!(first.trigger());
    assert_eq!(server.handle.state(), LifecycleState::ShuttingDown);
    assert!(!second.trigger());
    assert!(!first.trigger());

    assert_eq!(server.handle.wait().await, ShutdownOutcome::Graceful);
    assert!(!first.trigger());
}

#[tokio::test]
async fn test_in_flight_request_drains() {
    let config = webhook_receiver::Config {
        shutdown_timeout: Duration::from_secs(5),
        ..test_config(None)
    };
    let server = spawn_router(&config, slow_router(Duration::from_millis(300))).await;
    let trigger = server.handle.shutdown_trigger();

    let url = format!("{}/slow", server.base_url);
    let request = tokio::spawn(async move { client().get(url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(trigger.trigger());

    assert_eq!(server.handle.wait().await, ShutdownOutcome::Graceful);

    let res = request.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_new_connections_rejected_after_shutdown() {
    let config = webhook_receiver::Config {
        shutdown_timeout: Duration::from_secs(5),
        ..test_config(None)
    };
    let server = spawn_router(&config, slow_router(Duration::from_millis(500))).await;
    let trigger = server.handle.shutdown_trigger();
    let base_url = server.base_url.clone();

    let slow_url = format!("{}/slow", base_url);
    let in_flight = tokio::spawn(async move { client().get(slow_url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    trigger.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let late = client().get(format!("{}/slow", base_url)).send().await;
    assert!(late.is_err());

    assert_eq!(server.handle.wait().await, ShutdownOutcome::Graceful);
    assert_eq!(in_flight.await.unwrap().unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_drain_deadline_forces_shutdown() {
    let config = webhook_receiver::Config {
        shutdown_timeout: Duration::from_millis(200),
        ..test_config(None)
    };
    let server = spawn_router(&config, slow_router(Duration::from_secs(30))).await;
    let trigger = server.handle.shutdown_trigger();

    let url = format!("{}/slow", server.base_url);
    let request = tokio::spawn(async move { client().get(url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    assert!(trigger.trigger());
    let outcome = server.handle.wait().await;

    assert_eq!(outcome, ShutdownOutcome::Forced);
    assert_eq!(outcome.exit_code(), 1);
    assert!(started.elapsed() < Duration::from_secs(5));

    // The connection was torn down with the server; no response arrives.
    let pending = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("pending request should end once the server is gone")
        .unwrap();
    assert!(pending.is_err());
}

#[tokio::test]
async fn test_forced_shutdown_cancels_handler() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let app = Router::new().route(
        "/slow",
        get(move || {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                flag.store(true, Ordering::SeqCst);
                "done"
            }
        }),
    );
    let config = webhook_receiver::Config {
        shutdown_timeout: Duration::from_millis(200),
        ..test_config(None)
    };
    let server = spawn_router(&config, app).await;
    let trigger = server.handle.shutdown_trigger();

    let url = format!("{}/slow", server.base_url);
    let request = tokio::spawn(async move { client().get(url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    trigger.trigger();
    assert_eq!(server.handle.wait().await, ShutdownOutcome::Forced);

    let pending = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .unwrap()
        .unwrap();
    assert!(pending.is_err());

    // Well past the handler's sleep: it was dropped, not left running.
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_repeated_idle_shutdowns_drain() {
    for _ in 0..20 {
        let server = spawn_app(test_config(None)).await;
        let trigger = server.handle.shutdown_trigger();

        let res = client().get(&server.base_url).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        assert!(trigger.trigger());
        assert_eq!(server.handle.wait().await, ShutdownOutcome::Graceful);
        assert!(!trigger.trigger());
    }
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let server = spawn_app(test_config(None)).await;
    let config = webhook_receiver::Config {
        port: server.handle.local_addr().port(),
        ..test_config(None)
    };

    let result = webhook_receiver::start(&config, Router::new()).await;
    assert!(matches!(
        result,
        Err(webhook_receiver::lifecycle::LifecycleError::Bind { .. })
    ));

    server.handle.shutdown_trigger().trigger();
    server.handle.wait().await;
}
