//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use webhook_receiver::{router, start, AppState, Config, ServerHandle};

/// A running server bound to an ephemeral port.
pub struct TestServer {
    pub handle: ServerHandle,
    pub base_url: String,
}

/// Config bound to an ephemeral port with an optional secret.
pub fn test_config(secret: Option<&str>) -> Config {
    Config {
        port: 0,
        webhook_secret: secret.map(str::to_string),
        ..Config::default()
    }
}

pub async fn spawn_app(config: Config) -> TestServer {
    let app = router(AppState::new(config.clone()));
    spawn_router(&config, app).await
}

pub async fn spawn_router(config: &Config, app: Router) -> TestServer {
    let handle = start(config, app).await.expect("server should start");
    let base_url = format!("http://127.0.0.1:{}", handle.local_addr().port());
    TestServer { handle, base_url }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap()
}
