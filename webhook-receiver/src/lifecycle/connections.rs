//! Accept loop with owned connection tasks.
//!
//! Every connection runs inside a `JoinSet` owned by the accept loop, so
//! cancelling the loop's task drops the set and aborts every connection
//! still open, including requests that have not answered yet.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::ConnectInfo, Extension, Router};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::JoinSet,
};
use tracing::{debug, error, info};

/// Serve `router` until the shutdown flag flips, then wait for every open
/// connection to finish its current request.
pub(crate) async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = wait_for_stop(&mut shutdown_rx) => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    let router = router.clone();
                    let shutdown_rx = shutdown_rx.clone();
                    connections.spawn(serve_connection(stream, remote_addr, router, shutdown_rx));
                }
                Err(e) if is_connection_error(&e) => {
                    debug!(error = %e, "accept_connection_error");
                }
                Err(e) => {
                    // Usually fd exhaustion; back off instead of spinning.
                    error!(error = %e, "accept_failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            },
        }
    }

    drop(listener);
    info!(open_connections = connections.len(), "server_stopped_accepting");

    while connections.join_next().await.is_some() {}
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    router: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let service = TowerToHyperService::new(router.layer(Extension(ConnectInfo(remote_addr))));
    let builder = Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(remote_addr = %remote_addr, error = %e, "connection_error");
            }
        }
        _ = wait_for_stop(&mut shutdown_rx) => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.as_mut().await {
                debug!(remote_addr = %remote_addr, error = %e, "connection_error");
            }
        }
    }
}

/// Resolves once shutdown is requested or the owning handle is gone.
pub(crate) async fn wait_for_stop(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
