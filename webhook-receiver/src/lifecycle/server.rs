//! Listener ownership, shutdown latch and bounded drain.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use thiserror::Error;
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use super::connections;
use crate::Config;

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to bind to port {port}: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("Server error: {0}")]
    Serve(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Stopped = 0,
    Starting = 1,
    Listening = 2,
    ShuttingDown = 3,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LifecycleState::Starting,
            2 => LifecycleState::Listening,
            3 => LifecycleState::ShuttingDown,
            _ => LifecycleState::Stopped,
        }
    }
}

/// How the server came down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight request finished before the deadline.
    Graceful,
    /// The deadline passed; pending requests were abandoned.
    Forced,
    /// The server stopped on its own because of an error.
    Failed,
}

impl ShutdownOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Graceful => 0,
            ShutdownOutcome::Forced | ShutdownOutcome::Failed => 1,
        }
    }
}

struct Shared {
    state: AtomicU8,
    shutdown_tx: watch::Sender<bool>,
}

impl Shared {
    fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state: AtomicU8::new(LifecycleState::Stopped as u8),
            shutdown_tx,
        }
    }

    fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Cloneable handle used by signal listeners to request shutdown.
#[derive(Clone)]
pub struct ShutdownTrigger {
    shared: Arc<Shared>,
}

impl ShutdownTrigger {
    /// Request shutdown.
    ///
    /// Only the first call while `Listening` has any effect; it returns
    /// `true`. Later calls return `false` and leave the deadline alone.
    pub fn trigger(&self) -> bool {
        let latched = self
            .shared
            .state
            .compare_exchange(
                LifecycleState::Listening as u8,
                LifecycleState::ShuttingDown as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if latched {
            info!("shutdown_started");
            self.shared.shutdown_tx.send_replace(true);
        } else {
            info!(state = ?self.shared.state(), "shutdown_already_in_progress");
        }

        latched
    }
}

/// Owns the running server. Returned by [`start`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_timeout: Duration,
    shared: Arc<Shared>,
    serve: JoinHandle<()>,
}

/// Bind the configured port and start serving `router`.
///
/// Port 0 binds an OS-assigned ephemeral port; see
/// [`ServerHandle::local_addr`] for the result.
pub async fn start(config: &Config, router: Router) -> Result<ServerHandle, LifecycleError> {
    let shared = Arc::new(Shared::new());
    shared.set(LifecycleState::Starting);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => {
            shared.set(LifecycleState::Stopped);
            error!(address = %addr, error = %source, "server_bind_failed");
            return Err(LifecycleError::Bind {
                port: config.port,
                source,
            });
        }
    };

    let local_addr = match listener.local_addr() {
        Ok(local_addr) => local_addr,
        Err(e) => {
            shared.set(LifecycleState::Stopped);
            return Err(LifecycleError::Serve(e));
        }
    };

    let shutdown_rx = shared.shutdown_tx.subscribe();
    let serve = tokio::spawn(connections::serve(listener, router, shutdown_rx));

    shared.set(LifecycleState::Listening);
    info!(address = %local_addr, "server_listening");

    Ok(ServerHandle {
        local_addr,
        shutdown_timeout: config.shutdown_timeout,
        shared,
        serve,
    })
}

impl ServerHandle {
    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run until shutdown is triggered, then drain within the deadline.
    ///
    /// When the deadline passes, the accept loop and every open connection
    /// are cancelled before this returns; pending requests get no response.
    pub async fn wait(self) -> ShutdownOutcome {
        let ServerHandle {
            shutdown_timeout,
            shared,
            mut serve,
            ..
        } = self;

        let mut shutdown_rx = shared.shutdown_tx.subscribe();

        let finished = tokio::select! {
            biased;
            _ = connections::wait_for_stop(&mut shutdown_rx) => None,
            result = &mut serve => Some(result),
        };

        let requested = *shared.shutdown_tx.borrow();
        if !requested {
            shared.set(LifecycleState::Stopped);
            match finished {
                Some(Err(e)) => error!(error = %e, "server_task_failed"),
                _ => error!("server_exited_without_shutdown"),
            }
            return ShutdownOutcome::Failed;
        }

        info!(
            timeout_ms = shutdown_timeout.as_millis() as u64,
            "shutdown_draining"
        );
        let started = Instant::now();

        let drained = match finished {
            Some(result) => Ok(result),
            None => tokio::time::timeout(shutdown_timeout, &mut serve).await,
        };

        let outcome = match drained {
            Ok(Ok(())) => {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "shutdown_drained"
                );
                ShutdownOutcome::Graceful
            }
            Ok(Err(e)) => {
                error!(error = %e, "server_task_failed");
                ShutdownOutcome::Failed
            }
            Err(_) => {
                serve.abort();
                // Cancelled: the connection set is dropped with the task.
                let _ = serve.await;
                warn!(
                    timeout_ms = shutdown_timeout.as_millis() as u64,
                    "shutdown_deadline_exceeded"
                );
                ShutdownOutcome::Forced
            }
        };

        shared.set(LifecycleState::Stopped);
        outcome
    }
}
