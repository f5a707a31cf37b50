//! OS signal handling.
//!
//! SIGINT and SIGTERM are both translated into a shutdown trigger. The
//! listener keeps running after the first signal so repeats are observed
//! and logged rather than left to the default disposition.

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::server::ShutdownTrigger;

/// Spawn a task forwarding termination signals to `trigger`.
///
/// Handlers are installed before this returns, so a signal delivered right
/// after the call is never handled by the default disposition. Must be
/// called from within a tokio runtime.
#[cfg(unix)]
pub fn listen_for_signals(trigger: ShutdownTrigger) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    fn install(kind: SignalKind, name: &'static str) -> Option<Signal> {
        match signal(kind) {
            Ok(sig) => Some(sig),
            Err(e) => {
                error!(signal = name, error = %e, "signal_handler_install_failed");
                None
            }
        }
    }

    async fn recv(sig: &mut Option<Signal>) -> Option<()> {
        match sig {
            Some(sig) => sig.recv().await,
            None => None,
        }
    }

    let mut interrupt = install(SignalKind::interrupt(), "SIGINT");
    let mut terminate = install(SignalKind::terminate(), "SIGTERM");

    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = recv(&mut interrupt) => "SIGINT",
                Some(()) = recv(&mut terminate) => "SIGTERM",
                else => break,
            };

            info!(signal = name, "signal_received");
            trigger.trigger();
        }
    })
}

/// Spawn a task forwarding Ctrl+C to `trigger`.
#[cfg(not(unix))]
pub fn listen_for_signals(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(signal = "SIGINT", error = %e, "signal_handler_install_failed");
                break;
            }

            info!(signal = "SIGINT", "signal_received");
            trigger.trigger();
        }
    })
}
