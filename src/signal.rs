//! Signal handling for interruptible runs.
//!
//! SIGINT and SIGTERM cancel a shared [`ShutdownToken`]. Long operations
//! race against [`ShutdownToken::cancelled`] and return normally, so every
//! RAII guard (notably temporary download files) is dropped before exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::Notify;
use tracing::{info, warn};

struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// A token that can be shared across tasks to check for shutdown.
#[derive(Clone)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Check if shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel() is not missed
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Listens for SIGINT/SIGTERM and cancels the token it was given.
///
/// If signal handlers cannot be registered (e.g., in restricted environments),
/// the guard is still created but signal handling will be disabled.
pub struct ShutdownGuard {
    handle: tokio::task::JoinHandle<()>,
}

impl ShutdownGuard {
    /// Register the handlers, then wait for a signal in the background.
    ///
    /// Registration happens before returning, so a signal delivered right
    /// after `new` is not lost.
    pub fn new(token: ShutdownToken) -> Self {
        let sigint = register(SignalKind::interrupt(), "SIGINT");
        let sigterm = register(SignalKind::terminate(), "SIGTERM");

        let handle = tokio::spawn(async move {
            match (sigint, sigterm) {
                (Some(mut int), Some(mut term)) => {
                    tokio::select! {
                        _ = int.recv() => info!("Received SIGINT, cleaning up..."),
                        _ = term.recv() => info!("Received SIGTERM, cleaning up..."),
                    }
                }
                (Some(mut int), None) => {
                    int.recv().await;
                    info!("Received SIGINT, cleaning up...");
                }
                (None, Some(mut term)) => {
                    term.recv().await;
                    info!("Received SIGTERM, cleaning up...");
                }
                (None, None) => {
                    warn!("No signal handlers registered - interruption cleanup disabled");
                    return;
                }
            }
            token.cancel();
        });

        Self { handle }
    }
}

fn register(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Failed to register {} handler: {}", name, e);
            None
        }
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
