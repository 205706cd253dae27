//! Lifecycle for the long-running listeners (HTTP server, bots).
//!
//! Every listener gets a child of one root [`CancellationToken`]. Shutdown
//! cancels the root, waits for the listeners until a shared deadline, then
//! aborts whatever is still running.

use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::Notify, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Failed(String),
    Aborted,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, o)| matches!(o, Outcome::Finished))
    }

    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }
}

struct Task {
    name: String,
    handle: JoinHandle<std::result::Result<(), String>>,
}

/// Counts a listener as exited when its task ends, however it ends.
struct ExitGuard {
    running: Arc<AtomicUsize>,
    exited: Arc<Notify>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.exited.notify_waiters();
    }
}

pub struct Supervisor {
    root: CancellationToken,
    tasks: Vec<Task>,
    running: Arc<AtomicUsize>,
    exited: Arc<Notify>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: Vec::new(),
            running: Arc::new(AtomicUsize::new(0)),
            exited: Arc::new(Notify::new()),
        }
    }

    /// Spawn a listener. `start` receives the listener's own token.
    pub fn spawn<F, Fut, E>(&mut self, name: impl Into<String>, start: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let name = name.into();
        let token = self.root.child_token();
        let fut = start(token.clone());

        self.running.fetch_add(1, Ordering::SeqCst);
        let guard = ExitGuard {
            running: self.running.clone(),
            exited: self.exited.clone(),
        };

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            // Dropped on return, panic or abort alike.
            let _guard = guard;
            let res = fut.await.map_err(|e| e.to_string());
            match &res {
                Ok(()) if token.is_cancelled() => {
                    tracing::info!(listener = %task_name, "listener stopped");
                }
                Ok(()) => tracing::warn!(listener = %task_name, "listener exited on its own"),
                Err(e) => tracing::error!(listener = %task_name, error = %e, "listener failed"),
            }
            res
        });

        tracing::info!(listener = %name, "listener started");
        self.tasks.push(Task { name, handle });
    }

    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolves once every spawned listener has exited (for any reason).
    pub async fn all_exited(&self) {
        loop {
            let notified = self.exited.notified();
            if self.running() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Cancel every listener and collect outcomes; stragglers past `timeout` are aborted.
    pub async fn shutdown(self, timeout: Duration) -> ShutdownReport {
        self.root.cancel();
        let deadline = tokio::time::Instant::now() + timeout;

        let mut report = ShutdownReport::default();
        for Task { name, mut handle } in self.tasks {
            let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(Ok(()))) => Outcome::Finished,
                Ok(Ok(Err(e))) => Outcome::Failed(e),
                Ok(Err(join)) => Outcome::Failed(join.to_string()),
                Err(_) => {
                    handle.abort();
                    tracing::warn!(listener = %name, "listener did not stop in time; aborted");
                    Outcome::Aborted
                }
            };
            report.outcomes.push((name, outcome));
        }
        report
    }
}

/// Wait for SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
