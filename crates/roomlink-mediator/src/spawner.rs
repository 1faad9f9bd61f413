//! Task spawning seam.
//!
//! The mediator never calls `tokio::spawn` directly. Hosts supply a
//! [`TaskSpawner`] so they decide which runtime the delivery loop and the
//! inbound event pump run on, and how those tasks are named or tracked.

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;

/// Starts long-lived background tasks on behalf of a mediator.
pub trait TaskSpawner: Send + Sync + 'static {
    /// Starts `task` in the background. `name` identifies it in logs.
    fn spawn(&self, name: String, task: BoxFuture<'static, ()>);
}

/// Spawns onto a Tokio runtime.
///
/// With no handle, tasks go to the runtime of whoever calls `spawn`.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner {
    handle: Option<Handle>,
}

impl TokioSpawner {
    /// Spawns onto the ambient runtime.
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Spawns onto a specific runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, name: String, task: BoxFuture<'static, ()>) {
        tracing::trace!(task = %name, "spawning mediator task");
        match &self.handle {
            Some(handle) => {
                handle.spawn(task);
            }
            None => {
                tokio::spawn(task);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::FutureExt;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_tokio_spawner_runs_task() {
        let (tx, rx) = oneshot::channel();
        TokioSpawner::new().spawn(
            "test".into(),
            async move {
                let _ = tx.send(7);
            }
            .boxed(),
        );
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_tokio_spawner_with_handle() {
        let (tx, rx) = oneshot::channel();
        let spawner = TokioSpawner::with_handle(Handle::current());
        spawner.spawn(
            "test".into(),
            async move {
                let _ = tx.send("ran");
            }
            .boxed(),
        );
        assert_eq!(rx.await.unwrap(), "ran");
    }
}
