//! Worker pool for delivery attempts

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;

/// Spawn the configured number of delivery workers. Each worker exits
/// after finishing its current attempt once the token is cancelled; the
/// caller joins the returned handles to wait for a clean stop.
pub fn spawn(engine: Arc<Engine>, token: CancellationToken) -> Vec<JoinHandle<()>> {
    let workers = engine.config().workers;
    tracing::info!(workers, "starting worker pool");
    (0..workers)
        .map(|index| {
            let engine = engine.clone();
            let token = token.clone();
            tokio::spawn(worker_loop(engine, index, token))
        })
        .collect()
}

async fn worker_loop(engine: Arc<Engine>, index: usize, token: CancellationToken) {
    tracing::debug!(worker = index, "worker started");
    loop {
        if token.is_cancelled() {
            break;
        }

        let Some(task) = engine.dequeue_ready() else {
            // Nothing due (or paused): idle briefly, but wake up promptly
            // for shutdown.
            tokio::select! {
                _ = tokio::time::sleep(engine.config().poll_interval) => {}
                _ = token.cancelled() => break,
            }
            continue;
        };

        engine.throttle().await;

        let task_id = task.id.clone();
        if let Err(e) = engine.attempt(task).await {
            // The attempt itself ran; what failed is persisting its
            // outcome. Surface it loudly, the task file is the source of
            // truth for what happens on the next boot.
            tracing::error!(task_id = %task_id, error = %e, "failed to settle delivery attempt");
        }
    }
    tracing::debug!(worker = index, "worker stopped");
}
