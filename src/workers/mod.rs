//! Generic worker loop, instantiated once per job type.
//!
//! The loop blocks on the queue with a timeout (the pacing mechanism),
//! runs the handler, and goes back to idle. A handler or broker error is
//! logged and followed by a short pause; a single bad job never
//! terminates the worker. Handlers must be safe to invoke more than once
//! for the same logical unit of work: the queue is at-least-once.

pub mod payment;
pub mod refund;
pub mod webhook;

use crate::config::WorkerConfig;
use crate::error::AppResult;
use crate::jobs::JobEnvelope;
use crate::queue::JobQueue;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, envelope: JobEnvelope) -> AppResult<()>;
}

/// Runs a worker loop until the shutdown flag flips. An in-flight handler
/// finishes before the loop exits; only new dequeues stop.
pub async fn run_worker(
    queue: Arc<dyn JobQueue>,
    queue_name: &'static str,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(queue = queue_name, "worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let popped = tokio::select! {
            _ = shutdown.changed() => break,
            popped = queue.pop_blocking(queue_name, config.poll_timeout()) => popped,
        };

        match popped {
            Ok(Some(envelope)) => {
                if let Err(e) = handler.handle(envelope).await {
                    error!(queue = queue_name, "job handler failed: {}", e);
                    tokio::time::sleep(config.error_pause()).await;
                }
            }
            Ok(None) => {
                // Dequeue timeout: stay idle and re-poll.
            }
            Err(e) => {
                error!(queue = queue_name, "queue error: {}", e);
                tokio::time::sleep(config.error_pause()).await;
            }
        }
    }

    info!(queue = queue_name, "worker stopped");
}
