use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn, Instrument};

use crate::config::{TaskRoutes, WorkerConfig};
use crate::error::{Result, WorkerError};
use crate::task::{TaskEnvelope, TaskHandler, TaskOutcome, TaskReport};

#[derive(Debug, Clone, Copy)]
struct Limits {
    soft: Duration,
    hard: Duration,
    acks_late: bool,
}

/// A bounded pool executing tasks routed to one queue.
///
/// At most `concurrency` tasks run at once; up to
/// `concurrency * prefetch_multiplier` more wait in the queue buffer.
pub struct Worker {
    queue: String,
    routes: TaskRoutes,
    sender: mpsc::Sender<TaskEnvelope>,
    dispatcher: JoinHandle<()>,
}

impl Worker {
    /// Spawn the dispatcher. Must be called inside a Tokio runtime.
    pub fn start(
        config: &WorkerConfig,
        queue: impl Into<String>,
        concurrency: usize,
        handler: Arc<dyn TaskHandler>,
        reports: mpsc::UnboundedSender<TaskReport>,
    ) -> Self {
        let queue = queue.into();
        let concurrency = concurrency.max(1);
        let capacity = concurrency * config.worker_prefetch_multiplier.max(1);
        let limits = Limits {
            soft: config.task_soft_time_limit,
            hard: config.task_time_limit,
            acks_late: config.task_acks_late,
        };

        info!(
            app = %config.app_name,
            queue = %queue,
            concurrency,
            prefetch = capacity,
            broker = %nexus_common::redact_url(&config.broker_url),
            "Worker started"
        );

        let (sender, receiver) = mpsc::channel(capacity);
        let dispatcher = tokio::spawn(dispatch(receiver, concurrency, handler, reports, limits));

        Self {
            queue,
            routes: config.task_routes.clone(),
            sender,
            dispatcher,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Enqueue a task. Waits while the prefetch buffer is full.
    pub async fn submit(&self, envelope: TaskEnvelope) -> Result<()> {
        let routed = self.routes.queue_for(&envelope.task);
        if routed != self.queue {
            return Err(WorkerError::WrongQueue {
                task: envelope.task,
                routed: routed.to_string(),
                queue: self.queue.clone(),
            });
        }
        self.sender
            .send(envelope)
            .await
            .map_err(|_| WorkerError::Closed)
    }

    /// Stop accepting tasks, then wait for queued and running ones to finish.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "Worker dispatcher panicked");
        }
        info!(queue = %self.queue, "Worker stopped");
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<TaskEnvelope>,
    concurrency: usize,
    handler: Arc<dyn TaskHandler>,
    reports: mpsc::UnboundedSender<TaskReport>,
    limits: Limits,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut running = JoinSet::new();

    while let Some(envelope) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let handler = handler.clone();
        let reports = reports.clone();
        let span = tracing::info_span!("task", task_id = %envelope.id, task = %envelope.task);
        running.spawn(
            async move {
                let _permit = permit;
                execute(handler.as_ref(), envelope, &reports, limits).await;
            }
            .instrument(span),
        );
        while running.try_join_next().is_some() {}
    }

    while running.join_next().await.is_some() {}
}

async fn execute(
    handler: &dyn TaskHandler,
    envelope: TaskEnvelope,
    reports: &mpsc::UnboundedSender<TaskReport>,
    limits: Limits,
) {
    if !limits.acks_late {
        send_report(reports, &envelope, TaskOutcome::Accepted);
    }

    let started = Instant::now();
    let work = async {
        let fut = handler.handle(&envelope);
        tokio::pin!(fut);
        match tokio::time::timeout(limits.soft, &mut fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    soft_limit_secs = limits.soft.as_secs_f64(),
                    "Task exceeded soft time limit"
                );
                fut.await
            }
        }
    };

    let outcome = match tokio::time::timeout(limits.hard, work).await {
        Ok(Ok(result)) => TaskOutcome::Succeeded { result },
        Ok(Err(e)) => {
            warn!(error = %e, "Task failed");
            TaskOutcome::Failed {
                error: e.to_string(),
            }
        }
        Err(_) => {
            warn!(
                hard_limit_secs = limits.hard.as_secs_f64(),
                "Task exceeded hard time limit, abandoned"
            );
            TaskOutcome::TimedOut
        }
    };

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Task finished"
    );
    send_report(reports, &envelope, outcome);
}

fn send_report(
    reports: &mpsc::UnboundedSender<TaskReport>,
    envelope: &TaskEnvelope,
    outcome: TaskOutcome,
) {
    let report = TaskReport {
        id: envelope.id,
        task: envelope.task.clone(),
        outcome,
        at: Utc::now(),
    };
    if reports.send(report).is_err() {
        tracing::debug!("Report receiver dropped");
    }
}
