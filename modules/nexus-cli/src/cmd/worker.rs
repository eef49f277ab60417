use anyhow::Result;
use console::style;
use nexus_worker::{TaskEnvelope, Worker, WorkerError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Run a worker on `queue`, taking newline-delimited task envelopes from stdin.
pub async fn run(queue: &str, concurrency: usize) -> Result<()> {
    eprintln!(
        "{}",
        style(format!("Starting worker for queue: {queue}")).blue().bold()
    );

    let config = super::worker_config();
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(super::print_reports(rx));
    let worker = Worker::start(&config, queue, concurrency, super::listening_tasks(), tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, draining worker");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let envelope: TaskEnvelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Skipping malformed task envelope");
                continue;
            }
        };
        match worker.submit(envelope).await {
            Ok(()) => {}
            Err(e @ WorkerError::WrongQueue { .. }) => warn!(error = %e, "Skipping task"),
            Err(e) => return Err(e.into()),
        }
    }

    worker.shutdown().await;
    printer.await?;
    Ok(())
}
