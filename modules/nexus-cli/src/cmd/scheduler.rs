use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use nexus_worker::{ListeningScheduler, ScheduleFile, Worker};
use tokio::sync::mpsc;

const TICK: Duration = Duration::from_secs(30);
const QUEUE: &str = "default";

/// Run the listening schedule with an embedded worker until Ctrl-C.
pub async fn run(schedule: &Path, concurrency: usize) -> Result<()> {
    eprintln!("{}", style("Starting scheduler...").yellow().bold());

    let file = ScheduleFile::load(schedule)
        .with_context(|| format!("Failed to load schedule {}", schedule.display()))?;
    let config = super::worker_config();

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(super::print_reports(rx));
    let worker = Worker::start(&config, QUEUE, concurrency, super::listening_tasks(), tx);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let result = ListeningScheduler::new(file.listening)
        .run(&worker, TICK, shutdown)
        .await;

    worker.shutdown().await;
    printer.await?;
    result.context("Scheduler failed")
}
