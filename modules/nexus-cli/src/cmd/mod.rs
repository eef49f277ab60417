pub mod scheduler;
pub mod search;
pub mod serve;
pub mod worker;

use std::sync::Arc;

use nexus_common::Settings;
use nexus_worker::{ListeningTasks, TaskReport, WorkerConfig};
use tokio::sync::mpsc;
use x_search::EnvAccountDirectory;

/// Worker settings from the loaded config, or from `CELERY_*` variables when
/// the config is incomplete.
fn worker_config() -> WorkerConfig {
    match Settings::from_env() {
        Ok(settings) => WorkerConfig::from_settings(Some(&settings)),
        Err(e) => {
            tracing::warn!(error = %e, "Settings unavailable, using CELERY_* variables");
            WorkerConfig::from_settings(None)
        }
    }
}

fn listening_tasks() -> Arc<ListeningTasks> {
    Arc::new(ListeningTasks::new(Arc::new(EnvAccountDirectory::from_env())))
}

/// Print each report as a JSON line until every sender is dropped.
async fn print_reports(mut reports: mpsc::UnboundedReceiver<TaskReport>) {
    while let Some(report) = reports.recv().await {
        match serde_json::to_string(&report) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, task_id = %report.id, "Unprintable report"),
        }
    }
}
