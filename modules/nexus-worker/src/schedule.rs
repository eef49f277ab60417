use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::error::{Result, WorkerError};
use crate::task::{ListeningTask, TaskEnvelope};
use crate::worker::Worker;

/// Parsed schedule file: a list of `[[listening]]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleFile {
    #[serde(default)]
    pub listening: Vec<ListeningJob>,
}

/// A listening task repeated every `every_minutes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListeningJob {
    pub name: String,
    pub every_minutes: u32,
    #[serde(flatten)]
    pub task: ListeningTask,
}

impl ScheduleFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkerError::Schedule(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: ScheduleFile =
            toml::from_str(content).map_err(|e| WorkerError::Schedule(e.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for job in &self.listening {
            if !names.insert(job.name.as_str()) {
                return Err(WorkerError::Schedule(format!(
                    "duplicate job name {:?}",
                    job.name
                )));
            }
            if job.every_minutes == 0 {
                return Err(WorkerError::Schedule(format!(
                    "job {:?}: every_minutes must be positive",
                    job.name
                )));
            }
            if job.task.org_id.trim().is_empty() {
                return Err(WorkerError::Schedule(format!(
                    "job {:?}: org_id is required",
                    job.name
                )));
            }
            x_search::build_search_query(&job.task.query_options()).map_err(|e| {
                WorkerError::Schedule(format!("job {:?}: {e}", job.name))
            })?;
        }
        Ok(())
    }
}

/// Decides which listening jobs are due and hands them to a worker.
pub struct ListeningScheduler {
    jobs: Vec<ListeningJob>,
    last_run: HashMap<String, DateTime<Utc>>,
}

impl ListeningScheduler {
    pub fn new(jobs: Vec<ListeningJob>) -> Self {
        Self {
            jobs,
            last_run: HashMap::new(),
        }
    }

    /// Jobs never run, or whose interval has elapsed by `now`. Marks them run.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<ListeningJob> {
        let mut due = Vec::new();
        for job in &self.jobs {
            let every = chrono::Duration::minutes(i64::from(job.every_minutes));
            let ready = match self.last_run.get(&job.name) {
                Some(last) => now - *last >= every,
                None => true,
            };
            if ready {
                self.last_run.insert(job.name.clone(), now);
                due.push(job.clone());
            }
        }
        due
    }

    /// Tick every `tick`, enqueueing due jobs, until `shutdown` resolves.
    pub async fn run(
        mut self,
        worker: &Worker,
        tick: Duration,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        info!(jobs = self.jobs.len(), tick_secs = tick.as_secs_f64(), "Scheduler started");

        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            for job in self.due(Utc::now()) {
                let envelope = TaskEnvelope::listening(&job.task)?;
                info!(job = %job.name, task_id = %envelope.id, "Enqueueing listening run");
                worker.submit(envelope).await?;
            }
        }
    }
}
