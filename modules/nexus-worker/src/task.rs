use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use x_search::{search_and_normalize, AccountDirectory, MatchMode, SearchQueryOptions};

use crate::error::{Result, WorkerError};

pub const RUN_LISTENING: &str = "nexus.workers.tasks.run_listening";

/// A named task with JSON arguments, as it travels through a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub task: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(task: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
            args,
        }
    }

    pub fn listening(task: &ListeningTask) -> Result<Self> {
        Ok(Self::new(RUN_LISTENING, serde_json::to_value(task)?))
    }
}

/// One keyword search on behalf of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningTask {
    pub org_id: String,
    pub keywords: Vec<String>,
    #[serde(default = "default_hours_back")]
    pub hours_back: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default = "default_exclude_retweets")]
    pub exclude_retweets: bool,
}

fn default_hours_back() -> u32 {
    48
}

fn default_limit() -> u32 {
    50
}

fn default_exclude_retweets() -> bool {
    true
}

impl ListeningTask {
    pub fn query_options(&self) -> SearchQueryOptions {
        SearchQueryOptions {
            keywords: self.keywords.clone(),
            hours_back: self.hours_back,
            match_mode: self.match_mode,
            lang: self.lang.clone(),
            exclude_retweets: self.exclude_retweets,
        }
    }
}

/// Executes tasks by name.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<serde_json::Value>;
}

/// Handles [`RUN_LISTENING`] using org-scoped search providers.
pub struct ListeningTasks {
    accounts: Arc<dyn AccountDirectory>,
}

impl ListeningTasks {
    pub fn new(accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl TaskHandler for ListeningTasks {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<serde_json::Value> {
        if envelope.task != RUN_LISTENING {
            return Err(WorkerError::UnknownTask(envelope.task.clone()));
        }
        let task: ListeningTask = serde_json::from_value(envelope.args.clone())
            .map_err(|e| WorkerError::InvalidArgs(e.to_string()))?;

        let records = search_and_normalize(
            self.accounts.as_ref(),
            &task.org_id,
            &task.query_options(),
            task.limit,
        )
        .await?;
        tracing::info!(
            task_id = %envelope.id,
            org_id = %task.org_id,
            count = records.len(),
            "Listening run complete"
        );

        Ok(serde_json::to_value(records)?)
    }
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Picked up by a worker running with early acknowledgement.
    Accepted,
    Succeeded { result: serde_json::Value },
    Failed { error: String },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: Uuid,
    pub task: String,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
    pub at: DateTime<Utc>,
}
