use std::collections::HashMap;
use std::time::Duration;

use nexus_common::Settings;

/// Queue that receives tasks no route matches.
pub const DEFAULT_QUEUE: &str = "celery";

const DEFAULT_BROKER_URL: &str = "redis://localhost:6379/1";
const DEFAULT_RESULT_BACKEND: &str = "redis://localhost:6379/2";

/// Task-queue configuration shared by workers and the scheduler.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub app_name: String,
    pub broker_url: String,
    pub result_backend: String,
    /// Past this, a running task is logged as overdue.
    pub task_soft_time_limit: Duration,
    /// Past this, a running task is abandoned.
    pub task_time_limit: Duration,
    pub worker_prefetch_multiplier: usize,
    /// Acknowledge a task only once it has finished.
    pub task_acks_late: bool,
    pub task_routes: TaskRoutes,
}

impl WorkerConfig {
    /// Build from loaded settings, or from `CELERY_*` variables when settings
    /// could not be loaded.
    pub fn from_settings(settings: Option<&Settings>) -> Self {
        match settings {
            Some(settings) => Self::with_urls(
                settings.celery_broker_url.clone(),
                settings.celery_result_backend.clone(),
            ),
            None => Self::from_vars(std::env::vars()),
        }
    }

    /// Fallback path: read broker URLs straight from variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        Self::with_urls(
            vars.get("CELERY_BROKER_URL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_BROKER_URL.to_string()),
            vars.get("CELERY_RESULT_BACKEND")
                .cloned()
                .unwrap_or_else(|| DEFAULT_RESULT_BACKEND.to_string()),
        )
    }

    fn with_urls(broker_url: String, result_backend: String) -> Self {
        Self {
            app_name: "nexus".to_string(),
            broker_url,
            result_backend,
            task_soft_time_limit: Duration::from_secs(1800),
            task_time_limit: Duration::from_secs(3600),
            worker_prefetch_multiplier: 1,
            task_acks_late: true,
            task_routes: TaskRoutes::default(),
        }
    }
}

/// Ordered task-name patterns mapped to queues. A trailing `*` matches any suffix.
#[derive(Debug, Clone)]
pub struct TaskRoutes {
    routes: Vec<(String, String)>,
}

impl TaskRoutes {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn route(mut self, pattern: impl Into<String>, queue: impl Into<String>) -> Self {
        self.routes.push((pattern.into(), queue.into()));
        self
    }

    /// First matching route wins; unmatched tasks go to [`DEFAULT_QUEUE`].
    pub fn queue_for(&self, task: &str) -> &str {
        self.routes
            .iter()
            .find(|(pattern, _)| match pattern.strip_suffix('*') {
                Some(prefix) => task.starts_with(prefix),
                None => task == pattern.as_str(),
            })
            .map(|(_, queue)| queue.as_str())
            .unwrap_or(DEFAULT_QUEUE)
    }
}

impl Default for TaskRoutes {
    fn default() -> Self {
        Self::new().route("nexus.workers.tasks.*", "default")
    }
}
