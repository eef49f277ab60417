use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Task {task} routes to queue {routed}, not {queue}")]
    WrongQueue {
        task: String,
        routed: String,
        queue: String,
    },

    #[error("Worker is shut down")]
    Closed,

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Invalid task arguments: {0}")]
    InvalidArgs(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Search(#[from] x_search::SearchError),
}
