pub mod config;
pub mod error;
pub mod schedule;
pub mod task;
pub mod worker;

pub use config::{TaskRoutes, WorkerConfig, DEFAULT_QUEUE};
pub use error::{Result, WorkerError};
pub use schedule::{ListeningJob, ListeningScheduler, ScheduleFile};
pub use task::{
    ListeningTask, ListeningTasks, TaskEnvelope, TaskHandler, TaskOutcome, TaskReport,
    RUN_LISTENING,
};
pub use worker::Worker;
