//! Worker pool tests with in-memory handlers and providers. No network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nexus_worker::{
    ListeningScheduler, ListeningTask, ListeningTasks, ScheduleFile, TaskEnvelope, TaskHandler,
    TaskOutcome, TaskReport, Worker, WorkerConfig, WorkerError, RUN_LISTENING,
};
use serde_json::json;
use tokio::sync::mpsc;
use x_search::{AccountDirectory, MatchMode, RawTweet, RawUser, SearchError, SearchProvider};

fn config() -> WorkerConfig {
    WorkerConfig::from_vars(Vec::<(String, String)>::new())
}

fn task(name: &str, args: serde_json::Value) -> TaskEnvelope {
    TaskEnvelope::new(format!("nexus.workers.tasks.{name}"), args)
}

async fn drain(mut rx: mpsc::UnboundedReceiver<TaskReport>) -> Vec<TaskReport> {
    let mut reports = Vec::new();
    while let Some(report) = rx.recv().await {
        reports.push(report);
    }
    reports
}

/// Sleeps for `args.sleep_ms`, fails if `args.fail` is set, otherwise echoes its args.
#[derive(Default)]
struct ScriptedHandler {
    running: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl TaskHandler for ScriptedHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> nexus_worker::Result<serde_json::Value> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let sleep_ms = envelope.args["sleep_ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if envelope.args["fail"].as_bool().unwrap_or(false) {
            return Err(WorkerError::InvalidArgs("scripted failure".into()));
        }
        Ok(envelope.args.clone())
    }
}

#[tokio::test]
async fn success_and_failure_are_reported() {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Worker::start(&config(), "default", 2, Arc::new(ScriptedHandler::default()), tx);

    let ok = task("echo", json!({"n": 1}));
    let bad = task("echo", json!({"fail": true}));
    worker.submit(ok.clone()).await.unwrap();
    worker.submit(bad.clone()).await.unwrap();
    worker.shutdown().await;

    let reports = drain(rx).await;
    assert_eq!(reports.len(), 2);
    let ok_report = reports.iter().find(|r| r.id == ok.id).unwrap();
    assert_eq!(
        ok_report.outcome,
        TaskOutcome::Succeeded {
            result: json!({"n": 1})
        }
    );
    let bad_report = reports.iter().find(|r| r.id == bad.id).unwrap();
    assert!(matches!(&bad_report.outcome, TaskOutcome::Failed { error } if error.contains("scripted")));
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let handler = Arc::new(ScriptedHandler::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Worker::start(&config(), "default", 2, handler.clone(), tx);

    for _ in 0..6 {
        worker
            .submit(task("echo", json!({"sleep_ms": 20})))
            .await
            .unwrap();
    }
    worker.shutdown().await;

    assert_eq!(drain(rx).await.len(), 6);
    assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    assert!(handler.peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn hard_limit_abandons_task() {
    let mut config = config();
    config.task_soft_time_limit = Duration::from_millis(10);
    config.task_time_limit = Duration::from_millis(40);
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Worker::start(&config, "default", 1, Arc::new(ScriptedHandler::default()), tx);

    worker
        .submit(task("echo", json!({"sleep_ms": 2000})))
        .await
        .unwrap();
    worker.shutdown().await;

    let reports = drain(rx).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, TaskOutcome::TimedOut);
}

#[tokio::test]
async fn soft_limit_only_warns() {
    let mut config = config();
    config.task_soft_time_limit = Duration::from_millis(5);
    config.task_time_limit = Duration::from_secs(5);
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Worker::start(&config, "default", 1, Arc::new(ScriptedHandler::default()), tx);

    worker
        .submit(task("echo", json!({"sleep_ms": 30})))
        .await
        .unwrap();
    worker.shutdown().await;

    let reports = drain(rx).await;
    assert!(matches!(reports[0].outcome, TaskOutcome::Succeeded { .. }));
}

#[tokio::test]
async fn early_ack_reports_acceptance_first() {
    let mut config = config();
    config.task_acks_late = false;
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Worker::start(&config, "default", 1, Arc::new(ScriptedHandler::default()), tx);

    worker.submit(task("echo", json!({}))).await.unwrap();
    worker.shutdown().await;

    let outcomes: Vec<_> = drain(rx).await.into_iter().map(|r| r.outcome).collect();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0], TaskOutcome::Accepted);
    assert!(matches!(outcomes[1], TaskOutcome::Succeeded { .. }));
}

#[tokio::test]
async fn tasks_for_other_queues_are_rejected() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let worker = Worker::start(&config(), "default", 1, Arc::new(ScriptedHandler::default()), tx);

    let err = worker
        .submit(TaskEnvelope::new("billing.invoice", json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::WrongQueue { routed, .. } if routed == "celery"));
    worker.shutdown().await;
}

// ---------------------------------------------------------------------------
// Listening tasks
// ---------------------------------------------------------------------------

struct CannedProvider {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl SearchProvider for CannedProvider {
    async fn search(&self, query: &str, _limit: u32) -> x_search::Result<Vec<RawTweet>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![RawTweet {
            id: Some(42.into()),
            user: Some(RawUser {
                username: Some("alice".into()),
                displayname: Some("Alice".into()),
            }),
            text: Some("hello".into()),
            ..Default::default()
        }])
    }
}

struct SingleOrg {
    provider: Arc<CannedProvider>,
    lookups: AtomicUsize,
}

#[async_trait]
impl AccountDirectory for SingleOrg {
    async fn provider_for_org(&self, org_id: &str) -> x_search::Result<Arc<dyn SearchProvider>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if org_id != "acme" {
            return Err(SearchError::MissingCredentials(org_id.to_string()));
        }
        Ok(self.provider.clone() as Arc<dyn SearchProvider>)
    }
}

fn listening(org_id: &str, keywords: &[&str]) -> ListeningTask {
    ListeningTask {
        org_id: org_id.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        hours_back: 24,
        limit: 10,
        match_mode: MatchMode::Any,
        lang: None,
        exclude_retweets: true,
    }
}

fn directory() -> Arc<SingleOrg> {
    Arc::new(SingleOrg {
        provider: Arc::new(CannedProvider {
            queries: Mutex::new(Vec::new()),
        }),
        lookups: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn listening_task_returns_normalized_records() {
    let accounts = directory();
    let handler = ListeningTasks::new(accounts.clone());

    let envelope = TaskEnvelope::listening(&listening("acme", &["rust", "tokio"])).unwrap();
    let result = handler.handle(&envelope).await.unwrap();

    assert_eq!(envelope.task, RUN_LISTENING);
    assert_eq!(result[0]["url"], "https://x.com/alice/status/42");
    assert_eq!(result[0]["displayname"], "Alice");
    assert!(result[0]["likes"].is_null());
    let queries = accounts.provider.queries.lock().unwrap();
    assert!(queries[0].starts_with("rust OR tokio since:"));
}

#[tokio::test]
async fn listening_task_with_blank_keywords_fails_before_lookup() {
    let accounts = directory();
    let handler = ListeningTasks::new(accounts.clone());

    let envelope = TaskEnvelope::listening(&listening("acme", &["  "])).unwrap();
    let err = handler.handle(&envelope).await.unwrap_err();

    assert!(matches!(err, WorkerError::Search(SearchError::InvalidInput(_))));
    assert_eq!(accounts.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn listening_task_for_unknown_org_fails() {
    let handler = ListeningTasks::new(directory());

    let envelope = TaskEnvelope::listening(&listening("globex", &["rust"])).unwrap();
    let err = handler.handle(&envelope).await.unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Search(SearchError::MissingCredentials(_))
    ));
}

#[tokio::test]
async fn unknown_task_name_is_rejected() {
    let handler = ListeningTasks::new(directory());

    let err = handler
        .handle(&task("send_digest", json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::UnknownTask(_)));
}

#[tokio::test]
async fn scheduler_enqueues_each_due_job_once() {
    let schedule = ScheduleFile::parse(
        r#"
[[listening]]
name = "brand"
org_id = "acme"
keywords = ["acme"]
every_minutes = 60

[[listening]]
name = "rivals"
org_id = "acme"
keywords = ["globex", "initech"]
every_minutes = 60
"#,
    )
    .unwrap();

    let accounts = directory();
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Worker::start(
        &config(),
        "default",
        2,
        Arc::new(ListeningTasks::new(accounts.clone())),
        tx,
    );

    ListeningScheduler::new(schedule.listening)
        .run(
            &worker,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(60)),
        )
        .await
        .unwrap();
    worker.shutdown().await;

    let reports = drain(rx).await;
    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|r| matches!(r.outcome, TaskOutcome::Succeeded { .. })));
    assert_eq!(accounts.provider.queries.lock().unwrap().len(), 2);
}
