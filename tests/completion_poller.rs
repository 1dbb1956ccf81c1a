use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kayentactl::analysis::{
    observer_fn, CompletionPoller, PollError, PollState, ProgressObserver, SharedObserver,
};
use kayentactl::kayenta::{
    AnalysisApi, AnalysisStatus, ClientConfig, ClientError, KayentaAdapter,
    StandaloneCanaryAnalysisInput,
};
use reqwest::StatusCode;
use serde_json::json;
use tokio::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Replays a fixed script of fetch results, then keeps reporting "running".
struct ScriptedClient {
    script: Mutex<VecDeque<Result<AnalysisStatus, ClientError>>>,
    fetch_times: Mutex<Vec<Instant>>,
    latency: Duration,
}

impl ScriptedClient {
    fn new(script: Vec<Result<AnalysisStatus, ClientError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fetch_times: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn fetches(&self) -> usize {
        self.fetch_times.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisApi for ScriptedClient {
    async fn submit(&self, _input: &StandaloneCanaryAnalysisInput) -> Result<String, ClientError> {
        Ok("exec-1".to_string())
    }

    async fn fetch(&self, _execution_id: &str) -> Result<AnalysisStatus, ClientError> {
        self.fetch_times.lock().unwrap().push(Instant::now());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(running()))
    }
}

fn running() -> AnalysisStatus {
    AnalysisStatus {
        status: "running".into(),
        execution_status: "RUNNING".into(),
        complete: false,
        ..Default::default()
    }
}

fn finished(status: &str) -> AnalysisStatus {
    AnalysisStatus {
        status: status.into(),
        execution_status: status.to_ascii_uppercase(),
        complete: true,
        ..Default::default()
    }
}

fn counting_observer() -> (SharedObserver, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let observer = observer_fn(move |status: &AnalysisStatus| {
        assert!(!status.complete, "observer saw a terminal snapshot");
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (observer, calls)
}

#[tokio::test(start_paused = true)]
async fn progress_is_reported_until_complete() {
    let client = Arc::new(ScriptedClient::new(vec![
        Ok(running()),
        Ok(running()),
        Ok(finished("succeeded")),
    ]));
    let poller = CompletionPoller::new(Arc::clone(&client), Duration::from_secs(10));
    let (observer, calls) = counting_observer();

    let status = poller
        .poll_for("exec-1", Duration::from_secs(3600), Some(observer))
        .await
        .unwrap();

    assert!(status.complete);
    assert_eq!(status.status, "succeeded");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.fetches(), 3);
}

#[tokio::test(start_paused = true)]
async fn first_fetch_waits_one_full_interval() {
    let client = Arc::new(ScriptedClient::new(vec![
        Ok(running()),
        Ok(finished("succeeded")),
    ]));
    let poller = CompletionPoller::new(Arc::clone(&client), Duration::from_secs(10));
    let started = Instant::now();

    poller
        .poll_for("exec-1", Duration::from_secs(3600), None)
        .await
        .unwrap();

    let times = client.fetch_times.lock().unwrap().clone();
    assert_eq!(times.len(), 2);
    assert_eq!(times[0] - started, Duration::from_secs(10));
    assert_eq!(times[1] - times[0], Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn deadline_before_first_tick_times_out_without_fetching() {
    let client = Arc::new(ScriptedClient::new(vec![Ok(finished("succeeded"))]));
    let poller = CompletionPoller::new(Arc::clone(&client), Duration::from_secs(10));
    let (observer, calls) = counting_observer();

    let err = poller
        .poll_for("exec-1", Duration::from_secs(5), Some(observer))
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Timeout { .. }));
    assert_eq!(err.state(), PollState::TimedOut);
    assert_eq!(client.fetches(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn analysis_that_never_completes_times_out() {
    let client = Arc::new(ScriptedClient::new(Vec::new()));
    let poller = CompletionPoller::new(Arc::clone(&client), Duration::from_secs(10));
    let (observer, calls) = counting_observer();

    let err = poller
        .poll_for("exec-1", Duration::from_secs(35), Some(observer))
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Timeout { timeout } if timeout == Duration::from_secs(35)));
    assert_eq!(client.fetches(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn transport_error_ends_session_without_progress() {
    let client = Arc::new(ScriptedClient::new(vec![
        Err(ClientError::server(StatusCode::INTERNAL_SERVER_ERROR, "boom")),
        Ok(finished("succeeded")),
    ]));
    let poller = CompletionPoller::new(Arc::clone(&client), Duration::from_secs(10));
    let (observer, calls) = counting_observer();

    let err = poller
        .poll_for("exec-1", Duration::from_secs(3600), Some(observer))
        .await
        .unwrap_err();

    match &err {
        PollError::Transport(ClientError::Server { status, message }) => {
            assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.state(), PollState::Errored);
    assert_eq!(client.fetches(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn fetch_finishing_after_deadline_is_discarded() {
    let client = Arc::new(
        ScriptedClient::new(vec![Ok(finished("succeeded"))]).with_latency(Duration::from_secs(8)),
    );
    let poller = CompletionPoller::new(Arc::clone(&client), Duration::from_secs(10));

    let err = poller
        .poll_for("exec-1", Duration::from_secs(15), None)
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Timeout { .. }));
    assert_eq!(client.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn terminal_failure_is_returned_not_raised() {
    let client = Arc::new(ScriptedClient::new(vec![Ok(finished("terminal"))]));
    let poller = CompletionPoller::new(client, Duration::from_secs(1));

    let status = poller
        .poll_for("exec-1", Duration::from_secs(60), None)
        .await
        .unwrap();
    assert_eq!(status.status, "terminal");
}

#[tokio::test(start_paused = true)]
async fn dropping_the_poll_future_stops_fetching() {
    let client = Arc::new(ScriptedClient::new(Vec::new()));
    let poller = CompletionPoller::new(Arc::clone(&client), Duration::from_secs(10));

    let outer = tokio::time::timeout(
        Duration::from_secs(25),
        poller.poll_for("exec-1", Duration::from_secs(3600), None),
    )
    .await;
    assert!(outer.is_err());
    assert_eq!(client.fetches(), 2);

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(client.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn observer_is_started_and_finished_once() {
    struct Lifecycle(Mutex<Vec<String>>);

    impl ProgressObserver for Lifecycle {
        fn on_start(&self) {
            self.0.lock().unwrap().push("start".into());
        }
        fn on_progress(&self, _status: &AnalysisStatus) {
            self.0.lock().unwrap().push("progress".into());
        }
        fn on_finish(&self, state: PollState) {
            self.0.lock().unwrap().push(format!("finish:{state}"));
        }
    }

    let client = Arc::new(ScriptedClient::new(vec![
        Ok(running()),
        Ok(finished("succeeded")),
    ]));
    let poller = CompletionPoller::new(client, Duration::from_secs(10));
    let lifecycle = Arc::new(Lifecycle(Mutex::new(Vec::new())));

    poller
        .poll_for("exec-1", Duration::from_secs(60), Some(lifecycle.clone() as SharedObserver))
        .await
        .unwrap();
    assert_eq!(
        *lifecycle.0.lock().unwrap(),
        ["start", "progress", "finish:complete"]
    );

    let timed_out = Arc::new(Lifecycle(Mutex::new(Vec::new())));
    let poller =
        CompletionPoller::new(Arc::new(ScriptedClient::new(Vec::new())), Duration::from_secs(10));
    poller
        .poll_for("exec-1", Duration::from_secs(5), Some(timed_out.clone() as SharedObserver))
        .await
        .unwrap_err();
    assert_eq!(*timed_out.0.lock().unwrap(), ["start", "finish:timed_out"]);
}

struct RunningThenDone {
    calls: Arc<AtomicUsize>,
    running_for: usize,
}

impl Respond for RunningThenDone {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.running_for {
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "running",
                "executionStatus": "RUNNING",
                "complete": false,
                "stages": [{"name": "Run Canary #1", "type": "runCanary", "status": "RUNNING"}]
            }))
        } else {
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "succeeded",
                "executionStatus": "SUCCEEDED",
                "complete": true,
                "canaryAnalysisExecutionResult": {
                    "didPassThresholds": true,
                    "canaryScores": [95.0]
                }
            }))
        }
    }
}

#[tokio::test]
async fn polls_over_http_until_complete() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));

    Mock::given(method("GET"))
        .and(path("/standalone_canary_analysis/exec-http"))
        .respond_with(RunningThenDone {
            calls: Arc::clone(&calls),
            running_for: 2,
        })
        .mount(&server)
        .await;

    let adapter = KayentaAdapter::new(
        ClientConfig::default()
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap();
    let poller = CompletionPoller::new(Arc::new(adapter), Duration::from_millis(20));
    let (observer, progress) = counting_observer();

    let status = poller
        .poll_for("exec-http", Duration::from_secs(10), Some(observer))
        .await
        .unwrap();

    assert!(status.complete);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(progress.load(Ordering::SeqCst), 2);
}
