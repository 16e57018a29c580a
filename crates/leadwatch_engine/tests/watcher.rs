use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use leadwatch_core::{
    ApiError, FailureKind, JobProgressSnapshot, JobResults, JobStatus, Lead, SocketActivity,
    ViewCondition,
};
use leadwatch_engine::{Backend, JobWatcher, LeadsFetchError, WatchSettings};
use pretty_assertions::assert_eq;
use url::Url;

const WAIT: Duration = Duration::from_secs(5);

/// Backend double: replays a status script (repeating its last entry) and
/// serves a fixed results response.
struct ScriptedBackend {
    statuses: Mutex<VecDeque<Result<JobProgressSnapshot, ApiError>>>,
    results: Mutex<Result<JobResults, ApiError>>,
    results_delay: Duration,
    status_calls: AtomicUsize,
    results_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(statuses: Vec<Result<JobProgressSnapshot, ApiError>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            results: Mutex::new(Ok(JobResults::default())),
            results_delay: Duration::ZERO,
            status_calls: AtomicUsize::new(0),
            results_calls: AtomicUsize::new(0),
        }
    }

    fn with_results(self, results: Result<JobResults, ApiError>) -> Self {
        *self.results.lock().unwrap() = results;
        self
    }

    fn with_results_delay(mut self, delay: Duration) -> Self {
        self.results_delay = delay;
        self
    }

    fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn results_calls(&self) -> usize {
        self.results_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Backend for ScriptedBackend {
    async fn job_status(&self, _job_id: &str) -> Result<JobProgressSnapshot, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap()
        }
    }

    async fn job_results(&self, _job_id: &str, _timeout: Duration) -> Result<JobResults, ApiError> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        if !self.results_delay.is_zero() {
            tokio::time::sleep(self.results_delay).await;
        }
        self.results.lock().unwrap().clone()
    }

    async fn download_csv(&self, _job_id: &str) -> Result<Vec<u8>, ApiError> {
        Ok(b"name\n".to_vec())
    }

    fn progress_socket_url(&self, job_id: &str) -> Result<Url, ApiError> {
        Err(ApiError::new(
            FailureKind::InvalidUrl,
            format!("no socket for {job_id} in tests"),
        ))
    }
}

fn settings() -> WatchSettings {
    WatchSettings {
        poll_interval: Duration::from_millis(20),
        results_retry_limit: 1,
        results_retry_backoff: Duration::from_millis(1),
        ..WatchSettings::default()
    }
}

fn snapshot(status: JobStatus, leads: u64, target: u64) -> JobProgressSnapshot {
    JobProgressSnapshot {
        job_id: "job-1".into(),
        status,
        leads_collected: leads,
        target_leads: target,
        queries_total: 4,
        ..JobProgressSnapshot::default()
    }
}

fn results_with(count: usize) -> JobResults {
    JobResults {
        job_id: "job-1".into(),
        status: "completed".into(),
        leads: (0..count)
            .map(|i| Lead {
                name: Some(format!("Lead {i}")),
                ..Lead::default()
            })
            .collect(),
        total_leads: count as u64,
        ..JobResults::default()
    }
}

async fn wait_until(
    watcher: &JobWatcher,
    ready: impl FnMut(&leadwatch_core::JobViewModel) -> bool,
) -> leadwatch_core::JobViewModel {
    tokio::time::timeout(WAIT, watcher.wait_for(ready))
        .await
        .expect("view never reached the expected state")
        .expect("watcher stopped")
}

#[tokio::test]
async fn vanished_job_stops_every_source() {
    leadwatch_logging::initialize_for_tests();
    let backend = Arc::new(ScriptedBackend::new(vec![Err(ApiError::not_found())]));
    let watcher = JobWatcher::new(backend.clone(), settings());

    watcher.open("job-1");
    let view = wait_until(&watcher, |v| v.is_not_found()).await;
    assert_eq!(view.condition, ViewCondition::NotFound);

    let calls = backend.status_calls();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.status_calls(), calls);
    assert_eq!(backend.results_calls(), 0);
    watcher.shutdown().await;
}

#[tokio::test]
async fn running_job_is_followed_to_completion() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![
            Ok(snapshot(JobStatus::Pending, 0, 10)),
            Ok(snapshot(JobStatus::Running, 4, 10)),
            Ok(snapshot(JobStatus::Running, 6, 10)),
            Ok(snapshot(JobStatus::Completed, 10, 10)),
        ])
        .with_results(Ok(results_with(10))),
    );
    let watcher = JobWatcher::new(backend.clone(), settings());
    let mut updates = watcher.subscribe();

    watcher.open("job-1");
    let mut seen_percent = Vec::new();
    let done = tokio::time::timeout(WAIT, async {
        loop {
            updates.changed().await.expect("watcher stopped");
            let view = updates.borrow_and_update().clone();
            if let Some(progress) = view.progress() {
                seen_percent.push(progress.progress_percent);
                if progress.status == JobStatus::Completed && view.leads.is_some() {
                    return view;
                }
            }
        }
    })
    .await
    .expect("job never completed");

    let progress = done.progress().unwrap();
    assert_eq!(progress.progress_percent, 100.0);
    assert_eq!(progress.effective_leads_collected, 10);
    assert_eq!(done.leads.as_ref().unwrap().lead_count(), 10);
    assert!(seen_percent.windows(2).all(|w| w[0] <= w[1]), "{seen_percent:?}");
    assert!(seen_percent.iter().all(|p| (0.0..=100.0).contains(p)));

    // Completed jobs are polled for results once; further status polls do not
    // restart the results poller.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let results_calls = backend.results_calls();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.results_calls(), results_calls);
    watcher.shutdown().await;
}

#[tokio::test]
async fn missing_socket_leaves_polling_in_charge() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![Ok(snapshot(JobStatus::Running, 3, 12))])
            .with_results(Ok(results_with(5))),
    );
    let watcher = JobWatcher::new(backend.clone(), settings());

    watcher.open("job-1");
    let view = wait_until(&watcher, |v| {
        v.socket == SocketActivity::Degraded
            && v.progress().map(|p| p.effective_leads_collected) == Some(5)
    })
    .await;

    let progress = view.progress().unwrap();
    assert_eq!(progress.status, JobStatus::Running);
    assert_eq!(progress.target_leads, 12);
    assert!(progress.progress_percent <= 99.0);
    watcher.shutdown().await;
}

#[tokio::test]
async fn cached_leads_are_returned_without_a_request() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![Ok(snapshot(JobStatus::Completed, 3, 3))])
            .with_results(Ok(results_with(3))),
    );
    let watcher = JobWatcher::new(backend.clone(), settings());
    watcher.open("job-1");
    wait_until(&watcher, |v| v.leads.is_some()).await;
    let calls = backend.results_calls();

    let leads = watcher.fetch_leads_if_needed().await.unwrap().unwrap();
    assert_eq!(leads.lead_count(), 3);
    assert_eq!(backend.results_calls(), calls);
    watcher.shutdown().await;
}

#[tokio::test]
async fn empty_cache_triggers_a_direct_fetch() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![Ok(snapshot(JobStatus::Completed, 0, 3))])
            .with_results(Ok(JobResults::default())),
    );
    let watcher = JobWatcher::new(backend.clone(), settings());
    watcher.open("job-1");
    wait_until(&watcher, |v| v.leads.is_some()).await;
    let calls = backend.results_calls();

    let leads = watcher.fetch_leads_if_needed().await.unwrap().unwrap();
    assert_eq!(leads.lead_count(), 0);
    assert_eq!(backend.results_calls(), calls + 1);

    let view = wait_until(&watcher, |v| !v.fetching_leads).await;
    assert_eq!(view.leads_error, None);
    watcher.shutdown().await;
}

#[tokio::test]
async fn fetch_of_a_vanished_job_reports_not_found() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![Ok(snapshot(JobStatus::Pending, 0, 8))])
            .with_results(Err(ApiError::not_found())),
    );
    let watcher = JobWatcher::new(backend.clone(), settings());
    watcher.open("job-1");
    wait_until(&watcher, |v| v.progress().is_some()).await;

    match watcher.fetch_leads_if_needed().await {
        Err(LeadsFetchError::NotFound) => {}
        other => panic!("expected not found, got {other:?}"),
    }
    watcher.shutdown().await;
}

#[tokio::test]
async fn failed_job_has_no_leads_to_fetch() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok(snapshot(
        JobStatus::Failed,
        0,
        10,
    ))]));
    let watcher = JobWatcher::new(backend.clone(), settings());
    watcher.open("job-1");
    let view = wait_until(&watcher, |v| v.progress().is_some()).await;
    assert_eq!(view.progress().unwrap().progress_percent, 0.0);

    assert_eq!(watcher.fetch_leads_if_needed().await.unwrap(), None);
    assert_eq!(backend.results_calls(), 0);
    watcher.shutdown().await;
}

#[tokio::test]
async fn overlapping_fetches_keep_the_busy_flag_until_both_finish() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![Ok(snapshot(JobStatus::Pending, 0, 5))])
            .with_results(Ok(results_with(2)))
            .with_results_delay(Duration::from_millis(50)),
    );
    let watcher = JobWatcher::new(backend.clone(), settings());
    watcher.open("job-1");
    wait_until(&watcher, |v| v.progress().is_some()).await;

    let mut updates = watcher.subscribe();
    let watch_flag = tokio::spawn(async move {
        let mut busy_seen = false;
        loop {
            if updates.changed().await.is_err() {
                return busy_seen;
            }
            let view = updates.borrow_and_update().clone();
            if view.fetching_leads {
                busy_seen = true;
            } else if busy_seen && view.leads.is_some() {
                return busy_seen;
            }
        }
    });

    let (first, second) = tokio::join!(
        watcher.fetch_leads_if_needed(),
        watcher.fetch_leads_if_needed()
    );
    assert_eq!(first.unwrap().unwrap().lead_count(), 2);
    assert_eq!(second.unwrap().unwrap().lead_count(), 2);
    assert_eq!(backend.results_calls(), 2);

    assert!(tokio::time::timeout(WAIT, watch_flag).await.unwrap().unwrap());
    let view = wait_until(&watcher, |v| !v.fetching_leads).await;
    assert_eq!(view.leads.unwrap().lead_count(), 2);
    watcher.shutdown().await;
}

#[tokio::test]
async fn switching_jobs_starts_from_scratch() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok(snapshot(
        JobStatus::Pending,
        0,
        5,
    ))]));
    let watcher = JobWatcher::new(backend.clone(), settings());

    watcher.open("job-1");
    wait_until(&watcher, |v| v.progress().is_some()).await;
    watcher.open("job-2");
    let view = wait_until(&watcher, |v| v.job_id.as_deref() == Some("job-2")).await;
    assert_eq!(view.leads, None);

    watcher.close();
    let view = wait_until(&watcher, |v| v.job_id.is_none()).await;
    assert_eq!(view.condition, ViewCondition::Loading);
    watcher.shutdown().await;
}

#[tokio::test]
async fn abandoned_fetch_still_clears_the_busy_flag() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![Ok(snapshot(JobStatus::Pending, 0, 5))])
            .with_results(Ok(results_with(3)))
            .with_results_delay(Duration::from_millis(200)),
    );
    let watcher = JobWatcher::new(backend.clone(), settings());
    watcher.open("job-1");
    wait_until(&watcher, |v| v.progress().is_some()).await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), watcher.fetch_leads_if_needed()).await;
    assert!(abandoned.is_err());
    assert!(watcher.view().fetching_leads);

    let view = wait_until(&watcher, |v| !v.fetching_leads).await;
    assert_eq!(view.leads.map(|r| r.lead_count()), Some(3));
    assert_eq!(backend.results_calls(), 1);
    watcher.shutdown().await;
}

#[tokio::test]
async fn fetch_after_the_job_vanished_reports_not_found() {
    let backend = Arc::new(ScriptedBackend::new(vec![Err(ApiError::not_found())]));
    let watcher = JobWatcher::new(backend.clone(), settings());
    watcher.open("job-1");
    wait_until(&watcher, |v| v.is_not_found()).await;

    match watcher.fetch_leads_if_needed().await {
        Err(LeadsFetchError::NotFound) => {}
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(backend.results_calls(), 0);
    watcher.shutdown().await;
}
