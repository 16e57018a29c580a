use std::sync::Arc;

use leadwatch_core::{
    update, ApiError, FailureKind, JobId, JobResults, JobViewModel, LeadsFetchPlan, Msg, WatchState,
};
use leadwatch_logging::leadwatch_debug;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::effects::EffectRunner;
use crate::{Backend, ReqwestBackend, WatchSettings};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeadsFetchError {
    #[error("Job not found. It may have been cleared after a backend restart.")]
    NotFound,
    #[error("failed to fetch leads: {0}")]
    Failed(ApiError),
}

/// Live, reconciled progress of one job detail view.
///
/// Owns the update loop: source results flow in as messages, the core state
/// machine decides which sources run, and every change is published on a
/// `watch` channel. Must be created inside a tokio runtime.
pub struct JobWatcher {
    backend: Arc<dyn Backend>,
    settings: WatchSettings,
    msg_tx: mpsc::UnboundedSender<Msg>,
    view_rx: watch::Receiver<JobViewModel>,
    shutdown: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl JobWatcher {
    pub fn new(backend: Arc<dyn Backend>, settings: WatchSettings) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(JobViewModel::default());
        let shutdown = CancellationToken::new();
        let runner = EffectRunner::new(Arc::clone(&backend), settings.clone(), msg_tx.clone());
        let driver = tokio::spawn(drive(msg_rx, view_tx, runner, shutdown.clone()));

        Self {
            backend,
            settings,
            msg_tx,
            view_rx,
            shutdown,
            driver: Some(driver),
        }
    }

    pub fn with_reqwest(settings: WatchSettings) -> Result<Self, ApiError> {
        let backend = ReqwestBackend::new(settings.clone())?;
        Ok(Self::new(Arc::new(backend), settings))
    }

    /// Starts watching `job_id`; a different job previously watched is torn
    /// down first.
    pub fn open(&self, job_id: impl Into<JobId>) {
        let _ = self.msg_tx.send(Msg::JobOpened(job_id.into()));
    }

    /// Stops every source of the current job.
    pub fn close(&self) {
        let _ = self.msg_tx.send(Msg::ViewClosed);
    }

    pub fn view(&self) -> JobViewModel {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobViewModel> {
        self.view_rx.clone()
    }

    /// Waits until the published view satisfies `ready`.
    pub async fn wait_for(&self, ready: impl FnMut(&JobViewModel) -> bool) -> Option<JobViewModel> {
        let mut rx = self.view_rx.clone();
        let view = rx.wait_for(ready).await.ok()?.clone();
        Some(view)
    }

    /// Returns the job's lead list, fetching it only when no non-empty copy is
    /// cached. `Ok(None)` means the job has no leads to fetch.
    ///
    /// Overlapping calls each perform their own read. The read runs on its own
    /// task, so a caller that gives up early still leaves the view consistent.
    pub async fn fetch_leads_if_needed(&self) -> Result<Option<Arc<JobResults>>, LeadsFetchError> {
        let plan = self.view_rx.borrow().leads_fetch_plan();
        let job_id = match plan {
            LeadsFetchPlan::Cached(results) => return Ok(Some(results)),
            LeadsFetchPlan::Nothing => return Ok(None),
            LeadsFetchPlan::NotFound => return Err(LeadsFetchError::NotFound),
            LeadsFetchPlan::Fetch(job_id) => job_id,
        };

        leadwatch_debug!("fetching leads of {} on demand", job_id);
        let _ = self.msg_tx.send(Msg::LeadsFetchStarted {
            job_id: job_id.clone(),
        });
        let backend = Arc::clone(&self.backend);
        let msg_tx = self.msg_tx.clone();
        let timeout = self.settings.results_timeout;
        let fetch = tokio::spawn(async move {
            let result = backend.job_results(&job_id, timeout).await.map(Arc::new);
            let _ = msg_tx.send(Msg::LeadsFetched {
                job_id,
                result: result.clone(),
            });
            result
        });
        let result = fetch.await.map_err(|err| {
            LeadsFetchError::Failed(ApiError::new(
                FailureKind::Network,
                format!("lead fetch task failed: {err}"),
            ))
        })?;

        match result {
            Ok(results) => Ok(Some(results)),
            Err(err) if err.is_not_found() => Err(LeadsFetchError::NotFound),
            Err(err) => Err(LeadsFetchError::Failed(err)),
        }
    }

    /// CSV export of a job, passed through untouched.
    pub async fn download_csv(&self, job_id: &str) -> Result<Vec<u8>, ApiError> {
        self.backend.download_csv(job_id).await
    }

    /// Stops the update loop and every source, and waits for the loop to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
    }
}

impl Drop for JobWatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn drive(
    mut msg_rx: mpsc::UnboundedReceiver<Msg>,
    view_tx: watch::Sender<JobViewModel>,
    mut runner: EffectRunner,
    shutdown: CancellationToken,
) {
    let mut state = WatchState::new();
    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            msg = msg_rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        let (next, effects) = update(state, msg);
        state = next;
        runner.run(effects);
        if state.consume_dirty() {
            view_tx.send_replace(state.view());
        }
    }
    runner.stop_all();
}
