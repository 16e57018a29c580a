use std::sync::Arc;

use leadwatch_core::{Effect, JobId, Msg, ResultsSchedule};
use leadwatch_logging::{leadwatch_debug, leadwatch_info};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::schedule::{PollHandle, PollMode, PollScheduler};
use crate::socket::ProgressSubscription;
use crate::sources::{self, RetryPolicy};
use crate::{Backend, WatchSettings};

/// Executes core effects: owns the pollers and the socket of the observed job.
pub(crate) struct EffectRunner {
    backend: Arc<dyn Backend>,
    settings: WatchSettings,
    scheduler: PollScheduler,
    msg_tx: UnboundedSender<Msg>,
    status: Option<PollHandle>,
    results: Option<PollHandle>,
    socket: Option<SocketForwarder>,
}

impl EffectRunner {
    pub(crate) fn new(
        backend: Arc<dyn Backend>,
        settings: WatchSettings,
        msg_tx: UnboundedSender<Msg>,
    ) -> Self {
        Self {
            scheduler: PollScheduler::new(settings.poll_interval),
            backend,
            settings,
            msg_tx,
            status: None,
            results: None,
            socket: None,
        }
    }

    pub(crate) fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartStatusPolling { job_id } => {
                    leadwatch_info!("watching job {}", job_id);
                    self.status = Some(self.spawn_status_poller(job_id));
                }
                Effect::RefreshStatus { job_id } => {
                    if let Some(poller) = &self.status {
                        leadwatch_debug!("refreshing status of {} now", job_id);
                        poller.trigger_now();
                    }
                }
                Effect::StartResultsPolling { job_id, schedule } => {
                    self.results = Some(self.spawn_results_poller(job_id, map_schedule(schedule)));
                }
                Effect::StopResultsPolling { .. } => {
                    self.results = None;
                }
                Effect::OpenProgressSocket { job_id } => {
                    self.socket = self.open_socket(job_id);
                }
                Effect::CloseProgressSocket { .. } => {
                    self.socket = None;
                }
                Effect::StopAllSources { job_id } => {
                    leadwatch_info!("stopping sources of job {}", job_id);
                    self.stop_all();
                }
            }
        }
    }

    pub(crate) fn stop_all(&mut self) {
        self.status = None;
        self.results = None;
        self.socket = None;
    }

    fn spawn_status_poller(&self, job_id: JobId) -> PollHandle {
        let backend = Arc::clone(&self.backend);
        let msg_tx = self.msg_tx.clone();
        self.scheduler.spawn(PollMode::Repeating, move || {
            let backend = Arc::clone(&backend);
            let msg_tx = msg_tx.clone();
            let job_id = job_id.clone();
            async move { sources::poll_status(backend.as_ref(), &job_id, &msg_tx).await }
        })
    }

    fn spawn_results_poller(&self, job_id: JobId, mode: PollMode) -> PollHandle {
        let backend = Arc::clone(&self.backend);
        let msg_tx = self.msg_tx.clone();
        let timeout = self.settings.poll_timeout;
        let retry = RetryPolicy {
            limit: self.settings.results_retry_limit,
            backoff: self.settings.results_retry_backoff,
        };
        self.scheduler.spawn(mode, move || {
            let backend = Arc::clone(&backend);
            let msg_tx = msg_tx.clone();
            let job_id = job_id.clone();
            async move {
                sources::poll_results(backend.as_ref(), &job_id, timeout, retry, &msg_tx).await
            }
        })
    }

    fn open_socket(&self, job_id: JobId) -> Option<SocketForwarder> {
        let url = match self.backend.progress_socket_url(&job_id) {
            Ok(url) => url,
            Err(err) => {
                leadwatch_debug!("no progress socket for {}: {}", job_id, err);
                let _ = self.msg_tx.send(Msg::SocketClosed { job_id });
                return None;
            }
        };

        let mut subscription = ProgressSubscription::connect(url);
        let msg_tx = self.msg_tx.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = subscription.next().await {
                let msg = Msg::Socket {
                    job_id: job_id.clone(),
                    message,
                };
                if msg_tx.send(msg).is_err() {
                    return;
                }
            }
            let _ = msg_tx.send(Msg::SocketClosed { job_id });
        });
        Some(SocketForwarder { task })
    }
}

fn map_schedule(schedule: ResultsSchedule) -> PollMode {
    match schedule {
        ResultsSchedule::Repeating => PollMode::Repeating,
        ResultsSchedule::Once => PollMode::Once,
    }
}

/// Relays socket messages into the update loop. Dropping it drops the
/// subscription, which closes the socket.
struct SocketForwarder {
    task: JoinHandle<()>,
}

impl Drop for SocketForwarder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
