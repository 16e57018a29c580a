use std::sync::Arc;

use crate::reconcile::{ProgressReconciler, ReconciledProgressView, Sources};
use crate::view_model::{JobViewModel, ViewCondition};
use crate::{
    ApiError, Effect, JobId, JobProgressSnapshot, JobResults, JobStatus, LeadCache,
    ResultsSchedule, SocketMessage, JOB_NOT_FOUND_MESSAGE,
};

/// What the results poller is currently doing for the observed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultsActivity {
    #[default]
    Idle,
    Repeating,
    /// The single post-completion fetch was scheduled; nothing further.
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketActivity {
    #[default]
    Closed,
    Open,
    /// Closed on its own while the job was running; polling carries on alone.
    Degraded,
}

/// Session state of one job detail view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatchState {
    job_id: Option<JobId>,
    status: Option<JobProgressSnapshot>,
    socket_snapshot: Option<JobProgressSnapshot>,
    leads: LeadCache,
    reconciler: ProgressReconciler,
    progress: Option<ReconciledProgressView>,
    not_found: bool,
    status_error: Option<ApiError>,
    leads_error: Option<String>,
    leads_fetches_in_flight: u32,
    status_polling: bool,
    results: ResultsActivity,
    socket: SocketActivity,
    dirty: bool,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn is_current(&self, job_id: &str) -> bool {
        self.job_id.as_deref() == Some(job_id)
    }

    /// Whether source updates for `job_id` should still be applied.
    pub fn accepts(&self, job_id: &str) -> bool {
        self.is_current(job_id) && !self.not_found
    }

    pub fn results_activity(&self) -> ResultsActivity {
        self.results
    }

    pub fn socket_activity(&self) -> SocketActivity {
        self.socket
    }

    pub fn is_status_polling(&self) -> bool {
        self.status_polling
    }

    pub fn leads(&self) -> &LeadCache {
        &self.leads
    }

    pub fn view(&self) -> JobViewModel {
        let condition = if self.not_found {
            ViewCondition::NotFound
        } else if let Some(progress) = &self.progress {
            ViewCondition::Ready(progress.clone())
        } else if let Some(err) = &self.status_error {
            ViewCondition::Error(err.message.clone())
        } else if let Some(message) = &self.leads_error {
            ViewCondition::Error(message.clone())
        } else {
            ViewCondition::Loading
        };

        JobViewModel {
            job_id: self.job_id.clone(),
            condition,
            leads: self
                .job_id
                .as_deref()
                .and_then(|job_id| self.leads.get(job_id))
                .cloned(),
            leads_error: self.leads_error.clone(),
            fetching_leads: self.leads_fetches_in_flight > 0,
            socket: self.socket,
        }
    }

    /// Returns whether the view changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Starts observing `job_id`, tearing down whatever was observed before.
    pub(crate) fn open_job(&mut self, job_id: JobId) -> Vec<Effect> {
        if self.is_current(&job_id) {
            return Vec::new();
        }
        let mut effects = self.close();

        self.reconciler.observe(&job_id);
        self.job_id = Some(job_id.clone());
        self.status_polling = true;
        self.mark_dirty();
        effects.push(Effect::StartStatusPolling { job_id });
        effects
    }

    /// Stops every source and forgets the observed job.
    pub(crate) fn close(&mut self) -> Vec<Effect> {
        let Some(job_id) = self.job_id.take() else {
            return Vec::new();
        };
        *self = Self {
            dirty: true,
            ..Self::default()
        };
        vec![Effect::StopAllSources { job_id }]
    }

    pub(crate) fn apply_status(&mut self, snapshot: JobProgressSnapshot) -> Vec<Effect> {
        let status = snapshot.status;
        self.status = Some(snapshot);
        self.status_error = None;
        let effects = self.sync_sources(status);
        self.refresh_progress();
        effects
    }

    pub(crate) fn apply_status_failure(&mut self, err: ApiError) -> Vec<Effect> {
        if err.is_not_found() {
            return self.mark_not_found();
        }
        if !err.is_transient() {
            self.status_error = Some(err);
            self.mark_dirty();
        }
        Vec::new()
    }

    pub(crate) fn apply_results(&mut self, results: Arc<JobResults>) {
        if let Some(job_id) = self.job_id.clone() {
            self.leads.store(&job_id, results);
            self.leads_error = None;
            self.refresh_progress();
        }
    }

    pub(crate) fn apply_results_failure(&mut self, err: ApiError) -> Vec<Effect> {
        if err.is_not_found() {
            return self.mark_not_found();
        }
        self.leads_error = Some(err.message);
        self.mark_dirty();
        Vec::new()
    }

    pub(crate) fn apply_socket(&mut self, message: SocketMessage) -> Vec<Effect> {
        if self.socket != SocketActivity::Open {
            return Vec::new();
        }
        let Some(job_id) = self.job_id.clone() else {
            return Vec::new();
        };
        match message {
            SocketMessage::Connected(Some(snapshot)) => {
                self.socket_snapshot = Some(snapshot);
                self.refresh_progress();
                Vec::new()
            }
            SocketMessage::Connected(None) | SocketMessage::Malformed(_) => Vec::new(),
            SocketMessage::Progress(snapshot) => {
                self.socket_snapshot = Some(snapshot);
                self.refresh_progress();
                vec![Effect::RefreshStatus { job_id }]
            }
            SocketMessage::Completion => vec![Effect::RefreshStatus { job_id }],
        }
    }

    pub(crate) fn socket_closed(&mut self) {
        if self.socket == SocketActivity::Open {
            self.socket = SocketActivity::Degraded;
            self.mark_dirty();
        }
    }

    pub(crate) fn leads_fetch_started(&mut self) {
        self.leads_fetches_in_flight += 1;
        self.mark_dirty();
    }

    pub(crate) fn leads_fetch_finished(&mut self, result: Result<Arc<JobResults>, ApiError>) {
        self.leads_fetches_in_flight = self.leads_fetches_in_flight.saturating_sub(1);
        match result {
            Ok(results) => self.apply_results(results),
            Err(err) if err.is_not_found() => {
                self.leads_error = Some(JOB_NOT_FOUND_MESSAGE.to_string());
            }
            Err(err) => self.leads_error = Some(err.message),
        }
        self.mark_dirty();
    }

    fn mark_not_found(&mut self) -> Vec<Effect> {
        self.not_found = true;
        self.status_polling = false;
        self.results = ResultsActivity::Idle;
        self.socket = SocketActivity::Closed;
        self.socket_snapshot = None;
        self.mark_dirty();
        self.job_id
            .clone()
            .map(|job_id| vec![Effect::StopAllSources { job_id }])
            .unwrap_or_default()
    }

    /// Brings the results poller and the socket in line with the job status.
    fn sync_sources(&mut self, status: JobStatus) -> Vec<Effect> {
        let Some(job_id) = self.job_id.clone() else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        match status {
            JobStatus::Running => {
                if self.results != ResultsActivity::Repeating {
                    self.results = ResultsActivity::Repeating;
                    effects.push(Effect::StartResultsPolling {
                        job_id: job_id.clone(),
                        schedule: ResultsSchedule::Repeating,
                    });
                }
                if self.socket == SocketActivity::Closed {
                    self.socket = SocketActivity::Open;
                    effects.push(Effect::OpenProgressSocket { job_id });
                }
            }
            JobStatus::Completed => {
                if self.results != ResultsActivity::Once {
                    self.results = ResultsActivity::Once;
                    effects.push(Effect::StartResultsPolling {
                        job_id: job_id.clone(),
                        schedule: ResultsSchedule::Once,
                    });
                }
                self.leave_running(job_id, &mut effects);
            }
            JobStatus::Pending | JobStatus::Failed | JobStatus::Cancelled => {
                if self.results == ResultsActivity::Repeating {
                    self.results = ResultsActivity::Idle;
                    effects.push(Effect::StopResultsPolling {
                        job_id: job_id.clone(),
                    });
                }
                self.leave_running(job_id, &mut effects);
            }
        }
        effects
    }

    fn leave_running(&mut self, job_id: JobId, effects: &mut Vec<Effect>) {
        if self.socket == SocketActivity::Open {
            effects.push(Effect::CloseProgressSocket { job_id });
        }
        self.socket = SocketActivity::Closed;
        self.socket_snapshot = None;
    }

    fn refresh_progress(&mut self) {
        let results = self
            .job_id
            .as_deref()
            .and_then(|job_id| self.leads.get(job_id))
            .map(Arc::as_ref);
        self.progress = self.reconciler.reconcile(Sources {
            status: self.status.as_ref(),
            results,
            socket: self.socket_snapshot.as_ref(),
        });
        self.mark_dirty();
    }
}
