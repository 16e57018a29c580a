use std::sync::Arc;

use crate::reconcile::ReconciledProgressView;
use crate::{JobId, JobResults, SocketActivity};

/// Signaled condition of the job detail view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCondition {
    Loading,
    /// The backend does not know the job; terminal for the session.
    NotFound,
    Error(String),
    Ready(ReconciledProgressView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobViewModel {
    pub job_id: Option<JobId>,
    pub condition: ViewCondition,
    /// Cached lead list for the observed job, if any was fetched.
    pub leads: Option<Arc<JobResults>>,
    pub leads_error: Option<String>,
    /// At least one on-demand lead fetch is outstanding.
    pub fetching_leads: bool,
    pub socket: SocketActivity,
}

impl Default for JobViewModel {
    fn default() -> Self {
        Self {
            job_id: None,
            condition: ViewCondition::Loading,
            leads: None,
            leads_error: None,
            fetching_leads: false,
            socket: SocketActivity::Closed,
        }
    }
}

/// What an on-demand lead request should do.
#[derive(Debug, Clone, PartialEq)]
pub enum LeadsFetchPlan {
    /// A non-empty list is already cached; no network call needed.
    Cached(Arc<JobResults>),
    /// Fetch the list directly.
    Fetch(JobId),
    /// The job has no leads to fetch.
    Nothing,
    /// The backend no longer knows the job.
    NotFound,
}

impl JobViewModel {
    pub fn progress(&self) -> Option<&ReconciledProgressView> {
        match &self.condition {
            ViewCondition::Ready(progress) => Some(progress),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.condition == ViewCondition::NotFound
    }

    pub fn leads_fetch_plan(&self) -> LeadsFetchPlan {
        let Some(job_id) = &self.job_id else {
            return LeadsFetchPlan::Nothing;
        };
        if self.is_not_found() {
            return LeadsFetchPlan::NotFound;
        }
        if let Some(cached) = self.leads.as_ref().filter(|r| !r.leads.is_empty()) {
            return LeadsFetchPlan::Cached(Arc::clone(cached));
        }
        match self.progress() {
            Some(progress) if progress.status.has_leads() => LeadsFetchPlan::Fetch(job_id.clone()),
            _ => LeadsFetchPlan::Nothing,
        }
    }
}
