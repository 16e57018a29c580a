//! Merges the status poll, the results poll and the progress socket into one
//! monotonic progress view.
//!
//! The three sources race each other and any of them may deliver a stale
//! count. The reconciler keeps a per-job high-water mark of the lead count so
//! the emitted value never moves backward while the same job is observed.

use crate::{JobId, JobProgressSnapshot, JobResults, JobStatus};

/// Highest percentage shown while a job is still running; 100 is reserved for
/// a confirmed completion.
pub const RUNNING_PERCENT_CAP: f64 = 99.0;

/// Latest value from each source. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sources<'a> {
    pub status: Option<&'a JobProgressSnapshot>,
    pub results: Option<&'a JobResults>,
    pub socket: Option<&'a JobProgressSnapshot>,
}

impl Sources<'_> {
    /// Largest lead count reported by any present source.
    pub fn candidate_leads_collected(&self) -> u64 {
        let status = self.status.map_or(0, |s| s.leads_collected);
        let results = self.results.map_or(0, JobResults::lead_count);
        let socket = self.socket.map_or(0, |s| s.leads_collected);
        status.max(results).max(socket)
    }

    fn target_leads(&self, base: &JobProgressSnapshot) -> u64 {
        [
            Some(base.target_leads),
            self.status.map(|s| s.target_leads),
            self.socket.map(|s| s.target_leads),
        ]
        .into_iter()
        .flatten()
        .find(|target| *target > 0)
        .unwrap_or(0)
    }
}

/// The single progress value consumers render.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledProgressView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub queries_completed: u64,
    pub queries_total: u64,
    /// High-water mark of every lead count seen for this job.
    pub effective_leads_collected: u64,
    pub target_leads: u64,
    pub duplicates_removed: u64,
    pub failed_queries: u64,
    pub current_query: Option<String>,
    pub elapsed_time: Option<String>,
    pub estimated_time_remaining: Option<String>,
    pub error_message: Option<String>,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressReconciler {
    job_id: Option<JobId>,
    high_water: u64,
}

impl ProgressReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the reconciler at `job_id`. Switching jobs drops the previous
    /// job's high-water mark.
    pub fn observe(&mut self, job_id: &str) {
        if self.job_id.as_deref() != Some(job_id) {
            self.job_id = Some(job_id.to_owned());
            self.high_water = 0;
        }
    }

    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    /// Folds the current sources into the high-water mark and builds the view.
    ///
    /// Returns `None` when neither the status poll nor the socket has produced
    /// a snapshot yet; the results list never supplies structural fields.
    pub fn reconcile(&mut self, sources: Sources<'_>) -> Option<ReconciledProgressView> {
        self.high_water = self.high_water.max(sources.candidate_leads_collected());

        let base = sources.status.or(sources.socket)?;
        let effective = self.high_water;
        let target_leads = sources.target_leads(base);
        let progress_percent =
            derive_percent(base.status, effective, target_leads, base.progress_percent);

        Some(ReconciledProgressView {
            job_id: self.job_id.clone().unwrap_or_else(|| base.job_id.clone()),
            status: base.status,
            queries_completed: base.queries_completed,
            queries_total: base.queries_total,
            effective_leads_collected: effective,
            target_leads,
            duplicates_removed: base.duplicates_removed,
            failed_queries: base.failed_queries,
            current_query: base.current_query.clone(),
            elapsed_time: base.elapsed_time.clone(),
            estimated_time_remaining: base.estimated_time_remaining.clone(),
            error_message: base.error_message.clone(),
            progress_percent,
        })
    }
}

/// Completion percentage for display.
///
/// With a lead target the percentage is computed from the effective count;
/// without one the backend's own figure is used. Running jobs stop at 99,
/// completed jobs are always exactly 100.
pub fn derive_percent(
    status: JobStatus,
    effective_leads: u64,
    target_leads: u64,
    self_reported: Option<f64>,
) -> f64 {
    if status == JobStatus::Completed {
        return 100.0;
    }

    let raw = if target_leads > 0 {
        100.0 * effective_leads as f64 / target_leads as f64
    } else {
        self_reported.unwrap_or(0.0)
    };
    let raw = if raw.is_finite() { raw } else { 0.0 };

    match status {
        JobStatus::Running => raw.clamp(0.0, RUNNING_PERCENT_CAP),
        _ => raw.clamp(0.0, 100.0),
    }
}
