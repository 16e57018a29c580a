/// Work the driver must perform after an update. All effects are scoped to a
/// job so the driver can ignore ones for a job it already tore down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Poll status on the fixed interval until stopped.
    StartStatusPolling { job_id: crate::JobId },
    /// Poll status right away instead of waiting for the next tick.
    RefreshStatus { job_id: crate::JobId },
    /// Start (or replace) the results poller.
    StartResultsPolling {
        job_id: crate::JobId,
        schedule: ResultsSchedule,
    },
    StopResultsPolling { job_id: crate::JobId },
    OpenProgressSocket { job_id: crate::JobId },
    CloseProgressSocket { job_id: crate::JobId },
    /// Tear down every source for the job.
    StopAllSources { job_id: crate::JobId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsSchedule {
    /// Refetch on every tick while the job runs.
    Repeating,
    /// A single fetch, used once the job has completed.
    Once,
}
