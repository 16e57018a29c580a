use std::sync::Arc;

use crate::{ApiError, JobId, JobProgressSnapshot, JobResults};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The job detail view was opened for a job (or switched to another one).
    JobOpened(JobId),
    /// The job detail view was closed.
    ViewClosed,
    /// A status poll finished.
    StatusPolled {
        job_id: JobId,
        result: Result<JobProgressSnapshot, ApiError>,
    },
    /// A results poll finished, after its own retries.
    ResultsPolled {
        job_id: JobId,
        result: Result<Arc<JobResults>, ApiError>,
    },
    /// A message arrived on the progress socket.
    Socket {
        job_id: JobId,
        message: SocketMessage,
    },
    /// The progress socket closed or failed to connect.
    SocketClosed { job_id: JobId },
    /// An on-demand lead fetch went out.
    LeadsFetchStarted { job_id: JobId },
    /// An on-demand lead fetch finished.
    LeadsFetched {
        job_id: JobId,
        result: Result<Arc<JobResults>, ApiError>,
    },
}

/// Typed progress socket message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketMessage {
    /// Connection acknowledgement, optionally carrying the current progress.
    Connected(Option<JobProgressSnapshot>),
    Progress(JobProgressSnapshot),
    /// The job finished; status should be re-polled now.
    Completion,
    /// Anything that could not be understood. Dropped by the update loop.
    Malformed(String),
}
