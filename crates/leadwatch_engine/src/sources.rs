use std::sync::Arc;
use std::time::Duration;

use leadwatch_core::{ApiError, JobResults, Msg};
use leadwatch_logging::{leadwatch_debug, leadwatch_warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::schedule::PollControl;
use crate::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub limit: u32,
    pub backoff: Duration,
}

/// One status poll. Stops the poller once the job is gone.
pub(crate) async fn poll_status(
    backend: &dyn Backend,
    job_id: &str,
    msg_tx: &UnboundedSender<Msg>,
) -> PollControl {
    let result = backend.job_status(job_id).await;
    let control = match &result {
        Ok(_) => PollControl::Continue,
        Err(err) if err.is_not_found() => {
            leadwatch_warn!("job {} not found by status poll", job_id);
            PollControl::Stop
        }
        Err(err) => {
            leadwatch_debug!("status poll for {} failed: {}", job_id, err);
            PollControl::Continue
        }
    };
    let sent = msg_tx.send(Msg::StatusPolled {
        job_id: job_id.to_owned(),
        result,
    });
    if sent.is_err() {
        return PollControl::Stop;
    }
    control
}

/// One results poll, with its own retries.
pub(crate) async fn poll_results(
    backend: &dyn Backend,
    job_id: &str,
    timeout: Duration,
    retry: RetryPolicy,
    msg_tx: &UnboundedSender<Msg>,
) -> PollControl {
    let result = fetch_results_with_retry(backend, job_id, timeout, retry)
        .await
        .map(Arc::new);
    let control = match &result {
        Err(err) if err.is_not_found() => PollControl::Stop,
        Err(err) => {
            leadwatch_warn!("results for {} unavailable: {}", job_id, err);
            PollControl::Continue
        }
        Ok(_) => PollControl::Continue,
    };
    let sent = msg_tx.send(Msg::ResultsPolled {
        job_id: job_id.to_owned(),
        result,
    });
    if sent.is_err() {
        return PollControl::Stop;
    }
    control
}

/// Fetches the lead list, retrying transient failures with a fixed backoff.
///
/// A missing job is never retried.
pub async fn fetch_results_with_retry(
    backend: &dyn Backend,
    job_id: &str,
    timeout: Duration,
    retry: RetryPolicy,
) -> Result<JobResults, ApiError> {
    let mut attempt = 0;
    loop {
        match backend.job_results(job_id, timeout).await {
            Ok(results) => return Ok(results),
            Err(err) if err.is_transient() && attempt < retry.limit => {
                attempt += 1;
                leadwatch_debug!(
                    "results fetch for {} failed (attempt {}/{}): {}",
                    job_id,
                    attempt,
                    retry.limit + 1,
                    err
                );
                tokio::time::sleep(retry.backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}
