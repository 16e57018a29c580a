use crate::{Effect, Msg, WatchState};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages tagged with a job other than the observed one are late arrivals
/// from a torn-down view and are discarded, as are source updates once the
/// job is known to be gone.
pub fn update(mut state: WatchState, msg: Msg) -> (WatchState, Vec<Effect>) {
    let effects = match msg {
        Msg::JobOpened(job_id) => state.open_job(job_id),
        Msg::ViewClosed => state.close(),
        Msg::StatusPolled { job_id, result } => {
            if !state.accepts(&job_id) {
                return (state, Vec::new());
            }
            match result {
                Ok(snapshot) => state.apply_status(snapshot),
                Err(err) => state.apply_status_failure(err),
            }
        }
        Msg::ResultsPolled { job_id, result } => {
            if !state.accepts(&job_id) {
                return (state, Vec::new());
            }
            match result {
                Ok(results) => {
                    state.apply_results(results);
                    Vec::new()
                }
                Err(err) => state.apply_results_failure(err),
            }
        }
        Msg::Socket { job_id, message } => {
            if !state.accepts(&job_id) {
                return (state, Vec::new());
            }
            state.apply_socket(message)
        }
        Msg::SocketClosed { job_id } => {
            if state.is_current(&job_id) {
                state.socket_closed();
            }
            Vec::new()
        }
        Msg::LeadsFetchStarted { job_id } => {
            if state.is_current(&job_id) {
                state.leads_fetch_started();
            }
            Vec::new()
        }
        Msg::LeadsFetched { job_id, result } => {
            if state.is_current(&job_id) {
                state.leads_fetch_finished(result);
            }
            Vec::new()
        }
    };

    (state, effects)
}
