//! Leadwatch core: pure progress reconciliation state machine and view-model helpers.
mod cache;
mod effect;
mod failure;
mod model;
mod msg;
mod reconcile;
mod state;
mod update;
mod view_model;

pub use cache::LeadCache;
pub use effect::{Effect, ResultsSchedule};
pub use failure::{ApiError, FailureKind, JOB_NOT_FOUND_MESSAGE};
pub use model::{JobId, JobProgressSnapshot, JobResults, JobStatus, Lead, UnknownStatus};
pub use msg::{Msg, SocketMessage};
pub use reconcile::{
    derive_percent, ProgressReconciler, ReconciledProgressView, Sources, RUNNING_PERCENT_CAP,
};
pub use state::{ResultsActivity, SocketActivity, WatchState};
pub use update::update;
pub use view_model::{JobViewModel, LeadsFetchPlan, ViewCondition};
