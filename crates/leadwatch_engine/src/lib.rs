//! Leadwatch engine: backend IO, progress sources and effect execution.
mod backend;
mod effects;
mod persist;
mod schedule;
mod settings;
mod socket;
mod sources;
mod watcher;

pub use backend::{http_error, Backend, ReqwestBackend};
pub use persist::{download_filename, ensure_output_dir, AtomicFileWriter, PersistError};
pub use schedule::{PollControl, PollHandle, PollMode, PollScheduler};
pub use settings::{WatchSettings, DEFAULT_API_URL};
pub use socket::{parse_socket_message, ProgressSubscription};
pub use sources::{fetch_results_with_retry, RetryPolicy};
pub use watcher::{JobWatcher, LeadsFetchError};
