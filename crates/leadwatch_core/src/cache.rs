use std::collections::HashMap;
use std::sync::Arc;

use crate::{JobId, JobResults};

/// Lead lists keyed by job, owned by one watch session.
///
/// Pollers and the on-demand fetch all write here; writes are last-write-wins
/// since every payload is a read of the same append-only backend result set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeadCache {
    entries: HashMap<JobId, Arc<JobResults>>,
}

impl LeadCache {
    pub fn get(&self, job_id: &str) -> Option<&Arc<JobResults>> {
        self.entries.get(job_id)
    }

    pub fn store(&mut self, job_id: &str, results: Arc<JobResults>) {
        self.entries.insert(job_id.to_owned(), results);
    }
}
