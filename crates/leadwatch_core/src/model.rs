use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Opaque backend job identifier.
pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses for which the backend holds a lead list worth fetching.
    pub fn has_leads(self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Running | JobStatus::Completed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One source's view of a job at a point in time.
///
/// Status polls and socket messages both deserialize into this shape.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct JobProgressSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Backend's own percentage; only used when there is no lead target.
    pub progress_percent: Option<f64>,
    pub queries_completed: u64,
    pub queries_total: u64,
    pub leads_collected: u64,
    /// Requested goal; 0 means unbounded or unknown.
    pub target_leads: u64,
    pub duplicates_removed: u64,
    pub failed_queries: u64,
    pub current_query: Option<String>,
    pub elapsed_time: Option<String>,
    pub estimated_time_remaining: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Lead {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub rating: Option<String>,
    pub reviews: Option<String>,
    pub category: Option<String>,
    pub tech_stack: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub social_facebook: Option<String>,
    pub social_instagram: Option<String>,
    pub social_linkedin: Option<String>,
    pub social_twitter: Option<String>,
}

/// Accumulated lead list for a job, as returned by the results endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct JobResults {
    pub job_id: JobId,
    /// Kept as free text; only the status poll is authoritative.
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub leads: Vec<Lead>,
    pub total_leads: u64,
    pub target_leads: u64,
    pub file_path: Option<String>,
}

impl JobResults {
    pub fn lead_count(&self) -> u64 {
        self.leads.len() as u64
    }
}
