//! Common types for ReplyBox

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a stored email record, assigned by the database
pub type EmailId = i64;

/// Identifier of a queued job
pub type JobId = Uuid;

/// Which parts of the service a process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
    /// HTTP API only
    Api,
    /// Reply worker only
    Worker,
    /// Both in one process
    #[default]
    All,
}

impl ServerRole {
    pub fn runs_api(&self) -> bool {
        matches!(self, ServerRole::Api | ServerRole::All)
    }

    pub fn runs_worker(&self) -> bool {
        matches!(self, ServerRole::Worker | ServerRole::All)
    }
}

/// Job lifecycle status as stored by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(crate::Error::Validation(format!(
                "Unknown job status: {}",
                other
            ))),
        }
    }
}
