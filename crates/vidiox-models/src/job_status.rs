//! Job status state machine and the record served to pollers.
//!
//! Statuses only move forward: `queued < processing < {completed, error}`.
//! `processing -> processing` is allowed so progress messages can be
//! published; nothing leaves a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::JobResult;

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted and waiting for a worker
    #[default]
    Queued,
    /// A worker is running the pipeline
    Processing,
    /// At least one rendition was produced
    Completed,
    /// The job failed; the message says why
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Error => 2,
        }
    }

    /// Whether a record currently in `self` may be rewritten as `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    /// Validate a transition, returning a typed error when it would regress.
    pub fn transition_to(&self, next: JobStatus) -> Result<JobStatus, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError { from: *self, to: next })
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// A status write that would move a job backwards or out of a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal status transition {from} -> {to}")]
pub struct StatusTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Snapshot of a job as served to status pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    /// Job ID
    pub job_id: String,
    /// Current status
    pub status: JobStatus,
    /// Human-readable progress or diagnostic message
    pub message: String,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
    /// Video ID, when recorded at acceptance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    /// Client filename, when recorded at acceptance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    /// When the job was accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Result payload, only for completed jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JobResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 4] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Error,
    ];

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Error));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Error));
    }

    #[test]
    fn test_regressions_rejected() {
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
        let err = JobStatus::Processing.transition_to(JobStatus::Queued).unwrap_err();
        assert_eq!(err.from, JobStatus::Processing);
        assert_eq!(err.to, JobStatus::Queued);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [JobStatus::Completed, JobStatus::Error] {
            for next in ALL {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("failed".parse::<JobStatus>().is_err());
    }
}
