// Workflow run models
// GitHub Actions runs and artifacts as observed by the run monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run status reported by GitHub
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Pending,
    Waiting,
    Requested,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// `completed` is the only terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Pending => "pending",
            RunStatus::Waiting => "waiting",
            RunStatus::Requested => "requested",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Unknown => "unknown",
        }
    }
}

/// Conclusion of a completed run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Stale,
    StartupFailure,
    #[serde(other)]
    Other,
}

impl RunConclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunConclusion::Success => "success",
            RunConclusion::Failure => "failure",
            RunConclusion::Cancelled => "cancelled",
            RunConclusion::Skipped => "skipped",
            RunConclusion::TimedOut => "timed_out",
            RunConclusion::ActionRequired => "action_required",
            RunConclusion::Neutral => "neutral",
            RunConclusion::Stale => "stale",
            RunConclusion::StartupFailure => "startup_failure",
            RunConclusion::Other => "other",
        }
    }
}

/// Visual tone of a run, used by renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTone {
    Success,
    Failure,
    Running,
    Pending,
}

/// One execution of the workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub run_number: u64,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<RunConclusion>,
    #[serde(default)]
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Headline label: the conclusion once completed, otherwise the status
    pub fn display_label(&self) -> String {
        if self.is_completed() {
            self.conclusion
                .map(|c| c.as_str())
                .unwrap_or("completed")
                .to_uppercase()
        } else {
            self.status.as_str().to_uppercase().replace('_', " ")
        }
    }

    pub fn tone(&self) -> RunTone {
        match (self.status, self.conclusion) {
            (RunStatus::Completed, Some(RunConclusion::Success)) => RunTone::Success,
            (RunStatus::Completed, Some(RunConclusion::Failure)) => RunTone::Failure,
            (RunStatus::InProgress, _) => RunTone::Running,
            _ => RunTone::Pending,
        }
    }

    /// Whole minutes between creation and last update
    pub fn duration_minutes(&self) -> i64 {
        (self.updated_at - self.created_at).num_minutes()
    }
}

/// `GET .../actions/workflows/{file}/runs` response
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Build output attached to a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archive_download_url: String,
    #[serde(default)]
    pub expired: bool,
}

impl Artifact {
    /// Size in MiB, as shown next to each artifact
    pub fn size_mb(&self) -> f64 {
        self.size_in_bytes as f64 / 1024.0 / 1024.0
    }
}

/// `GET .../actions/runs/{id}/artifacts` response
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// What artifact enumeration produced for a completed run.
///
/// `Empty` (the run produced nothing) and `Unavailable` (the listing failed)
/// are distinct outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactOutcome {
    Produced(Vec<Artifact>),
    Empty,
    Unavailable(String),
}

impl ArtifactOutcome {
    pub fn from_list(artifacts: Vec<Artifact>) -> Self {
        if artifacts.is_empty() {
            ArtifactOutcome::Empty
        } else {
            ArtifactOutcome::Produced(artifacts)
        }
    }
}

/// Workflow inputs for one autobuild dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub mode: String,
    pub release_tag: String,
    pub keep_artifacts: bool,
}

/// Body of `POST .../actions/workflows/{file}/dispatches`
#[derive(Debug, Clone, Serialize)]
pub struct DispatchPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub inputs: DispatchInputs,
}

/// Workflow inputs; GitHub only accepts strings here
#[derive(Debug, Clone, Serialize)]
pub struct DispatchInputs {
    pub mode: String,
    pub release_tag: String,
    pub keep_artifacts: String,
}

impl DispatchPayload {
    pub fn new(git_ref: &str, request: &DispatchRequest) -> Self {
        Self {
            git_ref: git_ref.to_string(),
            inputs: DispatchInputs {
                mode: request.mode.clone(),
                release_tag: request.release_tag.clone(),
                keep_artifacts: request.keep_artifacts.to_string(),
            },
        }
    }
}
