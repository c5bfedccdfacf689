use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Fixed ordered step table driven by the extraction engine. Each step
/// bumps progress to its deterministic checkpoint; observers see the same
/// sequence every run.
pub const EXTRACTION_STEPS: &[(&str, u8)] = &[
    ("location", 17),
    ("customer", 34),
    ("scope", 51),
    ("materials", 68),
    ("labour", 85),
    ("fees", 100),
];

/// Progress record observed by polling/push clients, one per intake.
///
/// `intake_id` is the idempotency key: a lookup must precede creation, and
/// an existing `complete` job means the stored extraction is replayed
/// instead of recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GenerationJob {
    pub id: i64,
    pub intake_id: Uuid,
    pub status: GenerationJobStatus,
    pub current_step: Option<String>,
    pub progress_percent: u8,
    pub steps_completed: Vec<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GenerationJobStatus {
    Running,
    /// Set only by the downstream draft-builder, never by extraction
    Complete,
    Failed,
}

impl GenerationJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationJobStatus::Running => "running",
            GenerationJobStatus::Complete => "complete",
            GenerationJobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<GenerationJobStatus> {
        match s {
            "running" => Some(GenerationJobStatus::Running),
            "complete" => Some(GenerationJobStatus::Complete),
            "failed" => Some(GenerationJobStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct GenerationJobListResponse {
    pub jobs: Vec<GenerationJob>,
}
