use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::extraction::ExtractionResult;

/// One voice submission, tracked through its full lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Intake {
    pub id: Uuid,
    pub transcript_text: String,
    pub stage: IntakeStage,
    pub status: IntakeStatus,
    pub extraction_json: Option<ExtractionResult>,
    /// Raw user overrides, kept separate from extraction_json for audit
    #[ts(skip)]
    pub user_corrections_json: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Intake {
    /// Once true, no code path may re-open this record for review
    pub fn is_user_confirmed(&self) -> bool {
        self.extraction_json
            .as_ref()
            .map(|e| e.quality.user_confirmed)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    Recorded,
    Transcribing,
    Transcribed,
    Extracting,
    ExtractDone,
    NeedsUserReview,
    DraftStarted,
    DraftDone,
    Failed,
}

impl IntakeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeStage::Recorded => "recorded",
            IntakeStage::Transcribing => "transcribing",
            IntakeStage::Transcribed => "transcribed",
            IntakeStage::Extracting => "extracting",
            IntakeStage::ExtractDone => "extract_done",
            IntakeStage::NeedsUserReview => "needs_user_review",
            IntakeStage::DraftStarted => "draft_started",
            IntakeStage::DraftDone => "draft_done",
            IntakeStage::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<IntakeStage> {
        match s {
            "recorded" => Some(IntakeStage::Recorded),
            "transcribing" => Some(IntakeStage::Transcribing),
            "transcribed" => Some(IntakeStage::Transcribed),
            "extracting" => Some(IntakeStage::Extracting),
            "extract_done" => Some(IntakeStage::ExtractDone),
            "needs_user_review" => Some(IntakeStage::NeedsUserReview),
            "draft_started" => Some(IntakeStage::DraftStarted),
            "draft_done" => Some(IntakeStage::DraftDone),
            "failed" => Some(IntakeStage::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IntakeStage::DraftDone | IntakeStage::Failed)
    }

    /// Transitions are monotonic along the pipeline sequence, with two
    /// exceptions: any non-terminal stage may fail, and confirmation moves
    /// needs_user_review back to extract_done.
    pub fn can_transition_to(&self, next: IntakeStage) -> bool {
        if *self == next {
            return false;
        }
        if next == IntakeStage::Failed {
            return !self.is_terminal();
        }
        matches!(
            (*self, next),
            (IntakeStage::Recorded, IntakeStage::Transcribing)
                | (IntakeStage::Recorded, IntakeStage::Transcribed)
                | (IntakeStage::Transcribing, IntakeStage::Transcribed)
                | (IntakeStage::Transcribed, IntakeStage::Extracting)
                | (IntakeStage::Extracting, IntakeStage::ExtractDone)
                | (IntakeStage::Extracting, IntakeStage::NeedsUserReview)
                | (IntakeStage::ExtractDone, IntakeStage::NeedsUserReview)
                | (IntakeStage::ExtractDone, IntakeStage::DraftStarted)
                | (IntakeStage::NeedsUserReview, IntakeStage::ExtractDone)
                | (IntakeStage::DraftStarted, IntakeStage::DraftDone)
        )
    }

    /// Coarse flag mirrored onto the intake for external consumers
    pub fn status(&self) -> IntakeStatus {
        match self {
            IntakeStage::Recorded => IntakeStatus::Recorded,
            IntakeStage::Transcribing => IntakeStatus::Transcribing,
            IntakeStage::Transcribed => IntakeStatus::Transcribed,
            IntakeStage::Extracting => IntakeStatus::Extracting,
            IntakeStage::ExtractDone => IntakeStatus::Extracted,
            IntakeStage::NeedsUserReview => IntakeStatus::NeedsUserReview,
            IntakeStage::DraftStarted => IntakeStatus::Drafting,
            IntakeStage::DraftDone => IntakeStatus::Quoted,
            IntakeStage::Failed => IntakeStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStatus {
    Recorded,
    Transcribing,
    Transcribed,
    Extracting,
    Extracted,
    NeedsUserReview,
    Drafting,
    Quoted,
    Failed,
}

/// Request to create an intake from a captured transcript
#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct CreateIntakeRequest {
    pub transcript_text: String,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct IntakeListResponse {
    pub intakes: Vec<Intake>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(IntakeStage::Transcribed.can_transition_to(IntakeStage::Extracting));
        assert!(IntakeStage::Extracting.can_transition_to(IntakeStage::ExtractDone));
        assert!(IntakeStage::ExtractDone.can_transition_to(IntakeStage::DraftStarted));
        assert!(IntakeStage::DraftStarted.can_transition_to(IntakeStage::DraftDone));
    }

    #[test]
    fn test_confirm_edge() {
        assert!(IntakeStage::NeedsUserReview.can_transition_to(IntakeStage::ExtractDone));
    }

    #[test]
    fn test_no_backwards_or_skipped_review_exit() {
        assert!(!IntakeStage::ExtractDone.can_transition_to(IntakeStage::Extracting));
        assert!(!IntakeStage::NeedsUserReview.can_transition_to(IntakeStage::DraftStarted));
        assert!(!IntakeStage::DraftDone.can_transition_to(IntakeStage::Recorded));
    }

    #[test]
    fn test_failed_is_terminal() {
        assert!(IntakeStage::Extracting.can_transition_to(IntakeStage::Failed));
        assert!(!IntakeStage::Failed.can_transition_to(IntakeStage::Extracting));
        assert!(!IntakeStage::DraftDone.can_transition_to(IntakeStage::Failed));
    }

    #[test]
    fn test_stage_round_trip() {
        for stage in [
            IntakeStage::Recorded,
            IntakeStage::Transcribing,
            IntakeStage::Transcribed,
            IntakeStage::Extracting,
            IntakeStage::ExtractDone,
            IntakeStage::NeedsUserReview,
            IntakeStage::DraftStarted,
            IntakeStage::DraftDone,
            IntakeStage::Failed,
        ] {
            assert_eq!(IntakeStage::parse(stage.as_str()), Some(stage));
        }
    }
}
