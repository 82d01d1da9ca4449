//! The submission state machine per §4.2.
//!
//! ```text
//! uploaded -> queued -> ocr_processing -> metadata_processing -> categorization_processing -> pending_review
//!                                                                                               -> approved
//!                                                                                               -> rejected
//! any pipeline state -> failed     (error message required)
//! ```
//!
//! Transitions are monotonic except that `failed` is reachable from any
//! pipeline state and is terminal alongside `approved`/`rejected`.

use crate::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    Uploaded,
    Queued,
    OcrProcessing,
    MetadataProcessing,
    CategorizationProcessing,
    PendingReview,
    Approved,
    Rejected,
    Failed,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Uploaded => "uploaded",
            SubmissionState::Queued => "queued",
            SubmissionState::OcrProcessing => "ocr_processing",
            SubmissionState::MetadataProcessing => "metadata_processing",
            SubmissionState::CategorizationProcessing => "categorization_processing",
            SubmissionState::PendingReview => "pending_review",
            SubmissionState::Approved => "approved",
            SubmissionState::Rejected => "rejected",
            SubmissionState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(SubmissionState::Uploaded),
            "queued" => Some(SubmissionState::Queued),
            "ocr_processing" => Some(SubmissionState::OcrProcessing),
            "metadata_processing" => Some(SubmissionState::MetadataProcessing),
            "categorization_processing" => Some(SubmissionState::CategorizationProcessing),
            "pending_review" => Some(SubmissionState::PendingReview),
            "approved" => Some(SubmissionState::Approved),
            "rejected" => Some(SubmissionState::Rejected),
            "failed" => Some(SubmissionState::Failed),
            _ => None,
        }
    }

    /// Terminal states accept no further transition at all, including `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Approved | SubmissionState::Rejected | SubmissionState::Failed
        )
    }

    fn is_pipeline_state(&self) -> bool {
        matches!(
            self,
            SubmissionState::Uploaded
                | SubmissionState::Queued
                | SubmissionState::OcrProcessing
                | SubmissionState::MetadataProcessing
                | SubmissionState::CategorizationProcessing
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SubmissionEvent {
    Queue,
    StartOcr,
    StartMetadata,
    StartCategorization,
    ReachPendingReview,
    Approve,
    Reject,
    Fail,
}

impl SubmissionEvent {
    fn as_str(&self) -> &'static str {
        match self {
            SubmissionEvent::Queue => "queue",
            SubmissionEvent::StartOcr => "start_ocr",
            SubmissionEvent::StartMetadata => "start_metadata",
            SubmissionEvent::StartCategorization => "start_categorization",
            SubmissionEvent::ReachPendingReview => "reach_pending_review",
            SubmissionEvent::Approve => "approve",
            SubmissionEvent::Reject => "reject",
            SubmissionEvent::Fail => "fail",
        }
    }
}

/// Compute the next state for a submission transition, or reject it.
pub fn transition(
    current: SubmissionState,
    event: SubmissionEvent,
) -> Result<SubmissionState, DomainError> {
    use SubmissionEvent::*;
    use SubmissionState::*;

    match (current, event) {
        (Uploaded, Queue) => Ok(Queued),
        (Queued, StartOcr) => Ok(OcrProcessing),
        (OcrProcessing, StartMetadata) => Ok(MetadataProcessing),
        (MetadataProcessing, StartCategorization) => Ok(CategorizationProcessing),
        (CategorizationProcessing, ReachPendingReview) => Ok(PendingReview),
        (PendingReview, Approve) => Ok(Approved),
        (PendingReview, Reject) => Ok(Rejected),
        (state, Fail) if state.is_pipeline_state() => Ok(Failed),
        (state, event) => Err(DomainError::InvalidTransition {
            current: state.as_str().to_string(),
            attempted: event.as_str().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_stage() {
        let mut state = SubmissionState::Uploaded;
        for event in [
            SubmissionEvent::Queue,
            SubmissionEvent::StartOcr,
            SubmissionEvent::StartMetadata,
            SubmissionEvent::StartCategorization,
            SubmissionEvent::ReachPendingReview,
        ] {
            state = transition(state, event).unwrap();
        }
        assert_eq!(state.as_str(), "pending_review");
        assert_eq!(transition(state, SubmissionEvent::Approve).unwrap().as_str(), "approved");
    }

    #[test]
    fn fail_reachable_from_any_pipeline_state() {
        for state in [
            SubmissionState::Uploaded,
            SubmissionState::Queued,
            SubmissionState::OcrProcessing,
            SubmissionState::MetadataProcessing,
            SubmissionState::CategorizationProcessing,
        ] {
            assert_eq!(
                transition(state, SubmissionEvent::Fail).unwrap().as_str(),
                "failed"
            );
        }
    }

    #[test]
    fn failed_and_approved_are_terminal() {
        assert!(SubmissionState::Failed.is_terminal());
        assert!(SubmissionState::Approved.is_terminal());
        assert!(SubmissionState::Rejected.is_terminal());
        assert!(transition(SubmissionState::Failed, SubmissionEvent::Fail).is_err());
        assert!(transition(SubmissionState::Approved, SubmissionEvent::Reject).is_err());
    }

    #[test]
    fn cannot_skip_stages() {
        assert!(transition(SubmissionState::Uploaded, SubmissionEvent::StartOcr).is_err());
        assert!(transition(SubmissionState::PendingReview, SubmissionEvent::Queue).is_err());
    }
}
