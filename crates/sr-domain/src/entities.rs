//! Domain entities per the data model: Student, CertificateSubmission,
//! CertificateOcrText, CertificateMetadata, ActivityCategory, ExtractedActivity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered student. Created only by explicit registration; the
/// intake path never creates one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub enrollment_number: String,
    pub name: String,
    pub email: Option<String>,
    pub total_approved_hours: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The spine of the pipeline: one durable record per upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateSubmission {
    pub id: i64,
    pub student_id: i64,
    pub original_filename: String,
    pub object_key: String,
    pub file_checksum: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: String,
    pub error_message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
}

/// 1:1 with a submission. Immutable once created at the end of stage 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateOcrText {
    pub id: i64,
    pub submission_id: i64,
    pub raw_text: String,
    pub ocr_confidence: f64,
    pub processing_time_ms: i64,
    pub extracted_at: DateTime<Utc>,
}

/// Extraction method for a metadata record. Only `llm` exists today but
/// the field is kept open for a future heuristic extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Llm,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Llm => "llm",
        }
    }
}

/// N:1 with submission (one per pipeline pass, more on reprocessing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub id: i64,
    pub submission_id: i64,
    pub participant_name: Option<String>,
    pub event_name: Option<String>,
    pub location: Option<String>,
    pub event_date: Option<String>,
    pub original_hours: Option<String>,
    pub numeric_hours: Option<i64>,
    pub extraction_method: String,
    pub extraction_confidence: Option<f64>,
    pub processing_time_ms: i64,
    pub extracted_at: DateTime<Utc>,
}

/// The calculation rule a category uses to turn extracted data into hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    FixedPerSemester,
    FixedPerActivity,
    RatioHours,
    RatioDays,
    RatioPages,
}

impl CalculationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationType::FixedPerSemester => "fixed_per_semester",
            CalculationType::FixedPerActivity => "fixed_per_activity",
            CalculationType::RatioHours => "ratio_hours",
            CalculationType::RatioDays => "ratio_days",
            CalculationType::RatioPages => "ratio_pages",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fixed_per_semester" => Some(CalculationType::FixedPerSemester),
            "fixed_per_activity" => Some(CalculationType::FixedPerActivity),
            "ratio_hours" => Some(CalculationType::RatioHours),
            "ratio_days" => Some(CalculationType::RatioDays),
            "ratio_pages" => Some(CalculationType::RatioPages),
            _ => None,
        }
    }
}

/// Policy data, pre-seeded. Invariant: all computed award values are
/// clamped at `max_total_hours` before they ever reach an activity row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityCategory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub calculation_type: CalculationType,
    pub hours_awarded: Option<i64>,
    pub input_unit: Option<String>,
    pub input_quantity: Option<i64>,
    pub output_hours: Option<i64>,
    pub max_total_hours: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityCategory {
    /// Human-readable rendering of the calculation rule, used when
    /// listing categories and in the numbered catalog fed to the LLM.
    pub fn calc_description(&self) -> String {
        match self.calculation_type {
            CalculationType::FixedPerSemester => {
                format!("{} hours per semester", self.hours_awarded.unwrap_or(0))
            }
            CalculationType::FixedPerActivity => {
                format!("{} hours per activity", self.hours_awarded.unwrap_or(0))
            }
            CalculationType::RatioHours => format!(
                "{} awarded hour(s) per {} input hour(s)",
                self.output_hours.unwrap_or(0),
                self.input_quantity.unwrap_or(1)
            ),
            CalculationType::RatioDays => {
                format!("{} awarded hour(s) per day", self.output_hours.unwrap_or(0))
            }
            CalculationType::RatioPages => format!(
                "{} awarded hour(s) per {} page(s)",
                self.output_hours.unwrap_or(0),
                self.input_quantity.unwrap_or(1)
            ),
        }
    }
}

/// Review status of an `ExtractedActivity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    PendingReview,
    Approved,
    Rejected,
    ManualOverride,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::PendingReview => "pending_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::ManualOverride => "manual_override",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending_review" => Some(ReviewStatus::PendingReview),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            "manual_override" => Some(ReviewStatus::ManualOverride),
            _ => None,
        }
    }
}

/// The reviewable record produced by the metadata stage worker.
///
/// Invariant: once `review_status = approved`, `final_category_id` and
/// `final_hours` are non-null and immutable, and `final_hours` is
/// bounded by the final category's `max_total_hours`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedActivity {
    pub id: i64,
    pub submission_id: i64,
    pub metadata_id: i64,
    pub student_id: i64,
    pub enrollment_number: String,
    pub filename: String,
    pub participant_name: Option<String>,
    pub event_name: Option<String>,
    pub location: Option<String>,
    pub event_date: Option<String>,
    pub original_hours: Option<String>,
    pub numeric_hours: Option<i64>,
    pub category_id: Option<i64>,
    pub calculated_hours: Option<i64>,
    pub llm_reasoning: Option<String>,
    pub raw_text: String,
    pub review_status: String,
    pub coordinator_id: Option<String>,
    pub coordinator_comments: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub override_category_id: Option<i64>,
    pub override_hours: Option<i64>,
    pub override_reasoning: Option<String>,
    pub final_category_id: Option<i64>,
    pub final_hours: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
