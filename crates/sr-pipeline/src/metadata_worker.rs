//! Metadata/categorization stage worker (C10): classifies the activity
//! against the category catalog, computes awarded hours, and hands the
//! submission to human review (§4.5).

use std::sync::Arc;

use sr_domain::{calculate_hours, HoursInput};
use sr_ports::{
    ActivityRepository, CategoryRepository, LlmProvider, MessageBus, MessageBusError, NewActivity,
    OcrTextRepository, StudentRepository, SubmissionRepository,
};
use sr_adapters::{CONSUMER_GROUP_METADATA, TOPIC_METADATA};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

#[derive(serde::Deserialize)]
struct MetadataPayload {
    submission_id: i64,
    metadata_id: i64,
    extracted_data: ExtractedData,
}

#[derive(Clone, serde::Deserialize)]
struct ExtractedData {
    nome_participante: Option<String>,
    evento: Option<String>,
    local: Option<String>,
    data: Option<String>,
    carga_horaria: Option<String>,
}

fn render_catalog(categories: &[sr_domain::ActivityCategory]) -> String {
    categories
        .iter()
        .map(|c| format!("{}. {} - {} ({}, max {}h)", c.id, c.name, c.calc_description(), c.description.clone().unwrap_or_default(), c.max_total_hours))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn run_metadata_worker<S, ST, OT, C, A, L, B>(
    submissions: Arc<S>,
    students: Arc<ST>,
    ocr_text: Arc<OT>,
    categories: Arc<C>,
    activities: Arc<A>,
    llm: Arc<L>,
    message_bus: Arc<B>,
    cancel: CancellationToken,
) -> Result<(), MessageBusError>
where
    S: SubmissionRepository,
    ST: StudentRepository,
    OT: OcrTextRepository,
    C: CategoryRepository,
    A: ActivityRepository,
    L: LlmProvider,
    B: MessageBus,
{
    let mut subscription = message_bus
        .subscribe(TOPIC_METADATA, CONSUMER_GROUP_METADATA)
        .await?;

    loop {
        let msg = tokio::select! {
            msg = subscription.next() => msg,
            _ = cancel.cancelled() => {
                info!("metadata worker received shutdown signal, closing subscription");
                break;
            }
        };
        let Some(msg) = msg else { break };

        let payload: Result<MetadataPayload, _> = serde_json::from_slice(msg.payload());
        match payload {
            Ok(payload) => {
                handle_message(
                    payload,
                    &submissions,
                    &students,
                    &ocr_text,
                    &categories,
                    &activities,
                    &llm,
                )
                .await;
            }
            Err(e) => {
                warn!(error = %e, "dropping metadata message with unparseable payload");
            }
        }
        msg.ack().await;
    }

    Ok(())
}

#[instrument(skip(submissions, students, ocr_text, categories, activities, llm), fields(submission_id = payload.submission_id))]
async fn handle_message<S, ST, OT, C, A, L>(
    payload: MetadataPayload,
    submissions: &Arc<S>,
    students: &Arc<ST>,
    ocr_text: &Arc<OT>,
    categories: &Arc<C>,
    activities: &Arc<A>,
    llm: &Arc<L>,
) where
    S: SubmissionRepository,
    ST: StudentRepository,
    OT: OcrTextRepository,
    C: CategoryRepository,
    A: ActivityRepository,
    L: LlmProvider,
{
    let submission_id = payload.submission_id;

    let submission = match submissions.get_by_id(submission_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            warn!(submission_id, "metadata: submission not found, dropping message");
            return;
        }
        Err(e) => {
            error!(submission_id, error = %e, "metadata: failed to load submission");
            return;
        }
    };

    let student = match students.get_by_id(submission.student_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            error!(submission_id, "metadata: student vanished");
            return;
        }
        Err(e) => {
            error!(submission_id, error = %e, "metadata: failed to load student");
            return;
        }
    };

    if let Err(e) = submissions
        .update_status(submission_id, "categorization_processing", None, false)
        .await
    {
        error!(submission_id, error = %e, "metadata: failed to transition to categorization_processing");
        return;
    }

    let raw_text = match ocr_text.get_by_submission_id(submission_id).await {
        Ok(Some(row)) => row.raw_text,
        Ok(None) => {
            error!(submission_id, "metadata: no OCR text found for submission");
            let _ = submissions
                .update_status(submission_id, "failed", Some("missing OCR text"), true)
                .await;
            return;
        }
        Err(e) => {
            error!(submission_id, error = %e, "metadata: failed to load OCR text");
            let _ = submissions
                .update_status(submission_id, "failed", Some(&e.to_string()), true)
                .await;
            return;
        }
    };

    let category_rows = match categories.list_all().await {
        Ok(rows) => rows,
        Err(e) => {
            error!(submission_id, error = %e, "metadata: failed to load category catalog");
            let _ = submissions
                .update_status(submission_id, "failed", Some(&e.to_string()), true)
                .await;
            return;
        }
    };
    let catalog_text = render_catalog(&category_rows);

    let extracted = payload.extracted_data.clone();

    if extracted.evento.as_deref().unwrap_or("").is_empty() {
        warn!(submission_id, "metadata: missing evento, cannot categorize");
        let _ = submissions
            .update_status(submission_id, "failed", Some("Missing evento information"), true)
            .await;
        return;
    }

    let numeric_hours = sr_domain::extract_numeric_hours(extracted.carga_horaria.as_deref());
    if numeric_hours.is_none() {
        warn!(submission_id, "metadata: could not extract numeric hours from carga_horaria");
        let _ = submissions
            .update_status(submission_id, "failed", Some("Could not extract numeric hours"), true)
            .await;
        return;
    }

    let categorization = match llm
        .categorize_activity(
            &raw_text,
            &sr_ports::ExtractedFields {
                nome_participante: extracted.nome_participante.clone(),
                evento: extracted.evento.clone(),
                local: extracted.local.clone(),
                data: extracted.data.clone(),
                carga_horaria: extracted.carga_horaria.clone(),
            },
            &catalog_text,
        )
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!(submission_id, error = %e, "metadata: LLM categorization failed");
            let _ = submissions
                .update_status(submission_id, "failed", Some(&e.to_string()), true)
                .await;
            return;
        }
    };

    let category = match categorization
        .category_id
        .and_then(|id| category_rows.iter().find(|c| c.id == id))
    {
        Some(category) => category,
        None => {
            warn!(submission_id, "metadata: LLM did not return a catalog category");
            let _ = submissions
                .update_status(submission_id, "failed", Some(&categorization.reasoning), true)
                .await;
            return;
        }
    };

    let calculated_hours = calculate_hours(
        category,
        &HoursInput {
            numeric_hours,
            evento: extracted.evento.as_deref(),
            data: extracted.data.as_deref(),
            carga_horaria: extracted.carga_horaria.as_deref(),
        },
    );

    let activity = activities
        .create(NewActivity {
            submission_id,
            metadata_id: payload.metadata_id,
            student_id: student.id,
            enrollment_number: &student.enrollment_number,
            filename: &submission.original_filename,
            participant_name: extracted.nome_participante.as_deref(),
            event_name: extracted.evento.as_deref(),
            location: extracted.local.as_deref(),
            event_date: extracted.data.as_deref(),
            original_hours: extracted.carga_horaria.as_deref(),
            numeric_hours,
            category_id: Some(category.id),
            calculated_hours: Some(calculated_hours),
            llm_reasoning: Some(&categorization.reasoning),
            raw_text: &raw_text,
        })
        .await;

    if let Err(e) = activity {
        error!(submission_id, error = %e, "metadata: failed to persist extracted activity");
        let _ = submissions
            .update_status(submission_id, "failed", Some(&e.to_string()), true)
            .await;
        return;
    }

    if let Err(e) = submissions
        .update_status(submission_id, "pending_review", None, true)
        .await
    {
        error!(submission_id, error = %e, "metadata: failed to transition to pending_review");
        return;
    }

    info!(submission_id, category_id = category.id, calculated_hours, "metadata stage complete");
}
