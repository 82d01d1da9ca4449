//! OCR stage worker (C9): extracts structured fields with the LLM,
//! validates the participant name against the submitting student, and
//! publishes the metadata stage message (§4.4).

use std::sync::Arc;

use sr_domain::{names_match, DomainError};
use sr_ports::{
    LlmProvider, MessageBus, MessageBusError, MetadataRepository, NewMetadata, StudentRepository,
    SubmissionRepository,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use sr_adapters::{CONSUMER_GROUP_OCR, TOPIC_METADATA, TOPIC_OCR};

#[derive(serde::Deserialize)]
struct OcrPayload {
    submission_id: i64,
    raw_text: String,
}

pub async fn run_ocr_worker<S, ST, L, MD, B>(
    submissions: Arc<S>,
    students: Arc<ST>,
    llm: Arc<L>,
    metadata: Arc<MD>,
    message_bus: Arc<B>,
    cancel: CancellationToken,
) -> Result<(), MessageBusError>
where
    S: SubmissionRepository,
    ST: StudentRepository,
    L: LlmProvider,
    MD: MetadataRepository,
    B: MessageBus,
{
    let mut subscription = message_bus.subscribe(TOPIC_OCR, CONSUMER_GROUP_OCR).await?;

    loop {
        let msg = tokio::select! {
            msg = subscription.next() => msg,
            _ = cancel.cancelled() => {
                info!("ocr worker received shutdown signal, closing subscription");
                break;
            }
        };
        let Some(msg) = msg else { break };

        let payload: Result<OcrPayload, _> = serde_json::from_slice(msg.payload());
        match payload {
            Ok(payload) => {
                handle_message(payload, &submissions, &students, &llm, &metadata, &message_bus).await;
            }
            Err(e) => {
                warn!(error = %e, "dropping ocr message with unparseable payload");
            }
        }
        msg.ack().await;
    }

    Ok(())
}

#[instrument(skip(submissions, students, llm, metadata, message_bus), fields(submission_id = payload.submission_id))]
async fn handle_message<S, ST, L, MD, B>(
    payload: OcrPayload,
    submissions: &Arc<S>,
    students: &Arc<ST>,
    llm: &Arc<L>,
    metadata: &Arc<MD>,
    message_bus: &Arc<B>,
) where
    S: SubmissionRepository,
    ST: StudentRepository,
    L: LlmProvider,
    MD: MetadataRepository,
    B: MessageBus,
{
    let submission_id = payload.submission_id;

    let submission = match submissions.get_by_id(submission_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            warn!(submission_id, "ocr: submission not found, dropping message");
            return;
        }
        Err(e) => {
            error!(submission_id, error = %e, "ocr: failed to load submission");
            return;
        }
    };

    let student = match students.get_by_id(submission.student_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            error!(submission_id, student_id = submission.student_id, "ocr: student vanished");
            return;
        }
        Err(e) => {
            error!(submission_id, error = %e, "ocr: failed to load student");
            return;
        }
    };

    if let Err(e) = submissions
        .update_status(submission_id, "metadata_processing", None, false)
        .await
    {
        error!(submission_id, error = %e, "ocr: failed to transition to metadata_processing");
        return;
    }

    let started = std::time::Instant::now();
    let extracted = match llm.extract_fields(&payload.raw_text).await {
        Ok(fields) => fields,
        Err(e) => {
            error!(submission_id, error = %e, "ocr: LLM field extraction failed");
            let _ = submissions
                .update_status(submission_id, "failed", Some(&e.to_string()), true)
                .await;
            return;
        }
    };
    let processing_time_ms = started.elapsed().as_millis() as i64;

    let numeric_hours = sr_domain::extract_numeric_hours(extracted.carga_horaria.as_deref());

    let metadata_row = match metadata
        .create(NewMetadata {
            submission_id,
            participant_name: extracted.nome_participante.as_deref(),
            event_name: extracted.evento.as_deref(),
            location: extracted.local.as_deref(),
            event_date: extracted.data.as_deref(),
            original_hours: extracted.carga_horaria.as_deref(),
            numeric_hours,
            processing_time_ms,
        })
        .await
    {
        Ok(row) => row,
        Err(e) => {
            error!(submission_id, error = %e, "ocr: failed to persist metadata");
            let _ = submissions
                .update_status(submission_id, "failed", Some(&e.to_string()), true)
                .await;
            return;
        }
    };

    let extracted_name = extracted.nome_participante.clone().unwrap_or_default();
    if !names_match(&extracted_name, &student.name) {
        let mismatch = DomainError::ParticipantMismatch {
            extracted: extracted_name,
            student: student.name.clone(),
        };
        warn!(submission_id, "ocr: participant name does not match submitting student");
        let _ = submissions
            .update_status(submission_id, "failed", Some(&mismatch.to_string()), true)
            .await;
        return;
    }

    let stage_payload = serde_json::json!({
        "submission_id": submission_id,
        "metadata_id": metadata_row.id,
        "extracted_data": {
            "nome_participante": extracted.nome_participante,
            "evento": extracted.evento,
            "local": extracted.local,
            "data": extracted.data,
            "carga_horaria": extracted.carga_horaria,
        },
    });

    if let Err(e) = message_bus
        .publish(TOPIC_METADATA, &submission_id.to_string(), stage_payload)
        .await
    {
        error!(submission_id, error = %e, "ocr: failed to publish metadata stage message");
        let _ = submissions
            .update_status(submission_id, "failed", Some(&e.to_string()), true)
            .await;
        return;
    }

    info!(submission_id, "ocr stage complete");
}
