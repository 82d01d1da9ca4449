//! Ingest stage worker (C8): downloads the uploaded bytes, runs OCR,
//! and publishes the OCR stage message (§4.3).

use std::sync::Arc;
use std::time::Instant;

use sr_adapters::{CONSUMER_GROUP_INGEST, TOPIC_INGEST, TOPIC_OCR};
use sr_ports::{MessageBus, MessageBusError, ObjectStore, OcrEngine, OcrTextRepository, SubmissionRepository};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

#[derive(serde::Deserialize)]
struct IngestPayload {
    submission_id: i64,
    original_filename: String,
}

fn extension_of(filename: &str) -> Option<String> {
    filename.rsplit('.').next().map(|s| s.to_lowercase())
}

/// Run the ingest consumer until the subscription closes. Each message
/// is acknowledged unconditionally after processing, per §5: commits
/// cannot be deferred past DB completion in this delivery model.
pub async fn run_ingest_worker<S, OS, E, OT, B>(
    submissions: Arc<S>,
    object_store: Arc<OS>,
    ocr_engine: Arc<E>,
    ocr_text: Arc<OT>,
    message_bus: Arc<B>,
    cancel: CancellationToken,
) -> Result<(), MessageBusError>
where
    S: SubmissionRepository,
    OS: ObjectStore,
    E: OcrEngine,
    OT: OcrTextRepository,
    B: MessageBus,
{
    let mut subscription = message_bus
        .subscribe(TOPIC_INGEST, CONSUMER_GROUP_INGEST)
        .await?;

    loop {
        let msg = tokio::select! {
            msg = subscription.next() => msg,
            _ = cancel.cancelled() => {
                info!("ingest worker received shutdown signal, closing subscription");
                break;
            }
        };
        let Some(msg) = msg else { break };

        let payload: Result<IngestPayload, _> = serde_json::from_slice(msg.payload());
        match payload {
            Ok(payload) => {
                handle_message(
                    payload,
                    &submissions,
                    &object_store,
                    &ocr_engine,
                    &ocr_text,
                    &message_bus,
                )
                .await;
            }
            Err(e) => {
                warn!(error = %e, "dropping ingest message with unparseable payload");
            }
        }
        msg.ack().await;
    }

    Ok(())
}

#[instrument(skip(submissions, object_store, ocr_engine, ocr_text, message_bus), fields(submission_id = payload.submission_id))]
async fn handle_message<S, OS, E, OT, B>(
    payload: IngestPayload,
    submissions: &Arc<S>,
    object_store: &Arc<OS>,
    ocr_engine: &Arc<E>,
    ocr_text: &Arc<OT>,
    message_bus: &Arc<B>,
) where
    S: SubmissionRepository,
    OS: ObjectStore,
    E: OcrEngine,
    OT: OcrTextRepository,
    B: MessageBus,
{
    let submission_id = payload.submission_id;

    let submission = match submissions.get_by_id(submission_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            warn!(submission_id, "ingest: submission not found, dropping message");
            return;
        }
        Err(e) => {
            error!(submission_id, error = %e, "ingest: failed to load submission");
            return;
        }
    };

    if let Err(e) = submissions
        .update_status(submission_id, "ocr_processing", None, false)
        .await
    {
        error!(submission_id, error = %e, "ingest: failed to transition to ocr_processing");
        return;
    }

    let bytes = match object_store.download(&submission.object_key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(submission_id, error = %e, "ingest: failed to download file from object store");
            let _ = submissions
                .update_status(
                    submission_id,
                    "failed",
                    Some(&format!("Failed to download file from S3: {}", submission.object_key)),
                    true,
                )
                .await;
            return;
        }
    };

    let extension = extension_of(&payload.original_filename).unwrap_or_default();

    let started = Instant::now();
    let ocr_result = ocr_engine.process_file(bytes, &extension).await;
    let processing_time_ms = started.elapsed().as_millis() as i64;

    let ocr_result = match ocr_result {
        Ok(result) => result,
        Err(e) => {
            error!(submission_id, error = %e, "ingest: OCR processing failed");
            let _ = submissions
                .update_status(submission_id, "failed", Some(&e.to_string()), true)
                .await;
            return;
        }
    };

    let ocr_row = match ocr_text
        .create(
            submission_id,
            &ocr_result.text,
            ocr_result.confidence,
            processing_time_ms,
        )
        .await
    {
        Ok(row) => row,
        Err(e) => {
            error!(submission_id, error = %e, "ingest: failed to persist OCR text");
            let _ = submissions
                .update_status(submission_id, "failed", Some(&e.to_string()), true)
                .await;
            return;
        }
    };

    let payload = serde_json::json!({
        "submission_id": submission_id,
        "ocr_text_id": ocr_row.id,
        "raw_text": ocr_row.raw_text,
        "ocr_confidence": ocr_row.ocr_confidence,
    });

    if let Err(e) = message_bus
        .publish(TOPIC_OCR, &submission_id.to_string(), payload)
        .await
    {
        error!(submission_id, error = %e, "ingest: failed to publish OCR stage message");
        let _ = submissions
            .update_status(submission_id, "failed", Some(&e.to_string()), true)
            .await;
        return;
    }

    info!(submission_id, "ingest stage complete");
}
