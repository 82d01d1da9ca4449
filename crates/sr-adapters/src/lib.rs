//! Adapter implementations for the certificate processing pipeline.
//!
//! Each module implements one or more ports from `sr-ports` against a
//! concrete external collaborator:
//! - `postgres`: student/submission/metadata/activity repositories (C3)
//! - `object_store`: S3/MinIO-compatible content-addressed storage (C1)
//! - `message_bus`: NATS JetStream durable pub/sub (C2)
//! - `ocr`: HTTP client for the external OCR engine (C4)
//! - `llm`: HTTP client for the Ollama-compatible LLM provider (C5)
//! - `prompts`: the two certificate-domain prompt templates (§4.9)

pub mod config;
pub mod llm;
pub mod message_bus;
pub mod object_store;
pub mod ocr;
pub mod postgres;
pub mod prompts;

pub use config::{LlmConfig, MessageBusConfig, ObjectStoreConfig, OcrConfig, PostgresConfig};
pub use llm::OllamaLlmProvider;
pub use message_bus::{
    NatsMessageBus, CONSUMER_GROUP_INGEST, CONSUMER_GROUP_METADATA, CONSUMER_GROUP_OCR,
    TOPIC_INGEST, TOPIC_METADATA, TOPIC_OCR,
};
pub use object_store::{content_type_for_extension, object_key, S3ObjectStore};
pub use ocr::HttpOcrEngine;
pub use postgres::{
    PostgresActivityRepository, PostgresCategoryRepository, PostgresMetadataRepository,
    PostgresOcrTextRepository, PostgresStudentRepository, PostgresSubmissionRepository,
};
