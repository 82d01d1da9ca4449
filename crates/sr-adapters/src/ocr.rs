//! HTTP-based OCR engine adapter (C4).
//!
//! The actual image/PDF decoding and Tesseract invocation live in the
//! external OCR engine this adapter calls over HTTP; per §1 that engine
//! is an out-of-scope collaborator and this crate only implements the
//! client side of its contract. The engine returns one `{text,
//! confidence}` pair per page — a single-element list for an image —
//! and this adapter reproduces the source's page-aggregation exactly:
//! texts are joined with a single space, confidences are averaged.

use crate::config::OcrConfig;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sr_ports::{OcrEngine, OcrError, OcrResult};
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct PageResult {
    text: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    pages: Vec<PageResult>,
}

pub struct HttpOcrEngine {
    client: Client,
    base_url: String,
}

impl HttpOcrEngine {
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OcrError::BackendError {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }
}

impl OcrEngine for HttpOcrEngine {
    #[instrument(skip(self, bytes), fields(extension = %extension, size = bytes.len()))]
    async fn process_file(&self, bytes: Bytes, extension: &str) -> Result<OcrResult, OcrError> {
        let part = Part::bytes(bytes.to_vec()).file_name(format!("file.{extension}"));
        let form = Form::new().part("file", part).text("extension", extension.to_string());

        let response = self
            .client
            .post(format!("{}/process", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| OcrError::BackendError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(OcrError::BackendError {
                message: format!("ocr engine returned status {}", response.status()),
            });
        }

        let parsed: ProcessResponse = response.json().await.map_err(|e| OcrError::BackendError {
            message: e.to_string(),
        })?;

        Ok(aggregate_pages(parsed.pages))
    }
}

fn aggregate_pages(pages: Vec<PageResult>) -> OcrResult {
    if pages.is_empty() {
        return OcrResult {
            text: String::new(),
            confidence: 0.0,
        };
    }

    let texts: Vec<&str> = pages.iter().map(|p| p.text.as_str()).collect();
    let confidence_sum: f64 = pages.iter().map(|p| p.confidence).sum();

    OcrResult {
        text: texts.join(" "),
        confidence: confidence_sum / pages.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_aggregates_to_itself() {
        let pages = vec![PageResult {
            text: "hello world".to_string(),
            confidence: 92.5,
        }];
        let result = aggregate_pages(pages);
        assert_eq!(result.text, "hello world");
        assert_eq!(result.confidence, 92.5);
    }

    #[test]
    fn multi_page_pdf_joins_text_and_averages_confidence() {
        let pages = vec![
            PageResult {
                text: "page one".to_string(),
                confidence: 90.0,
            },
            PageResult {
                text: "page two".to_string(),
                confidence: 80.0,
            },
        ];
        let result = aggregate_pages(pages);
        assert_eq!(result.text, "page one page two");
        assert_eq!(result.confidence, 85.0);
    }

    #[test]
    fn empty_pages_yield_empty_text_and_zero_confidence() {
        let result = aggregate_pages(vec![]);
        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn process_file_posts_multipart_and_parses_pages() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pages": [{"text": "certificado de participacao", "confidence": 96.0}]
            })))
            .mount(&server)
            .await;

        let engine = HttpOcrEngine::new(OcrConfig {
            base_url: server.uri(),
            connect_timeout_secs: 5,
            request_timeout_secs: 5,
        })
        .unwrap();

        let result = engine
            .process_file(Bytes::from_static(b"%PDF-1.4 fake"), "pdf")
            .await
            .unwrap();

        assert_eq!(result.text, "certificado de participacao");
        assert_eq!(result.confidence, 96.0);
    }

    #[tokio::test]
    async fn process_file_surfaces_backend_error_on_non_success_status() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let engine = HttpOcrEngine::new(OcrConfig {
            base_url: server.uri(),
            connect_timeout_secs: 5,
            request_timeout_secs: 5,
        })
        .unwrap();

        let err = engine
            .process_file(Bytes::from_static(b"whatever"), "png")
            .await
            .unwrap_err();

        assert!(matches!(err, OcrError::BackendError { .. }));
    }
}
