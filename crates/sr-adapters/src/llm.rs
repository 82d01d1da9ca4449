//! HTTP-based LLM provider adapter (C5): an Ollama-compatible
//! `/api/generate` client with the JSON-then-key-value reply parser
//! from §4.9.

use crate::config::LlmConfig;
use crate::prompts::{render_categorization_prompt, render_extraction_prompt, CategorizationPromptInput};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sr_ports::{CategorizationResult, ExtractedFields, LlmError, LlmProvider};
use tracing::{error, info, instrument, warn};

const FIELD_NAMES: [&str; 5] = ["nome_participante", "evento", "local", "data", "carga_horaria"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\sÀ-ÿ.,;:()\-/]").unwrap());

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaLlmProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaLlmProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::BackendError {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url,
            model: config.model,
        })
    }

    async fn generate(&self, prompt: String) -> Result<String, LlmError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.1,
                top_p: 0.9,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::BackendError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LlmError::BackendError {
                message: format!("ollama returned status {}", response.status()),
            });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| LlmError::BackendError {
            message: e.to_string(),
        })?;
        Ok(body.response.trim().to_string())
    }
}

impl LlmProvider for OllamaLlmProvider {
    #[instrument(skip(self, raw_text), fields(model = %self.model))]
    async fn extract_fields(&self, raw_text: &str) -> Result<ExtractedFields, LlmError> {
        let prompt = render_extraction_prompt(raw_text);
        let reply = match self.generate(prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "ollama request failed during extraction");
                return Ok(ExtractedFields::default());
            }
        };

        if let Some(fields) = parse_json_fields(&reply) {
            return Ok(fields);
        }
        info!("no valid JSON in extraction reply, falling back to key-value parsing");
        Ok(parse_key_value_fields(&reply))
    }

    #[instrument(skip(self, raw_text, extracted, categories_text), fields(model = %self.model))]
    async fn categorize_activity(
        &self,
        raw_text: &str,
        extracted: &ExtractedFields,
        categories_text: &str,
    ) -> Result<CategorizationResult, LlmError> {
        let prompt = render_categorization_prompt(&CategorizationPromptInput {
            raw_text,
            nome_participante: extracted.nome_participante.as_deref(),
            evento: extracted.evento.as_deref(),
            local: extracted.local.as_deref(),
            data: extracted.data.as_deref(),
            carga_horaria: extracted.carga_horaria.as_deref(),
            categories_text,
        });

        let reply = match self.generate(prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "ollama request failed during categorization");
                return Ok(CategorizationResult {
                    category_id: None,
                    reasoning: String::new(),
                });
            }
        };

        Ok(parse_categorization(&reply))
    }
}

fn json_bounds(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&reply[start..=end])
}

fn parse_json_fields(reply: &str) -> Option<ExtractedFields> {
    let json_str = json_bounds(reply)?;
    serde_json::from_str(json_str).ok()
}

/// Line-by-line fallback parser: scan for a recognized field name
/// followed by `:`, fold continuation lines until the next recognized
/// key, then clean whitespace and strip characters outside the allowed
/// Portuguese text set.
fn parse_key_value_fields(reply: &str) -> ExtractedFields {
    let mut values: std::collections::HashMap<&str, String> = std::collections::HashMap::new();
    let mut current_field: Option<&str> = None;
    let mut current_value = String::new();

    for line in reply.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let lower = line.to_lowercase();
        let mut matched_field = None;
        for field in FIELD_NAMES {
            let prefix = format!("{field}:");
            if lower.starts_with(&prefix) {
                matched_field = Some(field);
                break;
            }
        }

        if let Some(field) = matched_field {
            if let Some(prev_field) = current_field {
                if !current_value.trim().is_empty() {
                    values.insert(prev_field, current_value.trim().to_string());
                }
            }
            current_field = Some(field);
            current_value = line[field.len() + 1..].trim().to_string();
        } else if let Some(_field) = current_field {
            current_value.push(' ');
            current_value.push_str(line);
        }
    }

    if let Some(field) = current_field {
        if !current_value.trim().is_empty() {
            values.insert(field, current_value.trim().to_string());
        }
    }

    let clean = |raw: &str| -> String {
        let collapsed = WHITESPACE.replace_all(raw, " ");
        DISALLOWED_CHARS.replace_all(&collapsed, "").trim().to_string()
    };

    ExtractedFields {
        nome_participante: values.get("nome_participante").map(|v| clean(v)),
        evento: values.get("evento").map(|v| clean(v)),
        local: values.get("local").map(|v| clean(v)),
        data: values.get("data").map(|v| clean(v)),
        carga_horaria: values.get("carga_horaria").map(|v| clean(v)),
    }
}

#[derive(Debug, Deserialize)]
struct RawCategorization {
    category_id: Option<i64>,
    #[serde(default)]
    reasoning: Option<String>,
}

fn parse_categorization(reply: &str) -> CategorizationResult {
    if let Some(json_str) = json_bounds(reply) {
        if let Ok(parsed) = serde_json::from_str::<RawCategorization>(json_str) {
            return CategorizationResult {
                category_id: parsed.category_id,
                reasoning: parsed.reasoning.unwrap_or_else(|| reply.to_string()),
            };
        }
    }
    CategorizationResult {
        category_id: None,
        reasoning: reply.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_fields() {
        let reply = r#"{"nome_participante": "Joao Silva", "evento": "Workshop", "local": "online", "data": "2024-01-01", "carga_horaria": "8h"}"#;
        let fields = parse_json_fields(reply).unwrap();
        assert_eq!(fields.nome_participante.as_deref(), Some("Joao Silva"));
        assert_eq!(fields.local.as_deref(), Some("online"));
    }

    #[test]
    fn falls_back_to_key_value_when_json_absent() {
        let reply = "nome_participante: Joao Silva\nevento: Workshop Rust\ncontinuing line of text\nlocal: online\ndata: 2024-01-01\ncarga_horaria: 8h";
        let fields = parse_key_value_fields(reply);
        assert_eq!(fields.nome_participante.as_deref(), Some("Joao Silva"));
        assert!(fields.evento.as_deref().unwrap().contains("continuing line of text"));
        assert_eq!(fields.local.as_deref(), Some("online"));
    }

    #[test]
    fn key_value_cleanup_strips_disallowed_characters() {
        let reply = "evento: Workshop @@@ Rust ### 2024";
        let fields = parse_key_value_fields(reply);
        assert_eq!(fields.evento.as_deref(), Some("Workshop  Rust  2024"));
    }

    #[test]
    fn categorization_prefers_json_reasoning() {
        let reply = r#"Here's the result: {"category_id": 3, "reasoning": "Matched course keyword"}"#;
        let result = parse_categorization(reply);
        assert_eq!(result.category_id, Some(3));
        assert_eq!(result.reasoning, "Matched course keyword");
    }

    #[test]
    fn categorization_falls_back_to_raw_text_without_json() {
        let reply = "I could not determine a category for this certificate.";
        let result = parse_categorization(reply);
        assert_eq!(result.category_id, None);
        assert_eq!(result.reasoning, reply);
    }
}
