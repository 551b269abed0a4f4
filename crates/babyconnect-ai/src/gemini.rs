//! Gemini `generateContent` client.

use std::env;

use async_trait::async_trait;
use babyconnect_store::models::AppConfig;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::error::{AiError, AiResult};
use crate::generator::{GenerateRequest, Generator, Speaker};

/// Public Gemini endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used unless configured otherwise.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Environment variables consulted for the key, in order.
const KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// API key from the operator config, then the environment.
pub fn resolve_api_key(config: &AppConfig) -> Option<String> {
    config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| {
            KEY_VARS
                .iter()
                .filter_map(|var| env::var(var).ok())
                .map(|k| k.trim().to_string())
                .find(|k| !k.is_empty())
        })
}

/// HTTP client for one Gemini model.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> AiResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AiError::MissingApiKey);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Client using [`resolve_api_key`].
    pub fn from_config(config: &AppConfig, model: impl Into<String>) -> AiResult<Self> {
        let key = resolve_api_key(config).ok_or(AiError::MissingApiKey)?;
        Self::new(key, model)
    }

    /// Point at a different endpoint (a proxy or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(request: &GenerateRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                let role = match turn.speaker {
                    Speaker::User => "user",
                    Speaker::Model => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.text }] })
            })
            .collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": request.prompt }] }));

        let mut body = json!({ "contents": contents });
        if let Some(system) = &request.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let mut generation = serde_json::Map::new();
        if let Some(t) = request.temperature {
            generation.insert("temperature".into(), json!(t));
        }
        if let Some(schema) = &request.schema {
            generation.insert("responseMimeType".into(), json!("application/json"));
            generation.insert("responseSchema".into(), schema.clone());
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }
        body
    }
}

/// Concatenated text of the first candidate.
fn reply_text(response: &Value) -> AiResult<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| AiError::Parse {
            reason: "response has no candidate content".into(),
        })?;
    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect())
}

#[async_trait]
impl Generator for GeminiClient {
    #[instrument(skip(self, request), fields(model = %self.model, structured = request.schema.is_some()))]
    async fn generate(&self, request: &GenerateRequest) -> AiResult<Value> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            warn!(%status, "ai service rejected request");
            return Err(AiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let response: Value = serde_json::from_str(&text).map_err(|e| AiError::Parse {
            reason: format!("invalid JSON response: {e}"),
        })?;
        let reply = reply_text(&response)?;
        debug!(chars = reply.len(), "ai reply received");

        if request.schema.is_none() {
            return Ok(Value::String(reply));
        }
        serde_json::from_str(&reply).map_err(|e| AiError::Parse {
            reason: format!("structured reply is not JSON: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ChatTurn;

    #[test]
    fn body_carries_history_system_and_schema() {
        let request = GenerateRequest {
            system_instruction: Some("Be kind.".into()),
            history: vec![ChatTurn::user("oi"), ChatTurn::model("olá!")],
            prompt: "tenho azia".into(),
            schema: Some(json!({ "type": "OBJECT" })),
            temperature: Some(0.5),
        };
        let body = GeminiClient::build_body(&request);

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "tenho azia");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be kind.");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn plain_body_has_no_generation_config() {
        let body = GeminiClient::build_body(&GenerateRequest::new("oi"));
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn reply_text_joins_parts() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Olá" }, { "text": ", mamãe" }] } }]
        });
        assert_eq!(reply_text(&response).unwrap(), "Olá, mamãe");
        assert!(reply_text(&json!({ "candidates": [] })).is_err());
    }

    #[test]
    fn config_key_takes_precedence() {
        let config = AppConfig {
            api_key: Some("  from-config ".into()),
            ..AppConfig::default()
        };
        assert_eq!(resolve_api_key(&config).as_deref(), Some("from-config"));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("  ", DEFAULT_MODEL),
            Err(AiError::MissingApiKey)
        ));
    }
}
