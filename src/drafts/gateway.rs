//! Chat-completions client for remote draft generation.
//!
//! Uses reqwest with Bearer token auth against an OpenAI-compatible
//! `/chat/completions` endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use super::prompts::{system_prompt, user_prompt};
use super::{DraftGenerator, DraftRequest};
use crate::error::DraftError;
use crate::types::DraftConfig;

pub struct GatewayDraftGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletion {
    /// Trimmed content of the first choice, or "".
    fn draft(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

impl GatewayDraftGenerator {
    pub fn new(config: &DraftConfig, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Build from config, reading the bearer token from `config.api_key_env`.
    pub fn from_env(config: &DraftConfig) -> Result<Self, DraftError> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(config, key.trim())),
            _ => Err(DraftError::Configuration(format!(
                "{} is not configured",
                config.api_key_env
            ))),
        }
    }

    fn request_body(&self, request: &DraftRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(&request.constraints) },
                { "role": "user", "content": user_prompt(request) },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }
}

/// Classify a non-success gateway status.
pub(crate) fn map_status(status: u16, body: String) -> DraftError {
    match status {
        429 => DraftError::RateLimited,
        402 => DraftError::QuotaExceeded,
        _ => DraftError::Gateway {
            status,
            message: body,
        },
    }
}

#[async_trait]
impl DraftGenerator for GatewayDraftGenerator {
    async fn generate(&self, request: &DraftRequest) -> Result<String, DraftError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            log::warn!("DraftGateway: error {}: {}", status, text);
            return Err(map_status(status.as_u16(), text));
        }

        let completion: ChatCompletion = resp.json().await.map_err(|e| DraftError::Gateway {
            status: status.as_u16(),
            message: format!("Failed to parse gateway response: {}", e),
        })?;

        let draft = completion.draft();
        if draft.is_empty() {
            return Err(DraftError::EmptyDraft);
        }
        log::info!(
            "DraftGateway: drafted block {} ({} chars)",
            request.section_number,
            draft.len()
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DraftErrorCategory;
    use crate::types::PitchData;

    #[test]
    fn test_map_status_categories() {
        assert_eq!(map_status(429, String::new()).category(), DraftErrorCategory::RateLimit);
        assert_eq!(map_status(402, String::new()).category(), DraftErrorCategory::Quota);
        match map_status(500, "boom".into()) {
            DraftError::Gateway { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let generator = GatewayDraftGenerator::new(&DraftConfig::default(), "key");
        let request = DraftRequest::from_data(2, &PitchData::default()).unwrap();
        let body = generator.request_body(&request);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("LA SOLUCIÓN"));
    }

    #[test]
    fn test_completion_draft_extraction() {
        let parsed: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Carlos tiene 24 años.  "}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.draft(), "Carlos tiene 24 años.");

        let empty: ChatCompletion = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.draft(), "");
        let null: ChatCompletion =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(null.draft(), "");
    }

    #[test]
    fn test_from_env_requires_key() {
        let config = DraftConfig {
            api_key_env: "PITCHKIT_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..DraftConfig::default()
        };
        assert!(matches!(
            GatewayDraftGenerator::from_env(&config),
            Err(DraftError::Configuration(_))
        ));
    }
}
