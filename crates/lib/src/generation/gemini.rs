//! Generative-language API client (https://generativelanguage.googleapis.com by default).
//! Single-turn generateContent: one user text part in, first candidate's text parts out.

use crate::config::SafetySetting;
use crate::error::GenerationError;
use crate::generation::{non_empty_text, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-pro";

/// Client for the generateContent endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    safety_settings: Vec<SafetySetting>,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            safety_settings: Vec::new(),
            client,
        })
    }

    /// Safety thresholds sent with every request. Empty means provider defaults.
    pub fn with_safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = settings;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /v1beta/models/{model}:generateContent
    pub async fn generate_content(&self, prompt: &str) -> Result<GenerateContentResponse, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            safety_settings: &self.safety_settings,
        };
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GenerationError::Api(format!("{} {}", status, detail)));
        }
        let text = res.text().await?;
        serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self.generate_content(prompt).await?;
        response.into_text()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "no_safety_settings")]
    safety_settings: &'a [SafetySetting],
}

fn no_safety_settings(settings: &&[SafetySetting]) -> bool {
    settings.is_empty()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    /// A blocked prompt, a safety-stopped candidate, or no text at all is an error.
    pub fn into_text(self) -> Result<String, GenerationError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(match block_reason {
                Some(reason) => GenerationError::Blocked(reason),
                None => GenerationError::EmptyResult,
            });
        };
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            if let Some(reason) = candidate.finish_reason.filter(|r| r == "SAFETY") {
                return Err(GenerationError::Blocked(reason));
            }
        }
        non_empty_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn joins_parts_of_first_candidate() {
        let r = parse(
            r#"{"candidates":[
                {"content":{"role":"model","parts":[{"text":"Hi "},{"text":"there!"}]},"finishReason":"STOP"},
                {"content":{"parts":[{"text":"ignored"}]}}
            ]}"#,
        );
        assert_eq!(r.into_text().unwrap(), "Hi there!");
    }

    #[test]
    fn no_candidates_is_empty_result() {
        assert!(matches!(
            parse(r#"{"candidates":[]}"#).into_text(),
            Err(GenerationError::EmptyResult)
        ));
        assert!(matches!(
            parse("{}").into_text(),
            Err(GenerationError::EmptyResult)
        ));
    }

    #[test]
    fn blocked_prompt() {
        let r = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        match r.into_text() {
            Err(GenerationError::Blocked(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn safety_stopped_candidate_without_text() {
        let r = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert!(matches!(r.into_text(), Err(GenerationError::Blocked(_))));
    }

    #[test]
    fn request_omits_empty_safety_settings() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some("Hello".to_string()),
                }],
            }],
            safety_settings: &[],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "Hello");
        assert!(v.get("safetySettings").is_none());

        let settings = vec![SafetySetting {
            category: "HARM_CATEGORY_HARASSMENT".to_string(),
            threshold: "BLOCK_ONLY_HIGH".to_string(),
        }];
        let body = GenerateContentRequest {
            contents: Vec::new(),
            safety_settings: &settings,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["safetySettings"][0]["threshold"], "BLOCK_ONLY_HIGH");
    }
}
