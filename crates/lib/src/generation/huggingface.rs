//! Hosted-inference client: POST {base}/models/{model} with `{ "inputs": prompt }`.
//! Text-generation models answer with `[{ "generated_text": … }]`.

use crate::error::GenerationError;
use crate::generation::{non_empty_text, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
const DEFAULT_MODEL: &str = "google/flan-t5-small";

#[derive(Clone)]
pub struct HuggingFaceClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// The endpoint answers with a list, a bare object, or an error object depending on model and state.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Generations(Vec<Generation>),
    Error { error: String },
    Single(Generation),
}

impl HuggingFaceClient {
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
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceClient {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&InferenceRequest { inputs: prompt })
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            let detail = match serde_json::from_str::<InferenceResponse>(&body) {
                Ok(InferenceResponse::Error { error }) => error,
                _ => body,
            };
            return Err(GenerationError::Api(format!("{} {}", status, detail)));
        }
        parse_generated_text(&body)
    }
}

fn parse_generated_text(body: &str) -> Result<String, GenerationError> {
    let parsed: InferenceResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    match parsed {
        InferenceResponse::Generations(list) => match list.into_iter().next() {
            Some(g) => non_empty_text(&g.generated_text),
            None => Err(GenerationError::EmptyResult),
        },
        InferenceResponse::Single(g) => non_empty_text(&g.generated_text),
        InferenceResponse::Error { error } => Err(GenerationError::Api(error)),
    }
}
