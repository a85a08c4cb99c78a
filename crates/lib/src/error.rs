//! Error types for each stage of the bridge.
//!
//! `ConfigError` stops the process at startup. `GenerationError` and `DeliveryError`
//! come from the external providers and are folded into `BridgeError` by the handler.
//! `WebhookError` is what the HTTP layer turns into a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {key} (set {env})")]
    Missing {
        key: &'static str,
        env: &'static str,
    },
    #[error("no generation provider configured: set GEMINI_API_KEY or HUGGINGFACE_API_KEY, or generation.provider")]
    NoProvider,
    #[error("both GEMINI_API_KEY and HUGGINGFACE_API_KEY are set; choose one with generation.provider")]
    AmbiguousProvider,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(reqwest::Error),
    #[error("generation request timed out")]
    Timeout,
    #[error("generation api error: {0}")]
    Api(String),
    #[error("generation response malformed: {0}")]
    Malformed(String),
    #[error("generation returned no text")]
    EmptyResult,
    #[error("prompt blocked by provider: {0}")]
    Blocked(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Request(e)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("send request failed: {0}")]
    Request(reqwest::Error),
    #[error("send request timed out")]
    Timeout,
    #[error("send api error: {status} {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Request(e)
        }
    }
}

/// Failure of one bridged message.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Generation failed. `fallback_sent` is true when the apology reached the send API.
    #[error("{source}")]
    Generation {
        #[source]
        source: GenerationError,
        fallback_sent: bool,
    },
    /// Generation succeeded but the reply could not be sent.
    #[error("{0}")]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("unreadable payload: {0}")]
    Unparseable(String),
    #[error("invalid or missing X-Twilio-Signature")]
    BadSignature,
    #[error(transparent)]
    Processing(#[from] BridgeError),
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::MissingField(_) | WebhookError::Unparseable(_) => StatusCode::BAD_REQUEST,
            WebhookError::BadSignature => StatusCode::FORBIDDEN,
            WebhookError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = match &self {
            WebhookError::MissingField(_) | WebhookError::Unparseable(_) => json!({
                "error": "Malformed request",
                "details": self.to_string(),
            }),
            WebhookError::BadSignature => json!({ "error": "Invalid signature" }),
            WebhookError::Processing(e) => json!({
                "error": "Processing failed",
                "details": e.to_string(),
            }),
        };
        (self.status(), Json(body)).into_response()
    }
}
