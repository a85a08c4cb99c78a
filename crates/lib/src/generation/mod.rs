//! Text-generation providers behind one capability trait.
//!
//! Provider response shapes differ (candidate parts vs. a list of `generated_text`);
//! each client hides its own shape and returns plain text. The provider is chosen once
//! from config by [`build_generator`].

mod echo;
mod gemini;
mod huggingface;

pub use echo::EchoGenerator;
pub use gemini::GeminiClient;
pub use huggingface::HuggingFaceClient;

use crate::config::{GeneratorSettings, ProviderKind};
use crate::error::GenerationError;
use async_trait::async_trait;
use std::sync::Arc;

/// Produces reply text for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name for logs and health output.
    fn name(&self) -> &str;

    /// Generate a reply. Empty or unparseable provider output is an error, never `Ok("")`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Construct the configured provider.
pub fn build_generator(settings: &GeneratorSettings) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    let api_key = || {
        settings
            .api_key
            .clone()
            .ok_or_else(|| GenerationError::Api("api key not configured".to_string()))
    };
    let generator: Arc<dyn TextGenerator> = match settings.provider {
        ProviderKind::Gemini => Arc::new(
            GeminiClient::new(
                api_key()?,
                settings.model.clone(),
                settings.base_url.clone(),
                settings.timeout,
            )?
            .with_safety_settings(settings.safety_settings.clone()),
        ),
        ProviderKind::HuggingFace => Arc::new(HuggingFaceClient::new(
            api_key()?,
            settings.model.clone(),
            settings.base_url.clone(),
            settings.timeout,
        )?),
        ProviderKind::Echo => Arc::new(EchoGenerator),
    };
    log::info!("generation provider: {}", generator.name());
    Ok(generator)
}

/// Whitespace-only provider output counts as no result. Non-blank text is returned as-is.
pub(crate) fn non_empty_text(text: &str) -> Result<String, GenerationError> {
    if text.trim().is_empty() {
        Err(GenerationError::EmptyResult)
    } else {
        Ok(text.to_string())
    }
}
