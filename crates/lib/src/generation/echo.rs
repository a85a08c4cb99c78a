//! Echo provider: replies with the message it was given.

use crate::error::GenerationError;
use crate::generation::{non_empty_text, TextGenerator};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        non_empty_text(prompt)
    }
}
