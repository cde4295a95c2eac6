use async_trait::async_trait;
use tracing::debug;

use crate::error::{AiError, Result};
use crate::traits::PromptBuilder;

use super::types::*;
use super::OpenAi;

pub struct OpenAiPromptBuilder {
    agent: OpenAi,
    input: String,
    preamble: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiPromptBuilder {
    pub(crate) fn new(agent: OpenAi, input: String) -> Self {
        Self {
            agent,
            input,
            preamble: None,
            temperature: None,
            max_tokens: None,
        }
    }

    fn build_request(&self) -> ChatRequest {
        let model = self.agent.model();
        let mut request = ChatRequest::new(model);

        if let Some(ref preamble) = self.preamble {
            request = request.message(WireMessage::system(preamble));
        }

        request = request.message(WireMessage::user(&self.input));

        if uses_max_completion_tokens(model) {
            if let Some(max) = self.max_tokens {
                request = request.max_completion_tokens(max);
            }
        } else {
            if let Some(max) = self.max_tokens {
                request = request.max_tokens(max);
            }
            if let Some(t) = self.temperature {
                request = request.temperature(t);
            }
        }

        request
    }
}

#[async_trait]
impl PromptBuilder for OpenAiPromptBuilder {
    fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    async fn send(self) -> Result<String> {
        let request = self.build_request();
        let response = self.agent.client().chat(&request).await?;

        let text = response.text().ok_or(AiError::EmptyResponse)?;
        debug!(chars = text.len(), "OpenAI completion received");
        Ok(text)
    }
}
