mod client;
pub mod prompt_builder;
pub(crate) mod types;

pub use prompt_builder::OpenAiPromptBuilder;

use std::time::Duration;

use crate::error::Result;
use crate::traits::Agent;

use client::OpenAiClient;

/// Request timeout. The hosting platform's default is unbounded.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// OpenAi Agent
// =============================================================================

/// Cloning shares the underlying HTTP connection pool.
#[derive(Clone)]
pub struct OpenAi {
    pub(crate) model: String,
    client: OpenAiClient,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            model: model.into(),
            client: OpenAiClient::new(api_key.into(), DEFAULT_TIMEOUT)?,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(&url.into());
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    pub(crate) fn client(&self) -> &OpenAiClient {
        &self.client
    }
}

// =============================================================================
// Agent Implementation
// =============================================================================

impl Agent for OpenAi {
    type PromptBuilder = OpenAiPromptBuilder;

    fn prompt(&self, input: impl Into<String>) -> OpenAiPromptBuilder {
        OpenAiPromptBuilder::new(self.clone(), input.into())
    }
}
