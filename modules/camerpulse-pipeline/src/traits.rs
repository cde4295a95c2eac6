// Trait abstractions for the generation pipeline's external collaborators.
//
// GenerationStore wraps PulseStore: settings, signals, quota count and the
// transactional poll + audit write.
// TextGenerator wraps the OpenAI chat client.
//
// These enable deterministic testing with MockGenerationStore and
// MockTextGenerator: no network, no database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ai_client::{Agent, OpenAi, PromptBuilder};
use camerpulse_common::{
    AuditRecord, CommitOutcome, GeneratedPoll, GenerationSettings, Signal, SignalCategory,
};
use camerpulse_store::PulseStore;

// ---------------------------------------------------------------------------
// GenerationStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Current generation settings. Called once at the start of every run.
    async fn load_settings(&self) -> Result<GenerationSettings>;

    /// Strongest signals of `category` since `since` with strength >= `min_strength`,
    /// strongest first, most recent first among equals.
    async fn top_signals(
        &self,
        category: SignalCategory,
        since: DateTime<Utc>,
        min_strength: f64,
        limit: u32,
    ) -> Result<Vec<Signal>>;

    /// Audit rows created at or after `since`.
    async fn count_generations_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Re-check the quota and write poll + audit atomically.
    async fn commit_generation(
        &self,
        poll: &GeneratedPoll,
        audit: &AuditRecord,
        window_start: DateTime<Utc>,
        max_per_window: u32,
    ) -> Result<CommitOutcome>;

    /// Most recent audit rows, newest first.
    async fn recent_audit_records(&self, limit: u32) -> Result<Vec<AuditRecord>>;
}

#[async_trait]
impl GenerationStore for PulseStore {
    async fn load_settings(&self) -> Result<GenerationSettings> {
        let rows = self.settings_rows().await?;
        Ok(GenerationSettings::from_rows(rows))
    }

    async fn top_signals(
        &self,
        category: SignalCategory,
        since: DateTime<Utc>,
        min_strength: f64,
        limit: u32,
    ) -> Result<Vec<Signal>> {
        self.top_signals(category, since, min_strength, limit).await
    }

    async fn count_generations_since(&self, since: DateTime<Utc>) -> Result<u64> {
        self.count_generations_since(since).await
    }

    async fn commit_generation(
        &self,
        poll: &GeneratedPoll,
        audit: &AuditRecord,
        window_start: DateTime<Utc>,
        max_per_window: u32,
    ) -> Result<CommitOutcome> {
        self.commit_generation(poll, audit, window_start, max_per_window)
            .await
    }

    async fn recent_audit_records(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        self.recent_audit_records(limit).await
    }
}

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

/// One completion call: system message, user prompt and sampling budget.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Return the raw message content produced for `request`.
    async fn generate(&self, request: &GenerationRequest) -> ai_client::Result<String>;
}

#[async_trait]
impl TextGenerator for OpenAi {
    async fn generate(&self, request: &GenerationRequest) -> ai_client::Result<String> {
        self.prompt(&request.prompt)
            .preamble(&request.system)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .send()
            .await
    }
}
