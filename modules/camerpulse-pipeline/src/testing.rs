// Test mocks for the generation pipeline.
//
// Two mocks matching the two trait boundaries:
// - MockGenerationStore (GenerationStore): in-memory settings, signals,
//   audit history and the transactional commit
// - MockTextGenerator (TextGenerator): scripted queue of completions
//
// Plus helpers for constructing signals, settings and model responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use ai_client::AiError;
use camerpulse_common::{
    AuditRecord, CommitOutcome, GeneratedPoll, GenerationSettings, Signal, SignalCategory,
};

use crate::traits::{GenerationRequest, GenerationStore, TextGenerator};

// ---------------------------------------------------------------------------
// MockGenerationStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    polls: Vec<GeneratedPoll>,
    audits: Vec<AuditRecord>,
    /// Generations written before the test started, by creation time.
    past_generations: Vec<DateTime<Utc>>,
}

/// Stateful in-memory store. Builder pattern: `.with_settings()`,
/// `.with_signal()`, `.with_past_generation()`, `.fill_quota_at_commit()`,
/// `.failing_commit()`, `.failing_reads()`.
pub struct MockGenerationStore {
    settings: GenerationSettings,
    signals: Vec<Signal>,
    state: Mutex<StoreState>,
    /// Generations another writer lands between the pre-check and our commit.
    racing_generations: Mutex<u64>,
    fail_commit: bool,
    fail_reads: bool,
}

impl Default for MockGenerationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationStore {
    /// Default settings: generation disabled.
    pub fn new() -> Self {
        Self {
            settings: GenerationSettings::default(),
            signals: Vec::new(),
            state: Mutex::new(StoreState::default()),
            racing_generations: Mutex::new(0),
            fail_commit: false,
            fail_reads: false,
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn with_past_generation(self, created_at: DateTime<Utc>) -> Self {
        self.state
            .lock()
            .unwrap()
            .past_generations
            .push(created_at);
        self
    }

    /// Simulate `n` concurrent runs committing after our pre-check.
    pub fn fill_quota_at_commit(self, n: u64) -> Self {
        *self.racing_generations.lock().unwrap() = n;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    // --- Assertions ---

    pub fn polls(&self) -> Vec<GeneratedPoll> {
        self.state.lock().unwrap().polls.clone()
    }

    pub fn audits(&self) -> Vec<AuditRecord> {
        self.state.lock().unwrap().audits.clone()
    }

    fn count_since(state: &StoreState, since: DateTime<Utc>) -> u64 {
        let past = state.past_generations.iter().filter(|t| **t >= since).count();
        let written = state.audits.iter().filter(|a| a.created_at >= since).count();
        (past + written) as u64
    }
}

#[async_trait]
impl GenerationStore for MockGenerationStore {
    async fn load_settings(&self) -> Result<GenerationSettings> {
        if self.fail_reads {
            bail!("MockGenerationStore: connection refused");
        }
        Ok(self.settings.clone())
    }

    async fn top_signals(
        &self,
        category: SignalCategory,
        since: DateTime<Utc>,
        min_strength: f64,
        limit: u32,
    ) -> Result<Vec<Signal>> {
        if self.fail_reads {
            bail!("MockGenerationStore: connection refused");
        }
        let mut matching: Vec<Signal> = self
            .signals
            .iter()
            .filter(|s| s.category == category)
            .filter(|s| s.observed_at >= since && s.strength >= min_strength)
            .cloned()
            .collect();
        // Mirrors ORDER BY strength DESC, observed_at DESC.
        matching.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then(b.observed_at.cmp(&a.observed_at))
        });
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn count_generations_since(&self, since: DateTime<Utc>) -> Result<u64> {
        if self.fail_reads {
            bail!("MockGenerationStore: connection refused");
        }
        Ok(Self::count_since(&self.state.lock().unwrap(), since))
    }

    async fn commit_generation(
        &self,
        poll: &GeneratedPoll,
        audit: &AuditRecord,
        window_start: DateTime<Utc>,
        max_per_window: u32,
    ) -> Result<CommitOutcome> {
        if self.fail_commit {
            bail!("MockGenerationStore: audit insert failed");
        }

        let mut state = self.state.lock().unwrap();
        let racing = std::mem::take(&mut *self.racing_generations.lock().unwrap());
        for _ in 0..racing {
            state.past_generations.push(audit.created_at);
        }

        let used = Self::count_since(&state, window_start);
        if used >= u64::from(max_per_window) {
            return Ok(CommitOutcome::QuotaReached { used });
        }

        state.polls.push(poll.clone());
        state.audits.push(audit.clone());
        Ok(CommitOutcome::Committed)
    }

    async fn recent_audit_records(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        let mut audits = self.audits();
        audits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        audits.truncate(limit as usize);
        Ok(audits)
    }
}

// ---------------------------------------------------------------------------
// MockTextGenerator
// ---------------------------------------------------------------------------

/// Scripted completions, consumed in order. An exhausted script is a
/// network error.
pub struct MockTextGenerator {
    responses: Mutex<VecDeque<ai_client::Result<String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn with_error(self, error: AiError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, request: &GenerationRequest) -> ai_client::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::Network("MockTextGenerator: script exhausted".into())))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A signal observed an hour ago. Complaints get a row id; sentiment trends
/// are aggregates and get none.
pub fn signal(category: SignalCategory, topic: &str, strength: f64) -> Signal {
    Signal {
        id: match category {
            SignalCategory::Complaint => Some(Uuid::new_v4()),
            SignalCategory::SentimentTrend => None,
        },
        topic: topic.to_string(),
        description: None,
        strength,
        category,
        region: None,
        observed_at: Utc::now() - Duration::hours(1),
    }
}

/// Defaults with the kill switch on.
pub fn enabled_settings() -> GenerationSettings {
    GenerationSettings {
        enabled: true,
        ..GenerationSettings::default()
    }
}

/// A well-formed model response.
pub fn poll_json(question: &str, options: &[&str], reasoning: &str) -> String {
    serde_json::json!({
        "question": question,
        "options": options,
        "reasoning": reasoning,
    })
    .to_string()
}
